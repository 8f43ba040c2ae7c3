//! File storage abstraction for item image uploads.

use std::path::PathBuf;

use crate::{AppError, AppResult};

/// Image extensions accepted for uploads.
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Maximum accepted image size in bytes (5 MiB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Storage configuration.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Local filesystem storage.
    Local {
        /// Base path for stored files.
        base_path: PathBuf,
        /// Base URL for serving files.
        base_url: String,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Local {
            base_path: PathBuf::from("./uploads"),
            base_url: "/uploads".to_string(),
        }
    }
}

impl StorageConfig {
    /// Build the backend described by this configuration.
    #[must_use]
    pub fn build(&self) -> LocalStorage {
        match self {
            Self::Local {
                base_path,
                base_url,
            } => LocalStorage::new(base_path.clone(), base_url.clone()),
        }
    }
}

/// Uploaded file metadata.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Storage key (relative path).
    pub key: String,
    /// Public URL to access the file.
    pub url: String,
    /// File size in bytes.
    pub size: u64,
    /// MIME content type.
    pub content_type: String,
    /// MD5 hash of the file.
    pub md5: String,
}

/// Storage backend trait.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Upload a file.
    async fn upload(&self, key: &str, data: &[u8], content_type: &str)
    -> AppResult<UploadedFile>;

    /// Delete a file.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Get the public URL for a key.
    fn public_url(&self, key: &str) -> String;
}

/// Local filesystem storage backend.
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new local storage backend.
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String) -> Self {
        Self {
            base_path,
            base_url,
        }
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalStorage {
    async fn upload(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> AppResult<UploadedFile> {
        let path = self.base_path.join(key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {e}")))?;

        let md5 = format!("{:x}", md5::compute(data));

        Ok(UploadedFile {
            key: key.to_string(),
            url: self.public_url(key),
            size: data.len() as u64,
            content_type: content_type.to_string(),
            md5,
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.base_path.join(key);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to delete file: {e}")))?;
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

/// Lowercased extension of `file_name` if it is an accepted image type.
pub fn image_extension(file_name: &str) -> AppResult<String> {
    let extension = file_name
        .rfind('.')
        .filter(|&pos| pos > 0 && pos < file_name.len() - 1)
        .map(|pos| file_name[pos + 1..].to_ascii_lowercase())
        .ok_or_else(|| AppError::BadRequest("File has no extension".to_string()))?;

    if ALLOWED_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(AppError::BadRequest(format!(
            "File type .{extension} is not allowed"
        )))
    }
}

/// Generate the storage key for an item image.
///
/// Layout: `marketplace/{municipality}/{item_id}/{timestamp}_{suffix}.{ext}`.
#[must_use]
pub fn generate_image_key(municipality_slug: &str, item_id: i32, extension: &str) -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let suffix = uuid::Uuid::new_v4().simple().to_string();

    format!(
        "marketplace/{municipality_slug}/{item_id}/{timestamp}_{}.{extension}",
        &suffix[..8]
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_image_key_layout() {
        let key = generate_image_key("san-isidro", 12, "jpg");
        let parts: Vec<&str> = key.split('/').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(&parts[..3], ["marketplace", "san-isidro", "12"]);
        assert!(parts[3].ends_with(".jpg"));
    }

    #[test]
    fn test_image_extension_accepts_images_case_insensitively() {
        assert_eq!(image_extension("Photo.JPG").unwrap(), "jpg");
        assert_eq!(image_extension("a.b.webp").unwrap(), "webp");
    }

    #[test]
    fn test_image_extension_rejects_other_files() {
        assert!(image_extension("script.sh").is_err());
        assert!(image_extension("noext").is_err());
        assert!(image_extension("trailing.").is_err());
    }

    #[tokio::test]
    async fn test_local_storage_upload_and_delete() {
        let dir = std::env::temp_dir().join(format!("lgu-storage-{}", uuid::Uuid::new_v4()));
        let storage = LocalStorage::new(dir.clone(), "/uploads/".to_string());

        let uploaded = storage
            .upload("marketplace/x/1/a.png", b"png-bytes", "image/png")
            .await
            .unwrap();

        assert_eq!(uploaded.url, "/uploads/marketplace/x/1/a.png");
        assert_eq!(uploaded.size, 9);
        let path = dir.join(&uploaded.key);
        assert!(tokio::fs::try_exists(&path).await.unwrap());

        storage.delete(&uploaded.key).await.unwrap();
        assert!(!tokio::fs::try_exists(&path).await.unwrap());
        storage.delete(&uploaded.key).await.unwrap();

        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}
