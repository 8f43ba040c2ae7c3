//! Application configuration.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::storage::StorageConfig;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Image storage configuration.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Marketplace rules.
    #[serde(default)]
    pub marketplace: MarketplaceConfig,
    /// Log output configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Municipality id to slug map, used for storage paths.
    #[serde(default)]
    pub locations: HashMap<String, String>,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this deployment.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Bearer token verification settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity service.
    pub jwt_secret: String,
    /// Allowed clock skew in seconds when checking `exp`.
    #[serde(default = "default_jwt_leeway")]
    pub leeway_secs: u64,
}

/// Local storage settings for item images.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Directory uploads are written to.
    #[serde(default = "default_storage_path")]
    pub base_path: PathBuf,
    /// URL prefix uploads are served from.
    #[serde(default = "default_storage_url")]
    pub base_url: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            base_path: default_storage_path(),
            base_url: default_storage_url(),
        }
    }
}

impl From<&StorageSettings> for StorageConfig {
    fn from(settings: &StorageSettings) -> Self {
        Self::Local {
            base_path: settings.base_path.clone(),
            base_url: settings.base_url.clone(),
        }
    }
}

/// Marketplace business rules.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketplaceConfig {
    /// Minimum lead time between proposing and the pickup itself.
    #[serde(default = "default_pickup_lead_minutes")]
    pub min_pickup_lead_minutes: i64,
    /// Maximum number of images per item.
    #[serde(default = "default_max_images")]
    pub max_images: usize,
    /// Upper bound for `per_page` on list endpoints.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            min_pickup_lead_minutes: default_pickup_lead_minutes(),
            max_images: default_max_images(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_jwt_leeway() -> u64 {
    30
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_storage_url() -> String {
    "/uploads".to_string()
}

const fn default_pickup_lead_minutes() -> i64 {
    5
}

const fn default_max_images() -> usize {
    5
}

const fn default_max_page_size() -> u64 {
    100
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `LGU_ENV`)
    /// 3. Environment variables with `LGU__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("LGU_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("LGU")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("LGU")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Municipality slugs keyed by numeric id.
    ///
    /// Keys that do not parse as ids are skipped.
    #[must_use]
    pub fn location_slugs(&self) -> HashMap<i32, String> {
        self.locations
            .iter()
            .filter_map(|(id, slug)| id.parse().ok().map(|id| (id, slug.clone())))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_fill_optional_sections() {
        let config = parse(
            r#"
            [server]
            url = "http://localhost:3000"

            [database]
            url = "postgres://localhost/lgu"

            [auth]
            jwt_secret = "secret"
            "#,
        );

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.marketplace.min_pickup_lead_minutes, 5);
        assert_eq!(config.marketplace.max_images, 5);
        assert_eq!(config.marketplace.max_page_size, 100);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.auth.leeway_secs, 30);
    }

    #[test]
    fn test_location_slugs_skip_invalid_keys() {
        let config = parse(
            r#"
            [server]
            url = "http://localhost:3000"

            [database]
            url = "postgres://localhost/lgu"

            [auth]
            jwt_secret = "secret"

            [logging]
            format = "json"

            [locations]
            1 = "city-of-san-fernando"
            abc = "ignored"
            "#,
        );

        let slugs = config.location_slugs();
        assert_eq!(slugs.len(), 1);
        assert_eq!(slugs.get(&1).map(String::as_str), Some("city-of-san-fernando"));
        assert_eq!(config.logging.format, LogFormat::Json);
    }
}
