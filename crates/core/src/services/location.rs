//! Municipality reference data.

use std::collections::HashMap;
use std::sync::Arc;

/// Resolves municipality ids to the slugs used in storage paths.
pub trait LocationDirectory: Send + Sync {
    /// Slug for `municipality_id`, if known.
    fn slug(&self, municipality_id: i32) -> Option<String>;
}

/// Directory backed by a fixed map, usually loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticLocationDirectory {
    slugs: HashMap<i32, String>,
}

impl StaticLocationDirectory {
    #[must_use]
    pub const fn new(slugs: HashMap<i32, String>) -> Self {
        Self { slugs }
    }
}

impl LocationDirectory for StaticLocationDirectory {
    fn slug(&self, municipality_id: i32) -> Option<String> {
        self.slugs.get(&municipality_id).cloned()
    }
}

pub type LocationDirectoryService = Arc<dyn LocationDirectory>;

/// Slug for `municipality_id`, falling back to `municipality-{id}`.
#[must_use]
pub fn slug_or_fallback(directory: &dyn LocationDirectory, municipality_id: i32) -> String {
    directory
        .slug(municipality_id)
        .unwrap_or_else(|| format!("municipality-{municipality_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unknown_slugs() {
        let directory = StaticLocationDirectory::new(HashMap::from([(1, "san-jose".to_string())]));
        assert_eq!(slug_or_fallback(&directory, 1), "san-jose");
        assert_eq!(slug_or_fallback(&directory, 7), "municipality-7");
    }
}
