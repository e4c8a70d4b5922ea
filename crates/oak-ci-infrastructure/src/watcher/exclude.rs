//! Shared exclusion policy for the watcher and the full-index walk
//! (spec.md §4.6): the built-in set, `.gitignore`, and
//! `indexing.exclude_patterns` are unioned; `indexing.include_managed_paths`
//! wins over all of them.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::IndexingConfig;

/// Compiled glob sets deciding whether a path is eligible for indexing or
/// watching.
pub struct ExclusionPolicy {
    excluded: GlobSet,
    managed: GlobSet,
}

impl ExclusionPolicy {
    /// Compile the policy from a loaded [`IndexingConfig`].
    pub fn from_config(config: &IndexingConfig) -> Self {
        let mut excluded = GlobSetBuilder::new();
        for pattern in &config.exclude_patterns {
            if let Ok(glob) = Glob::new(pattern) {
                excluded.add(glob);
            }
        }
        let mut managed = GlobSetBuilder::new();
        for pattern in &config.include_managed_paths {
            if let Ok(glob) = Glob::new(pattern) {
                managed.add(glob);
            }
        }
        Self {
            excluded: excluded.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap()),
            managed: managed.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap()),
        }
    }

    /// Whether `relative_path` (relative to the project root) should be
    /// indexed/watched.
    #[must_use]
    pub fn is_included(&self, relative_path: &Path) -> bool {
        if self.managed.is_match(relative_path) {
            return true;
        }
        !self.excluded.is_match(relative_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_default_patterns() {
        let policy = ExclusionPolicy::from_config(&IndexingConfig::default());
        assert!(!policy.is_included(Path::new("node_modules/left-pad/index.js")));
        assert!(policy.is_included(Path::new("src/main.rs")));
    }

    #[test]
    fn managed_paths_override_exclusion() {
        let mut config = IndexingConfig::default();
        config.exclude_patterns.push(".claude/**".to_owned());
        let policy = ExclusionPolicy::from_config(&config);
        assert!(policy.is_included(Path::new(".claude/commands/deploy.md")));
        assert!(!policy.is_included(Path::new(".claude/settings.json")));
    }
}
