//! File inclusion policy for a full index run (spec.md §4.6 step 1).
//!
//! Deliberately independent of any infrastructure config type: it is built
//! from the plain pattern lists the binary reads out of configuration, so
//! this crate's only dependencies stay `oak-ci-domain` plus pure libraries.
//! `oak-ci-infrastructure::watcher::ExclusionPolicy` applies the identical
//! rule to the live watch stream from the same source patterns, per
//! spec.md §4.7 "kept in one place to avoid skew".

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

/// A candidate path is included iff it is not matched by any excluded
/// glob AND (it is matched by a managed include OR not ignored by the
/// project's `.gitignore`, which the caller applies separately via
/// `ignore::WalkBuilder`).
pub struct ExclusionPolicy {
    excluded: GlobSet,
    managed: GlobSet,
}

impl ExclusionPolicy {
    /// Compile the exclusion and managed-path pattern lists.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern is not a valid glob.
    pub fn new(exclude_patterns: &[String], managed_paths: &[String]) -> Result<Self, globset::Error> {
        let mut excluded = GlobSetBuilder::new();
        for pattern in exclude_patterns {
            excluded.add(Glob::new(pattern)?);
        }
        let mut managed = GlobSetBuilder::new();
        for pattern in managed_paths {
            managed.add(Glob::new(pattern)?);
        }
        Ok(Self {
            excluded: excluded.build()?,
            managed: managed.build()?,
        })
    }

    /// Whether `relative_path` should be indexed, ignoring `.gitignore`.
    /// Managed paths override an exclusion match; everything else is
    /// included unless explicitly excluded.
    #[must_use]
    pub fn is_included(&self, relative_path: &Path) -> bool {
        if self.is_managed(relative_path) {
            return true;
        }
        !self.is_excluded(relative_path)
    }

    /// Whether `relative_path` matches a hard exclusion glob.
    #[must_use]
    pub fn is_excluded(&self, relative_path: &Path) -> bool {
        self.excluded.is_match(relative_path)
    }

    /// Whether `relative_path` is a managed path that must be indexed even
    /// if `.gitignore` would otherwise hide it.
    #[must_use]
    pub fn is_managed(&self, relative_path: &Path) -> bool {
        self.managed.is_match(relative_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_hard_coded_patterns() {
        let policy = ExclusionPolicy::new(&[".git/**".to_owned(), "target/**".to_owned()], &[]).unwrap();
        assert!(!policy.is_included(Path::new(".git/HEAD")));
        assert!(policy.is_included(Path::new("src/lib.rs")));
    }

    #[test]
    fn managed_paths_override_exclusion() {
        let policy = ExclusionPolicy::new(
            &[".claude/**".to_owned()],
            &[".claude/commands/**".to_owned()],
        )
        .unwrap();
        assert!(!policy.is_included(Path::new(".claude/settings.json")));
        assert!(policy.is_included(Path::new(".claude/commands/deploy.md")));
    }
}
