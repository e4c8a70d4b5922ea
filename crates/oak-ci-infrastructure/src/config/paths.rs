//! All daemon-owned paths resolve from this single constant
//! (spec.md §6.3 "All paths resolved from a single `OAK_DIR` constant").

use std::path::{Path, PathBuf};

/// The directory name, relative to a project root, that holds every
/// daemon-owned file.
pub const OAK_DIR: &str = ".oak/ci";

/// Paths within [`OAK_DIR`] for one project root.
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    /// Resolve paths for the given project root.
    #[must_use]
    pub fn new(project_root: &Path) -> Self {
        Self {
            root: project_root.join(OAK_DIR),
        }
    }

    /// The `.oak/ci/` directory itself.
    #[must_use]
    pub fn oak_dir(&self) -> &Path {
        &self.root
    }

    /// `activities.db` — the relational store.
    #[must_use]
    pub fn activities_db(&self) -> PathBuf {
        self.root.join("activities.db")
    }

    /// `vector/` — the vector index directory.
    #[must_use]
    pub fn vector_dir(&self) -> PathBuf {
        self.root.join("vector")
    }

    /// `daemon.pid`.
    #[must_use]
    pub fn pid_file(&self) -> PathBuf {
        self.root.join("daemon.pid")
    }

    /// `daemon.port`.
    #[must_use]
    pub fn port_file(&self) -> PathBuf {
        self.root.join("daemon.port")
    }

    /// `daemon.log`.
    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.root.join("daemon.log")
    }

    /// `config.toml`.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }
}
