//! Debounced filesystem change stream contract (spec.md §4.7).

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::Result;

/// The kind of change observed for a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileChangeKind {
    /// A new file appeared.
    Created,
    /// An existing file's content changed.
    Modified,
    /// A file was removed.
    Deleted,
    /// A file moved from one path to another.
    Renamed,
}

/// One debounced filesystem change, carrying a monotonic sequence number so
/// downstream consumers can detect drops.
#[derive(Clone, Debug)]
pub struct FileChangeEvent {
    /// Monotonically increasing across the life of one watcher instance.
    pub sequence: u64,
    /// What kind of change this is.
    pub kind: FileChangeKind,
    /// The affected path (for `Renamed`, the new path).
    pub path: PathBuf,
    /// The previous path, set only for `Renamed`.
    pub previous_path: Option<PathBuf>,
}

/// Recursive, exclusion-aware, debounced filesystem watcher.
#[async_trait]
pub trait Watcher: Send + Sync {
    /// Start watching; events are delivered to `sink` until the watcher is
    /// dropped or cancelled.
    async fn run(&self, sink: tokio::sync::mpsc::Sender<FileChangeEvent>) -> Result<()>;
}
