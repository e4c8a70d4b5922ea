//! `notify`-backed [`Watcher`], debounced in-process (spec.md §4.7).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::mpsc;

use oak_ci_domain::error::{Error, Result};
use oak_ci_domain::ports::{FileChangeEvent, FileChangeKind, Watcher};

use super::exclude::ExclusionPolicy;

/// Debounce window: bursts of writes to the same path within this window
/// collapse into a single [`FileChangeEvent`].
const DEBOUNCE: Duration = Duration::from_millis(400);

pub struct NotifyWatcher {
    project_root: PathBuf,
    policy: Arc<ExclusionPolicy>,
    sequence: AtomicU64,
}

impl NotifyWatcher {
    #[must_use]
    pub fn new(project_root: PathBuf, policy: ExclusionPolicy) -> Self {
        Self {
            project_root,
            policy: Arc::new(policy),
            sequence: AtomicU64::new(0),
        }
    }

    fn relative(&self, path: &std::path::Path) -> Option<PathBuf> {
        path.strip_prefix(&self.project_root).ok().map(Path::to_owned)
    }
}

#[async_trait]
impl Watcher for NotifyWatcher {
    async fn run(&self, sink: mpsc::Sender<FileChangeEvent>) -> Result<()> {
        let (raw_tx, mut raw_rx) = mpsc::channel::<Event>(1024);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    let _ = raw_tx.blocking_send(event);
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| Error::Store { message: format!("watcher init failed: {e}") })?;

        watcher
            .watch(&self.project_root, RecursiveMode::Recursive)
            .map_err(|e| Error::Store { message: format!("watch failed: {e}") })?;

        let mut pending: HashMap<PathBuf, FileChangeKind> = HashMap::new();
        let mut debounce_deadline: Option<tokio::time::Instant> = None;

        loop {
            let sleep = match debounce_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline),
                None => tokio::time::sleep(Duration::from_secs(3600)),
            };
            tokio::select! {
                maybe_event = raw_rx.recv() => {
                    let Some(event) = maybe_event else { break };
                    for path in event.paths {
                        let Some(relative) = self.relative(&path) else { continue };
                        if !self.policy.is_included(&relative) {
                            continue;
                        }
                        if let Some(kind) = classify(&event.kind) {
                            pending.insert(path, kind);
                        }
                    }
                    if debounce_deadline.is_none() {
                        debounce_deadline = Some(tokio::time::Instant::now() + DEBOUNCE);
                    }
                }
                () = sleep, if debounce_deadline.is_some() => {
                    for (path, kind) in pending.drain() {
                        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
                        let event = FileChangeEvent { sequence, kind, path, previous_path: None };
                        if sink.send(event).await.is_err() {
                            return Ok(());
                        }
                    }
                    debounce_deadline = None;
                }
            }
        }
        Ok(())
    }
}

fn classify(kind: &EventKind) -> Option<FileChangeKind> {
    match kind {
        EventKind::Create(_) => Some(FileChangeKind::Created),
        EventKind::Modify(notify::event::ModifyKind::Name(_)) => Some(FileChangeKind::Renamed),
        EventKind::Modify(_) => Some(FileChangeKind::Modified),
        EventKind::Remove(_) => Some(FileChangeKind::Deleted),
        _ => None,
    }
}
