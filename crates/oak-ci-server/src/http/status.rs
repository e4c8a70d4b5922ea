//! Process-wide daemon status atomic (spec.md §5 "Shared state").

use std::sync::atomic::{AtomicU8, Ordering};

const STARTING: u8 = 0;
const READY: u8 = 1;
const INDEXING: u8 = 2;
const ERROR: u8 = 3;
const DRAINING: u8 = 4;

/// `{starting, ready, indexing, error}` plus a `draining` state entered on
/// shutdown (spec.md §9 SPEC_FULL "Graceful shutdown").
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonStatusValue {
    Starting,
    Ready,
    Indexing,
    Error,
    Draining,
}

/// Lock-free status cell shared by the HTTP health handler, the indexer
/// (flips to `indexing` mid-run), and the shutdown handler.
pub struct DaemonStatus(AtomicU8);

impl Default for DaemonStatus {
    fn default() -> Self {
        Self(AtomicU8::new(STARTING))
    }
}

impl DaemonStatus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: DaemonStatusValue) {
        let raw = match value {
            DaemonStatusValue::Starting => STARTING,
            DaemonStatusValue::Ready => READY,
            DaemonStatusValue::Indexing => INDEXING,
            DaemonStatusValue::Error => ERROR,
            DaemonStatusValue::Draining => DRAINING,
        };
        self.0.store(raw, Ordering::SeqCst);
    }

    #[must_use]
    pub fn get(&self) -> DaemonStatusValue {
        match self.0.load(Ordering::SeqCst) {
            STARTING => DaemonStatusValue::Starting,
            READY => DaemonStatusValue::Ready,
            INDEXING => DaemonStatusValue::Indexing,
            ERROR => DaemonStatusValue::Error,
            _ => DaemonStatusValue::Draining,
        }
    }
}
