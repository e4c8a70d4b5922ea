//! `Session` — one per agent conversation (spec.md §3.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{BatchId, SessionId};

/// Lifecycle status of a [`Session`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accepting new prompt batches.
    Active,
    /// Ended (explicitly, or by stale recovery).
    Completed,
}

/// One agent conversation, created on `SessionStart` or implicitly on the
/// first `UserPromptSubmit`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Id assigned by the calling agent (not by the daemon).
    pub id: SessionId,
    /// Name of the agent that owns this session (e.g. "claude").
    pub agent: String,
    /// Absolute path of the project this session belongs to.
    pub project_root: String,
    /// When the session was created.
    pub started_at: DateTime<Utc>,
    /// When the session ended, if it has.
    pub ended_at: Option<DateTime<Utc>>,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Denormalized count, kept equal to `count(batches)` (invariant 1).
    pub prompt_count: i64,
    /// Denormalized count, kept equal to `sum(batch.activity_count)`.
    pub tool_count: i64,
    /// Generated title, filled in by the background processor.
    pub title: Option<String>,
    /// Generated summary, filled in by the background processor.
    pub summary: Option<String>,
    /// The batch currently accepting activities, if any.
    pub current_prompt_batch_id: Option<BatchId>,
}

impl Session {
    /// Construct a freshly-started, empty session.
    #[must_use]
    pub fn new(id: SessionId, agent: impl Into<String>, project_root: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            agent: agent.into(),
            project_root: project_root.into(),
            started_at: now,
            ended_at: None,
            status: SessionStatus::Active,
            prompt_count: 0,
            tool_count: 0,
            title: None,
            summary: None,
            current_prompt_batch_id: None,
        }
    }

    /// Whether this session has no recorded prompt batches at all
    /// (used by the stale-recovery delete-vs-complete branch).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prompt_count == 0
    }

    /// Whether `now - last_activity > timeout`, for stale-recovery sweeps.
    /// `last_activity` is the later of `started_at` and any batch activity;
    /// callers pass the store-computed last-activity timestamp.
    #[must_use]
    pub fn is_stale(last_activity: DateTime<Utc>, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        now - last_activity > timeout
    }
}
