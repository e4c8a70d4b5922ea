//! `PromptBatch` — one per user turn (spec.md §3.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{BatchId, SessionId};

/// Lifecycle status of a [`PromptBatch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptBatchStatus {
    /// Still accepting activities.
    Active,
    /// Closed — either a new batch opened, or the session ended.
    Completed,
}

/// Heuristic classification of what a batch was about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptBatchClassification {
    /// Mostly reads/greps, no edits.
    Exploration,
    /// Mostly edits/writes.
    Implementation,
    /// Failure-heavy, with reads/edits.
    Debugging,
    /// Edits concentrated in restructuring existing code.
    Refactoring,
    /// Carries a plan payload.
    Plan,
    /// None of the above heuristics matched.
    Other,
}

/// Where a batch's "prompt" actually came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptSourceType {
    /// A real user turn.
    User,
    /// A synthetic batch opened for hooks that arrived with no active batch.
    AgentNotification,
    /// A plan payload submitted by the agent.
    Plan,
}

/// One user turn and the tool activity belonging to it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PromptBatch {
    /// Daemon-assigned id.
    pub id: BatchId,
    /// Owning session.
    pub session_id: SessionId,
    /// Dense, 1-based, increasing within a session (invariant 2).
    pub prompt_number: i64,
    /// The text of the user's prompt (or the synthetic label for
    /// `agent_notification` batches).
    pub user_prompt: String,
    /// When the batch was opened.
    pub started_at: DateTime<Utc>,
    /// When the batch was closed, if it has been.
    pub ended_at: Option<DateTime<Utc>>,
    /// Current lifecycle status.
    pub status: PromptBatchStatus,
    /// Denormalized count of activities belonging to this batch.
    pub activity_count: i64,
    /// Heuristic classification, filled in after a grace period.
    pub classification: Option<PromptBatchClassification>,
    /// Where this batch's prompt text came from.
    pub source_type: PromptSourceType,
    /// Path of the plan file, if `source_type == Plan`.
    pub plan_file_path: Option<String>,
    /// Raw plan content, if `source_type == Plan`.
    pub plan_content: Option<String>,
    /// Whether the plan content has a corresponding `plan` Observation in
    /// the vector store (invariant 4).
    pub plan_embedded: bool,
    /// Whether the background processor has run memory extraction over
    /// this batch's activities (spec.md §4.10 medium tier).
    pub observations_extracted: bool,
}

impl PromptBatch {
    /// Construct a new active batch with the next prompt number.
    #[must_use]
    pub fn new(
        id: BatchId,
        session_id: SessionId,
        prompt_number: i64,
        user_prompt: impl Into<String>,
        source_type: PromptSourceType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            session_id,
            prompt_number,
            user_prompt: user_prompt.into(),
            started_at: now,
            ended_at: None,
            status: PromptBatchStatus::Active,
            activity_count: 0,
            classification: None,
            source_type,
            plan_file_path: None,
            plan_content: None,
            plan_embedded: false,
            observations_extracted: false,
        }
    }

    /// Whether this batch carries non-empty plan content that, per
    /// invariant 4, must have a matching `plan` Observation iff
    /// `plan_embedded` is true.
    #[must_use]
    pub fn has_plan_payload(&self) -> bool {
        matches!(self.source_type, PromptSourceType::Plan)
            && self.plan_content.as_deref().is_some_and(|s| !s.is_empty())
    }
}
