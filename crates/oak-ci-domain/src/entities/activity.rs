//! `Activity` — one per `PostToolUse`/`PostToolUseFailure` hook (spec.md §3.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value_objects::{ActivityId, BatchId, SessionId};

/// A single recorded tool invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Activity {
    /// Daemon-assigned id.
    pub id: ActivityId,
    /// Owning session (always the same session as `prompt_batch_id`'s
    /// batch — invariant 3).
    pub session_id: SessionId,
    /// Owning batch.
    pub prompt_batch_id: BatchId,
    /// Name of the tool invoked (e.g. "Read", "Edit", "subagent_start").
    pub tool_name: String,
    /// Raw tool input payload.
    pub tool_input: Value,
    /// Short summary of the tool's output, if provided.
    pub tool_output_summary: Option<String>,
    /// File path the tool operated on, if applicable.
    pub file_path: Option<String>,
    /// Whether the tool call succeeded.
    pub success: bool,
    /// Error message, if `success == false`.
    pub error_message: Option<String>,
    /// When this activity was recorded.
    pub created_at: DateTime<Utc>,
    /// Idempotency key from the originating hook payload's `tool_use_id`,
    /// used to dedup retried deliveries.
    pub dedup_key: Option<String>,
}

impl Activity {
    /// Whether this activity touched a file in a way that could warrant a
    /// follow-up memory query (`Read`, `Edit`, `Write`).
    #[must_use]
    pub fn is_file_touch(&self) -> bool {
        self.file_path.is_some()
            && matches!(self.tool_name.as_str(), "Read" | "Edit" | "Write")
    }
}
