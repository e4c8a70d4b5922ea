//! `Observation` — a distilled memory (spec.md §3.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{BatchId, ObservationId, SessionId};

/// What kind of thing was observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationType {
    /// Something new learned about the codebase.
    Discovery,
    /// A subtle pitfall worth remembering.
    Gotcha,
    /// A decision that was made and why.
    Decision,
    /// A bug was found and fixed.
    BugFix,
    /// A trade-off that was weighed.
    TradeOff,
    /// A distilled summary of a whole session.
    SessionSummary,
    /// A plan payload, embedded for later retrieval.
    Plan,
}

/// How important this observation is to keep surfacing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationImportance {
    /// Low importance.
    Low,
    /// Medium importance.
    Medium,
    /// High importance.
    High,
}

/// A memory produced by the background processor, or manually via the MCP
/// `oak_remember` tool.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Observation {
    /// Daemon-assigned id.
    pub id: ObservationId,
    /// Owning session.
    pub session_id: SessionId,
    /// Owning batch, if derived from one.
    pub prompt_batch_id: Option<BatchId>,
    /// What kind of observation this is.
    pub r#type: ObservationType,
    /// The observation text itself.
    pub observation: String,
    /// Supporting context, if any.
    pub context: Option<String>,
    /// Free-form tags for filtering.
    pub tags: Vec<String>,
    /// Importance bucket.
    pub importance: ObservationImportance,
    /// File this observation is scoped to, if any.
    pub file_path: Option<String>,
    /// When the observation was created.
    pub created_at: DateTime<Utc>,
    /// Whether it has been embedded into the `memory` vector collection.
    pub embedded: bool,
    /// Whether it has been archived (excluded from default retrieval).
    pub archived: bool,
}

impl Observation {
    /// Whether this observation should be considered for retrieval by
    /// default (not archived).
    #[must_use]
    pub fn is_retrievable(&self) -> bool {
        !self.archived
    }
}
