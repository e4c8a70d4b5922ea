//! The versioned relational store port (spec.md §4.5).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{
    Activity, IndexedFile, Observation, ObservationImportance, ObservationType, PromptBatch,
    PromptBatchClassification, PromptSourceType, Session,
};
use crate::error::Result;
use crate::value_objects::{BatchId, ObservationId, SessionId};

/// Filters accepted by [`ActivityStore::list_observations`].
#[derive(Clone, Debug, Default)]
pub struct ObservationFilter {
    /// Restrict to one observation type.
    pub r#type: Option<ObservationType>,
    /// Restrict to observations carrying this tag.
    pub tag: Option<String>,
    /// Restrict to observations created on/after this time.
    pub start_date: Option<DateTime<Utc>>,
    /// Restrict to observations created on/before this time.
    pub end_date: Option<DateTime<Utc>>,
    /// Include archived observations (default: excluded).
    pub include_archived: bool,
    /// Pagination limit.
    pub limit: i64,
    /// Pagination offset.
    pub offset: i64,
}

/// Result of one stale-recovery sweep (spec.md §4.5).
#[derive(Clone, Debug, Default)]
pub struct StaleRecoveryOutcome {
    /// Sessions completed (had activity, now past the stale timeout).
    pub recovered_ids: Vec<SessionId>,
    /// Sessions deleted (empty and past the stale timeout).
    pub deleted_ids: Vec<SessionId>,
}

/// Single-writer, many-reader relational store for sessions, batches,
/// activities and observations, with a full-text mirror.
///
/// Implementations serialize writes through one queue; reads are
/// snapshot-consistent and unlimited (spec.md §5).
#[async_trait]
pub trait ActivityStore: Send + Sync {
    // --- Sessions -------------------------------------------------------

    /// Create a brand-new session.
    async fn create_session(&self, session: Session) -> Result<Session>;

    /// Fetch a session by id.
    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>>;

    /// Persist changed fields of an existing session.
    async fn update_session(&self, session: Session) -> Result<Session>;

    /// Mark a session completed (`SessionEnd` hook).
    async fn end_session(&self, id: &SessionId, now: DateTime<Utc>) -> Result<Session>;

    /// Flip `completed -> active` if the session is currently completed;
    /// no-op otherwise. Must run in the same transaction as the batch
    /// creation that triggered it.
    async fn reactivate_if_needed(&self, id: &SessionId, now: DateTime<Utc>) -> Result<Session>;

    /// Fetch the session, or recreate it with the given agent if it was
    /// previously deleted (e.g. by stale recovery).
    async fn ensure_session_exists(
        &self,
        id: &SessionId,
        agent: &str,
        project_root: &str,
        now: DateTime<Utc>,
    ) -> Result<Session>;

    /// Delete a session and cascade to its batches, activities,
    /// observations, and file-scoped plan embeddings (invariant 7).
    async fn delete_session_cascade(&self, id: &SessionId) -> Result<()>;

    /// List sessions, most-recent-first by default.
    async fn list_sessions(
        &self,
        agent: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Session>>;

    /// Sessions with `status = active` and no activity within `timeout`.
    async fn get_stale_sessions(&self, timeout: chrono::Duration, now: DateTime<Utc>) -> Result<Vec<Session>>;

    // --- Prompt batches ---------------------------------------------------

    /// Open a new batch for a session, assigning the next `prompt_number`.
    async fn create_batch(
        &self,
        session_id: &SessionId,
        user_prompt: &str,
        source_type: PromptSourceType,
        plan_content: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<PromptBatch>;

    /// Fetch a batch by id.
    async fn get_batch(&self, id: &BatchId) -> Result<Option<PromptBatch>>;

    /// Set a batch's heuristic classification.
    async fn classify_batch(&self, batch_id: &BatchId, label: PromptBatchClassification) -> Result<()>;

    /// Mark a batch's plan content embedded (or not) in the vector store.
    async fn set_plan_embedded(&self, batch_id: &BatchId, embedded: bool) -> Result<()>;

    /// Batches with `source_type = plan`, non-empty `plan_content`, and
    /// `plan_embedded = false`.
    async fn get_batches_needing_plan_embedding(&self) -> Result<Vec<PromptBatch>>;

    /// Batches older than `older_than` still awaiting classification.
    async fn get_batches_needing_classification(&self, older_than: DateTime<Utc>) -> Result<Vec<PromptBatch>>;

    /// Completed batches not yet run through memory extraction.
    async fn get_batches_needing_extraction(&self) -> Result<Vec<PromptBatch>>;

    /// Mark a batch's activities as extracted (idempotent; a second
    /// extraction pass over the same batch is a no-op per spec.md §4.10
    /// "idempotent, keyed by (entity_id, job_kind)").
    async fn mark_observations_extracted(&self, batch_id: &BatchId) -> Result<()>;

    /// List batches for a session, most recent first.
    async fn list_batches_for_session(&self, session_id: &SessionId) -> Result<Vec<PromptBatch>>;

    /// List plan batches across all sessions (optionally one session).
    async fn list_plan_batches(
        &self,
        session_id: Option<&SessionId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PromptBatch>>;

    // --- Activities -------------------------------------------------------

    /// Append one activity. Append-only; implementations may buffer in
    /// memory and flush in groups (spec.md §5 "activity buffer <= 500").
    ///
    /// If `activity.dedup_key` is `Some` and an activity with the same key
    /// already exists in this batch, this is a no-op that returns the
    /// existing row (spec.md §8 idempotence property).
    async fn append_activity(&self, activity: Activity) -> Result<Activity>;

    /// Force any buffered activities to durable storage.
    async fn flush_activities(&self) -> Result<()>;

    /// List every activity recorded against one batch, insertion order.
    /// Flushes the in-memory buffer first so the result is complete.
    async fn list_activities_for_batch(&self, batch_id: &BatchId) -> Result<Vec<Activity>>;

    // --- Observations -----------------------------------------------------

    /// Store a new observation.
    async fn add_observation(&self, observation: Observation) -> Result<Observation>;

    /// List observations matching `filter`.
    async fn list_observations(&self, filter: &ObservationFilter) -> Result<Vec<Observation>>;

    /// Toggle an observation's archived flag.
    async fn set_archived(&self, id: &ObservationId, archived: bool) -> Result<()>;

    /// Delete an observation. If it was the plan observation for a batch,
    /// the caller is responsible for clearing that batch's `plan_embedded`
    /// flag (invariant 4, "Boundary behaviors").
    async fn delete_observation(&self, id: &ObservationId) -> Result<()>;

    /// Observations not yet embedded into the `memory` vector collection.
    async fn get_unembedded_observations(&self) -> Result<Vec<Observation>>;

    /// Mark a set of observations embedded.
    async fn mark_observations_embedded(&self, ids: &[ObservationId]) -> Result<()>;

    /// Full-text search over `(user_prompt, observation, tool_output_summary)`.
    async fn search_fts(&self, query: &str, limit: i64) -> Result<Vec<Observation>>;

    // --- Indexed files (invariant 5) --------------------------------------

    /// Insert or replace the shadow row tracking what's currently indexed
    /// for one file.
    async fn upsert_indexed_file(&self, file: IndexedFile) -> Result<IndexedFile>;

    /// Fetch the shadow row for one file, if it has been indexed.
    async fn get_indexed_file(&self, filepath: &str) -> Result<Option<IndexedFile>>;

    /// Delete the shadow row for one file (its chunks have already been
    /// removed from the vector store by the caller).
    async fn delete_indexed_file(&self, filepath: &str) -> Result<()>;

    /// List every currently indexed file, for a full run's stale-entry
    /// sweep (files removed from disk since the last run).
    async fn list_indexed_files(&self) -> Result<Vec<IndexedFile>>;

    // --- Lifecycle --------------------------------------------------------

    /// Run the stale-recovery rule once (spec.md §4.5).
    async fn run_stale_recovery(
        &self,
        timeout: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<StaleRecoveryOutcome>;

    /// Current schema version stamped on this database.
    async fn schema_version(&self) -> Result<i64>;

    /// Export every row as a literal, replayable SQL script (spec.md §6.1
    /// "SQL-text round-trip").
    async fn export_sql(&self) -> Result<String>;

    /// Execute a previously exported script against this store, replacing
    /// its current contents.
    async fn import_sql(&self, sql: &str) -> Result<()>;

    /// Default importance new observations get when the caller doesn't
    /// specify one.
    fn default_importance(&self) -> ObservationImportance {
        ObservationImportance::Medium
    }
}
