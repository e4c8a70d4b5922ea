//! Agent lifecycle hooks and context injection (spec.md §4.9).
//!
//! Every public method here is called from a best-effort HTTP handler in
//! `oak-ci-server`: on error the handler returns `{}` so the agent is never
//! blocked. This service still returns `Result` so the handler has something
//! to catch and log with a correlation id.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use oak_ci_domain::entities::{Activity, PromptSourceType, Session};
use oak_ci_domain::error::Result;
use oak_ci_domain::ports::ActivityStore;
use oak_ci_domain::value_objects::{ActivityId, ConfidenceTier, SessionId};

use crate::metadata;
use crate::use_cases::retrieval_service::{RetrievalService, SearchType};

/// Default top-K code chunks retrieved for a user prompt (spec.md §4.9 step 1).
const DEFAULT_CODE_LIMIT: usize = 5;
/// Default top-K memories retrieved for a rich query (spec.md §4.9 step 2).
const DEFAULT_MEMORY_LIMIT: usize = 5;
/// Default count of prior session summaries concatenated (spec.md §4.9 step 3).
const DEFAULT_SUMMARY_LIMIT: usize = 3;
/// Default per-chunk line cap (spec.md §4.9 step 1 "truncate ... to ≤ `max_lines_per_chunk`").
const DEFAULT_MAX_LINES_PER_CHUNK: usize = 40;

/// Markdown synthesized for one hook response (spec.md §4.9 "Injection
/// synthesis").
#[derive(Clone, Debug, Default)]
pub struct InjectedContext {
    /// The full `additional_context` string, or empty if nothing qualified.
    pub additional_context: String,
}

impl InjectedContext {
    fn is_empty(&self) -> bool {
        self.additional_context.is_empty()
    }
}

/// Tuning knobs for injection synthesis (spec.md §4.9, §4.1).
#[derive(Clone, Copy, Debug)]
pub struct InjectionConfig {
    /// Top-K code chunks retrieved for a user prompt.
    pub code_limit: usize,
    /// Top-K memories retrieved for a rich query.
    pub memory_limit: usize,
    /// Max prior session summaries concatenated.
    pub summary_limit: usize,
    /// Lines a rendered code chunk is truncated to.
    pub max_lines_per_chunk: usize,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            code_limit: DEFAULT_CODE_LIMIT,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            summary_limit: DEFAULT_SUMMARY_LIMIT,
            max_lines_per_chunk: DEFAULT_MAX_LINES_PER_CHUNK,
        }
    }
}

/// Receives agent hook events, mutates the [`ActivityStore`], and returns
/// synthesized context for re-injection (spec.md §4.9).
pub struct HookIngestionService {
    activity_store: Arc<dyn ActivityStore>,
    retrieval: RetrievalService,
    config: InjectionConfig,
}

impl HookIngestionService {
    /// Build a hook ingestion service over a store and a retrieval engine.
    #[must_use]
    pub fn new(activity_store: Arc<dyn ActivityStore>, retrieval: RetrievalService, config: InjectionConfig) -> Self {
        Self { activity_store, retrieval, config }
    }

    /// `SessionStart`: create or reactivate the session, return injected
    /// context (prior summaries for this project only — there is no prompt
    /// text yet to drive a code/memory search).
    pub async fn session_start(
        &self,
        session_id: &SessionId,
        agent: &str,
        project_root: &str,
        now: DateTime<Utc>,
    ) -> Result<InjectedContext> {
        let session = self
            .activity_store
            .ensure_session_exists(session_id, agent, project_root, now)
            .await?;
        let _ = self.activity_store.reactivate_if_needed(session_id, now).await?;

        let summaries = self.prior_session_summaries(&session).await?;
        Ok(self.synthesize(Vec::new(), Vec::new(), summaries))
    }

    /// `SessionEnd`: mark the session completed. Summary generation is the
    /// background processor's job (spec.md §4.10 infrequent tier), not this
    /// handler's.
    pub async fn session_end(&self, session_id: &SessionId, now: DateTime<Utc>) -> Result<()> {
        self.activity_store.end_session(session_id, now).await?;
        Ok(())
    }

    /// `UserPromptSubmit`: ensure the session exists and is active, open a
    /// new batch, and return code + memory + prior-summary context for the
    /// prompt just submitted.
    pub async fn prompt_submit(
        &self,
        session_id: &SessionId,
        agent: &str,
        project_root: &str,
        user_prompt: &str,
        now: DateTime<Utc>,
    ) -> Result<InjectedContext> {
        let session = self
            .activity_store
            .ensure_session_exists(session_id, agent, project_root, now)
            .await?;
        self.activity_store.reactivate_if_needed(session_id, now).await?;

        // `create_batch` already bumps `prompt_count` and sets
        // `current_prompt_batch_id` on the session row; re-fetch rather than
        // bumping again here.
        self.activity_store
            .create_batch(session_id, user_prompt, PromptSourceType::User, None, now)
            .await?;
        let updated = self.activity_store.get_session(session_id).await?.unwrap_or(session);

        let code = self.retrieval.search(user_prompt, SearchType::Code, self.config.code_limit, None).await?;
        let query = build_rich_query(None, None, Some(user_prompt));
        let memories = self.search_memories(&query).await?;
        let summaries = self.prior_session_summaries(&updated).await?;

        Ok(self.synthesize(code, memories, summaries))
    }

    /// `PostToolUse` / `PostToolUseFailure`: append the activity and, for
    /// `{Read,Edit,Write}` on a file, return a memory-only injection.
    pub async fn post_tool_use(
        &self,
        session_id: &SessionId,
        tool_name: &str,
        tool_input: Value,
        tool_output_summary: Option<String>,
        file_path: Option<String>,
        success: bool,
        error_message: Option<String>,
        dedup_key: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<InjectedContext> {
        let batch_id = self.ensure_active_batch(session_id, now).await?;

        let activity = Activity {
            id: ActivityId::new(),
            session_id: session_id.clone(),
            prompt_batch_id: batch_id,
            tool_name: tool_name.to_owned(),
            tool_input,
            tool_output_summary: tool_output_summary.clone(),
            file_path: file_path.clone(),
            success,
            error_message,
            created_at: now,
            dedup_key,
        };
        let is_file_touch = activity.is_file_touch();
        self.activity_store.append_activity(activity).await?;

        if !is_file_touch {
            return Ok(InjectedContext::default());
        }

        let query = build_rich_query(file_path.as_deref(), tool_output_summary.as_deref(), None);
        let memories = self.search_memories(&query).await?;
        Ok(self.synthesize(Vec::new(), memories, Vec::new()))
    }

    /// `SubagentStart`: append `Activity(tool="subagent_start", ...)`.
    pub async fn subagent_start(
        &self,
        session_id: &SessionId,
        agent_type: &str,
        agent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let batch_id = self.ensure_active_batch(session_id, now).await?;
        let activity = Activity {
            id: ActivityId::new(),
            session_id: session_id.clone(),
            prompt_batch_id: batch_id,
            tool_name: "subagent_start".to_owned(),
            tool_input: serde_json::json!({ "agent_type": agent_type, "agent_id": agent_id }),
            tool_output_summary: None,
            file_path: None,
            success: true,
            error_message: None,
            created_at: now,
            dedup_key: None,
        };
        self.activity_store.append_activity(activity).await?;
        Ok(())
    }

    /// `SubagentStop`: append `Activity(tool="subagent_stop", ...)`. Only
    /// the transcript path is stored, not its contents.
    pub async fn subagent_stop(
        &self,
        session_id: &SessionId,
        agent_id: &str,
        transcript_path: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let batch_id = self.ensure_active_batch(session_id, now).await?;
        let mut input = serde_json::json!({ "agent_id": agent_id });
        if let Some(path) = transcript_path {
            input["transcript_path"] = Value::String(path.to_owned());
        }
        let activity = Activity {
            id: ActivityId::new(),
            session_id: session_id.clone(),
            prompt_batch_id: batch_id,
            tool_name: "subagent_stop".to_owned(),
            tool_input: input,
            tool_output_summary: None,
            file_path: None,
            success: true,
            error_message: None,
            created_at: now,
            dedup_key: None,
        };
        self.activity_store.append_activity(activity).await?;
        Ok(())
    }

    /// Fetch (or open) the batch a hook with no preceding `UserPromptSubmit`
    /// should attach to: the session's active batch, or a fresh synthetic
    /// `agent_notification` one (invariant 3).
    async fn ensure_active_batch(&self, session_id: &SessionId, now: DateTime<Utc>) -> Result<oak_ci_domain::value_objects::BatchId> {
        let session = self
            .activity_store
            .ensure_session_exists(session_id, "unknown", "", now)
            .await?;

        if let Some(batch_id) = session.current_prompt_batch_id {
            if let Some(batch) = self.activity_store.get_batch(&batch_id).await? {
                if batch.status == oak_ci_domain::entities::PromptBatchStatus::Active {
                    return Ok(batch.id);
                }
            }
        }

        // `create_batch` already bumps `prompt_count` and sets
        // `current_prompt_batch_id` on the session row; nothing left to
        // write back here.
        let batch = self
            .activity_store
            .create_batch(session_id, "(agent notification)", PromptSourceType::AgentNotification, None, now)
            .await?;
        Ok(batch.id)
    }

    async fn search_memories(&self, query: &str) -> Result<Vec<crate::use_cases::retrieval_service::RetrievedItem>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let hits = self.retrieval.search(query, SearchType::Memory, self.config.memory_limit, None).await?;
        Ok(RetrievalService::filter_by_confidence(hits, ConfidenceTier::High)
            .into_iter()
            .filter(|item| !metadata::get_bool(&item.metadata, metadata::ARCHIVED))
            .collect())
    }

    /// Up to `summary_limit` prior completed sessions for the same project,
    /// excluding this one — a plain relational read (`Session.summary` is
    /// not embedded), not a vector search.
    async fn prior_session_summaries(&self, current: &Session) -> Result<Vec<Session>> {
        let sessions = self.activity_store.list_sessions(Some(&current.agent), 50, 0).await?;
        Ok(sessions
            .into_iter()
            .filter(|s| s.id != current.id && s.project_root == current.project_root && s.summary.is_some())
            .take(self.config.summary_limit)
            .collect())
    }

    fn synthesize(
        &self,
        code: Vec<crate::use_cases::retrieval_service::RetrievedItem>,
        memories: Vec<crate::use_cases::retrieval_service::RetrievedItem>,
        summaries: Vec<Session>,
    ) -> InjectedContext {
        let high_code: Vec<_> = code.into_iter().filter(|item| item.tier == ConfidenceTier::High).collect();

        let mut sections = Vec::new();

        if !high_code.is_empty() {
            let rendered: Vec<String> = high_code.iter().map(|item| self.render_code_chunk(item)).collect();
            sections.push(format!("## Relevant code\n\n{}", rendered.join("\n\n")));
        }

        if !memories.is_empty() {
            let rendered: Vec<String> = memories.iter().map(render_memory).collect();
            sections.push(format!("## Relevant memories\n\n{}", rendered.join("\n")));
        }

        if !summaries.is_empty() {
            let rendered: Vec<String> = summaries
                .iter()
                .map(|s| format!("- {}", s.summary.as_deref().unwrap_or_default()))
                .collect();
            sections.push(format!("## Prior sessions\n\n{}", rendered.join("\n")));
        }

        let context = InjectedContext { additional_context: sections.join("\n\n") };
        if context.is_empty() {
            InjectedContext::default()
        } else {
            context
        }
    }

    fn render_code_chunk(&self, item: &crate::use_cases::retrieval_service::RetrievedItem) -> String {
        let path = metadata::get_str(&item.metadata, metadata::FILEPATH).unwrap_or("?");
        let start = metadata::get_usize(&item.metadata, metadata::START_LINE).unwrap_or(0);
        let end = metadata::get_usize(&item.metadata, metadata::END_LINE).unwrap_or(0);
        let symbol = metadata::get_str(&item.metadata, metadata::SYMBOL_NAME);
        let header = match symbol {
            Some(name) => format!("**{path}** (L{start}-{end}) - {name}"),
            None => format!("**{path}** (L{start}-{end})"),
        };
        let body = truncate_lines(&item.document, self.config.max_lines_per_chunk);
        format!("{header}\n```\n{body}\n```")
    }
}

fn render_memory(item: &crate::use_cases::retrieval_service::RetrievedItem) -> String {
    format!("- {}", item.document)
}

fn truncate_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().take(max_lines).collect();
    lines.join("\n")
}

/// Strip noise prefixes from the signals a post-tool-use hook has on hand so
/// the result reads like a natural-language memory query rather than raw
/// tool plumbing (spec.md §4.9 step 2).
#[must_use]
pub fn build_rich_query(file_path: Option<&str>, tool_output_head: Option<&str>, user_prompt_head: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(path) = file_path {
        parts.push(strip_noise(path));
    }
    if let Some(head) = tool_output_head {
        parts.push(strip_noise(head));
    }
    if let Some(head) = user_prompt_head {
        parts.push(strip_noise(head));
    }
    parts.retain(|p| !p.is_empty());
    parts.join(" ")
}

fn strip_noise(text: &str) -> String {
    let mut s = text.trim();
    for prefix in ["Read ", "Edit ", "Write "] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest;
        }
    }
    let s = s.trim_start_matches(|c: char| c.is_ascii_digit() || c == '-' || c == ':' || c.is_whitespace());
    s.trim_start_matches(['{', '[']).trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use chrono::Duration;

    use oak_ci_domain::entities::{
        IndexedFile, Observation, PromptBatch, PromptBatchClassification, PromptBatchStatus, SessionStatus,
    };
    use oak_ci_domain::ports::{
        Collection, Embedder, ObservationFilter, SearchFilter, SearchResult, StaleRecoveryOutcome, VectorItem,
        VectorStore,
    };
    use oak_ci_domain::value_objects::BatchId;

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
        fn dimensions(&self) -> usize {
            2
        }
        fn context_window(&self) -> usize {
            8192
        }
        fn provider_name(&self) -> &str {
            "stub"
        }
    }

    struct StubVectorStore;

    #[async_trait]
    impl VectorStore for StubVectorStore {
        async fn add(&self, _collection: Collection, _items: Vec<VectorItem>) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, _collection: Collection, _filter: &SearchFilter) -> Result<usize> {
            Ok(0)
        }
        async fn search(
            &self,
            collection: Collection,
            _query_embedding: &[f32],
            _k: usize,
            _filter: Option<&SearchFilter>,
            _min_score: Option<f32>,
        ) -> Result<Vec<SearchResult>> {
            if collection != Collection::Memory {
                return Ok(Vec::new());
            }
            let mut metadata = HashMap::new();
            metadata.insert(metadata::ARCHIVED.to_owned(), Value::Bool(false));
            Ok(vec![SearchResult { id: "mem-1".to_owned(), score: 0.9, metadata, document: "watch out for X".to_owned() }])
        }
        async fn stats(&self, _collection: Collection) -> Result<(usize, usize)> {
            Ok((0, 0))
        }
        async fn reset(&self, _collection: Collection) -> Result<()> {
            Ok(())
        }
        async fn dimension(&self, _collection: Collection) -> Result<Option<usize>> {
            Ok(Some(2))
        }
    }

    #[derive(Default)]
    struct StubActivityStore {
        sessions: StdMutex<HashMap<String, Session>>,
        batches: StdMutex<HashMap<String, PromptBatch>>,
        next_prompt_number: StdMutex<HashMap<String, i64>>,
    }

    #[async_trait]
    impl ActivityStore for StubActivityStore {
        async fn create_session(&self, session: Session) -> Result<Session> {
            self.sessions.lock().unwrap().insert(session.id.as_str().to_owned(), session.clone());
            Ok(session)
        }
        async fn get_session(&self, id: &SessionId) -> Result<Option<Session>> {
            Ok(self.sessions.lock().unwrap().get(id.as_str()).cloned())
        }
        async fn update_session(&self, session: Session) -> Result<Session> {
            self.sessions.lock().unwrap().insert(session.id.as_str().to_owned(), session.clone());
            Ok(session)
        }
        async fn end_session(&self, id: &SessionId, now: DateTime<Utc>) -> Result<Session> {
            let mut sessions = self.sessions.lock().unwrap();
            let session = sessions.get_mut(id.as_str()).ok_or_else(|| oak_ci_domain::error::Error::not_found("session"))?;
            session.status = SessionStatus::Completed;
            session.ended_at = Some(now);
            Ok(session.clone())
        }
        async fn reactivate_if_needed(&self, id: &SessionId, _now: DateTime<Utc>) -> Result<Session> {
            self.get_session(id).await?.ok_or_else(|| oak_ci_domain::error::Error::not_found("session"))
        }
        async fn ensure_session_exists(&self, id: &SessionId, agent: &str, project_root: &str, now: DateTime<Utc>) -> Result<Session> {
            if let Some(existing) = self.get_session(id).await? {
                return Ok(existing);
            }
            self.create_session(Session::new(id.clone(), agent, project_root, now)).await
        }
        async fn delete_session_cascade(&self, id: &SessionId) -> Result<()> {
            self.sessions.lock().unwrap().remove(id.as_str());
            Ok(())
        }
        async fn list_sessions(&self, _agent: Option<&str>, _limit: i64, _offset: i64) -> Result<Vec<Session>> {
            Ok(self.sessions.lock().unwrap().values().cloned().collect())
        }
        async fn get_stale_sessions(&self, _timeout: Duration, _now: DateTime<Utc>) -> Result<Vec<Session>> {
            Ok(Vec::new())
        }
        async fn create_batch(
            &self,
            session_id: &SessionId,
            user_prompt: &str,
            source_type: PromptSourceType,
            plan_content: Option<String>,
            now: DateTime<Utc>,
        ) -> Result<PromptBatch> {
            let mut counters = self.next_prompt_number.lock().unwrap();
            let counter = counters.entry(session_id.as_str().to_owned()).or_insert(0);
            *counter += 1;
            let mut batch = PromptBatch::new(BatchId::new(), session_id.clone(), *counter, user_prompt, source_type, now);
            batch.plan_content = plan_content;
            self.batches.lock().unwrap().insert(batch.id.as_uuid().to_string(), batch.clone());
            if let Some(session) = self.sessions.lock().unwrap().get_mut(session_id.as_str()) {
                session.prompt_count += 1;
                session.current_prompt_batch_id = Some(batch.id);
            }
            Ok(batch)
        }
        async fn get_batch(&self, id: &BatchId) -> Result<Option<PromptBatch>> {
            Ok(self.batches.lock().unwrap().get(&id.as_uuid().to_string()).cloned())
        }
        async fn classify_batch(&self, _batch_id: &BatchId, _label: PromptBatchClassification) -> Result<()> {
            Ok(())
        }
        async fn set_plan_embedded(&self, _batch_id: &BatchId, _embedded: bool) -> Result<()> {
            Ok(())
        }
        async fn get_batches_needing_plan_embedding(&self) -> Result<Vec<PromptBatch>> {
            Ok(Vec::new())
        }
        async fn get_batches_needing_classification(&self, _older_than: DateTime<Utc>) -> Result<Vec<PromptBatch>> {
            Ok(Vec::new())
        }
        async fn get_batches_needing_extraction(&self) -> Result<Vec<PromptBatch>> {
            Ok(Vec::new())
        }
        async fn mark_observations_extracted(&self, _batch_id: &BatchId) -> Result<()> {
            Ok(())
        }
        async fn list_batches_for_session(&self, _session_id: &SessionId) -> Result<Vec<PromptBatch>> {
            Ok(Vec::new())
        }
        async fn list_plan_batches(&self, _session_id: Option<&SessionId>, _limit: i64, _offset: i64) -> Result<Vec<PromptBatch>> {
            Ok(Vec::new())
        }
        async fn append_activity(&self, activity: Activity) -> Result<Activity> {
            Ok(activity)
        }
        async fn flush_activities(&self) -> Result<()> {
            Ok(())
        }
        async fn list_activities_for_batch(&self, _batch_id: &BatchId) -> Result<Vec<Activity>> {
            Ok(Vec::new())
        }
        async fn add_observation(&self, observation: Observation) -> Result<Observation> {
            Ok(observation)
        }
        async fn list_observations(&self, _filter: &ObservationFilter) -> Result<Vec<Observation>> {
            Ok(Vec::new())
        }
        async fn set_archived(&self, _id: &oak_ci_domain::value_objects::ObservationId, _archived: bool) -> Result<()> {
            Ok(())
        }
        async fn delete_observation(&self, _id: &oak_ci_domain::value_objects::ObservationId) -> Result<()> {
            Ok(())
        }
        async fn get_unembedded_observations(&self) -> Result<Vec<Observation>> {
            Ok(Vec::new())
        }
        async fn mark_observations_embedded(&self, _ids: &[oak_ci_domain::value_objects::ObservationId]) -> Result<()> {
            Ok(())
        }
        async fn search_fts(&self, _query: &str, _limit: i64) -> Result<Vec<Observation>> {
            Ok(Vec::new())
        }
        async fn upsert_indexed_file(&self, file: IndexedFile) -> Result<IndexedFile> {
            Ok(file)
        }
        async fn get_indexed_file(&self, _filepath: &str) -> Result<Option<IndexedFile>> {
            Ok(None)
        }
        async fn delete_indexed_file(&self, _filepath: &str) -> Result<()> {
            Ok(())
        }
        async fn list_indexed_files(&self) -> Result<Vec<IndexedFile>> {
            Ok(Vec::new())
        }
        async fn run_stale_recovery(&self, _timeout: Duration, _now: DateTime<Utc>) -> Result<StaleRecoveryOutcome> {
            Ok(StaleRecoveryOutcome::default())
        }
        async fn schema_version(&self) -> Result<i64> {
            Ok(1)
        }
    }

    fn service() -> HookIngestionService {
        let retrieval = RetrievalService::new(Arc::new(StubVectorStore), Arc::new(StubEmbedder), 0.75, 0.5);
        HookIngestionService::new(Arc::new(StubActivityStore::default()), retrieval, InjectionConfig::default())
    }

    #[test]
    fn build_rich_query_strips_noise_prefixes() {
        let query = build_rich_query(Some("Read src/main.rs"), Some("12-  {\"ok\": true}"), None);
        assert_eq!(query, "src/main.rs \"ok\": true}");
    }

    #[tokio::test]
    async fn session_start_creates_session() {
        let svc = service();
        let id = SessionId::new("s1");
        let ctx = svc.session_start(&id, "claude", "/proj", Utc::now()).await.unwrap();
        assert!(ctx.additional_context.is_empty());
        let session = svc.activity_store.get_session(&id).await.unwrap();
        assert!(session.is_some());
    }

    #[tokio::test]
    async fn prompt_submit_opens_a_batch_and_injects_memories() {
        let svc = service();
        let id = SessionId::new("s1");
        let ctx = svc.prompt_submit(&id, "claude", "/proj", "how does auth work", Utc::now()).await.unwrap();
        assert!(ctx.additional_context.contains("Relevant memories"));
        let session = svc.activity_store.get_session(&id).await.unwrap().unwrap();
        assert_eq!(session.prompt_count, 1);
        assert!(session.current_prompt_batch_id.is_some());
    }

    #[tokio::test]
    async fn post_tool_use_on_non_file_tool_returns_no_context() {
        let svc = service();
        let id = SessionId::new("s1");
        svc.prompt_submit(&id, "claude", "/proj", "hello", Utc::now()).await.unwrap();
        let ctx = svc
            .post_tool_use(&id, "Bash", serde_json::json!({"command": "ls"}), None, None, true, None, None, Utc::now())
            .await
            .unwrap();
        assert!(ctx.additional_context.is_empty());
    }

    #[tokio::test]
    async fn post_tool_use_on_file_read_injects_memories() {
        let svc = service();
        let id = SessionId::new("s1");
        svc.prompt_submit(&id, "claude", "/proj", "hello", Utc::now()).await.unwrap();
        let ctx = svc
            .post_tool_use(&id, "Read", serde_json::json!({"file_path": "src/lib.rs"}), None, Some("src/lib.rs".to_owned()), true, None, None, Utc::now())
            .await
            .unwrap();
        assert!(ctx.additional_context.contains("watch out for X"));
    }

    #[tokio::test]
    async fn subagent_hooks_open_a_synthetic_batch() {
        let svc = service();
        let id = SessionId::new("s1");
        svc.activity_store.ensure_session_exists(&id, "claude", "/proj", Utc::now()).await.unwrap();
        svc.subagent_start(&id, "researcher", "a1", Utc::now()).await.unwrap();
        svc.subagent_stop(&id, "a1", Some("/tmp/transcript.json"), Utc::now()).await.unwrap();
        let session = svc.activity_store.get_session(&id).await.unwrap().unwrap();
        assert!(session.current_prompt_batch_id.is_some());
    }
}
