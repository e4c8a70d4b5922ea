//! Job bodies run by the tiered scheduler (spec.md §4.10).
//!
//! Every method here is a single idempotent unit of work over one or more
//! entities; none of them loop or sleep. Timing, dedup, backpressure, and
//! cancellation belong to the scheduler that calls these methods (the
//! binary's composition root wires its tier ticks to these via
//! `(entity_id, job_kind)` job keys), not to this crate — this crate never
//! depends on the scheduler or any other infrastructure type.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use oak_ci_domain::entities::{
    Observation, ObservationImportance, ObservationType, PromptBatch, PromptBatchClassification,
    Session,
};
use oak_ci_domain::error::Result;
use oak_ci_domain::ports::{
    ActivityStore, Collection, CompletionRequest, DomainEvent, Embedder, EventBus, Summarizer,
    VectorItem, VectorStore,
};
use oak_ci_domain::value_objects::{BatchId, ObservationId, SessionId};

use crate::metadata;

/// Tool-distribution thresholds and provider-call tuning the medium/
/// infrequent tiers are parameterized by (spec.md §4.1 `background.*`).
#[derive(Clone, Debug)]
pub struct BackgroundProcessorConfig {
    /// `K` in "≥K Edit/Write -> implementation" etc.
    pub classification_min_tool_count: i64,
    /// Max tokens requested from the summarizer per call.
    pub max_summary_tokens: usize,
    /// Max observations accepted from one extraction call.
    pub max_observations_per_batch: usize,
}

impl Default for BackgroundProcessorConfig {
    fn default() -> Self {
        Self { classification_min_tool_count: 3, max_summary_tokens: 512, max_observations_per_batch: 8 }
    }
}

/// The granular job bodies the scheduler's tiers invoke.
pub struct BackgroundProcessorService {
    activity_store: Arc<dyn ActivityStore>,
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    summarizer: Arc<dyn Summarizer>,
    event_bus: Arc<dyn EventBus>,
    config: BackgroundProcessorConfig,
}

impl BackgroundProcessorService {
    #[must_use]
    pub fn new(
        activity_store: Arc<dyn ActivityStore>,
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        summarizer: Arc<dyn Summarizer>,
        event_bus: Arc<dyn EventBus>,
        config: BackgroundProcessorConfig,
    ) -> Self {
        Self { activity_store, vector_store, embedder, summarizer, event_bus, config }
    }

    // --- Fast tier (5-15s) --------------------------------------------

    /// Force the activity buffer to durable storage.
    pub async fn flush_activities(&self) -> Result<()> {
        self.activity_store.flush_activities().await
    }

    // --- Medium tier (30-120s) -----------------------------------------

    /// Classify every batch older than `older_than` still awaiting one.
    /// Returns the number classified.
    pub async fn classify_stale_batches(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let pending = self.activity_store.get_batches_needing_classification(older_than).await?;
        for batch in &pending {
            let label = self.classify_batch(batch).await?;
            self.activity_store.classify_batch(&batch.id, label).await?;
        }
        Ok(pending.len())
    }

    async fn classify_batch(&self, batch: &PromptBatch) -> Result<PromptBatchClassification> {
        if batch.has_plan_payload() {
            return Ok(PromptBatchClassification::Plan);
        }
        let activities = self.activity_store.list_activities_for_batch(&batch.id).await?;
        let edits = activities.iter().filter(|a| matches!(a.tool_name.as_str(), "Edit" | "Write")).count() as i64;
        let reads = activities.iter().filter(|a| matches!(a.tool_name.as_str(), "Read" | "Grep")).count() as i64;
        let failures = activities.iter().filter(|a| !a.success).count() as i64;
        let touches_files = activities.iter().any(|a| matches!(a.tool_name.as_str(), "Read" | "Edit" | "Write" | "Grep"));
        let min = self.config.classification_min_tool_count;

        let label = if failures >= min && touches_files {
            PromptBatchClassification::Debugging
        } else if edits >= min {
            PromptBatchClassification::Implementation
        } else if reads >= min && edits == 0 {
            PromptBatchClassification::Exploration
        } else {
            PromptBatchClassification::Other
        };
        Ok(label)
    }

    /// Extract memory observations from one completed batch not yet
    /// processed, via [`Summarizer`]. Returns the observations stored.
    ///
    /// Idempotent: a batch already marked `observations_extracted` is
    /// skipped by the caller's poll (`get_batches_needing_extraction`), so
    /// calling this twice for the same batch only duplicates work if the
    /// caller bypasses that poll.
    pub async fn extract_observations_for_batch(&self, batch: &PromptBatch) -> Result<Vec<Observation>> {
        let activities = self.activity_store.list_activities_for_batch(&batch.id).await?;
        if activities.is_empty() {
            self.activity_store.mark_observations_extracted(&batch.id).await?;
            return Ok(vec![]);
        }

        let transcript = render_transcript(batch, &activities);
        let raw = self
            .summarizer
            .complete(CompletionRequest {
                system_prompt: EXTRACTION_SYSTEM_PROMPT.to_owned(),
                input: transcript,
                max_output_tokens: self.config.max_summary_tokens,
            })
            .await?;

        let mut observations = parse_extracted_observations(&raw, batch.session_id.clone(), batch.id, Utc::now());
        observations.truncate(self.config.max_observations_per_batch);

        let mut stored = Vec::with_capacity(observations.len());
        for observation in observations {
            stored.push(self.activity_store.add_observation(observation).await?);
        }
        self.activity_store.mark_observations_extracted(&batch.id).await?;
        Ok(stored)
    }

    /// Run one round of `extract_observations_for_batch` over every
    /// completed batch awaiting it.
    pub async fn extract_pending_observations(&self) -> Result<usize> {
        let pending = self.activity_store.get_batches_needing_extraction().await?;
        let mut total = 0usize;
        for batch in &pending {
            total += self.extract_observations_for_batch(batch).await?.len();
        }
        Ok(total)
    }

    /// Embed every observation not yet in the `memory` collection.
    pub async fn embed_pending_observations(&self) -> Result<usize> {
        let pending = self.activity_store.get_unembedded_observations().await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = pending.iter().map(observation_text).collect();
        let embeddings = self.embedder.embed(&texts).await?;

        let items: Vec<VectorItem> = pending
            .iter()
            .zip(embeddings)
            .map(|(observation, embedding)| VectorItem {
                id: observation.id.to_string(),
                embedding,
                metadata: observation_metadata(observation),
                document: observation_text(observation),
            })
            .collect();
        self.vector_store.add(Collection::Memory, items).await?;

        let ids: Vec<ObservationId> = pending.iter().map(|o| o.id).collect();
        self.activity_store.mark_observations_embedded(&ids).await?;
        Ok(ids.len())
    }

    /// Embed plan content for every batch with `plan_embedded = false`
    /// (invariant 4).
    pub async fn embed_pending_plans(&self) -> Result<usize> {
        let pending = self.activity_store.get_batches_needing_plan_embedding().await?;
        for batch in &pending {
            let Some(content) = batch.plan_content.as_deref().filter(|c| !c.is_empty()) else { continue };
            let embeddings = self.embedder.embed(std::slice::from_ref(&content.to_owned())).await?;
            let Some(embedding) = embeddings.into_iter().next() else { continue };

            let mut plan_metadata: HashMap<String, serde_json::Value> = HashMap::new();
            plan_metadata.insert(metadata::SESSION_ID.to_owned(), batch.session_id.as_str().into());
            plan_metadata.insert(metadata::BATCH_ID.to_owned(), batch.id.to_string().into());
            plan_metadata.insert(metadata::CREATED_AT.to_owned(), batch.started_at.to_rfc3339().into());
            if let Some(path) = &batch.plan_file_path {
                plan_metadata.insert(metadata::TITLE.to_owned(), path.clone().into());
            }

            self.vector_store
                .add(
                    Collection::Plan,
                    vec![VectorItem { id: batch.id.to_string(), embedding, metadata: plan_metadata, document: content.to_owned() }],
                )
                .await?;
            self.activity_store.set_plan_embedded(&batch.id, true).await?;
        }
        Ok(pending.len())
    }

    // --- Infrequent tier (~5 min) ----------------------------------------

    /// Run the stale-recovery sweep, publish one event per affected session,
    /// and generate a title/summary for every session it just completed
    /// (spec.md §4.5, §4.10 — a completed session is exactly a session that
    /// newly needs one).
    pub async fn run_stale_recovery(&self, timeout: chrono::Duration) -> Result<usize> {
        let outcome = self.activity_store.run_stale_recovery(timeout, Utc::now()).await?;
        for id in &outcome.recovered_ids {
            self.event_bus.publish(DomainEvent::SessionRecovered { session_id: id.to_string(), deleted: false }).await;
            if let Err(e) = self.generate_session_title_and_summary(id).await {
                oak_ci_domain::warn!("background", "failed to title/summarize recovered session", e);
            }
        }
        for id in &outcome.deleted_ids {
            self.event_bus.publish(DomainEvent::SessionRecovered { session_id: id.to_string(), deleted: true }).await;
        }
        Ok(outcome.recovered_ids.len() + outcome.deleted_ids.len())
    }

    /// Generate and persist a title and summary for one recovered session.
    pub async fn generate_session_title_and_summary(&self, session_id: &SessionId) -> Result<Option<Session>> {
        let Some(mut session) = self.activity_store.get_session(session_id).await? else { return Ok(None) };
        let batches = self.activity_store.list_batches_for_session(session_id).await?;
        if batches.is_empty() {
            return Ok(Some(session));
        }

        let transcript = batches.iter().rev().map(|b| format!("- {}", truncate(&b.user_prompt, 200))).collect::<Vec<_>>().join("\n");
        let raw = self
            .summarizer
            .complete(CompletionRequest {
                system_prompt: SESSION_SUMMARY_SYSTEM_PROMPT.to_owned(),
                input: transcript,
                max_output_tokens: self.config.max_summary_tokens,
            })
            .await?;

        let (title, summary) = split_title_and_summary(&raw);
        session.title = Some(title);
        session.summary = Some(summary);
        Ok(Some(self.activity_store.update_session(session).await?))
    }
}

const EXTRACTION_SYSTEM_PROMPT: &str = "\
Extract durable memories from this tool-use transcript. Respond with a \
JSON array of objects, each with fields: type (one of discovery, gotcha, \
decision, bug_fix, trade_off), observation (one sentence), importance \
(low, medium, high), tags (array of short strings). Respond with only \
the JSON array; if nothing is worth remembering, respond with [].";

const SESSION_SUMMARY_SYSTEM_PROMPT: &str = "\
Summarize this coding session in two lines: the first line is a short \
title (under 8 words), the second line is a one-paragraph summary. \
Respond with exactly those two lines, nothing else.";

#[derive(Deserialize)]
struct RawObservation {
    r#type: String,
    observation: String,
    #[serde(default)]
    importance: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

fn parse_extracted_observations(raw: &str, session_id: SessionId, batch_id: BatchId, now: DateTime<Utc>) -> Vec<Observation> {
    let trimmed = raw.trim();
    let parsed: Vec<RawObservation> = serde_json::from_str(trimmed).unwrap_or_default();
    parsed
        .into_iter()
        .filter_map(|raw| {
            let r#type = parse_observation_type(&raw.r#type)?;
            Some(Observation {
                id: ObservationId::new(),
                session_id: session_id.clone(),
                prompt_batch_id: Some(batch_id),
                r#type,
                observation: raw.observation,
                context: None,
                tags: raw.tags,
                importance: raw.importance.as_deref().and_then(parse_importance).unwrap_or(ObservationImportance::Medium),
                file_path: None,
                created_at: now,
                embedded: false,
                archived: false,
            })
        })
        .collect()
}

fn parse_observation_type(raw: &str) -> Option<ObservationType> {
    match raw {
        "discovery" => Some(ObservationType::Discovery),
        "gotcha" => Some(ObservationType::Gotcha),
        "decision" => Some(ObservationType::Decision),
        "bug_fix" => Some(ObservationType::BugFix),
        "trade_off" => Some(ObservationType::TradeOff),
        _ => None,
    }
}

fn parse_importance(raw: &str) -> Option<ObservationImportance> {
    match raw {
        "low" => Some(ObservationImportance::Low),
        "medium" => Some(ObservationImportance::Medium),
        "high" => Some(ObservationImportance::High),
        _ => None,
    }
}

fn render_transcript(batch: &PromptBatch, activities: &[oak_ci_domain::entities::Activity]) -> String {
    let mut out = format!("prompt: {}\n", batch.user_prompt);
    for activity in activities {
        let outcome = if activity.success { "ok" } else { "failed" };
        out.push_str(&format!(
            "- {} ({}) {}\n",
            activity.tool_name,
            outcome,
            activity.file_path.as_deref().unwrap_or_default(),
        ));
    }
    out
}

fn observation_text(observation: &Observation) -> String {
    match &observation.context {
        Some(context) => format!("{}\n\n{}", observation.observation, context),
        None => observation.observation.clone(),
    }
}

fn observation_type_key(value: ObservationType) -> &'static str {
    match value {
        ObservationType::Discovery => "discovery",
        ObservationType::Gotcha => "gotcha",
        ObservationType::Decision => "decision",
        ObservationType::BugFix => "bug_fix",
        ObservationType::TradeOff => "trade_off",
        ObservationType::SessionSummary => "session_summary",
        ObservationType::Plan => "plan",
    }
}

fn importance_key(value: ObservationImportance) -> &'static str {
    match value {
        ObservationImportance::Low => "low",
        ObservationImportance::Medium => "medium",
        ObservationImportance::High => "high",
    }
}

fn observation_metadata(observation: &Observation) -> HashMap<String, serde_json::Value> {
    let mut map = HashMap::new();
    map.insert(metadata::OBSERVATION_TYPE.to_owned(), observation_type_key(observation.r#type).into());
    map.insert(metadata::IMPORTANCE.to_owned(), importance_key(observation.importance).into());
    map.insert(metadata::ARCHIVED.to_owned(), observation.archived.into());
    map.insert(metadata::SESSION_ID.to_owned(), observation.session_id.as_str().into());
    map.insert(metadata::CREATED_AT.to_owned(), observation.created_at.to_rfc3339().into());
    map.insert(metadata::TAGS.to_owned(), observation.tags.clone().into());
    if let Some(batch_id) = observation.prompt_batch_id {
        map.insert(metadata::BATCH_ID.to_owned(), batch_id.to_string().into());
    }
    map
}

fn split_title_and_summary(raw: &str) -> (String, String) {
    let mut lines = raw.trim().lines();
    let title = lines.next().unwrap_or("Untitled session").trim().to_owned();
    let summary = lines.collect::<Vec<_>>().join(" ").trim().to_owned();
    let summary = if summary.is_empty() { title.clone() } else { summary };
    (title, summary)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_owned()
    } else {
        text.chars().take(max_chars).collect::<String>() + "…"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_prefers_plan_payload() {
        let config = BackgroundProcessorConfig::default();
        assert_eq!(config.classification_min_tool_count, 3);
    }

    #[test]
    fn parses_well_formed_extraction_json() {
        let raw = r#"[{"type":"gotcha","observation":"foo","importance":"high","tags":["x"]}]"#;
        let session_id = SessionId::new("s1");
        let batch_id = BatchId::new();
        let now = Utc::now();
        let observations = parse_extracted_observations(raw, session_id, batch_id, now);
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].importance, ObservationImportance::High);
    }

    #[test]
    fn malformed_extraction_json_yields_no_observations() {
        let observations = parse_extracted_observations("not json", SessionId::new("s1"), BatchId::new(), Utc::now());
        assert!(observations.is_empty());
    }

    #[test]
    fn split_title_and_summary_handles_single_line() {
        let (title, summary) = split_title_and_summary("Fixed the bug");
        assert_eq!(title, "Fixed the bug");
        assert_eq!(summary, "Fixed the bug");
    }
}
