//! Route handlers (spec.md §4.9 hook table, §6.1 HTTP API).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::Value;

use oak_ci_application::SearchType;
use oak_ci_domain::entities::ObservationImportance;
use oak_ci_domain::error::Error;
use oak_ci_domain::ports::{Collection, ObservationFilter, SearchFilter};
use oak_ci_domain::value_objects::{BatchId, ObservationId, SessionId};
use oak_ci_infrastructure::config::AppConfig;

use super::dto::*;
use super::AppState;

/// Wraps a domain [`Error`] for non-hook endpoints, which (unlike hooks)
/// surface real HTTP status codes (spec.md §6.1 `{error: {code, message}}`).
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            Error::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            Error::InvalidArgument { .. } => (StatusCode::BAD_REQUEST, "invalid_argument"),
            Error::DimensionMismatch { .. } => (StatusCode::CONFLICT, "dimension_mismatch"),
            Error::Busy => (StatusCode::SERVICE_UNAVAILABLE, "busy"),
            Error::ConfigError { .. } => (StatusCode::BAD_REQUEST, "config_error"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        let body = ErrorBody { error: ErrorDetail { code: code.to_owned(), message: self.0.to_string() } };
        (status, Json(body)).into_response()
    }
}

/// Run a hook body to completion, discarding its error per spec.md §4.9
/// "Failure semantics": every hook endpoint is best-effort and must not
/// block the agent.
async fn best_effort(label: &str, result: Result<HookResponse, Error>) -> Json<HookResponse> {
    match result {
        Ok(response) => Json(response),
        Err(e) => {
            oak_ci_domain::warn!(label, "hook handler failed", e);
            Json(HookResponse::default())
        }
    }
}

fn resolve_session_id(envelope: &HookEnvelope) -> SessionId {
    SessionId::new(envelope.session_id().unwrap_or("unknown-session").to_owned())
}

pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let schema_version = state.activity_store.schema_version().await?;
    Ok(Json(HealthResponse {
        status: "ok".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        uptime_s: state.started_at.elapsed().as_secs(),
        indexing_status: format!("{:?}", state.status.get()).to_lowercase(),
        schema_version,
        embedding_dimensions: state.embedder.dimensions(),
    }))
}

pub async fn session_start(State(state): State<AppState>, Json(req): Json<SessionStartRequest>) -> Json<HookResponse> {
    let session_id = resolve_session_id(&req.envelope);
    let project_root = req.envelope.cwd.clone().unwrap_or_default();
    let result = state
        .hook_ingestion
        .session_start(&session_id, &req.envelope.agent, &project_root, Utc::now())
        .await
        .map(|ctx| HookResponse { additional_context: non_empty(ctx.additional_context) });
    best_effort("session-start", result).await
}

pub async fn session_end(State(state): State<AppState>, Json(req): Json<SessionEndRequest>) -> Json<HookResponse> {
    let session_id = resolve_session_id(&req.envelope);
    let result = state.hook_ingestion.session_end(&session_id, Utc::now()).await.map(|()| HookResponse::default());
    best_effort("session-end", result).await
}

pub async fn prompt_submit(State(state): State<AppState>, Json(req): Json<PromptSubmitRequest>) -> Json<HookResponse> {
    let session_id = resolve_session_id(&req.envelope);
    let project_root = req.envelope.cwd.clone().unwrap_or_default();
    let result = state
        .hook_ingestion
        .prompt_submit(&session_id, &req.envelope.agent, &project_root, &req.prompt, Utc::now())
        .await
        .map(|ctx| HookResponse { additional_context: non_empty(ctx.additional_context) });
    best_effort("prompt-submit", result).await
}

async fn handle_post_tool_use(state: AppState, req: PostToolUseRequest, success: bool) -> Json<HookResponse> {
    let session_id = resolve_session_id(&req.envelope);
    let tool_output_summary = req
        .tool_output_summary
        .or_else(|| req.tool_response.as_ref().map(|v| v.to_string()));
    let result = state
        .hook_ingestion
        .post_tool_use(
            &session_id,
            &req.tool_name,
            req.tool_input,
            tool_output_summary,
            req.file_path,
            success,
            req.error,
            req.tool_use_id,
            Utc::now(),
        )
        .await
        .map(|ctx| HookResponse { additional_context: non_empty(ctx.additional_context) });
    best_effort("post-tool-use", result).await
}

pub async fn post_tool_use(State(state): State<AppState>, Json(req): Json<PostToolUseRequest>) -> Json<HookResponse> {
    handle_post_tool_use(state, req, true).await
}

pub async fn post_tool_use_failure(State(state): State<AppState>, Json(req): Json<PostToolUseRequest>) -> Json<HookResponse> {
    handle_post_tool_use(state, req, false).await
}

pub async fn subagent_start(State(state): State<AppState>, Json(req): Json<SubagentStartRequest>) -> Json<HookResponse> {
    let session_id = resolve_session_id(&req.envelope);
    let result = state
        .hook_ingestion
        .subagent_start(&session_id, &req.agent_type, &req.agent_id, Utc::now())
        .await
        .map(|()| HookResponse::default());
    best_effort("subagent-start", result).await
}

pub async fn subagent_stop(State(state): State<AppState>, Json(req): Json<SubagentStopRequest>) -> Json<HookResponse> {
    let session_id = resolve_session_id(&req.envelope);
    let result = state
        .hook_ingestion
        .subagent_stop(&session_id, &req.agent_id, req.transcript_path.as_deref(), Utc::now())
        .await
        .map(|()| HookResponse::default());
    best_effort("subagent-stop", result).await
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub async fn list_sessions(State(state): State<AppState>, Query(page): Query<Pagination>) -> Result<Json<Value>, ApiError> {
    let sessions = state.activity_store.list_sessions(page.agent.as_deref(), page.limit, page.offset).await?;
    Ok(Json(serde_json::json!({ "sessions": sessions })))
}

pub async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let session = state.activity_store.get_session(&SessionId::new(id)).await?;
    match session {
        Some(session) => Ok(Json(serde_json::to_value(session).map_err(Error::from)?)),
        None => Err(Error::not_found("session").into()),
    }
}

pub async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.activity_store.delete_session_cascade(&SessionId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_plans(State(state): State<AppState>, Query(page): Query<Pagination>) -> Result<Json<Value>, ApiError> {
    let batches = state.activity_store.list_plan_batches(None, page.limit, page.offset).await?;
    Ok(Json(serde_json::json!({ "plans": batches })))
}

/// Deletes a batch's plan embedding from the vector store and clears
/// `plan_embedded` (spec.md §3.2.4: "deleting it clears the flag"), so a
/// later edit of the same plan file is picked back up for re-embedding.
pub async fn delete_plan(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let batch_id = BatchId::from_uuid(uuid::Uuid::parse_str(&id).map_err(|_| Error::invalid_argument("malformed batch id"))?);
    state
        .vector_store
        .delete(Collection::Plan, &SearchFilter::eq(oak_ci_application::metadata::BATCH_ID, batch_id.to_string()))
        .await?;
    state.activity_store.set_plan_embedded(&batch_id, false).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_memories(State(state): State<AppState>, Query(query): Query<MemoryFilterQuery>) -> Result<Json<Value>, ApiError> {
    let filter = ObservationFilter {
        r#type: query.r#type.as_deref().and_then(parse_observation_type),
        tag: query.tag,
        start_date: query.start_date.as_deref().and_then(parse_date),
        end_date: query.end_date.as_deref().and_then(parse_date),
        include_archived: query.archived.unwrap_or(false),
        limit: query.limit,
        offset: query.offset,
    };
    let observations = state.activity_store.list_observations(&filter).await?;
    Ok(Json(serde_json::json!({ "memories": observations })))
}

pub async fn bulk_memories(State(state): State<AppState>, Json(req): Json<BulkMemoryRequest>) -> Result<Json<Value>, ApiError> {
    let r#type = parse_observation_type(&req.r#type).ok_or_else(|| Error::invalid_argument(format!("unknown observation type '{}'", req.r#type)))?;
    let importance = req.importance.as_deref().and_then(parse_importance).unwrap_or(ObservationImportance::Medium);
    let session_id = SessionId::new(req.session_id.unwrap_or_else(|| "manual".to_owned()));
    let mut tags = req.tags;
    if !tags.iter().any(|t| t == "source:manual") {
        tags.push("source:manual".to_owned());
    }
    let observation = oak_ci_domain::entities::Observation {
        id: ObservationId::new(),
        session_id,
        prompt_batch_id: None,
        r#type,
        observation: req.observation,
        context: req.context,
        tags,
        importance,
        file_path: None,
        created_at: Utc::now(),
        embedded: false,
        archived: false,
    };
    let stored = state.activity_store.add_observation(observation).await?;
    Ok(Json(serde_json::to_value(stored).map_err(Error::from)?))
}

pub async fn unified_search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> Result<Json<Value>, ApiError> {
    let search_type = match query.search_type.as_deref() {
        Some("code") => SearchType::Code,
        Some("memory") => SearchType::Memory,
        Some("plan") => SearchType::Plan,
        _ => SearchType::All,
    };
    let hits = state.retrieval.search(&query.q, search_type, query.limit.max(0) as usize, None).await?;
    let rendered: Vec<SearchHit> = hits
        .into_iter()
        .map(|hit| SearchHit {
            id: hit.id,
            collection: hit.collection.name().to_owned(),
            score: hit.score,
            confidence: format!("{:?}", hit.tier).to_lowercase(),
            document: hit.document,
            metadata: hit.metadata.into_iter().collect(),
        })
        .collect();
    Ok(Json(serde_json::json!({ "results": rendered })))
}

/// Runs a full re-walk of the project tree (spec.md §6.4 `index` CLI
/// subcommand). Content-hash skipping already makes a full walk cheap for
/// unchanged files, so there is no separate "incremental" code path here;
/// the watcher covers incremental updates as they happen.
pub async fn trigger_index(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.status.set(super::status::DaemonStatusValue::Indexing);
    let report = state.indexing.full_index().await;
    state.status.set(super::status::DaemonStatusValue::Ready);
    Ok(Json(serde_json::to_value(report?).map_err(Error::from)?))
}

pub async fn backup_export(State(state): State<AppState>) -> Result<Json<BackupExportResponse>, ApiError> {
    let sql = state.activity_store.export_sql().await?;
    Ok(Json(BackupExportResponse { sql }))
}

pub async fn backup_import(State(state): State<AppState>, Json(req): Json<BackupImportRequest>) -> Result<StatusCode, ApiError> {
    state.activity_store.import_sql(&req.sql).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_config(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let config = state.config_loader.load()?;
    Ok(Json(serde_json::to_value(config).map_err(Error::from)?))
}

/// Validates and writes the posted config to `.oak/ci/config.toml` (spec.md
/// §4.1, §9). Never touches the running `AppState`'s live snapshot; the
/// caller must restart the daemon for the new file to take effect.
pub async fn put_config(State(state): State<AppState>, Json(body): Json<AppConfig>) -> Result<Json<Value>, ApiError> {
    state.config_loader.write(&body)?;
    Ok(Json(serde_json::json!({ "written": true, "restart_required": true })))
}

pub async fn test_detect_config(State(state): State<AppState>) -> Json<Value> {
    Json(serde_json::json!({
        "embedding_dimensions": state.embedder.dimensions(),
        "embedding_context_window": state.embedder.context_window(),
        "embedding_provider": state.embedder.provider_name(),
    }))
}

fn parse_observation_type(raw: &str) -> Option<oak_ci_domain::entities::ObservationType> {
    use oak_ci_domain::entities::ObservationType as T;
    match raw {
        "discovery" => Some(T::Discovery),
        "gotcha" => Some(T::Gotcha),
        "decision" => Some(T::Decision),
        "bug_fix" => Some(T::BugFix),
        "trade_off" => Some(T::TradeOff),
        "session_summary" => Some(T::SessionSummary),
        "plan" => Some(T::Plan),
        _ => None,
    }
}

fn parse_importance(raw: &str) -> Option<oak_ci_domain::entities::ObservationImportance> {
    use oak_ci_domain::entities::ObservationImportance as I;
    match raw {
        "low" => Some(I::Low),
        "medium" => Some(I::Medium),
        "high" => Some(I::High),
        _ => None,
    }
}

fn parse_date(raw: &str) -> Option<chrono::DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.with_timezone(&Utc))
}
