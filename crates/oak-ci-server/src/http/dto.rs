//! Request/response JSON shapes for the HTTP surface (spec.md §4.9, §6.1).

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_agent() -> String {
    "unknown".to_owned()
}

/// Shared envelope fields every hook payload carries (spec.md §6.1 "Request
/// body includes `agent, session_id|conversation_id, hook_event_name`").
#[derive(Debug, Deserialize)]
pub struct HookEnvelope {
    #[serde(default = "default_agent")]
    pub agent: String,
    pub session_id: Option<String>,
    pub conversation_id: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub hook_event_name: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
}

impl HookEnvelope {
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref().or(self.conversation_id.as_deref())
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionStartRequest {
    #[serde(flatten)]
    pub envelope: HookEnvelope,
}

#[derive(Debug, Deserialize)]
pub struct SessionEndRequest {
    #[serde(flatten)]
    pub envelope: HookEnvelope,
}

#[derive(Debug, Deserialize)]
pub struct PromptSubmitRequest {
    #[serde(flatten)]
    pub envelope: HookEnvelope,
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct PostToolUseRequest {
    #[serde(flatten)]
    pub envelope: HookEnvelope,
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: Value,
    #[serde(default)]
    pub tool_response: Option<Value>,
    #[serde(default)]
    pub tool_output_summary: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub tool_use_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubagentStartRequest {
    #[serde(flatten)]
    pub envelope: HookEnvelope,
    pub agent_type: String,
    pub agent_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SubagentStopRequest {
    #[serde(flatten)]
    pub envelope: HookEnvelope,
    pub agent_id: String,
    #[serde(default)]
    pub transcript_path: Option<String>,
}

/// What every hook handler returns on success (spec.md §4.9 "Injection
/// synthesis" step 4) or failure (spec.md §4.9 "Failure semantics", `{}`).
#[derive(Debug, Serialize, Default)]
pub struct HookResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_s: u64,
    pub indexing_status: String,
    pub schema_version: i64,
    pub embedding_dimensions: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub agent: Option<String>,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct MemoryFilterQuery {
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub archived: Option<bool>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct BulkMemoryRequest {
    pub observation: String,
    pub r#type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub importance: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default)]
    pub search_type: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub collection: String,
    pub score: f32,
    pub confidence: String,
    pub document: String,
    pub metadata: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct BackupImportRequest {
    pub sql: String,
}

#[derive(Debug, Serialize)]
pub struct BackupExportResponse {
    pub sql: String,
}
