//! MCP tool surface (spec.md §4.11): `oak_search`, `oak_fetch`,
//! `oak_remember`, `oak_plans`, `oak_memories`. Servable over local
//! stdio/JSON-RPC and mounted under the HTTP daemon; the relay (§4.12)
//! forwards `tools/call` for the subset it registers.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::handler::server::tool::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ListToolsResult, PaginatedRequestParam,
    ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::model::ErrorData as McpError;
use rmcp::RoleServer;
use rmcp::{tool, ServerHandler};
use schemars::JsonSchema;
use serde::Deserialize;

use chrono::Utc;
use oak_ci_application::{metadata, RetrievalService, SearchType};
use oak_ci_domain::entities::{Observation, ObservationImportance, ObservationType};
use oak_ci_domain::ports::{ActivityStore, ObservationFilter, SearchFilter};
use oak_ci_domain::value_objects::{ObservationId, SessionId};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchArgs {
    /// Natural-language query text.
    pub query: String,
    /// One of `code`, `memory`, `plan`, `all` (default `all`).
    pub search_type: Option<String>,
    /// Maximum hits to return (default 10).
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FetchArgs {
    /// Path relative to the project root.
    pub path: String,
    /// First line to include, 1-based inclusive.
    pub start: Option<usize>,
    /// Last line to include, 1-based inclusive.
    pub end: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RememberArgs {
    /// The observation text.
    pub observation: String,
    /// One of `discovery`, `gotcha`, `decision`, `bug_fix`, `trade_off`,
    /// `session_summary`, `plan`.
    pub r#type: String,
    /// Free-form tags.
    pub tags: Option<Vec<String>>,
    /// Supporting context.
    pub context: Option<String>,
    /// One of `low`, `medium`, `high` (default `medium`).
    pub importance: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PlansArgs {
    /// Restrict to one session's plan batches.
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MemoriesArgs {
    /// Restrict to one observation type.
    pub r#type: Option<String>,
    /// Restrict to observations carrying this tag.
    pub tag: Option<String>,
    /// Include archived observations (default excluded).
    pub archived: Option<bool>,
    /// Maximum rows to return (default 50).
    pub limit: Option<usize>,
}

/// Local tool surface over the daemon's retrieval and relational stores.
#[derive(Clone)]
pub struct McpServer {
    retrieval: Arc<RetrievalService>,
    activity_store: Arc<dyn ActivityStore>,
}

impl McpServer {
    #[must_use]
    pub fn new(retrieval: Arc<RetrievalService>, activity_store: Arc<dyn ActivityStore>) -> Self {
        Self { retrieval, activity_store }
    }

    /// Tool names this server registers with a relay (spec.md §4.12
    /// "registers tools `[oak_search, oak_fetch]`").
    #[must_use]
    pub fn relay_tool_names() -> &'static [&'static str] {
        &["oak_search", "oak_fetch"]
    }
}

fn parse_observation_type(raw: &str) -> Option<ObservationType> {
    match raw {
        "discovery" => Some(ObservationType::Discovery),
        "gotcha" => Some(ObservationType::Gotcha),
        "decision" => Some(ObservationType::Decision),
        "bug_fix" => Some(ObservationType::BugFix),
        "trade_off" => Some(ObservationType::TradeOff),
        "session_summary" => Some(ObservationType::SessionSummary),
        "plan" => Some(ObservationType::Plan),
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

fn tool_error(message: impl Into<String>) -> McpError {
    McpError::invalid_params(message.into(), None)
}

fn internal_error(message: impl std::fmt::Display) -> McpError {
    McpError::internal_error(message.to_string(), None)
}

impl McpServer {
    #[tool(description = "Search indexed code, stored memories, and plans by natural-language query. Returns ranked snippets.")]
    pub async fn oak_search(&self, parameters: Parameters<SearchArgs>) -> Result<CallToolResult, McpError> {
        let args = parameters.0;
        let search_type = match args.search_type.as_deref() {
            Some("code") => SearchType::Code,
            Some("memory") => SearchType::Memory,
            Some("plan") => SearchType::Plan,
            Some(other) => return Err(tool_error(format!("unknown search_type '{other}'"))),
            None => SearchType::All,
        };
        let hits = self
            .retrieval
            .search(&args.query, search_type, args.limit.unwrap_or(10), None)
            .await
            .map_err(internal_error)?;

        if hits.is_empty() {
            return Ok(CallToolResult::success(vec![Content::text("No results.")]));
        }
        let mut rendered = String::new();
        for hit in hits {
            let path = metadata::get_str(&hit.metadata, metadata::FILEPATH).unwrap_or("-");
            rendered.push_str(&format!(
                "## {} ({:?}, score {:.3}, {:?} confidence)\n{}\n\n",
                path, hit.collection, hit.score, hit.tier, hit.document
            ));
        }
        Ok(CallToolResult::success(vec![Content::text(rendered)]))
    }

    #[tool(description = "Fetch the full content of an already-indexed code chunk by path and optional line range. No similarity search.")]
    pub async fn oak_fetch(&self, parameters: Parameters<FetchArgs>) -> Result<CallToolResult, McpError> {
        let args = parameters.0;
        let filter = SearchFilter::eq(metadata::FILEPATH, args.path.clone());
        let hits = self
            .retrieval
            .search(&args.path, SearchType::Code, 20, Some(&filter))
            .await
            .map_err(internal_error)?;

        let mut matches: Vec<_> = hits
            .into_iter()
            .filter(|hit| {
                let chunk_start = metadata::get_usize(&hit.metadata, metadata::START_LINE).unwrap_or(0);
                let chunk_end = metadata::get_usize(&hit.metadata, metadata::END_LINE).unwrap_or(usize::MAX);
                match (args.start, args.end) {
                    (Some(start), Some(end)) => chunk_start <= end && chunk_end >= start,
                    (Some(start), None) => chunk_end >= start,
                    (None, Some(end)) => chunk_start <= end,
                    (None, None) => true,
                }
            })
            .collect();
        matches.sort_by_key(|hit| metadata::get_usize(&hit.metadata, metadata::START_LINE).unwrap_or(0));

        if matches.is_empty() {
            return Ok(CallToolResult::success(vec![Content::text(format!("No indexed chunk found for '{}'.", args.path))]));
        }
        let rendered = matches.into_iter().map(|hit| hit.document).collect::<Vec<_>>().join("\n");
        Ok(CallToolResult::success(vec![Content::text(rendered)]))
    }

    #[tool(description = "Store a manually-authored memory (an Observation) for later retrieval.")]
    pub async fn oak_remember(&self, parameters: Parameters<RememberArgs>) -> Result<CallToolResult, McpError> {
        let args = parameters.0;
        let r#type = parse_observation_type(&args.r#type).ok_or_else(|| tool_error(format!("unknown type '{}'", args.r#type)))?;
        let importance = args.importance.as_deref().and_then(parse_importance).unwrap_or(ObservationImportance::Medium);
        let mut tags = args.tags.unwrap_or_default();
        if !tags.iter().any(|t| t == "source:manual") {
            tags.push("source:manual".to_owned());
        }
        let observation = Observation {
            id: ObservationId::new(),
            session_id: SessionId::new("mcp-manual"),
            prompt_batch_id: None,
            r#type,
            observation: args.observation,
            context: args.context,
            tags,
            importance,
            file_path: None,
            created_at: Utc::now(),
            embedded: false,
            archived: false,
        };
        let stored = self.activity_store.add_observation(observation).await.map_err(internal_error)?;
        Ok(CallToolResult::success(vec![Content::text(format!("Stored observation {}.", stored.id))]))
    }

    #[tool(description = "List plan batches, optionally scoped to one session.")]
    pub async fn oak_plans(&self, parameters: Parameters<PlansArgs>) -> Result<CallToolResult, McpError> {
        let args = parameters.0;
        let session_id = args.session_id.map(SessionId::new);
        let plans = self
            .activity_store
            .list_plan_batches(session_id.as_ref(), 50, 0)
            .await
            .map_err(internal_error)?;
        if plans.is_empty() {
            return Ok(CallToolResult::success(vec![Content::text("No plans recorded.")]));
        }
        let rendered = plans
            .into_iter()
            .map(|batch| format!("- {} (session {}): {}", batch.id, batch.session_id, batch.user_prompt))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(CallToolResult::success(vec![Content::text(rendered)]))
    }

    #[tool(description = "List stored memories (Observations) with optional type/tag/archived filters.")]
    pub async fn oak_memories(&self, parameters: Parameters<MemoriesArgs>) -> Result<CallToolResult, McpError> {
        let args = parameters.0;
        let filter = ObservationFilter {
            r#type: args.r#type.as_deref().and_then(parse_observation_type),
            tag: args.tag,
            start_date: None,
            end_date: None,
            include_archived: args.archived.unwrap_or(false),
            limit: args.limit.unwrap_or(50) as i64,
            offset: 0,
        };
        let memories = self.activity_store.list_observations(&filter).await.map_err(internal_error)?;
        if memories.is_empty() {
            return Ok(CallToolResult::success(vec![Content::text("No memories found.")]));
        }
        let rendered = memories
            .into_iter()
            .map(|m| format!("- [{:?}/{:?}] {}", m.r#type, m.importance, m.observation))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(CallToolResult::success(vec![Content::text(rendered)]))
    }
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "oak-ci".to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                ..Default::default()
            },
            instructions: Some(
                "Codebase intelligence tools for this project: oak_search (ranked snippets), \
                 oak_fetch (exact indexed chunk by path/range), oak_remember (store a memory), \
                 oak_plans and oak_memories (browse what's been recorded)."
                    .to_owned(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _pagination: PaginatedRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let schema = |value: serde_json::Value| -> Arc<serde_json::Map<String, serde_json::Value>> {
            Arc::new(value.as_object().cloned().unwrap_or_default())
        };
        let tool = |name: &'static str, description: &'static str, input_schema| Tool {
            name: Cow::Borrowed(name),
            description: Cow::Borrowed(description),
            input_schema,
        };
        let tools = vec![
            tool(
                "oak_search",
                "Search indexed code, memories, and plans by natural-language query.",
                schema(serde_json::to_value(schemars::schema_for!(SearchArgs)).map_err(internal_error)?),
            ),
            tool(
                "oak_fetch",
                "Fetch full chunk content for a path and optional line range.",
                schema(serde_json::to_value(schemars::schema_for!(FetchArgs)).map_err(internal_error)?),
            ),
            tool(
                "oak_remember",
                "Store a manually-authored memory.",
                schema(serde_json::to_value(schemars::schema_for!(RememberArgs)).map_err(internal_error)?),
            ),
            tool(
                "oak_plans",
                "List plan batches.",
                schema(serde_json::to_value(schemars::schema_for!(PlansArgs)).map_err(internal_error)?),
            ),
            tool(
                "oak_memories",
                "List stored memories.",
                schema(serde_json::to_value(schemars::schema_for!(MemoriesArgs)).map_err(internal_error)?),
            ),
        ];
        Ok(ListToolsResult { tools, next_cursor: None })
    }

    async fn call_tool(
        &self,
        request: rmcp::model::CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let args = serde_json::Value::Object(request.arguments.unwrap_or_default());
        match request.name.as_ref() {
            "oak_search" => self.oak_search(Parameters(serde_json::from_value(args).map_err(|e| tool_error(e.to_string()))?)).await,
            "oak_fetch" => self.oak_fetch(Parameters(serde_json::from_value(args).map_err(|e| tool_error(e.to_string()))?)).await,
            "oak_remember" => self.oak_remember(Parameters(serde_json::from_value(args).map_err(|e| tool_error(e.to_string()))?)).await,
            "oak_plans" => self.oak_plans(Parameters(serde_json::from_value(args).map_err(|e| tool_error(e.to_string()))?)).await,
            "oak_memories" => self.oak_memories(Parameters(serde_json::from_value(args).map_err(|e| tool_error(e.to_string()))?)).await,
            other => {
                let _ = context;
                Err(tool_error(format!("unknown tool '{other}'")))
            }
        }
    }
}
