//! Outbound cloud relay client (spec.md §4.12, §6.2): lets a remote agent
//! invoke `oak_search`/`oak_fetch` without the daemon opening inbound ports.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::Rng;
use rmcp::handler::server::tool::Parameters;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;

use crate::mcp::{FetchArgs, McpServer, SearchArgs};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const HEARTBEAT_ACK_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_TOOL_TIMEOUT_MS: u64 = 30_000;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Wire frame for the relay protocol (spec.md §6.2, `type` discriminator).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RelayFrame {
    Register { tools: Vec<String>, relay_token: String },
    Registered,
    ToolCall { call_id: String, tool_name: String, arguments: Value, timeout_ms: Option<u64> },
    ToolResult { call_id: String, result: Option<Value>, error: Option<String> },
    Heartbeat,
    HeartbeatAck,
    Error { message: String },
}

/// Outbound websocket client. One instance per daemon process; `run` loops
/// forever, reconnecting with jittered exponential backoff on disconnect.
pub struct CloudRelay {
    url: String,
    token: String,
    tools: Arc<McpServer>,
}

impl CloudRelay {
    #[must_use]
    pub fn new(url: impl Into<String>, token: impl Into<String>, tools: Arc<McpServer>) -> Self {
        Self { url: url.into(), token: token.into(), tools }
    }

    /// Runs until `shutdown` is signalled. Never returns an error: every
    /// connection failure is logged and retried (spec.md §7 "the
    /// cloud-relay daemon client never crashes the daemon").
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = INITIAL_BACKOFF;
        while !*shutdown.borrow() {
            match self.connect_and_serve(&mut shutdown).await {
                Ok(()) => backoff = INITIAL_BACKOFF,
                Err(e) => oak_ci_domain::warn!("relay", "connection lost, reconnecting", e),
            }
            if *shutdown.borrow() {
                return;
            }
            let wait = jittered(backoff);
            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => return,
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    async fn connect_and_serve(&self, shutdown: &mut watch::Receiver<bool>) -> Result<(), BoxError> {
        let endpoint = format!("{}/ws", self.url.trim_end_matches('/'));
        let (stream, _response) = tokio_tungstenite::connect_async(&endpoint).await?;
        let (mut write, mut read) = stream.split();

        let register = RelayFrame::Register {
            tools: McpServer::relay_tool_names().iter().map(|s| (*s).to_owned()).collect(),
            relay_token: self.token.clone(),
        };
        write.send(Message::Text(serde_json::to_string(&register)?)).await?;

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut awaiting_ack = false;
        let ack_timeout = tokio::time::sleep(HEARTBEAT_ACK_TIMEOUT);
        tokio::pin!(ack_timeout);

        loop {
            tokio::select! {
                () = &mut ack_timeout, if awaiting_ack => {
                    return Err("heartbeat ack timed out".into());
                }
                _ = heartbeat.tick() => {
                    write.send(Message::Text(serde_json::to_string(&RelayFrame::Heartbeat)?)).await?;
                    awaiting_ack = true;
                    ack_timeout.as_mut().reset(tokio::time::Instant::now() + HEARTBEAT_ACK_TIMEOUT);
                }
                frame = read.next() => {
                    let Some(frame) = frame else { return Err("relay closed the connection".into()) };
                    let message = frame?;
                    let Message::Text(text) = message else { continue };
                    let Ok(parsed) = serde_json::from_str::<RelayFrame>(&text) else { continue };
                    match parsed {
                        RelayFrame::Registered => {}
                        RelayFrame::HeartbeatAck => awaiting_ack = false,
                        RelayFrame::ToolCall { call_id, tool_name, arguments, timeout_ms } => {
                            let result = self.dispatch(&tool_name, arguments, timeout_ms).await;
                            let reply = match result {
                                Ok(value) => RelayFrame::ToolResult { call_id, result: Some(value), error: None },
                                Err(message) => RelayFrame::ToolResult { call_id, result: None, error: Some(message) },
                            };
                            write.send(Message::Text(serde_json::to_string(&reply)?)).await?;
                        }
                        // Unknown frame types are dropped silently (spec.md §6.2).
                        RelayFrame::Register { .. }
                        | RelayFrame::ToolResult { .. }
                        | RelayFrame::Error { .. }
                        | RelayFrame::Heartbeat => {}
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        let _ = write.close().await;
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn dispatch(&self, tool_name: &str, arguments: Value, timeout_ms: Option<u64>) -> Result<Value, String> {
        let deadline = Duration::from_millis(timeout_ms.unwrap_or(DEFAULT_TOOL_TIMEOUT_MS));
        let call = async {
            match tool_name {
                "oak_search" => {
                    let args: SearchArgs = serde_json::from_value(arguments).map_err(|e| e.to_string())?;
                    let result = self.tools.oak_search(Parameters(args)).await.map_err(|e| e.message.to_string())?;
                    serde_json::to_value(result).map_err(|e| e.to_string())
                }
                "oak_fetch" => {
                    let args: FetchArgs = serde_json::from_value(arguments).map_err(|e| e.to_string())?;
                    let result = self.tools.oak_fetch(Parameters(args)).await.map_err(|e| e.message.to_string())?;
                    serde_json::to_value(result).map_err(|e| e.to_string())
                }
                other => Err(format!("tool '{other}' is not registered with the relay")),
            }
        };
        match tokio::time::timeout(deadline, call).await {
            Ok(result) => result,
            Err(_) => Err("tool call timed out".to_owned()),
        }
    }
}

fn jittered(base: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let factor: f64 = rng.gen_range(0.5..1.5);
    Duration::from_secs_f64(base.as_secs_f64() * factor)
}
