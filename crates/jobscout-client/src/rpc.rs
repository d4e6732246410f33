//! JSON-RPC 2.0 envelopes and tool-call payloads.
//!
//! Responses arrive either as a plain JSON body or as a server-sent event
//! stream carrying one JSON message per event.

use jobscout_core::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2025-03-26";

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    /// Absent for notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn call(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: Some(id),
            method,
            params: Some(params),
        }
    }

    pub fn notification(method: &'a str) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: None,
            method,
            params: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcResponse {
    fn answers(&self, id: u64) -> bool {
        match &self.id {
            Some(Value::Number(n)) => n.as_u64() == Some(id),
            Some(Value::String(s)) => s.parse::<u64>().ok() == Some(id),
            _ => false,
        }
    }

    /// The `result` member, or the remote error it carries instead.
    pub fn into_result(self) -> Result<Value, AppError> {
        if let Some(err) = self.error {
            return Err(AppError::ToolError(format!(
                "{} (code {})",
                err.message, err.code
            )));
        }
        self.result
            .ok_or_else(|| AppError::ProtocolError("response has neither result nor error".into()))
    }
}

/// Parameters of the `initialize` handshake.
pub fn initialize_params() -> Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": "jobscout",
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

/// Find the response to request `id` in a response body.
pub fn parse_response(
    body: &str,
    content_type: Option<&str>,
    id: u64,
) -> Result<JsonRpcResponse, AppError> {
    let is_stream = content_type.is_some_and(|ct| ct.contains("text/event-stream"))
        || body.trim_start().starts_with("data:")
        || body.trim_start().starts_with("event:");

    if !is_stream {
        return serde_json::from_str(body)
            .map_err(|e| AppError::ProtocolError(format!("invalid JSON-RPC response: {e}")));
    }

    sse_messages(body)
        .iter()
        .filter_map(|data| serde_json::from_str::<JsonRpcResponse>(data).ok())
        .find(|msg| msg.answers(id))
        .ok_or_else(|| AppError::ProtocolError(format!("event stream carried no response to request {id}")))
}

/// Join the `data:` lines of each event.
fn sse_messages(body: &str) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in body.lines() {
        if line.is_empty() {
            if !current.is_empty() {
                messages.push(current.join("\n"));
                current.clear();
            }
            continue;
        }
        if let Some(data) = line.strip_prefix("data:") {
            current.push(data.strip_prefix(' ').unwrap_or(data));
        }
    }
    if !current.is_empty() {
        messages.push(current.join("\n"));
    }
    messages
}

#[derive(Debug, Deserialize)]
struct ToolCallResult {
    #[serde(default)]
    content: Vec<ContentItem>,
    #[serde(default, rename = "isError")]
    is_error: bool,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Text payload of a `tools/call` result: the first text item, or empty.
pub fn tool_text(result: Value) -> Result<String, AppError> {
    let result: ToolCallResult = serde_json::from_value(result)
        .map_err(|e| AppError::ProtocolError(format!("malformed tool result: {e}")))?;

    let text = result
        .content
        .into_iter()
        .find(|item| item.kind == "text")
        .and_then(|item| item.text)
        .unwrap_or_default();

    if result.is_error {
        let message = if text.is_empty() {
            "remote tool reported an error".to_string()
        } else {
            text
        };
        return Err(AppError::ToolError(message));
    }
    Ok(text)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ToolsList {
    #[serde(default)]
    tools: Vec<ToolInfo>,
}

pub fn tool_list(result: Value) -> Result<Vec<ToolInfo>, AppError> {
    serde_json::from_value::<ToolsList>(result)
        .map(|list| list.tools)
        .map_err(|e| AppError::ProtocolError(format!("malformed tool list: {e}")))
}
