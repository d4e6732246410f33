use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use jobscout_core::AppError;
use jobscout_core::traits::{Capability, ToolClient};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::rpc::{self, JsonRpcRequest, ToolInfo};

const SESSION_HEADER: &str = "Mcp-Session-Id";
const ACCEPT_BOTH: &str = "application/json, text/event-stream";
const MAX_ERROR_BODY: usize = 200;

/// Tool client that opens a fresh protocol session for every call.
///
/// Each invocation runs `initialize`, the `initialized` notification, the
/// actual request, then a best-effort session teardown. Nothing is shared
/// between calls except the HTTP connection pool.
#[derive(Clone)]
pub struct McpToolClient {
    http: Client,
    /// Endpoint with the access token already in its query string. Never log it.
    endpoint: Url,
    timeout_secs: u64,
    next_id: Arc<AtomicU64>,
}

impl McpToolClient {
    pub fn new(config: &ClientConfig) -> Result<Self, AppError> {
        let token = config.require_token()?;
        let mut endpoint = Url::parse(&config.endpoint)
            .map_err(|e| AppError::ConfigError(format!("Invalid endpoint: {e}")))?;
        endpoint.query_pairs_mut().append_pair("token", token);

        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("jobscout/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            timeout_secs: config.request_timeout.as_secs(),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Names and descriptions of the tools the remote exposes.
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>, AppError> {
        let result = self.call("tools/list", json!({})).await?;
        rpc::tool_list(result)
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, AppError> {
        let session = self.open_session().await?;
        let result = self.request(session.as_deref(), method, params).await;
        self.close_session(session.as_deref()).await;
        result
    }

    async fn open_session(&self) -> Result<Option<String>, AppError> {
        let id = self.next_id();
        let response = self
            .post(None, &JsonRpcRequest::call(id, "initialize", rpc::initialize_params()))
            .await?;
        let session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let handshake = match read_response(response, id, self.timeout_secs).await {
            Ok(_) => self
                .post(
                    session.as_deref(),
                    &JsonRpcRequest::notification("notifications/initialized"),
                )
                .await
                .map(drop),
            Err(e) => Err(e),
        };
        // The server may already hold the session even though the handshake failed.
        if let Err(e) = handshake {
            self.close_session(session.as_deref()).await;
            return Err(e);
        }

        debug!(has_session_id = session.is_some(), "Session initialized");
        Ok(session)
    }

    async fn request(
        &self,
        session: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<Value, AppError> {
        let id = self.next_id();
        let response = self
            .post(session, &JsonRpcRequest::call(id, method, params))
            .await?;
        read_response(response, id, self.timeout_secs).await
    }

    async fn close_session(&self, session: Option<&str>) {
        let Some(session) = session else {
            return;
        };
        let result = self
            .http
            .delete(self.endpoint.clone())
            .header(SESSION_HEADER, session)
            .send()
            .await;
        if let Err(e) = result {
            debug!(error = %e.without_url(), "Session teardown failed");
        }
    }

    async fn post(
        &self,
        session: Option<&str>,
        body: &JsonRpcRequest<'_>,
    ) -> Result<Response, AppError> {
        let mut request = self
            .http
            .post(self.endpoint.clone())
            .header(ACCEPT, ACCEPT_BOTH)
            .json(body);
        if let Some(session) = session {
            request = request.header(SESSION_HEADER, session);
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout_secs))?;
        check_status(response).await
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl ToolClient for McpToolClient {
    async fn invoke(&self, capability: &Capability) -> Result<String, AppError> {
        debug!(tool = capability.tool_name(), "Invoking remote tool");
        let result = self
            .call(
                "tools/call",
                json!({
                    "name": capability.tool_name(),
                    "arguments": capability.arguments(),
                }),
            )
            .await?;
        rpc::tool_text(result)
    }
}

async fn read_response(response: Response, id: u64, timeout_secs: u64) -> Result<Value, AppError> {
    let content_type = content_type(response.headers());
    let body = response
        .text()
        .await
        .map_err(|e| map_transport_error(e, timeout_secs))?;
    rpc::parse_response(&body, content_type.as_deref(), id)?.into_result()
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn check_status(response: Response) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!("Remote service rate limit hit");
        return Err(AppError::RateLimitExceeded);
    }
    if status.is_server_error() {
        return Err(AppError::NetworkError(format!(
            "HTTP {}: remote service unavailable",
            status.as_u16()
        )));
    }

    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
    Err(AppError::HttpError(format!("HTTP {}: {}", status.as_u16(), snippet.trim())))
}

/// Classify a reqwest failure. The URL is stripped so the token never surfaces.
fn map_transport_error(e: reqwest::Error, timeout_secs: u64) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(timeout_secs)
    } else if e.is_connect() {
        AppError::NetworkError(format!("Connection failed: {}", e.without_url()))
    } else if e.is_request() || e.is_body() {
        AppError::NetworkError(e.without_url().to_string())
    } else {
        AppError::HttpError(e.without_url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn config(endpoint: &str) -> ClientConfig {
        ClientConfig::from_lookup(|key| match key {
            "BRIGHT_DATA_API_TOKEN" => Some("secret-token-1234".into()),
            "BRIGHT_DATA_MCP_URL" => Some(endpoint.into()),
            "JOBSCOUT_REQUEST_TIMEOUT_SECS" => Some("5".into()),
            _ => None,
        })
        .unwrap()
    }

    #[derive(Clone, Copy)]
    enum Behavior {
        Normal,
        ToolFails,
        RateLimited,
        NotificationRejected,
    }

    /// Minimal scripted endpoint: one request per connection, then close.
    /// Records `"<METHOD> <rpc method>"` for every request it sees.
    async fn spawn_server(behavior: Behavior) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    handle(stream, behavior, log).await;
                });
            }
        });

        (format!("http://{addr}/mcp"), seen)
    }

    async fn read_request(stream: &mut TcpStream) -> Option<(String, String)> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..pos]).to_string();
                let len = head
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                while buf.len() < pos + 4 + len {
                    let n = stream.read(&mut chunk).await.ok()?;
                    if n == 0 {
                        return None;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let body = String::from_utf8_lossy(&buf[pos + 4..pos + 4 + len]).to_string();
                return Some((head, body));
            }
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    async fn handle(mut stream: TcpStream, behavior: Behavior, log: Arc<Mutex<Vec<String>>>) {
        let Some((head, body)) = read_request(&mut stream).await else {
            return;
        };
        let request_line = head.lines().next().unwrap_or_default().to_string();
        let has_session = head.to_lowercase().contains("mcp-session-id: sess-42");
        let has_token = request_line.contains("token=secret-token-1234");

        let (status, content_type, extra, payload) = if request_line.starts_with("DELETE") {
            log.lock().unwrap().push(format!("DELETE session={has_session}"));
            ("200 OK", "application/json", String::new(), String::new())
        } else {
            let msg: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            let method = msg["method"].as_str().unwrap_or_default().to_string();
            log.lock()
                .unwrap()
                .push(format!("POST {method} session={has_session} token={has_token}"));
            let id = msg["id"].clone();

            match (behavior, method.as_str()) {
                (Behavior::RateLimited, _) => (
                    "429 Too Many Requests",
                    "text/plain",
                    String::new(),
                    "slow down".to_string(),
                ),
                (_, "initialize") => (
                    "200 OK",
                    "application/json",
                    "Mcp-Session-Id: sess-42\r\n".to_string(),
                    json!({"jsonrpc": "2.0", "id": id, "result": {"protocolVersion": rpc::PROTOCOL_VERSION}})
                        .to_string(),
                ),
                (Behavior::NotificationRejected, "notifications/initialized") => (
                    "400 Bad Request",
                    "text/plain",
                    String::new(),
                    "unexpected notification".to_string(),
                ),
                (_, "notifications/initialized") => {
                    ("202 Accepted", "application/json", String::new(), String::new())
                }
                (Behavior::ToolFails, "tools/call") => (
                    "200 OK",
                    "application/json",
                    String::new(),
                    json!({"jsonrpc": "2.0", "id": id, "result": {
                        "content": [{"type": "text", "text": "target blocked"}],
                        "isError": true
                    }})
                    .to_string(),
                ),
                (_, "tools/call") => {
                    let event = json!({"jsonrpc": "2.0", "id": id, "result": {
                        "content": [{"type": "text", "text": format!("scraped {}", msg["params"]["arguments"]["url"].as_str().unwrap_or_default())}]
                    }});
                    (
                        "200 OK",
                        "text/event-stream",
                        String::new(),
                        format!("event: message\ndata: {event}\n\n"),
                    )
                }
                (_, "tools/list") => (
                    "200 OK",
                    "application/json",
                    String::new(),
                    json!({"jsonrpc": "2.0", "id": id, "result": {"tools": [
                        {"name": "scrape_as_markdown", "description": "Scrape a page"},
                        {"name": "search_engine"}
                    ]}})
                    .to_string(),
                ),
                _ => ("404 Not Found", "text/plain", String::new(), String::new()),
            }
        };

        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n{extra}\r\n{payload}",
            payload.len()
        );
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;
    }

    #[tokio::test]
    async fn test_invoke_runs_full_session() {
        let (endpoint, seen) = spawn_server(Behavior::Normal).await;
        let client = McpToolClient::new(&config(&endpoint)).unwrap();

        let text = client
            .invoke(&Capability::scrape("https://jobs.example.com/1"))
            .await
            .unwrap();

        assert_eq!(text, "scraped https://jobs.example.com/1");
        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                "POST initialize session=false token=true",
                "POST notifications/initialized session=true token=true",
                "POST tools/call session=true token=true",
                "DELETE session=true",
            ]
        );
    }

    #[tokio::test]
    async fn test_each_call_gets_its_own_session() {
        let (endpoint, seen) = spawn_server(Behavior::Normal).await;
        let client = McpToolClient::new(&config(&endpoint)).unwrap();

        client.invoke(&Capability::scrape("https://a.example")).await.unwrap();
        client.invoke(&Capability::scrape("https://b.example")).await.unwrap();

        let seen = seen.lock().unwrap().clone();
        let handshakes = seen.iter().filter(|s| s.starts_with("POST initialize")).count();
        let teardowns = seen.iter().filter(|s| s.starts_with("DELETE")).count();
        assert_eq!(handshakes, 2);
        assert_eq!(teardowns, 2);
    }

    #[tokio::test]
    async fn test_tool_failure_is_not_retryable() {
        let (endpoint, _) = spawn_server(Behavior::ToolFails).await;
        let client = McpToolClient::new(&config(&endpoint)).unwrap();

        let err = client
            .invoke(&Capability::scrape("https://jobs.example.com/1"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ToolError(ref m) if m == "target blocked"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_retryable_error() {
        let (endpoint, _) = spawn_server(Behavior::RateLimited).await;
        let client = McpToolClient::new(&config(&endpoint)).unwrap();

        let err = client
            .invoke(&Capability::scrape("https://jobs.example.com/1"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::RateLimitExceeded));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_failed_handshake_still_closes_session() {
        let (endpoint, seen) = spawn_server(Behavior::NotificationRejected).await;
        let client = McpToolClient::new(&config(&endpoint)).unwrap();

        let err = client
            .invoke(&Capability::scrape("https://jobs.example.com/1"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::HttpError(ref m) if m.contains("400")), "got {err:?}");
        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                "POST initialize session=false token=true",
                "POST notifications/initialized session=true token=true",
                "DELETE session=true",
            ]
        );
    }

    #[tokio::test]
    async fn test_list_tools() {
        let (endpoint, _) = spawn_server(Behavior::Normal).await;
        let client = McpToolClient::new(&config(&endpoint)).unwrap();

        let tools = client.list_tools().await.unwrap();

        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["scrape_as_markdown", "search_engine"]);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error_without_token() {
        let client = McpToolClient::new(&config("http://127.0.0.1:1/mcp")).unwrap();

        let err = tokio::time::timeout(
            Duration::from_secs(10),
            client.invoke(&Capability::scrape("https://jobs.example.com/1")),
        )
        .await
        .unwrap()
        .unwrap_err();

        assert!(matches!(err, AppError::NetworkError(_)), "got {err:?}");
        assert!(err.is_retryable());
        assert!(!err.to_string().contains("secret-token-1234"));
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let config = ClientConfig::from_lookup(|_| None).unwrap();
        assert!(matches!(
            McpToolClient::new(&config),
            Err(AppError::ConfigError(_))
        ));
    }
}
