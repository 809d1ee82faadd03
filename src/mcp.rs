//! MCP Protocol Handler
//!
//! Implements JSON-RPC 2.0 over stdio for Model Context Protocol, plus
//! an optional HTTP framing of the same request shape for streamable
//! clients. Reference: https://modelcontextprotocol.io/specification

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json as AxumJson, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::tools::ToolSurface;

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, Serialize)]
pub struct McpError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl McpResponse {
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<serde_json::Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(McpError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }

    /// Notification (no id, no response expected)
    pub fn notification() -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: None,
            id: None,
        }
    }
}

/// MCP Error Codes
pub mod error_codes {
    // JSON-RPC standard errors
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    // MCP custom errors (-32000 to -32099)
    pub const TOOL_EXECUTION_ERROR: i32 = -32001;
}

/// MCP Server
pub struct McpServer {
    tools: Arc<ToolSurface>,
    http_token: Option<String>,
}

impl McpServer {
    /// Create an MCP server over an already wired pipeline.
    pub fn new(config: &Config, pipeline: Arc<Pipeline>) -> Self {
        let tools = Arc::new(ToolSurface::new(config.tool_mode, pipeline));
        Self {
            tools,
            http_token: config.mcp_http_token.clone(),
        }
    }

    /// Run the MCP server (stdio mode)
    pub async fn run(&self) -> anyhow::Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        info!("MCP server ready, waiting for requests...");

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                info!("Client disconnected (EOF)");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            debug!("← {}", trimmed);

            let response = match serde_json::from_str::<McpRequest>(trimmed) {
                Ok(request) => {
                    // Notifications never get a reply
                    if request.id.is_none() && request.method.starts_with("notifications/") {
                        debug!("notification: {}", request.method);
                        continue;
                    }
                    self.handle_request(request).await
                }
                Err(e) => {
                    error!("Parse error: {}", e);
                    McpResponse::error(None, error_codes::PARSE_ERROR, format!("Parse error: {}", e))
                }
            };

            if response.id.is_none() && response.result.is_none() && response.error.is_none() {
                continue;
            }

            let response_json = serde_json::to_string(&response)?;
            debug!("→ {}", response_json);

            stdout.write_all(response_json.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }

        Ok(())
    }

    /// Handle a single MCP request
    pub async fn handle_request(&self, request: McpRequest) -> McpResponse {
        match request.method.as_str() {
            // Lifecycle
            "initialize" => self.handle_initialize(request.id),
            "initialized" => McpResponse::notification(),
            "shutdown" => {
                info!("Shutdown requested");
                McpResponse::success(request.id, serde_json::json!({}))
            }

            // Tools
            "tools/list" => self.handle_tools_list(request.id),
            "tools/call" => self.handle_tools_call(request.id, request.params).await,

            // Ping
            "ping" => McpResponse::success(request.id, serde_json::json!({})),

            // Unknown
            method => {
                warn!("Unknown method: {}", method);
                McpResponse::error(
                    request.id,
                    error_codes::METHOD_NOT_FOUND,
                    format!("Method not found: {}", method),
                )
            }
        }
    }

    fn handle_initialize(&self, id: Option<serde_json::Value>) -> McpResponse {
        McpResponse::success(
            id,
            serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": {
                        "listChanged": false
                    }
                },
                "serverInfo": {
                    "name": "telegram-bot-mcp",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Option<serde_json::Value>) -> McpResponse {
        let tools = self.tools.list_definitions();
        McpResponse::success(id, serde_json::json!({ "tools": tools }))
    }

    async fn handle_tools_call(
        &self,
        id: Option<serde_json::Value>,
        params: serde_json::Value,
    ) -> McpResponse {
        let name = match params.get("name").and_then(|v| v.as_str()) {
            Some(n) => n,
            None => {
                return McpResponse::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    "Missing 'name' parameter",
                )
            }
        };

        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or(serde_json::json!({}));

        match self.tools.call(name, arguments).await {
            Ok(result) => McpResponse::success(
                id,
                serde_json::json!({
                    "content": [{
                        "type": "text",
                        "text": result
                    }]
                }),
            ),
            Err(e) => McpResponse::error(
                id,
                error_codes::TOOL_EXECUTION_ERROR,
                format!("Tool '{}' failed: {}", name, e),
            ),
        }
    }

    /// Serve the same protocol over HTTP (`POST /mcp`), with an optional
    /// bearer token gate.
    pub async fn serve_http(self: Arc<Self>, port: u16) -> anyhow::Result<()> {
        let router = mcp_http_router(self);
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        info!("MCP HTTP framing listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;
        Ok(())
    }
}

fn authorized(server: &McpServer, headers: &HeaderMap) -> bool {
    match &server.http_token {
        None => true,
        Some(expected) => headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|v| v == expected)
            .unwrap_or(false),
    }
}

async fn mcp_http_handler(
    State(server): State<Arc<McpServer>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if !authorized(&server, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let response = match serde_json::from_str::<McpRequest>(&body) {
        Ok(request) => server.handle_request(request).await,
        Err(e) => McpResponse::error(None, error_codes::PARSE_ERROR, format!("Parse error: {}", e)),
    };

    AxumJson(response).into_response()
}

/// Build the HTTP framing router.
pub fn mcp_http_router(server: Arc<McpServer>) -> Router {
    Router::new()
        .route("/mcp", post(mcp_http_handler))
        .with_state(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiResponse, BotTransport, OutboundRequest, TransportError};
    use crate::config::ToolMode;
    use crate::pipeline::PipelineSettings;
    use async_trait::async_trait;
    use serde_json::json;

    struct OkTransport;

    #[async_trait]
    impl BotTransport for OkTransport {
        async fn execute(
            &self,
            _request: OutboundRequest,
        ) -> Result<ApiResponse, TransportError> {
            Ok(ApiResponse::success(json!({"id": 99, "is_bot": true})))
        }
    }

    fn test_server(mode: ToolMode, http_token: Option<&str>) -> McpServer {
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(OkTransport),
            PipelineSettings {
                request_timeout_ms: 30_000,
                max_retries: 0,
                rate_limit_per_minute: 60,
            },
        ));
        McpServer {
            tools: Arc::new(ToolSurface::new(mode, pipeline)),
            http_token: http_token.map(str::to_string),
        }
    }

    fn request(method: &str, params: serde_json::Value) -> McpRequest {
        McpRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: Some(json!(1)),
        }
    }

    #[tokio::test]
    async fn initialize_reports_capabilities() {
        let server = test_server(ToolMode::Flat, None);
        let response = server.handle_request(request("initialize", json!({}))).await;

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "telegram-bot-mcp");
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn tools_list_flat() {
        let server = test_server(ToolMode::Flat, None);
        let response = server.handle_request(request("tools/list", json!({}))).await;

        let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
        assert_eq!(tools, crate::methods::count());
    }

    #[tokio::test]
    async fn tools_call_wraps_envelope_as_text() {
        let server = test_server(ToolMode::Flat, None);
        let response = server
            .handle_request(request(
                "tools/call",
                json!({"name": "getMe", "arguments": {}}),
            ))
            .await;

        let result = response.result.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        let envelope: ApiResponse = serde_json::from_str(text).unwrap();
        assert!(envelope.ok);
        assert_eq!(envelope.result.unwrap()["id"], 99);
    }

    #[tokio::test]
    async fn tools_call_without_name_is_invalid_params() {
        let server = test_server(ToolMode::Flat, None);
        let response = server
            .handle_request(request("tools/call", json!({"arguments": {}})))
            .await;
        assert_eq!(response.error.unwrap().code, error_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn unknown_rpc_method() {
        let server = test_server(ToolMode::Flat, None);
        let response = server.handle_request(request("resources/list", json!({}))).await;
        assert_eq!(response.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn meta_mode_unknown_tool_is_execution_error() {
        let server = test_server(ToolMode::Meta, None);
        let response = server
            .handle_request(request(
                "tools/call",
                json!({"name": "bogus", "arguments": {}}),
            ))
            .await;
        assert_eq!(
            response.error.unwrap().code,
            error_codes::TOOL_EXECUTION_ERROR
        );
    }

    mod http {
        use super::*;
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        async fn post_mcp(
            router: Router,
            auth: Option<&str>,
            body: serde_json::Value,
        ) -> (StatusCode, serde_json::Value) {
            let mut request = Request::builder().method("POST").uri("/mcp");
            if let Some(auth) = auth {
                request = request.header("Authorization", auth);
            }
            let response = router
                .oneshot(request.body(Body::from(body.to_string())).unwrap())
                .await
                .unwrap();

            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
            (status, value)
        }

        #[tokio::test]
        async fn http_framing_round_trip() {
            let server = Arc::new(test_server(ToolMode::Flat, None));
            let router = mcp_http_router(server);

            let (status, body) = post_mcp(
                router,
                None,
                json!({"jsonrpc": "2.0", "method": "ping", "id": 7}),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["id"], 7);
            assert_eq!(body["result"], json!({}));
        }

        #[tokio::test]
        async fn http_bearer_gate() {
            let server = Arc::new(test_server(ToolMode::Flat, Some("tok123")));
            let router = mcp_http_router(server);

            let (status, _) = post_mcp(
                router.clone(),
                None,
                json!({"jsonrpc": "2.0", "method": "ping", "id": 1}),
            )
            .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);

            let (status, _) = post_mcp(
                router.clone(),
                Some("Bearer wrong"),
                json!({"jsonrpc": "2.0", "method": "ping", "id": 1}),
            )
            .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);

            let (status, body) = post_mcp(
                router,
                Some("Bearer tok123"),
                json!({"jsonrpc": "2.0", "method": "ping", "id": 1}),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["id"], 1);
        }

        #[tokio::test]
        async fn http_parse_error() {
            let server = Arc::new(test_server(ToolMode::Flat, None));
            let router = mcp_http_router(server);

            let response = router
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/mcp")
                        .body(Body::from("not json"))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(value["error"]["code"], error_codes::PARSE_ERROR);
        }
    }
}
