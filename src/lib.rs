//! Telegram Bot MCP Gateway
//!
//! Resilient Model Context Protocol gateway exposing the Telegram Bot
//! API method surface to model-driven clients.
//!
//! # Features
//!
//! - **MCP Protocol**: JSON-RPC 2.0 over stdio, optional HTTP framing
//! - **Tool surfaces**: one tool per method, or find/call meta tools
//! - **Request pipeline**: validation, response caching, global and
//!   per-chat rate limiting, circuit breaking, retry with backoff
//! - **Uploads**: local-file detection and multipart assembly
//! - **Webhook receiver**: bounded in-memory update queue
//! - **Observability**: Prometheus metrics, health/readiness endpoints
//!
//! # Architecture
//!
//! ```text
//! MCP client ──► Tool surface ──► Pipeline ──► Telegram Bot API
//!   (stdio/http)      │
//!                     ├── Validator (descriptor table)
//!                     ├── Cache (per-method TTL)
//!                     ├── Limiters (global + per-chat)
//!                     ├── Breaker (three-state)
//!                     ├── Uploads (multipart)
//!                     └── Retry (backoff + retry_after)
//! ```

pub mod api;
pub mod breaker;
pub mod cache;
pub mod config;
pub mod health;
pub mod mcp;
pub mod methods;
pub mod metrics;
pub mod pipeline;
pub mod rate_limit;
pub mod redact;
pub mod retry;
pub mod tools;
pub mod upload;
pub mod validator;
pub mod webhook;

pub use api::{
    ApiResponse, BotTransport, Encoding, ErrorCategory, HttpTransport, OutboundRequest,
    ResponseParameters, TransportError,
};
pub use breaker::{CircuitBreaker, Phase};
pub use cache::{CacheStats, ResponseCache};
pub use config::{Config, ToolMode};
pub use health::{HealthAggregator, HealthStatus, Overall};
pub use mcp::{McpRequest, McpResponse, McpServer};
pub use metrics::GatewayMetrics;
pub use pipeline::{InvokeOptions, Pipeline, PipelineSettings};
pub use rate_limit::{Admission, GlobalRateLimiter, PerChatRateLimiter};
pub use tools::{ToolDefinition, ToolSurface};
pub use webhook::UpdateQueue;
