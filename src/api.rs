//! Bot API wire types
//!
//! The reply envelope shared by every invocation, the error taxonomy the
//! pipeline attaches to failures, and the transport seam the HTTP client
//! plugs into.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Optional parameters attached to error replies by the platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResponseParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrate_to_chat_id: Option<i64>,
}

/// The canonical `{ok, result?, description?, error_code?, parameters?}`
/// envelope. Successful replies carry the platform's raw `result`
/// untouched; failures carry a description and usually an HTTP-like code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ResponseParameters>,
}

impl ApiResponse {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            description: None,
            error_code: None,
            parameters: None,
        }
    }

    pub fn failure(code: impl Into<Option<i64>>, description: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            description: Some(description.into()),
            error_code: code.into(),
            parameters: None,
        }
    }

    /// Refusal envelope with a `retry_after` hint, as produced by the
    /// rate-limiting stages.
    pub fn rate_limited(description: impl Into<String>, retry_after_secs: u64) -> Self {
        Self {
            ok: false,
            result: None,
            description: Some(description.into()),
            error_code: Some(429),
            parameters: Some(ResponseParameters {
                retry_after: Some(retry_after_secs),
                migrate_to_chat_id: None,
            }),
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        self.parameters.as_ref().and_then(|p| p.retry_after)
    }
}

/// Mutually exclusive failure categories. Every non-success outcome maps
/// to exactly one; the label feeds `errors_total{category}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    Client,
    Server,
    Network,
    RateLimited,
    Timeout,
    CircuitOpen,
}

impl ErrorCategory {
    /// First-match classification of a failed envelope.
    pub fn classify(response: &ApiResponse) -> Self {
        let description = response.description.as_deref().unwrap_or("");
        let lower = description.to_lowercase();

        if lower.contains("validation") {
            Self::Validation
        } else if lower.contains("timeout") {
            Self::Timeout
        } else if lower.contains("circuit breaker") {
            Self::CircuitOpen
        } else {
            match response.error_code {
                None => Self::Network,
                Some(429) => Self::RateLimited,
                Some(code) if code >= 500 => Self::Server,
                Some(code) if code >= 400 => Self::Client,
                Some(_) => Self::Network,
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::Client => "CLIENT",
            Self::Server => "SERVER",
            Self::Network => "NETWORK",
            Self::RateLimited => "RATE_LIMITED",
            Self::Timeout => "TIMEOUT",
            Self::CircuitOpen => "CIRCUIT_OPEN",
        }
    }
}

/// Transport-level failure: the request never produced a decodable
/// envelope. Carries no error code, so it classifies as NETWORK unless
/// the message names a timeout.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timeout after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid reply: {0}")]
    Decode(String),
}

impl TransportError {
    /// Synthesise the code-less envelope the retry engine and breaker see.
    pub fn into_response(self) -> ApiResponse {
        ApiResponse::failure(None, self.to_string())
    }
}

/// Body encoding chosen by the upload stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Json,
    Multipart,
}

/// One outbound request, fully encoded.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub timeout: Duration,
}

/// The seam between the pipeline and the wire. Production uses
/// [`HttpTransport`]; tests script replies.
#[async_trait]
pub trait BotTransport: Send + Sync {
    async fn execute(&self, request: OutboundRequest) -> Result<ApiResponse, TransportError>;
}

/// Reqwest-backed transport. POSTs to `{base}/bot{token}/{method}`.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.base_url.trim_end_matches('/'),
            self.token,
            method
        )
    }
}

#[async_trait]
impl BotTransport for HttpTransport {
    async fn execute(&self, request: OutboundRequest) -> Result<ApiResponse, TransportError> {
        let url = self.endpoint(&request.method);
        let timeout = request.timeout;

        let result = self
            .client
            .post(&url)
            .header("Content-Type", request.content_type)
            .body(request.body)
            .timeout(timeout)
            .send()
            .await;

        let response = match result {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Err(TransportError::Timeout(timeout)),
            Err(e) => return Err(TransportError::Network(e.without_url().to_string())),
        };

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.without_url().to_string()))?;

        serde_json::from_slice::<ApiResponse>(&bytes)
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_roundtrip() {
        let raw = r#"{"ok":false,"description":"Too Many Requests: retry after 5","error_code":429,"parameters":{"retry_after":5}}"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.error_code, Some(429));
        assert_eq!(parsed.retry_after(), Some(5));
    }

    #[test]
    fn success_omits_error_fields() {
        let env = ApiResponse::success(json!({"id": 7}));
        let serialized = serde_json::to_string(&env).unwrap();
        assert!(!serialized.contains("error_code"));
        assert!(!serialized.contains("description"));
    }

    #[test]
    fn classify_by_code() {
        assert_eq!(
            ErrorCategory::classify(&ApiResponse::failure(400, "Bad Request")),
            ErrorCategory::Client
        );
        assert_eq!(
            ErrorCategory::classify(&ApiResponse::failure(502, "Bad Gateway")),
            ErrorCategory::Server
        );
        assert_eq!(
            ErrorCategory::classify(&ApiResponse::failure(429, "Too Many Requests")),
            ErrorCategory::RateLimited
        );
        assert_eq!(
            ErrorCategory::classify(&ApiResponse::failure(None, "connection reset")),
            ErrorCategory::Network
        );
    }

    #[test]
    fn classify_by_description_first() {
        // Description wins over the code when it names a timeout or the breaker.
        assert_eq!(
            ErrorCategory::classify(&ApiResponse::failure(None, "request timeout after 30s")),
            ErrorCategory::Timeout
        );
        assert_eq!(
            ErrorCategory::classify(&ApiResponse::failure(503, "circuit breaker open")),
            ErrorCategory::CircuitOpen
        );
        assert_eq!(
            ErrorCategory::classify(&ApiResponse::failure(None, "Validation failed: text missing")),
            ErrorCategory::Validation
        );
    }

    #[test]
    fn transport_error_has_no_code() {
        let env = TransportError::Network("dns failure".to_string()).into_response();
        assert!(!env.ok);
        assert_eq!(env.error_code, None);
        assert_eq!(ErrorCategory::classify(&env), ErrorCategory::Network);
    }
}
