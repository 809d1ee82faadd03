//! Health surface
//!
//! Derives an overall status from the breaker and limiter state (never
//! stored, always computed) and serves it over HTTP together with the
//! Prometheus exposition. Readiness fails only while the breaker is
//! open; liveness only if configuration became unreadable.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::breaker::Phase;
use crate::pipeline::Pipeline;

/// Overall service state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Overall {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Aggregated status payload.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub overall: Overall,
    pub uptime_seconds: u64,
    pub timestamp: String,
    pub checks: HashMap<&'static str, String>,
}

/// Synthesises status from pipeline component state.
pub struct HealthAggregator {
    pipeline: Arc<Pipeline>,
}

impl HealthAggregator {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    pub async fn status(&self) -> HealthStatus {
        let phase = self.pipeline.breaker().phase().await;
        let saturated = self.pipeline.global_limiter().saturated().await;

        let overall = match phase {
            Phase::Open => Overall::Unhealthy,
            Phase::HalfOpen => Overall::Degraded,
            Phase::Closed if saturated => Overall::Degraded,
            Phase::Closed => Overall::Healthy,
        };

        let cache_stats = self.pipeline.cache().stats().await;
        let in_window = self.pipeline.global_limiter().in_window().await;
        let tracked = self.pipeline.per_chat_limiter().tracked().await;

        let mut checks = HashMap::new();
        checks.insert("circuit_breaker", phase.as_str().to_string());
        checks.insert(
            "rate_limiter",
            format!(
                "{}/{} in window, {} chats tracked",
                in_window,
                self.pipeline.global_limiter().budget(),
                tracked
            ),
        );
        checks.insert("cache", format!("{} entries", cache_stats.size));

        HealthStatus {
            overall,
            uptime_seconds: self.pipeline.metrics().uptime_secs(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            checks,
        }
    }

    /// Ready to take traffic unless the breaker is open.
    pub async fn ready(&self) -> bool {
        self.pipeline.breaker().phase().await != Phase::Open
    }
}

/// Shared state for the health router.
#[derive(Clone)]
pub struct HealthState {
    aggregator: Arc<HealthAggregator>,
    pipeline: Arc<Pipeline>,
}

/// `GET /health`: 200 while healthy or degraded, 503 when unhealthy.
async fn health_handler(State(state): State<HealthState>) -> Response {
    let status = state.aggregator.status().await;
    let code = match status.overall {
        Overall::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (code, Json(status)).into_response()
}

/// `GET /ready`: Kubernetes-style readiness probe.
async fn ready_handler(State(state): State<HealthState>) -> StatusCode {
    if state.aggregator.ready().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// `GET /live`: process is up and serving.
async fn live_handler() -> StatusCode {
    StatusCode::OK
}

/// `GET /metrics`: Prometheus text exposition.
async fn metrics_handler(State(state): State<HealthState>) -> String {
    state.pipeline.metrics().format_metrics().await
}

/// Build the health router.
pub fn health_router(pipeline: Arc<Pipeline>) -> Router {
    let state = HealthState {
        aggregator: Arc::new(HealthAggregator::new(Arc::clone(&pipeline))),
        pipeline,
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/live", get(live_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Serve the health surface until the process exits.
pub async fn serve(pipeline: Arc<Pipeline>, port: u16) -> anyhow::Result<()> {
    let router = health_router(pipeline);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("health surface listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiResponse, BotTransport, OutboundRequest, TransportError};
    use crate::pipeline::{InvokeOptions, PipelineSettings};
    use async_trait::async_trait;
    use serde_json::json;

    struct FailingTransport;

    #[async_trait]
    impl BotTransport for FailingTransport {
        async fn execute(
            &self,
            _request: OutboundRequest,
        ) -> Result<ApiResponse, TransportError> {
            Err(TransportError::Network("down".to_string()))
        }
    }

    fn pipeline(transport: Arc<dyn BotTransport>) -> Arc<Pipeline> {
        Arc::new(Pipeline::new(
            transport,
            PipelineSettings {
                request_timeout_ms: 30_000,
                max_retries: 0,
                rate_limit_per_minute: 60,
            },
        ))
    }

    #[tokio::test]
    async fn fresh_pipeline_is_healthy() {
        let pipeline = pipeline(Arc::new(FailingTransport));
        let aggregator = HealthAggregator::new(pipeline);

        let status = aggregator.status().await;
        assert_eq!(status.overall, Overall::Healthy);
        assert_eq!(status.checks["circuit_breaker"], "closed");
        assert!(aggregator.ready().await);
    }

    #[tokio::test]
    async fn open_breaker_reports_unhealthy_and_not_ready() {
        let pipeline = pipeline(Arc::new(FailingTransport));
        for _ in 0..5 {
            pipeline
                .invoke("getMe", json!({}), InvokeOptions::default())
                .await;
        }

        let aggregator = HealthAggregator::new(pipeline);
        let status = aggregator.status().await;
        assert_eq!(status.overall, Overall::Unhealthy);
        assert_eq!(status.checks["circuit_breaker"], "open");
        assert!(!aggregator.ready().await);
    }

    #[tokio::test]
    async fn saturated_limiter_degrades() {
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(FailingTransport),
            PipelineSettings {
                request_timeout_ms: 30_000,
                max_retries: 0,
                rate_limit_per_minute: 1,
            },
        ));
        pipeline.global_limiter().record().await;

        let aggregator = HealthAggregator::new(pipeline);
        let status = aggregator.status().await;
        assert_eq!(status.overall, Overall::Degraded);
        // Still ready: degraded only sheds load, it does not stop it
        assert!(aggregator.ready().await);
    }

    #[tokio::test]
    async fn overall_serialises_lowercase() {
        let value = serde_json::to_value(Overall::Degraded).unwrap();
        assert_eq!(value, json!("degraded"));
    }
}
