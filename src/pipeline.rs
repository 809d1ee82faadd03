//! Invocation pipeline
//!
//! The ordered stack every tool call goes through:
//! validate → cache probe → breaker admission → global limit →
//! per-chat limit → upload encoding → transport with retries → record.
//!
//! One `Pipeline` value owns its cache, limiters, breaker, metrics, and
//! transport; tests construct a fresh one per case with a scripted
//! transport. No lock is held across the HTTP exchange: the breaker is
//! consulted before the call and updated after it returns.

use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::api::{ApiResponse, BotTransport, ErrorCategory, HttpTransport, OutboundRequest};
use crate::breaker::CircuitBreaker;
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::metrics::GatewayMetrics;
use crate::methods;
use crate::rate_limit::{GlobalRateLimiter, PerChatRateLimiter};
use crate::redact;
use crate::retry::RetryEngine;
use crate::upload;
use crate::validator::{self, Validation};

const MIN_TIMEOUT_MS: u64 = 5_000;
const MAX_TIMEOUT_MS: u64 = 120_000;

/// Per-invocation overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvokeOptions {
    /// Bypass the global limiter (health probes).
    pub skip_global_limit: bool,
    /// Override the per-call HTTP timeout, clamped 5..120 s.
    pub timeout_ms: Option<u64>,
    /// Override the retry budget.
    pub max_retries: Option<u32>,
}

/// Tunables carried over from [`Config`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub rate_limit_per_minute: u32,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            request_timeout_ms: config.request_timeout_ms,
            max_retries: config.max_retries,
            rate_limit_per_minute: config.rate_limit_per_minute,
        }
    }
}

/// The request pipeline.
pub struct Pipeline {
    transport: Arc<dyn BotTransport>,
    cache: Arc<ResponseCache>,
    global_limiter: Arc<GlobalRateLimiter>,
    per_chat_limiter: Arc<PerChatRateLimiter>,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<GatewayMetrics>,
    settings: PipelineSettings,
}

impl Pipeline {
    /// Build a pipeline over an explicit transport. Tests use this with
    /// a scripted transport.
    pub fn new(transport: Arc<dyn BotTransport>, settings: PipelineSettings) -> Self {
        let metrics = GatewayMetrics::new();
        Self {
            transport,
            cache: Arc::new(ResponseCache::new(methods::cache_ttls())),
            global_limiter: Arc::new(GlobalRateLimiter::new(settings.rate_limit_per_minute)),
            per_chat_limiter: Arc::new(PerChatRateLimiter::new()),
            breaker: Arc::new(CircuitBreaker::with_metrics(Arc::clone(&metrics))),
            metrics,
            settings,
        }
    }

    /// Production wiring: HTTPS transport against the configured origin.
    pub fn from_config(config: &Config) -> Self {
        let transport = Arc::new(HttpTransport::new(
            config.api_url.clone(),
            config.bot_token.clone(),
        ));
        Self::new(transport, PipelineSettings::from(config))
    }

    /// Dispatch one invocation through the full stack.
    pub async fn invoke(&self, method: &str, params: Value, options: InvokeOptions) -> ApiResponse {
        let started = Instant::now();
        debug!(
            method,
            params = %redact::redact_to_string(&params),
            "invoke"
        );

        // 1. Validation short-circuits before anything is consumed.
        let params = match validator::validate(method, &params) {
            Validation::Ok(normalised) => normalised,
            invalid => {
                let response = ApiResponse::failure(
                    None,
                    format!("Validation failed: {}", invalid.details()),
                );
                self.record_failure(method, &response, ErrorCategory::Validation)
                    .await;
                return response;
            }
        };

        let descriptor = methods::get(method);
        let cacheable = self.cache.is_cacheable(method);

        // 2. Cache probe. A hit skips every downstream stage.
        if cacheable {
            if let Some(cached) = self.cache.lookup(method, &params).await {
                self.metrics.cache_hits_total.inc().await;
                debug!(method, "served from cache");
                return ApiResponse::success(cached);
            }
            self.metrics.cache_misses_total.inc().await;
        }

        // 3. Breaker admission.
        let admission = self.breaker.admit().await;
        if !admission.allowed {
            let response = ApiResponse::failure(
                503,
                "Service unavailable: circuit breaker open, upstream failing",
            );
            self.record_failure(method, &response, ErrorCategory::CircuitOpen)
                .await;
            return response;
        }

        // 4. Global limit.
        if !options.skip_global_limit {
            let admission = self.global_limiter.admit().await;
            if !admission.allowed {
                let wait_secs = admission.wait_ms.div_ceil(1000);
                self.metrics
                    .rate_limit_hits_total
                    .inc_labeled("type", "global")
                    .await;
                let response = ApiResponse::rate_limited(
                    format!("Rate limit exceeded. Wait {} seconds.", wait_secs),
                    wait_secs,
                );
                self.record_failure(method, &response, ErrorCategory::RateLimited)
                    .await;
                return response;
            }
        }

        // 5. Per-chat limit, for destination-scoped methods only.
        let destination = descriptor
            .filter(|d| d.destination_scoped)
            .and_then(|_| params.get("chat_id").cloned());
        if let Some(chat_id) = &destination {
            let admission = self.per_chat_limiter.admit_for(chat_id).await;
            if !admission.allowed {
                let wait_secs = admission.wait_ms.div_ceil(1000);
                self.metrics
                    .rate_limit_hits_total
                    .inc_labeled("type", "per_chat")
                    .await;
                let response = ApiResponse::rate_limited(
                    format!("Per-chat rate limit exceeded. Wait {} seconds.", wait_secs),
                    wait_secs,
                );
                self.record_failure(method, &response, ErrorCategory::RateLimited)
                    .await;
                return response;
            }
        }

        // 6. Upload encoding.
        let prepared = match upload::prepare(method, &params).await {
            Ok(prepared) => prepared,
            Err(e) => {
                let response =
                    ApiResponse::failure(400, format!("File upload failed: {}", e));
                self.record_failure(method, &response, ErrorCategory::Client)
                    .await;
                return response;
            }
        };

        // 7. Transport loop. The global limiter is charged immediately
        // before every attempt so retries consume budget too.
        let max_retries = options.max_retries.unwrap_or(self.settings.max_retries);
        let timeout = Duration::from_millis(
            options
                .timeout_ms
                .unwrap_or(self.settings.request_timeout_ms)
                .clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS),
        );

        let engine = RetryEngine::with_metrics(max_retries, Arc::clone(&self.metrics));
        let transport = Arc::clone(&self.transport);
        let limiter = Arc::clone(&self.global_limiter);
        let skip_record = options.skip_global_limit;
        let request_template = OutboundRequest {
            method: method.to_string(),
            body: prepared.body,
            content_type: prepared.content_type,
            timeout,
        };

        let response = engine
            .execute(|| {
                let transport = Arc::clone(&transport);
                let limiter = Arc::clone(&limiter);
                let request = request_template.clone();
                async move {
                    if !skip_record {
                        limiter.record().await;
                    }
                    transport.execute(request).await
                }
            })
            .await;

        // 8/9. Post-processing.
        if response.ok {
            self.breaker.on_success().await;

            if cacheable {
                if let Some(result) = &response.result {
                    self.cache.store(method, &params, result.clone()).await;
                    let stats = self.cache.stats().await;
                    self.metrics.cache_entries.set(stats.size as u64);
                }
            }

            if let Some(chat_id) = &destination {
                self.per_chat_limiter.record_for(chat_id).await;
            }

            let elapsed = started.elapsed().as_secs_f64();
            self.metrics.record_request(method, true, elapsed).await;
            info!(method, elapsed_ms = (elapsed * 1000.0) as u64, "ok");
        } else {
            self.breaker.on_failure(response.error_code).await;
            let category = ErrorCategory::classify(&response);
            self.record_failure(method, &response, category).await;
        }

        response
    }

    async fn record_failure(
        &self,
        method: &str,
        response: &ApiResponse,
        category: ErrorCategory,
    ) {
        self.metrics
            .errors_total
            .inc_labeled("category", category.as_str())
            .await;
        self.metrics.record_request(method, false, 0.0).await;
        debug!(
            method,
            category = category.as_str(),
            code = response.error_code,
            "invocation failed"
        );
    }

    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn global_limiter(&self) -> &GlobalRateLimiter {
        &self.global_limiter
    }

    pub fn per_chat_limiter(&self) -> &PerChatRateLimiter {
        &self.per_chat_limiter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TransportError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Transport stub scripted with a sequence of outcomes; repeats the
    /// last one once the script is exhausted.
    struct ScriptedTransport {
        script: Mutex<Vec<Result<ApiResponse, String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<ApiResponse, String>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            })
        }

        fn always(response: ApiResponse) -> Arc<Self> {
            Self::new(vec![Ok(response)])
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BotTransport for ScriptedTransport {
        async fn execute(
            &self,
            _request: OutboundRequest,
        ) -> Result<ApiResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().await;
            let outcome = if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            };
            outcome.map_err(TransportError::Network)
        }
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            request_timeout_ms: 30_000,
            max_retries: 0,
            rate_limit_per_minute: 60,
        }
    }

    #[tokio::test]
    async fn success_flows_through() {
        let transport = ScriptedTransport::always(ApiResponse::success(json!({"id": 42})));
        let pipeline = Pipeline::new(transport.clone(), settings());

        let response = pipeline
            .invoke(
                "sendMessage",
                json!({"chat_id": 1, "text": "hi"}),
                InvokeOptions::default(),
            )
            .await;

        assert!(response.ok);
        assert_eq!(response.result, Some(json!({"id": 42})));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn validation_failure_never_reaches_transport() {
        let transport = ScriptedTransport::always(ApiResponse::success(json!({})));
        let pipeline = Pipeline::new(transport.clone(), settings());

        let response = pipeline
            .invoke("sendMessage", json!({"chat_id": 1}), InvokeOptions::default())
            .await;

        assert!(!response.ok);
        assert!(response
            .description
            .as_deref()
            .unwrap()
            .starts_with("Validation failed:"));
        assert_eq!(response.error_code, None);
        assert_eq!(transport.calls(), 0);
        // The global limiter was never charged
        assert_eq!(pipeline.global_limiter().in_window().await, 0);
    }

    #[tokio::test]
    async fn cache_hit_skips_every_stage() {
        let transport = ScriptedTransport::always(ApiResponse::success(json!({"id": 7})));
        let pipeline = Pipeline::new(transport.clone(), settings());

        let first = pipeline
            .invoke("getMe", json!({}), InvokeOptions::default())
            .await;
        assert!(first.ok);
        assert_eq!(transport.calls(), 1);

        let second = pipeline
            .invoke("getMe", json!({}), InvokeOptions::default())
            .await;
        assert!(second.ok);
        assert_eq!(second.result, Some(json!({"id": 7})));
        // No second wire call, no extra budget consumed
        assert_eq!(transport.calls(), 1);
        assert_eq!(pipeline.global_limiter().in_window().await, 1);
        assert_eq!(pipeline.metrics().cache_hits_total.get().await, 1);
    }

    #[tokio::test]
    async fn global_limit_refusal_envelope() {
        let transport = ScriptedTransport::always(ApiResponse::success(json!({})));
        let pipeline = Pipeline::new(
            transport.clone(),
            PipelineSettings {
                rate_limit_per_minute: 1,
                ..settings()
            },
        );

        let first = pipeline
            .invoke(
                "sendMessage",
                json!({"chat_id": 1, "text": "a"}),
                InvokeOptions::default(),
            )
            .await;
        assert!(first.ok);

        let second = pipeline
            .invoke(
                "sendMessage",
                json!({"chat_id": 2, "text": "b"}),
                InvokeOptions::default(),
            )
            .await;
        assert!(!second.ok);
        assert_eq!(second.error_code, Some(429));
        assert!(second.retry_after().is_some());
        assert!(second.description.unwrap().contains("Rate limit exceeded"));
        assert_eq!(transport.calls(), 1);
        assert_eq!(
            pipeline
                .metrics()
                .rate_limit_hits_total
                .get_labeled("type", "global")
                .await,
            1
        );
    }

    #[tokio::test]
    async fn skip_global_limit_option() {
        let transport = ScriptedTransport::always(ApiResponse::success(json!({})));
        let pipeline = Pipeline::new(
            transport.clone(),
            PipelineSettings {
                rate_limit_per_minute: 1,
                ..settings()
            },
        );

        for _ in 0..3 {
            let response = pipeline
                .invoke(
                    "getWebhookInfo",
                    json!({"probe": uuid::Uuid::new_v4().to_string()}),
                    InvokeOptions {
                        skip_global_limit: true,
                        ..Default::default()
                    },
                )
                .await;
            assert!(response.ok);
        }
        assert_eq!(pipeline.global_limiter().in_window().await, 0);
    }

    #[tokio::test]
    async fn per_chat_refusal_envelope() {
        let transport = ScriptedTransport::always(ApiResponse::success(json!({})));
        let pipeline = Pipeline::new(transport.clone(), settings());

        let first = pipeline
            .invoke(
                "sendMessage",
                json!({"chat_id": 12345, "text": "a"}),
                InvokeOptions::default(),
            )
            .await;
        assert!(first.ok);

        let second = pipeline
            .invoke(
                "sendMessage",
                json!({"chat_id": 12345, "text": "b"}),
                InvokeOptions::default(),
            )
            .await;
        assert!(!second.ok);
        assert_eq!(second.error_code, Some(429));
        assert!(second
            .description
            .unwrap()
            .contains("Per-chat rate limit exceeded"));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn non_destination_method_ignores_per_chat_pacing() {
        let transport = ScriptedTransport::always(ApiResponse::success(json!({})));
        let pipeline = Pipeline::new(transport.clone(), settings());

        // deleteMessage carries chat_id but is not destination-scoped
        for _ in 0..3 {
            let response = pipeline
                .invoke(
                    "deleteMessage",
                    json!({"chat_id": 9, "message_id": 1}),
                    InvokeOptions::default(),
                )
                .await;
            assert!(response.ok);
        }
        assert_eq!(pipeline.per_chat_limiter().tracked().await, 0);
    }

    #[tokio::test]
    async fn client_error_propagates_unchanged_and_breaker_stays_closed() {
        let failure = ApiResponse::failure(400, "Bad Request: chat not found");
        let transport = ScriptedTransport::always(failure.clone());
        let pipeline = Pipeline::new(
            transport.clone(),
            PipelineSettings {
                max_retries: 3,
                ..settings()
            },
        );

        let response = pipeline
            .invoke(
                "sendMessage",
                json!({"chat_id": 123, "text": "x"}),
                InvokeOptions::default(),
            )
            .await;

        assert_eq!(response, failure);
        assert_eq!(transport.calls(), 1);
        assert_eq!(pipeline.breaker().consecutive_failures().await, 0);
    }

    #[tokio::test]
    async fn breaker_opens_after_five_network_failures() {
        let transport = ScriptedTransport::new(vec![Err("connection refused".to_string())]);
        let pipeline = Pipeline::new(transport.clone(), settings());

        for _ in 0..5 {
            let response = pipeline
                .invoke("getFile", json!({"file_id": "abc"}), InvokeOptions::default())
                .await;
            assert!(!response.ok);
        }
        assert_eq!(transport.calls(), 5);

        // Sixth call is refused without touching the wire
        let response = pipeline
            .invoke("getFile", json!({"file_id": "abc"}), InvokeOptions::default())
            .await;
        assert!(!response.ok);
        assert_eq!(response.error_code, Some(503));
        assert!(response.description.unwrap().contains("circuit breaker"));
        assert_eq!(transport.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_consume_global_budget() {
        let transport = ScriptedTransport::new(vec![
            Ok(ApiResponse::failure(500, "Internal Server Error")),
            Ok(ApiResponse::failure(502, "Bad Gateway")),
            Ok(ApiResponse::success(json!({}))),
        ]);
        let pipeline = Pipeline::new(
            transport.clone(),
            PipelineSettings {
                max_retries: 2,
                ..settings()
            },
        );

        let response = pipeline
            .invoke("getFile", json!({"file_id": "abc"}), InvokeOptions::default())
            .await;

        assert!(response.ok);
        assert_eq!(transport.calls(), 3);
        assert_eq!(pipeline.global_limiter().in_window().await, 3);
        assert_eq!(
            pipeline
                .metrics()
                .retries_total
                .get_labeled("reason", "server_error")
                .await,
            2
        );
    }

    #[tokio::test]
    async fn success_stores_in_cache_before_returning() {
        let transport = ScriptedTransport::new(vec![
            Ok(ApiResponse::success(json!({"username": "gatewaybot"}))),
            Ok(ApiResponse::failure(500, "should never be reached")),
        ]);
        let pipeline = Pipeline::new(transport.clone(), settings());

        let first = pipeline
            .invoke("getMe", json!({}), InvokeOptions::default())
            .await;
        assert!(first.ok);

        // Retry-within-TTL by the same caller observes the cached value
        let second = pipeline
            .invoke("getMe", json!({}), InvokeOptions::default())
            .await;
        assert_eq!(second.result, Some(json!({"username": "gatewaybot"})));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn upload_failure_returns_client_error() {
        let transport = ScriptedTransport::always(ApiResponse::success(json!({})));
        let pipeline = Pipeline::new(transport.clone(), settings());

        let response = pipeline
            .invoke(
                "sendPhoto",
                json!({"chat_id": 1, "photo": "file:///definitely/not/here.png"}),
                InvokeOptions::default(),
            )
            .await;

        assert!(!response.ok);
        assert_eq!(response.error_code, Some(400));
        assert!(response.description.unwrap().contains("not/here.png"));
        assert_eq!(transport.calls(), 0);
    }
}
