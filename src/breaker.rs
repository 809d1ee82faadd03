//! Circuit Breaker
//!
//! Three-state failure gate in front of the upstream platform. Opens
//! after five consecutive qualifying failures, half-opens 30 seconds
//! later (observed lazily on the next admission check), closes on the
//! first success. Client errors and 429s never move the state.
//!
//! Half-open admission is optimistic: concurrent probes are all allowed
//! and the first completion to report success closes the breaker.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::metrics::GatewayMetrics;

const FAILURE_THRESHOLD: u32 = 5;
const OPEN_DURATION: Duration = Duration::from_secs(30);

/// Breaker phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Closed,
    Open,
    HalfOpen,
}

impl Phase {
    /// Gauge encoding: 0 closed, 1 open, 2 half-open.
    fn gauge_value(self) -> u64 {
        match self {
            Phase::Closed => 0,
            Phase::Open => 1,
            Phase::HalfOpen => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Closed => "closed",
            Phase::Open => "open",
            Phase::HalfOpen => "half-open",
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    phase: Phase,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerAdmission {
    pub allowed: bool,
    pub phase: Phase,
}

/// Circuit breaker guarding the outbound path.
pub struct CircuitBreaker {
    state: RwLock<BreakerState>,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(BreakerState {
                phase: Phase::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
            metrics: None,
        }
    }

    pub fn with_metrics(metrics: Arc<GatewayMetrics>) -> Self {
        let breaker = Self::new();
        Self {
            metrics: Some(metrics),
            ..breaker
        }
    }

    /// Admission check. Performs the lazy open → half-open transition.
    pub async fn admit(&self) -> BreakerAdmission {
        let mut state = self.state.write().await;

        if state.phase == Phase::Open {
            let elapsed = state
                .opened_at
                .map(|t| t.elapsed())
                .unwrap_or(Duration::ZERO);
            if elapsed >= OPEN_DURATION {
                state.phase = Phase::HalfOpen;
                self.set_gauge(Phase::HalfOpen);
                info!("circuit breaker half-open, probing upstream");
            }
        }

        BreakerAdmission {
            allowed: state.phase != Phase::Open,
            phase: state.phase,
        }
    }

    /// Report a completed successful call.
    pub async fn on_success(&self) {
        let mut state = self.state.write().await;
        let was = state.phase;

        state.consecutive_failures = 0;
        state.opened_at = None;
        state.phase = Phase::Closed;

        if was != Phase::Closed {
            self.set_gauge(Phase::Closed);
            info!("circuit breaker closed after successful probe");
        }
    }

    /// Report a completed failed call. Only qualifying failures count:
    /// transport errors (no code) and upstream 5xx. Everything else is
    /// a no-op.
    pub async fn on_failure(&self, error_code: Option<i64>) {
        if !Self::qualifies(error_code) {
            return;
        }

        let tripped = {
            let mut state = self.state.write().await;
            match state.phase {
                Phase::HalfOpen => {
                    state.phase = Phase::Open;
                    state.opened_at = Some(Instant::now());
                    warn!("circuit breaker reopened after failed probe");
                    true
                }
                Phase::Closed => {
                    state.consecutive_failures += 1;
                    if state.consecutive_failures >= FAILURE_THRESHOLD {
                        state.phase = Phase::Open;
                        state.opened_at = Some(Instant::now());
                        warn!(
                            failures = state.consecutive_failures,
                            "circuit breaker opened"
                        );
                        true
                    } else {
                        false
                    }
                }
                Phase::Open => {
                    // Late completion from an in-flight call; already open.
                    state.consecutive_failures += 1;
                    false
                }
            }
        };

        if tripped {
            self.set_gauge(Phase::Open);
            if let Some(metrics) = &self.metrics {
                metrics.circuit_breaker_trips_total.inc().await;
            }
        }
    }

    /// Current phase, after applying the lazy transition.
    pub async fn phase(&self) -> Phase {
        self.admit().await.phase
    }

    pub async fn consecutive_failures(&self) -> u32 {
        self.state.read().await.consecutive_failures
    }

    fn qualifies(error_code: Option<i64>) -> bool {
        match error_code {
            None => true,
            Some(code) => code >= 500,
        }
    }

    fn set_gauge(&self, phase: Phase) {
        if let Some(metrics) = &self.metrics {
            metrics.circuit_breaker_state.set(phase.gauge_value());
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
