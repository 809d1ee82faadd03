//! Rate Limiting
//!
//! Two disciplines guard the outbound path:
//! - a global sliding-window budget across all methods;
//! - per-chat pacing for destination-scoped (message-sending) methods.
//!
//! Both are non-blocking: `admit` refuses with a wait hint instead of
//! sleeping. Callers pair every successful admission with a `record`.

use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

const WINDOW: Duration = Duration::from_secs(60);
const GROUP_SENDS_PER_MINUTE: usize = 20;
const PRIVATE_MIN_INTERVAL: Duration = Duration::from_millis(1000);

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    /// When refused: how long until a slot frees up.
    pub wait_ms: u64,
}

impl Admission {
    fn allowed() -> Self {
        Self {
            allowed: true,
            wait_ms: 0,
        }
    }

    fn refused(wait_ms: u64) -> Self {
        Self {
            allowed: false,
            wait_ms,
        }
    }
}

/// Global sliding-window counter of outbound calls.
pub struct GlobalRateLimiter {
    budget: usize,
    requests: RwLock<Vec<Instant>>,
}

impl GlobalRateLimiter {
    /// Budget is requests per trailing minute, clamped to 1..60.
    pub fn new(per_minute: u32) -> Self {
        Self {
            budget: per_minute.clamp(1, 60) as usize,
            requests: RwLock::new(Vec::new()),
        }
    }

    /// Check whether one more call fits in the window.
    pub async fn admit(&self) -> Admission {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        requests.retain(|&t| now.duration_since(t) < WINDOW);

        if requests.len() < self.budget {
            return Admission::allowed();
        }

        let oldest = requests[0];
        let wait = WINDOW
            .saturating_sub(now.duration_since(oldest))
            .as_millis() as u64;
        debug!(wait_ms = wait, "global rate limit refused");
        Admission::refused(wait)
    }

    /// Consume one budget slot. Instants stay non-decreasing because the
    /// push happens under the same lock as eviction.
    pub async fn record(&self) {
        self.requests.write().await.push(Instant::now());
    }

    /// Requests currently inside the window.
    pub async fn in_window(&self) -> usize {
        let now = Instant::now();
        let requests = self.requests.read().await;
        requests
            .iter()
            .filter(|&&t| now.duration_since(t) < WINDOW)
            .count()
    }

    /// True when the window is at or past budget.
    pub async fn saturated(&self) -> bool {
        self.in_window().await >= self.budget
    }

    pub fn budget(&self) -> usize {
        self.budget
    }
}

/// Destination pacing regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatScope {
    /// Positive ids: direct chats, min 1 s between sends.
    Private,
    /// Negative ids and non-numeric targets (`@channelname`): at most 20
    /// sends per trailing minute.
    Group,
}

/// Normalise a `chat_id` parameter into a map key and its regime.
/// Ids that fail integer parsing take the conservative group regime.
fn classify_destination(chat_id: &Value) -> (String, ChatScope) {
    let key = match chat_id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let scope = match key.parse::<i64>() {
        Ok(id) if id < 0 => ChatScope::Group,
        Ok(_) => ChatScope::Private,
        Err(_) => ChatScope::Group,
    };

    (key, scope)
}

/// Per-destination send pacing.
pub struct PerChatRateLimiter {
    history: RwLock<HashMap<String, Vec<Instant>>>,
    last_sweep: RwLock<Instant>,
}

impl PerChatRateLimiter {
    pub fn new() -> Self {
        Self {
            history: RwLock::new(HashMap::new()),
            last_sweep: RwLock::new(Instant::now()),
        }
    }

    /// Check whether a send to this destination is currently allowed.
    pub async fn admit_for(&self, chat_id: &Value) -> Admission {
        self.maybe_sweep().await;

        let (key, scope) = classify_destination(chat_id);
        let now = Instant::now();
        let history = self.history.read().await;
        let sends = match history.get(&key) {
            Some(sends) => sends,
            None => return Admission::allowed(),
        };

        match scope {
            ChatScope::Private => match sends.last() {
                Some(&last) if now.duration_since(last) < PRIVATE_MIN_INTERVAL => {
                    let wait = PRIVATE_MIN_INTERVAL
                        .saturating_sub(now.duration_since(last))
                        .as_millis() as u64;
                    debug!(chat = %key, wait_ms = wait, "per-chat limit refused");
                    Admission::refused(wait)
                }
                _ => Admission::allowed(),
            },
            ChatScope::Group => {
                let in_window: Vec<Instant> = sends
                    .iter()
                    .copied()
                    .filter(|&t| now.duration_since(t) < WINDOW)
                    .collect();
                if in_window.len() < GROUP_SENDS_PER_MINUTE {
                    return Admission::allowed();
                }
                let oldest = in_window[0];
                let wait = WINDOW
                    .saturating_sub(now.duration_since(oldest))
                    .as_millis() as u64;
                debug!(chat = %key, wait_ms = wait, "per-chat limit refused");
                Admission::refused(wait)
            }
        }
    }

    /// Record one send to this destination.
    pub async fn record_for(&self, chat_id: &Value) {
        let (key, _) = classify_destination(chat_id);
        let now = Instant::now();
        let mut history = self.history.write().await;
        let sends = history.entry(key).or_default();
        sends.retain(|&t| now.duration_since(t) < WINDOW);
        sends.push(now);
    }

    /// Destinations currently tracked.
    pub async fn tracked(&self) -> usize {
        self.history.read().await.len()
    }

    /// Drop destinations whose history is entirely outside the window.
    /// Runs at most once per window.
    async fn maybe_sweep(&self) {
        let now = Instant::now();
        {
            let last = self.last_sweep.read().await;
            if now.duration_since(*last) < WINDOW {
                return;
            }
        }

        let mut last = self.last_sweep.write().await;
        if now.duration_since(*last) < WINDOW {
            return;
        }
        *last = now;
        drop(last);

        let mut history = self.history.write().await;
        history.retain(|_, sends| sends.iter().any(|&t| now.duration_since(t) < WINDOW));
    }
}

impl Default for PerChatRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
