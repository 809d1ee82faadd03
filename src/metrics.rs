//! Prometheus Metrics
//!
//! Hand-rolled counters, gauges, and histograms with text exposition.
//! The registry is shared by the pipeline and scraped by the health
//! server's /metrics endpoint.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Counter metric (always increases), with optional label sets.
#[derive(Debug)]
pub struct Counter {
    name: String,
    help: String,
    values: RwLock<Vec<(HashMap<String, String>, AtomicU64)>>,
}

impl Counter {
    pub fn new(name: &str, help: &str) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            values: RwLock::new(Vec::new()),
        }
    }

    pub async fn inc(&self) {
        self.inc_by(1).await;
    }

    pub async fn inc_by(&self, n: u64) {
        let values = self.values.read().await;
        if let Some((_, counter)) = values.iter().find(|(l, _)| l.is_empty()) {
            counter.fetch_add(n, Ordering::Relaxed);
            return;
        }
        drop(values);

        let mut values = self.values.write().await;
        if let Some((_, counter)) = values.iter().find(|(l, _)| l.is_empty()) {
            counter.fetch_add(n, Ordering::Relaxed);
        } else {
            values.push((HashMap::new(), AtomicU64::new(n)));
        }
    }

    pub async fn inc_with_labels(&self, labels: HashMap<String, String>) {
        let values = self.values.read().await;
        for (l, counter) in values.iter() {
            if l == &labels {
                counter.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        drop(values);

        let mut values = self.values.write().await;
        for (l, counter) in values.iter() {
            if l == &labels {
                counter.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        values.push((labels, AtomicU64::new(1)));
    }

    /// Shorthand for a single-label increment.
    pub async fn inc_labeled(&self, key: &str, value: &str) {
        self.inc_with_labels([(key.to_string(), value.to_string())].into_iter().collect())
            .await;
    }

    pub async fn get(&self) -> u64 {
        let values = self.values.read().await;
        values
            .iter()
            .map(|(_, c)| c.load(Ordering::Relaxed))
            .sum()
    }

    pub async fn get_labeled(&self, key: &str, value: &str) -> u64 {
        let wanted: HashMap<String, String> =
            [(key.to_string(), value.to_string())].into_iter().collect();
        let values = self.values.read().await;
        values
            .iter()
            .find(|(l, _)| l == &wanted)
            .map(|(_, c)| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub async fn format(&self) -> String {
        let values = self.values.read().await;
        let mut output = format!("# HELP {} {}\n", self.name, self.help);
        output.push_str(&format!("# TYPE {} counter\n", self.name));

        if values.is_empty() {
            output.push_str(&format!("{} 0\n", self.name));
        } else {
            for (labels, value) in values.iter() {
                if labels.is_empty() {
                    output.push_str(&format!(
                        "{} {}\n",
                        self.name,
                        value.load(Ordering::Relaxed)
                    ));
                } else {
                    let mut parts: Vec<String> = labels
                        .iter()
                        .map(|(k, v)| format!("{}=\"{}\"", k, v))
                        .collect();
                    parts.sort();
                    output.push_str(&format!(
                        "{}{{{}}} {}\n",
                        self.name,
                        parts.join(","),
                        value.load(Ordering::Relaxed)
                    ));
                }
            }
        }

        output
    }
}

/// Gauge metric (can go up or down).
#[derive(Debug)]
pub struct Gauge {
    name: String,
    help: String,
    value: AtomicU64,
}

impl Gauge {
    pub fn new(name: &str, help: &str) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            value: AtomicU64::new(0),
        }
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn format(&self) -> String {
        format!(
            "# HELP {} {}\n# TYPE {} gauge\n{} {}\n",
            self.name, self.help, self.name, self.name, self.get()
        )
    }
}

/// Histogram for measuring distributions.
#[derive(Debug)]
pub struct Histogram {
    name: String,
    help: String,
    buckets: Vec<f64>,
    counts: Vec<AtomicU64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(name: &str, help: &str, buckets: Vec<f64>) -> Self {
        let counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            name: name.to_string(),
            help: help.to_string(),
            buckets,
            counts,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, value: f64) {
        for (i, bucket) in self.buckets.iter().enumerate() {
            if value <= *bucket {
                self.counts[i].fetch_add(1, Ordering::Relaxed);
            }
        }

        // Sum stored as integer microseconds for atomicity
        self.sum
            .fetch_add((value * 1_000_000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn format(&self) -> String {
        let mut output = format!("# HELP {} {}\n", self.name, self.help);
        output.push_str(&format!("# TYPE {} histogram\n", self.name));

        let mut cumulative = 0u64;
        for (i, bucket) in self.buckets.iter().enumerate() {
            cumulative += self.counts[i].load(Ordering::Relaxed);
            output.push_str(&format!(
                "{}_bucket{{le=\"{}\"}} {}\n",
                self.name, bucket, cumulative
            ));
        }

        output.push_str(&format!(
            "{}_bucket{{le=\"+Inf\"}} {}\n",
            self.name,
            self.count.load(Ordering::Relaxed)
        ));
        output.push_str(&format!(
            "{}_sum {}\n",
            self.name,
            self.sum.load(Ordering::Relaxed) as f64 / 1_000_000.0
        ));
        output.push_str(&format!(
            "{}_count {}\n",
            self.name,
            self.count.load(Ordering::Relaxed)
        ));

        output
    }
}

/// Gateway metrics collector.
pub struct GatewayMetrics {
    pub requests_total: Counter,
    pub request_duration: Histogram,
    pub errors_total: Counter,
    pub retries_total: Counter,
    pub rate_limit_hits_total: Counter,
    pub circuit_breaker_state: Gauge,
    pub circuit_breaker_trips_total: Counter,
    pub cache_hits_total: Counter,
    pub cache_misses_total: Counter,
    pub cache_entries: Gauge,
    start_time: Instant,
}

impl GatewayMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            requests_total: Counter::new(
                "gateway_requests_total",
                "Total Bot API invocations by method and outcome",
            ),
            request_duration: Histogram::new(
                "gateway_request_duration_seconds",
                "Invocation duration in seconds",
                vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            ),
            errors_total: Counter::new(
                "gateway_errors_total",
                "Total failed invocations by category",
            ),
            retries_total: Counter::new("gateway_retries_total", "Total retry attempts by reason"),
            rate_limit_hits_total: Counter::new(
                "gateway_rate_limit_hits_total",
                "Invocations refused by a rate limiter",
            ),
            circuit_breaker_state: Gauge::new(
                "gateway_circuit_breaker_state",
                "Circuit breaker state (0=closed, 1=open, 2=half-open)",
            ),
            circuit_breaker_trips_total: Counter::new(
                "gateway_circuit_breaker_trips_total",
                "Times the circuit breaker opened",
            ),
            cache_hits_total: Counter::new("gateway_cache_hits_total", "Response cache hits"),
            cache_misses_total: Counter::new("gateway_cache_misses_total", "Response cache misses"),
            cache_entries: Gauge::new("gateway_cache_entries", "Live response cache entries"),
            start_time: Instant::now(),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Record one completed invocation. The duration histogram only
    /// tracks successful exchanges; refusals would skew it toward zero.
    pub async fn record_request(&self, method: &str, success: bool, duration_secs: f64) {
        self.requests_total
            .inc_with_labels(
                [
                    ("method".to_string(), method.to_string()),
                    (
                        "outcome".to_string(),
                        if success { "ok" } else { "error" }.to_string(),
                    ),
                ]
                .into_iter()
                .collect(),
            )
            .await;
        if success {
            self.request_duration.observe(duration_secs);
        }
    }

    /// Format all metrics for Prometheus scraping.
    pub async fn format_metrics(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "# HELP gateway_uptime_seconds Uptime in seconds\n\
             # TYPE gateway_uptime_seconds gauge\n\
             gateway_uptime_seconds {}\n\n",
            self.uptime_secs()
        ));

        output.push_str(&self.requests_total.format().await);
        output.push('\n');
        output.push_str(&self.request_duration.format());
        output.push('\n');
        output.push_str(&self.errors_total.format().await);
        output.push('\n');
        output.push_str(&self.retries_total.format().await);
        output.push('\n');
        output.push_str(&self.rate_limit_hits_total.format().await);
        output.push('\n');
        output.push_str(&self.circuit_breaker_state.format());
        output.push('\n');
        output.push_str(&self.circuit_breaker_trips_total.format().await);
        output.push('\n');
        output.push_str(&self.cache_hits_total.format().await);
        output.push('\n');
        output.push_str(&self.cache_misses_total.format().await);
        output.push('\n');
        output.push_str(&self.cache_entries.format());

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counter_unlabeled() {
        let counter = Counter::new("test_counter", "A test counter");
        counter.inc().await;
        counter.inc().await;
        assert_eq!(counter.get().await, 2);
    }

    #[tokio::test]
    async fn counter_labeled_series_are_independent() {
        let counter = Counter::new("test_counter", "A test counter");
        counter.inc_labeled("reason", "rate_limit").await;
        counter.inc_labeled("reason", "rate_limit").await;
        counter.inc_labeled("reason", "network").await;

        assert_eq!(counter.get_labeled("reason", "rate_limit").await, 2);
        assert_eq!(counter.get_labeled("reason", "network").await, 1);
        assert_eq!(counter.get().await, 3);

        let text = counter.format().await;
        assert!(text.contains("test_counter{reason=\"rate_limit\"} 2"));
        assert!(text.contains("test_counter{reason=\"network\"} 1"));
    }

    #[test]
    fn gauge_set_inc_dec() {
        let gauge = Gauge::new("test_gauge", "A test gauge");
        gauge.set(10);
        assert_eq!(gauge.get(), 10);
        gauge.inc();
        assert_eq!(gauge.get(), 11);
        gauge.dec();
        assert_eq!(gauge.get(), 10);
    }

    #[test]
    fn histogram_buckets_cumulative() {
        let histogram = Histogram::new("test_hist", "A test histogram", vec![1.0, 5.0, 10.0]);
        histogram.observe(0.5);
        histogram.observe(3.0);
        histogram.observe(7.0);
        histogram.observe(15.0);

        let formatted = histogram.format();
        assert!(formatted.contains("test_hist_bucket{le=\"1\"} 1"));
        assert!(formatted.contains("test_hist_bucket{le=\"5\"} 2"));
        assert!(formatted.contains("test_hist_bucket{le=\"10\"} 3"));
        assert!(formatted.contains("test_hist_bucket{le=\"+Inf\"} 4"));
        assert!(formatted.contains("test_hist_count 4"));
    }

    #[tokio::test]
    async fn gateway_exposition_includes_all_families() {
        let metrics = GatewayMetrics::new();
        metrics.record_request("getMe", true, 0.2).await;
        metrics.errors_total.inc_labeled("category", "SERVER").await;
        metrics.circuit_breaker_state.set(1);

        let output = metrics.format_metrics().await;
        assert!(output.contains("gateway_uptime_seconds"));
        assert!(output.contains("gateway_requests_total{method=\"getMe\",outcome=\"ok\"} 1"));
        assert!(output.contains("gateway_errors_total{category=\"SERVER\"} 1"));
        assert!(output.contains("gateway_circuit_breaker_state 1"));
        assert!(output.contains("gateway_request_duration_seconds_count 1"));
    }
}
