//! Metrics and analytics for the verifier portal
//!
//! The registry doubles as the default analytics sink: every
//! [`AnalyticsAction`] increments `portal.analytics.<action>`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::infra::{AnalyticsSink, Result};

/// Process-wide metrics registry
pub struct MetricsRegistry {
    /// Counter metrics
    counters: RwLock<HashMap<String, Arc<AtomicU64>>>,

    /// Gauge metrics (current values)
    gauges: RwLock<HashMap<String, Arc<AtomicU64>>>,

    /// Histogram metrics (bucketed)
    histograms: RwLock<HashMap<String, Arc<Histogram>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            gauges: RwLock::new(HashMap::new()),
            histograms: RwLock::new(HashMap::new()),
        }
    }

    /// Increment a counter
    pub async fn inc_counter(&self, name: &str) {
        let counters = self.counters.read().await;
        if let Some(counter) = counters.get(name) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        drop(counters);

        let mut counters = self.counters.write().await;
        counters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Set a gauge value
    pub async fn set_gauge(&self, name: &str, value: u64) {
        let gauges = self.gauges.read().await;
        if let Some(gauge) = gauges.get(name) {
            gauge.store(value, Ordering::Relaxed);
            return;
        }
        drop(gauges);

        // Create new gauge
        let mut gauges = self.gauges.write().await;
        gauges.insert(name.to_string(), Arc::new(AtomicU64::new(value)));
    }

    /// Get a counter value
    pub async fn get_counter(&self, name: &str) -> u64 {
        let counters = self.counters.read().await;
        counters
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Get a gauge value
    pub async fn get_gauge(&self, name: &str) -> u64 {
        let gauges = self.gauges.read().await;
        gauges
            .get(name)
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Record a histogram observation
    pub async fn observe_histogram(&self, name: &str, value: f64) {
        let histograms = self.histograms.read().await;
        if let Some(histogram) = histograms.get(name) {
            histogram.observe(value).await;
            return;
        }
        drop(histograms);

        let mut histograms = self.histograms.write().await;
        let histogram = histograms
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Histogram::millis()));
        histogram.observe(value).await;
    }

    /// Point-in-time copy of every metric, sorted by name.
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let counters = self
            .counters
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();
        let gauges = self
            .gauges
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();

        let mut histograms = BTreeMap::new();
        for (name, histogram) in self.histograms.read().await.iter() {
            histograms.insert(name.clone(), histogram.summary().await);
        }

        MetricsSnapshot {
            counters,
            gauges,
            histograms,
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics of one run, as printed by `portal-admin --metrics`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, u64>,
    pub histograms: BTreeMap<String, HistogramSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistogramSummary {
    /// `(upper bound, observations)` per bucket
    pub buckets: Vec<(f64, u64)>,
    pub sum: f64,
    pub count: u64,
}

/// Bucketed histogram
pub struct Histogram {
    /// Bucket boundaries
    buckets: Vec<f64>,

    /// Count per bucket
    counts: RwLock<Vec<AtomicU64>>,

    /// Sum of all observations
    sum: AtomicU64,

    /// Total count of observations
    count: AtomicU64,
}

impl Histogram {
    pub fn new(buckets: Vec<f64>) -> Self {
        let counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts: RwLock::new(counts),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record an observation
    pub async fn observe(&self, value: f64) {
        // sum kept in thousandths
        let scaled = (value * 1000.0) as u64;
        self.sum.fetch_add(scaled, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        // Increment appropriate bucket
        let counts = self.counts.read().await;
        for (i, bucket) in self.buckets.iter().enumerate() {
            if value <= *bucket {
                counts[i].fetch_add(1, Ordering::Relaxed);
                break;
            }
        }
    }

    pub async fn summary(&self) -> HistogramSummary {
        let counts = self.counts.read().await;
        HistogramSummary {
            buckets: self
                .buckets
                .iter()
                .zip(counts.iter())
                .map(|(le, c)| (*le, c.load(Ordering::Relaxed)))
                .collect(),
            sum: self.sum.load(Ordering::Relaxed) as f64 / 1000.0,
            count: self.count.load(Ordering::Relaxed),
        }
    }
}

impl Histogram {
    /// Buckets for round-trip durations in milliseconds, up to two minutes.
    pub fn millis() -> Self {
        Self::new(vec![
            50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0, 30_000.0, 60_000.0,
            120_000.0,
        ])
    }
}

/// Predefined metric names
pub mod metric_names {
    pub const ANALYTICS_PREFIX: &str = "portal.analytics";

    // Submission rounds
    pub const ROUNDS_STARTED: &str = "portal.submission.rounds_started";
    pub const ROUNDS_FAILED: &str = "portal.submission.rounds_failed";
    pub const ROUND_DURATION_MS: &str = "portal.submission.round_ms";
    pub const SIGNATURES_COLLECTED: &str = "portal.submission.signatures";

    // Transaction flows
    pub const TXN_SENT: &str = "portal.txn.sent";
    pub const TXN_POLLS: &str = "portal.txn.polls";

    // Proof loading
    pub const PROOFS_LOADED: &str = "portal.proofs.loaded";
    pub const SOURCES_FETCH_MS: &str = "portal.proofs.sources_fetch_ms";
    pub const LATEST_ENTRIES: &str = "portal.latest.entries";
}

/// Product analytics events emitted by submission and publish flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalyticsAction {
    CompileSubmit,
    CompileServerError,
    CompileCompilationError,
    CompileHashesNotSimilar,
    CompileSuccessHashesMatch,
    SignServerError,
    SignServerSuccess,
    PublishClick,
    TransactionIssued,
    TransactionRejected,
    TransactionError,
    TransactionExpired,
    ContractDeployed,
}

impl AnalyticsAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsAction::CompileSubmit => "compile_submit",
            AnalyticsAction::CompileServerError => "compile_server_error",
            AnalyticsAction::CompileCompilationError => "compile_compilation_error",
            AnalyticsAction::CompileHashesNotSimilar => "compile_hashes_not_similar",
            AnalyticsAction::CompileSuccessHashesMatch => "compile_success_hashes_match",
            AnalyticsAction::SignServerError => "sign_server_error",
            AnalyticsAction::SignServerSuccess => "sign_server_success",
            AnalyticsAction::PublishClick => "publish_click",
            AnalyticsAction::TransactionIssued => "transaction_issued",
            AnalyticsAction::TransactionRejected => "transaction_rejected",
            AnalyticsAction::TransactionError => "transaction_error",
            AnalyticsAction::TransactionExpired => "transaction_expired",
            AnalyticsAction::ContractDeployed => "contract_deployed",
        }
    }

    /// Counter name in the metrics registry.
    pub fn metric_name(&self) -> String {
        format!("{}.{}", metric_names::ANALYTICS_PREFIX, self.as_str())
    }
}

impl fmt::Display for AnalyticsAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
impl AnalyticsSink for MetricsRegistry {
    async fn record(&self, action: AnalyticsAction) -> Result<()> {
        self.inc_counter(&action.metric_name()).await;
        Ok(())
    }
}

/// Emit an analytics event, logging and dropping sink failures.
pub async fn emit(sink: &dyn AnalyticsSink, action: AnalyticsAction) {
    if let Err(e) = sink.record(action).await {
        tracing::warn!(action = %action, error = %e, "Analytics sink rejected event");
    }
}

/// Time an async operation and record its duration in milliseconds.
pub async fn timed_ms<F, T>(metrics: &MetricsRegistry, metric_name: &str, f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = Instant::now();
    let result = f.await;
    let elapsed = start.elapsed().as_secs_f64() * 1000.0;
    metrics.observe_histogram(metric_name, elapsed).await;
    result
}
