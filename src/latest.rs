//! Feed of recently verified contracts

use std::sync::Arc;

use tracing::debug;

use crate::config::BackendPools;
use crate::domain::{LatestVerified, DEFAULT_VERIFIER};
use crate::infra::{BackendSelector, PortalError, RandomSelector, Result, VerifierBackend};
use crate::metrics::{metric_names, MetricsRegistry};

/// Maximum number of feed entries returned.
pub const LATEST_LIMIT: usize = 100;

pub struct LatestFeed {
    backend: Arc<dyn VerifierBackend>,
    pools: Arc<BackendPools>,
    selector: Arc<dyn BackendSelector>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl LatestFeed {
    pub fn new(backend: Arc<dyn VerifierBackend>, pools: Arc<BackendPools>) -> Self {
        Self {
            backend,
            pools,
            selector: Arc::new(RandomSelector),
            metrics: None,
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn BackendSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Latest verified contracts from one backend of the default verifier.
    pub async fn load_latest_verified(&self) -> Result<Vec<LatestVerified>> {
        let pool = self
            .pools
            .get(DEFAULT_VERIFIER)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let backend = self
            .selector
            .choose(pool)
            .and_then(|idx| pool.get(idx))
            .ok_or_else(|| {
                PortalError::Configuration(format!("no backends configured for {DEFAULT_VERIFIER}"))
            })?;

        debug!(backend = %backend, "Loading latest verified contracts");
        let mut entries = self.backend.latest_verified(backend).await?;
        entries.truncate(LATEST_LIMIT);

        if let Some(metrics) = &self.metrics {
            metrics
                .set_gauge(metric_names::LATEST_ENTRIES, entries.len() as u64)
                .await;
        }
        Ok(entries)
    }
}
