//! Keyed transaction lifecycle monitor
//!
//! One record per flow key (`"publishProof"`, `"deployContract"`, ...):
//!
//! ```text
//! initial ─send─▶ pending ─signer─▶ issued ─poll─▶ success | error | expired
//!                        └────────▶ rejected
//! ```
//!
//! While a record is `issued` a background task calls the caller's predicate
//! every poll interval. The monitor never caps attempts itself; predicates
//! return a terminal status when they give up. `clear` and a new `send` bump
//! the record generation, which orphans any poll task still running.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{POLL_INTERVAL, TX_VALIDITY};
use crate::domain::{OutgoingMessage, SignerOutcome, TxnStatus};
use crate::infra::{PortalError, Result, TransactionSigner};
use crate::metrics::{metric_names, MetricsRegistry};

struct Flow {
    generation: u64,
    status: watch::Sender<TxnStatus>,
}

impl Flow {
    fn new(generation: u64) -> Self {
        let (status, _) = watch::channel(TxnStatus::Initial);
        Self { generation, status }
    }
}

struct Inner {
    signer: Arc<dyn TransactionSigner>,
    flows: RwLock<HashMap<String, Flow>>,
    next_generation: AtomicU64,
    poll_interval: Duration,
    tx_validity: Duration,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl Inner {
    fn bump(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Start a new generation for `key` and move it to `status`.
    async fn restart(&self, key: &str, status: TxnStatus) -> u64 {
        let generation = self.bump();
        let mut flows = self.flows.write().await;
        let flow = flows
            .entry(key.to_string())
            .or_insert_with(|| Flow::new(generation));
        flow.generation = generation;
        flow.status.send_replace(status);
        generation
    }

    /// Write `status` only if `generation` still owns the record.
    async fn set_if_current(&self, key: &str, generation: u64, status: TxnStatus) -> bool {
        let flows = self.flows.read().await;
        match flows.get(key) {
            Some(flow) if flow.generation == generation => {
                flow.status.send_replace(status);
                true
            }
            _ => false,
        }
    }

    async fn is_current(&self, key: &str, generation: u64) -> bool {
        self.flows
            .read()
            .await
            .get(key)
            .map(|flow| flow.generation == generation)
            .unwrap_or(false)
    }
}

/// Shared handle to the monitor; clones see the same records.
#[derive(Clone)]
pub struct TransactionMonitor {
    inner: Arc<Inner>,
}

impl TransactionMonitor {
    pub fn new(signer: Arc<dyn TransactionSigner>) -> Self {
        Self::with_timing(signer, POLL_INTERVAL, TX_VALIDITY)
    }

    pub fn with_timing(
        signer: Arc<dyn TransactionSigner>,
        poll_interval: Duration,
        tx_validity: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                signer,
                flows: RwLock::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                poll_interval,
                tx_validity,
                metrics: None,
            }),
        }
    }

    /// Attach a metrics registry. Must be called before the handle is cloned.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.metrics = Some(metrics),
            None => warn!("Monitor handle already shared, metrics not attached"),
        }
        self
    }

    /// Current status, `initial` for unknown keys.
    pub async fn status(&self, key: &str) -> TxnStatus {
        self.inner
            .flows
            .read()
            .await
            .get(key)
            .map(|flow| *flow.status.borrow())
            .unwrap_or_default()
    }

    /// Watch status changes of one flow.
    pub async fn subscribe(&self, key: &str) -> watch::Receiver<TxnStatus> {
        let mut flows = self.inner.flows.write().await;
        if let Some(flow) = flows.get(key) {
            return flow.status.subscribe();
        }
        let generation = self.inner.bump();
        flows
            .entry(key.to_string())
            .or_insert_with(|| Flow::new(generation))
            .status
            .subscribe()
    }

    /// Wait for the current round of `key` to leave `issued`.
    ///
    /// Returns `None` when the round is cleared or superseded first.
    pub async fn settled(&self, key: &str) -> Option<TxnStatus> {
        let mut rx = self.subscribe(key).await;
        loop {
            let status = *rx.borrow_and_update();
            match status {
                TxnStatus::Issued => {}
                TxnStatus::Initial | TxnStatus::Pending => return None,
                terminal => return Some(terminal),
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Reset the flow to `initial`; any running poll task is orphaned.
    pub async fn clear(&self, key: &str) {
        self.inner.restart(key, TxnStatus::Initial).await;
        debug!(flow = key, "Transaction flow cleared");
    }

    /// Hand `messages` to the signer and, once issued, poll `check_success`.
    ///
    /// `check_success` receives the attempt number starting at 1 and returns
    /// the next status; polling stops at the first non-`issued` answer. An
    /// empty message list is a no-op returning the current status.
    pub async fn send<F, Fut>(
        &self,
        key: &str,
        messages: Vec<OutgoingMessage>,
        check_success: F,
    ) -> Result<TxnStatus>
    where
        F: Fn(u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TxnStatus> + Send + 'static,
    {
        if messages.is_empty() {
            return Ok(self.status(key).await);
        }

        let generation = self.inner.restart(key, TxnStatus::Pending).await;
        if let Some(metrics) = &self.inner.metrics {
            metrics.inc_counter(metric_names::TXN_SENT).await;
        }

        let validity = chrono::Duration::from_std(self.inner.tx_validity)
            .map_err(|e| PortalError::Configuration(format!("transaction validity: {e}")))?;
        let valid_until = chrono::Utc::now() + validity;
        info!(flow = key, messages = messages.len(), "Requesting wallet signature");

        let outcome = self
            .inner
            .signer
            .send_transaction(messages, valid_until.timestamp_millis())
            .await;

        let status = match outcome {
            Ok(SignerOutcome::Issued) => TxnStatus::Issued,
            Ok(SignerOutcome::Rejected) => TxnStatus::Rejected,
            Err(e) => {
                warn!(flow = key, error = %e, "Signer failed, treating as rejected");
                self.inner
                    .set_if_current(key, generation, TxnStatus::Rejected)
                    .await;
                return Err(e);
            }
        };

        if !self.inner.set_if_current(key, generation, status).await {
            debug!(flow = key, "Flow reset while waiting for the wallet");
            return Ok(self.status(key).await);
        }

        if status == TxnStatus::Issued {
            self.spawn_poller(key.to_string(), generation, check_success);
        }

        Ok(status)
    }

    fn spawn_poller<F, Fut>(&self, key: String, generation: u64, check_success: F)
    where
        F: Fn(u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TxnStatus> + Send + 'static,
    {
        let inner = self.inner.clone();
        let period = inner.poll_interval;

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut attempt: u32 = 1;

            loop {
                ticker.tick().await;
                if !inner.is_current(&key, generation).await {
                    debug!(flow = %key, "Poller orphaned");
                    break;
                }

                let next = check_success(attempt).await;
                if let Some(metrics) = &inner.metrics {
                    metrics.inc_counter(metric_names::TXN_POLLS).await;
                }
                attempt += 1;

                if !inner.set_if_current(&key, generation, next).await {
                    break;
                }
                if next != TxnStatus::Issued {
                    info!(flow = %key, status = %next, attempts = attempt - 1, "Transaction settled");
                    break;
                }
            }
        });
    }
}
