//! Contract deployment through the transaction monitor

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::config::MAX_POLL_ATTEMPTS;
use crate::domain::{OutgoingMessage, TxnStatus};
use crate::infra::{AnalyticsSink, ChainReader, Result};
use crate::metrics::{emit, AnalyticsAction};
use crate::monitor::TransactionMonitor;

/// Monitor key of the deploy flow.
pub const DEPLOY_FLOW: &str = "deployContract";

pub struct DeployEngine {
    monitor: TransactionMonitor,
    chain: Arc<dyn ChainReader>,
    analytics: Arc<dyn AnalyticsSink>,
    max_attempts: u32,
}

impl DeployEngine {
    pub fn new(
        monitor: TransactionMonitor,
        chain: Arc<dyn ChainReader>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        Self {
            monitor,
            chain,
            analytics,
            max_attempts: MAX_POLL_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub async fn status(&self) -> TxnStatus {
        self.monitor.status(DEPLOY_FLOW).await
    }

    /// Send `state_init` to `address` and wait for the account to become active.
    #[instrument(skip(self, state_init), fields(contract = %address))]
    pub async fn deploy(
        &self,
        address: &str,
        state_init: Vec<u8>,
        value: u128,
    ) -> Result<TxnStatus> {
        let message = OutgoingMessage::new(address, value).with_state_init(state_init);
        let chain = self.chain.clone();
        let target = address.to_string();
        let max_attempts = self.max_attempts;

        let status = self
            .monitor
            .send(DEPLOY_FLOW, vec![message], move |attempt| {
                let chain = chain.clone();
                let target = target.clone();
                async move {
                    if attempt > max_attempts {
                        return TxnStatus::Error;
                    }
                    match chain.contract_state(&target).await {
                        Ok(state) if state.is_deployed() => TxnStatus::Success,
                        Ok(_) => TxnStatus::Issued,
                        Err(e) => {
                            debug!(error = %e, "Chain read failed, still waiting");
                            TxnStatus::Issued
                        }
                    }
                }
            })
            .await?;

        info!(status = %status, "Deploy transaction sent");

        if status == TxnStatus::Issued {
            let monitor = self.monitor.clone();
            let analytics = self.analytics.clone();
            tokio::spawn(async move {
                if monitor.settled(DEPLOY_FLOW).await == Some(TxnStatus::Success) {
                    emit(analytics.as_ref(), AnalyticsAction::ContractDeployed).await;
                }
            });
        }

        Ok(status)
    }

    pub async fn clear(&self) {
        self.monitor.clear(DEPLOY_FLOW).await;
    }
}
