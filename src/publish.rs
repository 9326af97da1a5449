//! Publishing signed proofs to the verifier registry contract
//!
//! Every ready submission entry (signed message present) of the current
//! contract that the caller selected becomes one message to the verifier
//! registry. The batch goes through the transaction monitor under
//! [`PUBLISH_FLOW`]; the round succeeds once the proof index knows a source
//! item for every published verifier.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::config::{DEFAULT_PUBLISH_VALUE, MAX_POLL_ATTEMPTS};
use crate::domain::{ContractContext, OutgoingMessage, TxnStatus, VerifierId, VerifierRegistry};
use crate::infra::{AnalyticsSink, PortalError, ProofIndex, Result};
use crate::metrics::{emit, AnalyticsAction};
use crate::monitor::TransactionMonitor;
use crate::submission::SubmissionStore;

/// Monitor key of the publish flow.
pub const PUBLISH_FLOW: &str = "publishProof";

/// Analytics event for a publish status change.
pub fn publish_action(status: TxnStatus) -> Option<AnalyticsAction> {
    match status {
        TxnStatus::Pending => Some(AnalyticsAction::PublishClick),
        TxnStatus::Issued => Some(AnalyticsAction::TransactionIssued),
        TxnStatus::Rejected => Some(AnalyticsAction::TransactionRejected),
        TxnStatus::Error => Some(AnalyticsAction::TransactionError),
        TxnStatus::Expired => Some(AnalyticsAction::TransactionExpired),
        TxnStatus::Success => Some(AnalyticsAction::ContractDeployed),
        TxnStatus::Initial => None,
    }
}

#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub contract: ContractContext,
    /// Verifier names the user ticked
    pub selected: Vec<String>,
    pub registry: Arc<VerifierRegistry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// No selected verifier had a signed message
    NothingToPublish,
    /// Status of the publish flow right after the signer answered
    Sent(TxnStatus),
}

/// Publish round outcome predicate.
///
/// Kept separate from the engine so the poll task owns only what it needs.
#[derive(Clone)]
struct ProofCheck {
    index: Arc<dyn ProofIndex>,
    in_flight: Arc<RwLock<Vec<VerifierId>>>,
    code_hash: Option<String>,
    max_attempts: u32,
}

impl ProofCheck {
    async fn status(&self, attempt: u32) -> TxnStatus {
        let Some(code_hash) = self.code_hash.as_deref() else {
            return TxnStatus::Error;
        };

        let in_flight = self.in_flight.read().await.clone();
        if in_flight.is_empty() {
            return TxnStatus::Initial;
        }
        if attempt > self.max_attempts {
            return TxnStatus::Error;
        }

        for verifier in &in_flight {
            match self.index.source_item_url(code_hash, verifier).await {
                Ok(Some(_)) => {}
                Ok(None) => return TxnStatus::Issued,
                Err(e) => {
                    debug!(verifier = %verifier, error = %e, "Proof lookup failed, still waiting");
                    return TxnStatus::Issued;
                }
            }
        }
        TxnStatus::Success
    }
}

pub struct PublishEngine {
    monitor: TransactionMonitor,
    store: Arc<SubmissionStore>,
    index: Arc<dyn ProofIndex>,
    analytics: Arc<dyn AnalyticsSink>,
    value: u128,
    max_attempts: u32,
    in_flight: Arc<RwLock<Vec<VerifierId>>>,
}

impl PublishEngine {
    pub fn new(
        monitor: TransactionMonitor,
        store: Arc<SubmissionStore>,
        index: Arc<dyn ProofIndex>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        Self {
            monitor,
            store,
            index,
            analytics,
            value: DEFAULT_PUBLISH_VALUE,
            max_attempts: MAX_POLL_ATTEMPTS,
            in_flight: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Nano amount attached to every publish message.
    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub async fn status(&self) -> TxnStatus {
        self.monitor.status(PUBLISH_FLOW).await
    }

    /// Verifiers of the current publish round.
    pub async fn in_flight(&self) -> Vec<VerifierId> {
        self.in_flight.read().await.clone()
    }

    /// Build one message per ready, selected verifier; repeated names count once.
    async fn ready_messages(
        &self,
        request: &PublishRequest,
    ) -> Result<(Vec<VerifierId>, Vec<OutgoingMessage>)> {
        let entries = self.store.entries_for(&request.contract.address).await;
        let mut ids = Vec::new();
        let mut messages = Vec::new();

        for name in &request.selected {
            let Some(payload) = entries.get(name).and_then(|e| e.signed_message()) else {
                continue;
            };
            let config = request
                .registry
                .find_by_name(name)
                .ok_or_else(|| PortalError::UnknownVerifier(name.clone()))?;
            if ids.contains(&config.id) {
                continue;
            }

            ids.push(config.id.clone());
            messages.push(
                OutgoingMessage::new(request.registry.address.clone(), self.value)
                    .with_payload(payload.to_vec()),
            );
        }

        Ok((ids, messages))
    }

    #[instrument(skip(self, request), fields(contract = %request.contract.address))]
    pub async fn publish(&self, request: PublishRequest) -> Result<PublishOutcome> {
        let (ids, messages) = self.ready_messages(&request).await?;
        if messages.is_empty() {
            debug!("No signed proofs selected");
            return Ok(PublishOutcome::NothingToPublish);
        }

        info!(verifiers = ids.len(), "Publishing proofs");
        *self.in_flight.write().await = ids;
        emit(self.analytics.as_ref(), AnalyticsAction::PublishClick).await;

        let check = ProofCheck {
            index: self.index.clone(),
            in_flight: self.in_flight.clone(),
            code_hash: request.contract.code_hash.clone(),
            max_attempts: self.max_attempts,
        };

        let sent = self
            .monitor
            .send(PUBLISH_FLOW, messages, move |attempt| {
                let check = check.clone();
                async move { check.status(attempt).await }
            })
            .await;

        let status = match sent {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Publish transaction failed");
                emit(self.analytics.as_ref(), AnalyticsAction::TransactionRejected).await;
                return Err(e);
            }
        };

        if let Some(action) = publish_action(status) {
            emit(self.analytics.as_ref(), action).await;
        }

        if status == TxnStatus::Issued {
            let monitor = self.monitor.clone();
            let analytics = self.analytics.clone();
            tokio::spawn(async move {
                if let Some(action) = monitor.settled(PUBLISH_FLOW).await.and_then(publish_action) {
                    emit(analytics.as_ref(), action).await;
                }
            });
        }

        Ok(PublishOutcome::Sent(status))
    }

    /// Forget the in-flight list and reset the publish flow.
    pub async fn clear(&self) {
        self.in_flight.write().await.clear();
        self.monitor.clear(PUBLISH_FLOW).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::MockProofIndex;

    fn check(index: MockProofIndex, in_flight: Vec<VerifierId>, code_hash: Option<&str>) -> ProofCheck {
        ProofCheck {
            index: Arc::new(index),
            in_flight: Arc::new(RwLock::new(in_flight)),
            code_hash: code_hash.map(str::to_string),
            max_attempts: MAX_POLL_ATTEMPTS,
        }
    }

    #[tokio::test]
    async fn test_check_without_code_hash_is_error() {
        let check = check(MockProofIndex::new(), vec![VerifierId::from("a")], None);
        assert_eq!(check.status(1).await, TxnStatus::Error);
    }

    #[tokio::test]
    async fn test_check_with_empty_in_flight_is_initial() {
        let check = check(MockProofIndex::new(), vec![], Some("hash"));
        assert_eq!(check.status(1).await, TxnStatus::Initial);
    }

    #[tokio::test]
    async fn test_check_gives_up_after_max_attempts() {
        let mut index = MockProofIndex::new();
        index.expect_source_item_url().never();
        let check = check(index, vec![VerifierId::from("a")], Some("hash"));
        assert_eq!(check.status(MAX_POLL_ATTEMPTS + 1).await, TxnStatus::Error);
    }

    #[tokio::test]
    async fn test_check_waits_for_every_verifier() {
        let mut index = MockProofIndex::new();
        index
            .expect_source_item_url()
            .returning(|_, v| Ok((v.as_str() == "a").then(|| "https://ipfs/x".to_string())));
        let partial = check(
            index,
            vec![VerifierId::from("a"), VerifierId::from("b")],
            Some("hash"),
        );
        assert_eq!(partial.status(3).await, TxnStatus::Issued);

        let mut index = MockProofIndex::new();
        index
            .expect_source_item_url()
            .returning(|_, _| Ok(Some("https://ipfs/x".to_string())));
        let complete = check(
            index,
            vec![VerifierId::from("a"), VerifierId::from("b")],
            Some("hash"),
        );
        assert_eq!(complete.status(3).await, TxnStatus::Success);
    }

    #[test]
    fn test_publish_actions() {
        assert_eq!(publish_action(TxnStatus::Initial), None);
        assert_eq!(
            publish_action(TxnStatus::Success),
            Some(AnalyticsAction::ContractDeployed)
        );
        assert_eq!(
            publish_action(TxnStatus::Expired),
            Some(AnalyticsAction::TransactionExpired)
        );
    }
}
