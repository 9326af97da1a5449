//! Trait definitions for the portal's external collaborators

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::{
    ContractState, LatestVerified, OutgoingMessage, SignerOutcome, SourceUpload,
    SourcesRegistryInfo, SubmissionManifest, VerifierConfig, VerifierId, VerifyResponse,
};
use crate::metrics::AnalyticsAction;

use super::Result;

/// HTTP surface of a verifier backend.
///
/// Non-200 answers are errors: `/source` maps to `PortalError::CompileServer`,
/// `/sign` to `PortalError::SignServer`. Implementations never retry.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VerifierBackend: Send + Sync {
    /// `POST {backend}/source` with the file set and the manifest
    async fn submit_source(
        &self,
        backend: &str,
        manifest: &SubmissionManifest,
        files: &[SourceUpload],
    ) -> Result<VerifyResponse>;

    /// `POST {backend}/sign`, returns the countersigned cell
    async fn sign(&self, backend: &str, message_cell: &[u8]) -> Result<Vec<u8>>;

    /// `GET {backend}/latestVerified`
    async fn latest_verified(&self, backend: &str) -> Result<Vec<LatestVerified>>;
}

/// Wallet connection that signs and broadcasts messages.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Ask the wallet to send `messages`; the request is void after `valid_until_ms`
    async fn send_transaction(
        &self,
        messages: Vec<OutgoingMessage>,
        valid_until_ms: i64,
    ) -> Result<SignerOutcome>;
}

/// Read-only blockchain access.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn contract_state(&self, address: &str) -> Result<ContractState>;

    /// Balance in nano units
    async fn balance(&self, address: &str) -> Result<u128>;
}

/// Lookup of published proofs in the sources registry.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProofIndex: Send + Sync {
    /// URL of the `sources.json` bundle a verifier registered for `code_hash`,
    /// `None` when no source item exists
    async fn source_item_url(&self, code_hash: &str, verifier: &VerifierId)
        -> Result<Option<String>>;
}

/// Reads registry contracts.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RegistryReader: Send + Sync {
    async fn sources_registry(&self, address: &str) -> Result<SourcesRegistryInfo>;

    async fn verifiers(&self, verifier_registry: &str) -> Result<Vec<VerifierConfig>>;
}

/// Raw response from one content gateway mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchedContent {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Plain GET against a content gateway mirror.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchedContent>;
}

/// Picks one backend out of a candidate list.
#[cfg_attr(test, automock)]
pub trait BackendSelector: Send + Sync {
    /// Index into `candidates`, `None` when the list is empty
    fn choose(&self, candidates: &[String]) -> Option<usize>;
}

/// Uniform random selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelector;

impl BackendSelector for RandomSelector {
    fn choose(&self, candidates: &[String]) -> Option<usize> {
        use rand::Rng;

        if candidates.is_empty() {
            return None;
        }
        Some(rand::thread_rng().gen_range(0..candidates.len()))
    }
}

/// Destination for product analytics events.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn record(&self, action: AnalyticsAction) -> Result<()>;
}
