//! Loading published proofs and their source bundles

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    extract_ipfs_hash, CompilerSettings, ContractProof, ContractProofMap, SourceFile,
    SourcesData, VerifiedContractDocument, VerifierId, VerifierRegistry,
};
use crate::infra::{IpfsGateway, PortalError, ProofIndex, Result};
use crate::metrics::{metric_names, MetricsRegistry};

/// Stable-order files for display: reverse the bundle, then entrypoints first.
pub fn order_files(mut files: Vec<SourceFile>) -> Vec<SourceFile> {
    files.reverse();
    files.sort_by_key(|f| !f.is_entrypoint());
    files
}

/// One source file; a failed download becomes a `Missing` entry.
async fn source_file(
    gateway: &IpfsGateway,
    url: String,
    name: String,
    is_entrypoint: bool,
) -> SourceFile {
    let hash = extract_ipfs_hash(&url);
    match gateway.fetch_raw(&hash).await {
        Ok(response) if response.content.status < 400 => SourceFile::Resolved {
            name,
            is_entrypoint,
            content: response.content.text(),
        },
        Ok(response) => {
            debug!(file = %name, status = response.content.status, "Source file unavailable");
            SourceFile::Missing {
                name,
                is_entrypoint,
                error: response.content.text(),
            }
        }
        Err(e) => SourceFile::Missing {
            name,
            is_entrypoint,
            error: e.to_string(),
        },
    }
}

/// Download and decode the `sources.json` bundle behind `link`.
///
/// The bundle itself is fetched with retry; individual source files get a
/// single pass over the mirrors.
pub async fn fetch_sources_data(gateway: &IpfsGateway, link: &str) -> Result<SourcesData> {
    let hash = extract_ipfs_hash(link);
    let response = gateway.fetch(&hash).await?;
    let document: VerifiedContractDocument = serde_json::from_slice(&response.content.body)?;

    let verification_date = document
        .verification_date
        .to_datetime()
        .ok_or_else(|| PortalError::Decode(format!("invalid verification date in {hash}")))?;

    let compiler_settings =
        match CompilerSettings::from_parts(document.compiler, document.compiler_settings) {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!(hash = %hash, error = %e, "Unreadable compiler settings");
                None
            }
        };

    let files = join_all(
        document
            .sources
            .into_iter()
            .map(|source| source_file(gateway, source.url, source.filename, source.is_entrypoint)),
    )
    .await;

    Ok(SourcesData {
        files: order_files(files),
        compiler: document.compiler,
        compiler_settings,
        verification_date,
        ipfs_http_link: response.url,
    })
}

pub struct ProofLoader {
    index: Arc<dyn ProofIndex>,
    gateway: IpfsGateway,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl ProofLoader {
    pub fn new(index: Arc<dyn ProofIndex>, gateway: IpfsGateway) -> Self {
        Self {
            index,
            gateway,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Download and decode the `sources.json` bundle behind `link`.
    pub async fn sources_data(&self, link: &str) -> Result<SourcesData> {
        fetch_sources_data(&self.gateway, link).await
    }

    /// Proof of one verifier for a code hash.
    #[instrument(skip(self), fields(verifier = %verifier))]
    pub async fn load_proof(
        &self,
        code_hash: &str,
        verifier: &VerifierId,
    ) -> Result<ContractProof> {
        let Some(link) = self.index.source_item_url(code_hash, verifier).await? else {
            debug!("No on-chain proof");
            return Ok(ContractProof::absent(verifier.clone()));
        };

        let data = self.sources_data(&link).await?;
        if let Some(metrics) = &self.metrics {
            metrics.inc_counter(metric_names::PROOFS_LOADED).await;
        }
        Ok(ContractProof::from_sources(verifier.clone(), &link, data))
    }

    /// Proofs of every registry verifier, loaded concurrently.
    ///
    /// Fails when any single verifier fails to load.
    pub async fn load_all(
        &self,
        code_hash: &str,
        registry: &VerifierRegistry,
    ) -> Result<ContractProofMap> {
        let loaded = join_all(
            registry
                .verifiers
                .keys()
                .map(|id| async move { (id.clone(), self.load_proof(code_hash, id).await) }),
        )
        .await;

        let mut proofs = ContractProofMap::new();
        for (id, proof) in loaded {
            proofs.insert(id, proof?);
        }
        info!(
            verifiers = proofs.len(),
            onchain = proofs.values().filter(|p| p.has_onchain_proof).count(),
            "Loaded contract proofs"
        );
        Ok(proofs)
    }
}
