//! Verifier registry resolution
//!
//! The sources registry contract names the verifier registry it trusts. The
//! verifier snapshot is cached per verifier registry address and re-read only
//! when that address changes or the cache is invalidated.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::{SourcesRegistryInfo, VerifierRegistry};
use crate::infra::{RegistryReader, Result};

pub struct RegistryResolver {
    reader: Arc<dyn RegistryReader>,
    sources_registry: String,
    info: RwLock<Option<SourcesRegistryInfo>>,
    snapshot: RwLock<Option<Arc<VerifierRegistry>>>,
}

impl RegistryResolver {
    pub fn new(reader: Arc<dyn RegistryReader>, sources_registry: impl Into<String>) -> Self {
        Self {
            reader,
            sources_registry: sources_registry.into(),
            info: RwLock::new(None),
            snapshot: RwLock::new(None),
        }
    }

    pub fn sources_registry(&self) -> &str {
        &self.sources_registry
    }

    /// Read the sources registry contract.
    pub async fn sources_registry_info(&self) -> Result<SourcesRegistryInfo> {
        let info = self.reader.sources_registry(&self.sources_registry).await?;
        *self.info.write().await = Some(info.clone());
        Ok(info)
    }

    /// Current verifier snapshot, read from chain when the address changed.
    pub async fn resolve(&self) -> Result<Arc<VerifierRegistry>> {
        let info = self.sources_registry_info().await?;

        if let Some(cached) = self.snapshot.read().await.as_ref() {
            if cached.address == info.verifier_registry {
                return Ok(cached.clone());
            }
        }

        let verifiers = self.reader.verifiers(&info.verifier_registry).await?;
        let registry = Arc::new(VerifierRegistry::new(
            info.verifier_registry.clone(),
            verifiers,
        ));
        info!(
            verifier_registry = %registry.address,
            verifiers = registry.len(),
            "Loaded verifier registry"
        );

        *self.snapshot.write().await = Some(registry.clone());
        Ok(registry)
    }

    /// Drop the cached snapshot; the next `resolve` re-reads it.
    pub async fn invalidate(&self) {
        debug!("Verifier registry cache invalidated");
        self.snapshot.write().await.take();
        self.info.write().await.take();
    }

    /// Whether `wallet` administers the sources registry and may override proofs.
    pub async fn is_admin(&self, wallet: &str) -> Result<bool> {
        let cached = self.info.read().await.clone();
        let info = match cached {
            Some(info) => info,
            None => self.sources_registry_info().await?,
        };
        Ok(info.admin.as_deref() == Some(wallet))
    }
}
