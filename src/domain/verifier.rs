//! Verifier registry types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::VerifierId;

/// Public configuration of one verifier, as stored in the verifier registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifierConfig {
    pub id: VerifierId,
    pub name: String,
    pub url: String,
    pub admin: String,
    /// Number of distinct signer endpoints required to finalize a proof
    pub quorum: usize,
    /// Signer public key → endpoint name
    pub pub_key_endpoints: BTreeMap<String, String>,
}

/// Snapshot of the verifier registry contract at one address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VerifierRegistry {
    pub address: String,
    pub verifiers: BTreeMap<VerifierId, VerifierConfig>,
}

impl VerifierRegistry {
    pub fn new(address: impl Into<String>, verifiers: Vec<VerifierConfig>) -> Self {
        Self {
            address: address.into(),
            verifiers: verifiers.into_iter().map(|v| (v.id.clone(), v)).collect(),
        }
    }

    pub fn get(&self, id: &VerifierId) -> Option<&VerifierConfig> {
        self.verifiers.get(id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&VerifierConfig> {
        self.verifiers.values().find(|v| v.name == name)
    }

    pub fn len(&self) -> usize {
        self.verifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verifiers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VerifierId, &VerifierConfig)> {
        self.verifiers.iter()
    }
}

/// Sources registry contract state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcesRegistryInfo {
    pub address: String,
    pub admin: Option<String>,
    /// Address of the verifier registry this sources registry trusts
    pub verifier_registry: String,
    /// Base64 hash of the sources registry code cell
    pub code_cell_hash: String,
    /// Nano amounts charged for source item deployment, if exposed
    pub deployment_costs: Option<DeploymentCosts>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentCosts {
    pub min_ton: u128,
    pub max_ton: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str, quorum: usize) -> VerifierConfig {
        VerifierConfig {
            id: VerifierId::from_name(name),
            name: name.to_string(),
            url: format!("https://{name}"),
            admin: "EQadmin".to_string(),
            quorum,
            pub_key_endpoints: BTreeMap::new(),
        }
    }

    #[test]
    fn test_find_by_name() {
        let registry = VerifierRegistry::new(
            "EQregistry",
            vec![config("verifier.ton.org", 1), config("orbs.com", 3)],
        );

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.find_by_name("orbs.com").unwrap().quorum, 3);
        assert!(registry.find_by_name("nope").is_none());
        assert!(registry
            .get(&VerifierId::from_name("verifier.ton.org"))
            .is_some());
    }
}
