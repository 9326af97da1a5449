//! On-chain proofs and the source bundles they point to

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{CompilerKind, CompilerSettings, VerifierConfig, VerifierId, VerifierRegistry};

/// One file of a published source bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFile {
    Resolved {
        name: String,
        is_entrypoint: bool,
        content: String,
    },
    /// The file could not be fetched; `error` carries the gateway response text
    Missing {
        name: String,
        is_entrypoint: bool,
        error: String,
    },
}

impl SourceFile {
    pub fn name(&self) -> &str {
        match self {
            SourceFile::Resolved { name, .. } | SourceFile::Missing { name, .. } => name,
        }
    }

    pub fn is_entrypoint(&self) -> bool {
        match self {
            SourceFile::Resolved { is_entrypoint, .. } | SourceFile::Missing { is_entrypoint, .. } => {
                *is_entrypoint
            }
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, SourceFile::Missing { .. })
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            SourceFile::Resolved { content, .. } => Some(content),
            SourceFile::Missing { .. } => None,
        }
    }
}

/// Keep only files that were fetched successfully.
pub fn valid_sources(files: &[SourceFile]) -> impl Iterator<Item = &SourceFile> {
    files.iter().filter(|f| !f.is_missing())
}

/// Decoded source bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcesData {
    pub files: Vec<SourceFile>,
    pub compiler: CompilerKind,
    pub compiler_settings: Option<CompilerSettings>,
    pub verification_date: DateTime<Utc>,
    /// Gateway URL the bundle was actually served from
    pub ipfs_http_link: String,
}

/// `sources.json` document as stored in content-addressed storage.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedContractDocument {
    pub sources: Vec<SourceReference>,
    pub verification_date: VerificationDate,
    pub compiler: CompilerKind,
    #[serde(default)]
    pub compiler_settings: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReference {
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub is_entrypoint: bool,
}

/// Verification timestamp: epoch milliseconds or an RFC 3339 string.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum VerificationDate {
    Millis(i64),
    Text(String),
}

impl VerificationDate {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            VerificationDate::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            VerificationDate::Text(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|d| d.with_timezone(&Utc)),
        }
    }
}

/// Proof status of one contract for one verifier.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContractProof {
    pub verifier_id: VerifierId,
    pub has_onchain_proof: bool,
    pub files: Option<Vec<SourceFile>>,
    pub compiler: Option<CompilerKind>,
    pub compiler_settings: Option<CompilerSettings>,
    pub verification_date: Option<DateTime<Utc>>,
    pub ipfs_link: Option<String>,
    pub content_fingerprint: Option<String>,
}

impl ContractProof {
    /// No proof registered on-chain for this verifier.
    pub fn absent(verifier_id: VerifierId) -> Self {
        Self {
            verifier_id,
            ..Default::default()
        }
    }

    pub fn from_sources(verifier_id: VerifierId, link: &str, data: SourcesData) -> Self {
        Self {
            verifier_id,
            has_onchain_proof: true,
            files: Some(data.files),
            compiler: Some(data.compiler),
            compiler_settings: data.compiler_settings,
            verification_date: Some(data.verification_date),
            ipfs_link: Some(data.ipfs_http_link),
            content_fingerprint: Some(extract_ipfs_hash(link)),
        }
    }

    /// Grouping key for conflict detection.
    ///
    /// Falls back to `(verifier id, compiler)` when no content link is known.
    pub fn fingerprint(&self) -> String {
        match &self.content_fingerprint {
            Some(fp) => fp.clone(),
            None => format!(
                "{}:{}",
                self.verifier_id,
                self.compiler.map(|c| c.as_str()).unwrap_or("unknown")
            ),
        }
    }
}

/// Proofs of one contract keyed by verifier id.
pub type ContractProofMap = BTreeMap<VerifierId, ContractProof>;

pub fn has_any_onchain_proof(proofs: &ContractProofMap) -> bool {
    proofs.values().any(|p| p.has_onchain_proof)
}

/// Registry verifiers that have not published a proof for this contract yet.
pub fn missing_onchain_proofs<'a>(
    proofs: &ContractProofMap,
    registry: &'a VerifierRegistry,
) -> Vec<&'a VerifierConfig> {
    registry
        .verifiers
        .values()
        .filter(|v| !proofs.get(&v.id).map(|p| p.has_onchain_proof).unwrap_or(false))
        .collect()
}

pub fn find_proof_by_verifier_name<'a>(
    proofs: &'a ContractProofMap,
    registry: &VerifierRegistry,
    verifier_name: &str,
) -> Option<&'a ContractProof> {
    let config = registry.find_by_name(verifier_name)?;
    proofs.get(&config.id)
}

/// First proof that exists on-chain, otherwise the first entry at all.
pub fn first_available_proof(proofs: &ContractProofMap) -> Option<&ContractProof> {
    proofs
        .values()
        .find(|p| p.has_onchain_proof)
        .or_else(|| proofs.values().next())
}

/// Pull the content hash out of a gateway link, an `ipfs://` URI, or return the input.
pub fn extract_ipfs_hash(link: &str) -> String {
    for (idx, _) in link.match_indices("ipfs/") {
        let hash: String = link[idx + 5..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        if !hash.is_empty() {
            return hash;
        }
    }
    if let Some(rest) = link.strip_prefix("ipfs://") {
        return rest.to_string();
    }
    link.to_string()
}
