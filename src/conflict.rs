//! Cross-verifier proof conflict detection
//!
//! Proofs that exist on-chain are grouped by content fingerprint. The most
//! common fingerprint is canonical; when several fingerprints share the top
//! count there is no canonical one and every proof is suspect.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{CompilerKind, ContractProofMap, VerifierId};

/// One display row per verifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRow {
    pub verifier_id: VerifierId,
    pub has_onchain_proof: bool,
    pub fingerprint: Option<String>,
    pub compiler: Option<CompilerKind>,
    pub verification_date: Option<DateTime<Utc>>,
    pub is_conflicting: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub rows: Vec<ConflictRow>,
    pub has_conflicts: bool,
}

impl ConflictReport {
    pub fn conflicting(&self) -> impl Iterator<Item = &ConflictRow> {
        self.rows.iter().filter(|r| r.is_conflicting)
    }
}

/// Canonical fingerprint of a tally, `None` when the top count is shared.
fn canonical<'a>(tally: &HashMap<&'a str, usize>) -> Option<&'a str> {
    let top = tally.values().copied().max()?;
    let mut leaders = tally.iter().filter(|(_, count)| **count == top);
    let (fingerprint, _) = leaders.next()?;
    match leaders.next() {
        Some(_) => None,
        None => Some(fingerprint),
    }
}

/// Flag verifiers whose published proof disagrees with the majority.
///
/// Rows follow the map order, which is registry id order.
pub fn detect_conflicts(proofs: &ContractProofMap) -> ConflictReport {
    let fingerprints: Vec<Option<String>> = proofs
        .values()
        .map(|p| p.has_onchain_proof.then(|| p.fingerprint()))
        .collect();

    let mut tally: HashMap<&str, usize> = HashMap::new();
    for fp in fingerprints.iter().flatten() {
        *tally.entry(fp.as_str()).or_default() += 1;
    }

    let diverged = tally.len() > 1;
    let canonical = canonical(&tally);

    let rows: Vec<ConflictRow> = proofs
        .values()
        .zip(fingerprints.iter())
        .map(|(proof, fp)| {
            let is_conflicting = match fp {
                Some(fp) if diverged => canonical.map(|c| c != fp).unwrap_or(true),
                _ => false,
            };
            ConflictRow {
                verifier_id: proof.verifier_id.clone(),
                has_onchain_proof: proof.has_onchain_proof,
                fingerprint: fp.clone(),
                compiler: proof.compiler,
                verification_date: proof.verification_date,
                is_conflicting,
            }
        })
        .collect();

    let has_conflicts = rows.iter().any(|r| r.is_conflicting);
    ConflictReport {
        rows,
        has_conflicts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ContractProof;

    fn proof(id: &str, fingerprint: Option<&str>) -> (VerifierId, ContractProof) {
        let id = VerifierId::from(id);
        let proof = match fingerprint {
            Some(fp) => ContractProof {
                verifier_id: id.clone(),
                has_onchain_proof: true,
                content_fingerprint: Some(fp.to_string()),
                compiler: Some(CompilerKind::Func),
                ..Default::default()
            },
            None => ContractProof::absent(id.clone()),
        };
        (id, proof)
    }

    fn flagged(report: &ConflictReport) -> Vec<&str> {
        report.conflicting().map(|r| r.verifier_id.as_str()).collect()
    }

    #[test]
    fn test_minority_is_flagged() {
        let proofs: ContractProofMap = [
            proof("a", Some("fp1")),
            proof("b", Some("fp1")),
            proof("c", Some("fp2")),
        ]
        .into_iter()
        .collect();

        let report = detect_conflicts(&proofs);
        assert!(report.has_conflicts);
        assert_eq!(flagged(&report), vec!["c"]);
    }

    #[test]
    fn test_tie_flags_all_tied() {
        let proofs: ContractProofMap = [proof("a", Some("fp1")), proof("b", Some("fp2"))]
            .into_iter()
            .collect();

        let report = detect_conflicts(&proofs);
        assert!(report.has_conflicts);
        assert_eq!(flagged(&report), vec!["a", "b"]);
    }

    #[test]
    fn test_single_proof_never_conflicts() {
        let proofs: ContractProofMap = [proof("a", Some("fp1")), proof("b", None)]
            .into_iter()
            .collect();

        let report = detect_conflicts(&proofs);
        assert!(!report.has_conflicts);
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[1].fingerprint, None);
    }

    #[test]
    fn test_fallback_fingerprint_uses_compiler() {
        let (id_a, mut a) = proof("a", Some("unused"));
        a.content_fingerprint = None;
        let (id_b, mut b) = proof("b", Some("unused"));
        b.content_fingerprint = None;

        let proofs: ContractProofMap = [(id_a, a), (id_b, b)].into_iter().collect();
        let report = detect_conflicts(&proofs);

        // fallback keys differ per verifier id, so two proofs tie
        assert_eq!(report.rows[0].fingerprint.as_deref(), Some("a:func"));
        assert!(report.has_conflicts);
    }
}
