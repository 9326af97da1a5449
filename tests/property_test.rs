//! Property-based tests using proptest.
//!
//! These tests verify invariants that should hold for any valid input.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;

use common::*;
use verifier_portal::conflict::detect_conflicts;
use verifier_portal::domain::{
    extract_ipfs_hash, ContractProof, ContractProofMap, VerifierId, DEFAULT_VERIFIER,
};
use verifier_portal::infra::{boc, PortalError};
use verifier_portal::submission::{normalize_targets, SubmissionEngine};

// ============================================================================
// Custom Strategies
// ============================================================================

/// Per-verifier proof: `None` means no on-chain proof, otherwise a fingerprint
/// drawn from a small alphabet so collisions are common.
fn arb_proofs() -> impl Strategy<Value = ContractProofMap> {
    prop::collection::btree_map(
        "[a-z]{1,8}",
        prop::option::of(prop_oneof![Just("QmA"), Just("QmB"), Just("QmC")]),
        0..8,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(name, fp)| {
                let id = VerifierId::from_name(&name);
                let proof = match fp {
                    Some(fp) => ContractProof {
                        verifier_id: id.clone(),
                        has_onchain_proof: true,
                        content_fingerprint: Some(fp.to_string()),
                        ..Default::default()
                    },
                    None => ContractProof::absent(id.clone()),
                };
                (id, proof)
            })
            .collect()
    })
}

fn tally(proofs: &ContractProofMap) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for proof in proofs.values().filter(|p| p.has_onchain_proof) {
        *counts.entry(proof.fingerprint()).or_insert(0) += 1;
    }
    counts
}

// ============================================================================
// Conflict Detection Properties
// ============================================================================

proptest! {
    /// Fewer than two on-chain proofs never conflict
    #[test]
    fn prop_single_proof_never_conflicts(proofs in arb_proofs()) {
        let onchain = proofs.values().filter(|p| p.has_onchain_proof).count();
        let report = detect_conflicts(&proofs);
        if onchain < 2 {
            prop_assert!(!report.has_conflicts);
        }
    }

    /// Agreement means no flags
    #[test]
    fn prop_single_fingerprint_never_conflicts(proofs in arb_proofs()) {
        let report = detect_conflicts(&proofs);
        if tally(&proofs).len() <= 1 {
            prop_assert!(!report.has_conflicts);
        }
    }

    /// Verifiers without a proof are never flagged
    #[test]
    fn prop_absent_proofs_never_flagged(proofs in arb_proofs()) {
        let report = detect_conflicts(&proofs);
        for row in &report.rows {
            if !row.has_onchain_proof {
                prop_assert!(!row.is_conflicting);
            }
        }
    }

    /// A unique majority is never flagged; everyone else is
    #[test]
    fn prop_unique_majority_wins(proofs in arb_proofs()) {
        let counts = tally(&proofs);
        let report = detect_conflicts(&proofs);
        let top = counts.values().copied().max().unwrap_or(0);
        let leaders: Vec<&String> = counts.iter().filter(|(_, c)| **c == top).map(|(f, _)| f).collect();

        if counts.len() > 1 {
            for row in report.rows.iter().filter(|r| r.has_onchain_proof) {
                let fp = row.fingerprint.as_ref().unwrap();
                let expected = leaders.len() > 1 || !leaders.contains(&fp);
                prop_assert_eq!(row.is_conflicting, expected);
            }
        }
    }

    /// One row per verifier, in map order, and the summary flag matches the rows
    #[test]
    fn prop_rows_follow_registry_order(proofs in arb_proofs()) {
        let report = detect_conflicts(&proofs);
        let ids: Vec<&VerifierId> = report.rows.iter().map(|r| &r.verifier_id).collect();
        let expected: Vec<&VerifierId> = proofs.keys().collect();
        prop_assert_eq!(ids, expected);
        prop_assert_eq!(report.has_conflicts, report.rows.iter().any(|r| r.is_conflicting));
    }
}

// ============================================================================
// Payload Properties
// ============================================================================

proptest! {
    /// The query id is the leading 64 bits of the root cell
    #[test]
    fn prop_query_id_is_leading_u64(query_id in any::<u64>(), tail in prop::collection::vec(any::<u8>(), 0..100)) {
        let mut data = query_id.to_be_bytes().to_vec();
        data.extend_from_slice(&tail);
        let cell = boc::encode_single_cell(&data);
        prop_assert_eq!(boc::read_query_id(&cell).unwrap(), query_id);
    }

    /// Content links of every accepted shape resolve to the bare hash
    #[test]
    fn prop_ipfs_hash_extraction(hash in "Qm[a-zA-Z0-9]{10,46}") {
        prop_assert_eq!(extract_ipfs_hash(&format!("ipfs://{hash}")), hash.clone());
        prop_assert_eq!(extract_ipfs_hash(&format!("https://ipfs.ton.org/ipfs/{hash}")), hash.clone());
        prop_assert_eq!(extract_ipfs_hash(&hash), hash);
    }
}

// ============================================================================
// Quorum Properties
// ============================================================================

type RoundSigners = verifier_portal::infra::Result<Vec<String>>;

fn run_round(pool_size: usize, quorum: usize) -> (Vec<String>, RoundSigners) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        let backend = Arc::new(FakeBackend::similar(5));
        let urls: Vec<String> = (0..pool_size).map(|i| format!("https://q{i}")).collect();
        let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let engine = SubmissionEngine::new(
            backend.clone(),
            pools(&[("quorum.test", url_refs.as_slice())]),
            Arc::new(RecordingSink::default()),
        )
        .with_selector(Arc::new(FirstSelector));

        let mut outcome = engine
            .submit(submit_request(&["quorum.test"], registry(&[("quorum.test", quorum)])))
            .await;
        let result = outcome
            .remove("quorum.test")
            .unwrap()
            .map(|result| result.signers);
        (backend.sign_calls(), result)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// A round succeeds iff the pool can cover the quorum, and never reuses a backend
    #[test]
    fn prop_quorum_needs_distinct_backends(pool_size in 1usize..6, quorum in 1usize..6) {
        let (sign_calls, result) = run_round(pool_size, quorum);

        let mut distinct = sign_calls.clone();
        distinct.sort();
        distinct.dedup();
        prop_assert_eq!(distinct.len(), sign_calls.len());
        prop_assert!(!sign_calls.contains(&"https://q0".to_string()));

        if pool_size >= quorum {
            let signers = result.unwrap();
            prop_assert_eq!(signers.len(), quorum);
            prop_assert_eq!(sign_calls.len(), quorum - 1);
        } else {
            let insufficient = matches!(result, Err(PortalError::InsufficientBackends { .. }));
            prop_assert!(insufficient);
            prop_assert_eq!(sign_calls.len(), pool_size - 1);
        }
    }

    /// Targets are deduplicated in order and never empty
    #[test]
    fn prop_targets_dedup_preserving_order(names in prop::collection::vec("[a-c]", 0..8)) {
        let targets = normalize_targets(&names);
        if names.is_empty() {
            prop_assert_eq!(targets, vec![DEFAULT_VERIFIER.to_string()]);
        } else {
            let mut expected: Vec<String> = Vec::new();
            for name in &names {
                if !expected.contains(name) {
                    expected.push(name.clone());
                }
            }
            prop_assert_eq!(targets, expected);
        }
    }
}
