//! Performance benchmarks for the verifier portal.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use verifier_portal::conflict::detect_conflicts;
use verifier_portal::domain::{ContractProof, ContractProofMap, VerifierId};
use verifier_portal::infra::boc;

/// Proof map where every third verifier disagrees with the rest
fn create_proofs(count: usize) -> ContractProofMap {
    (0..count)
        .map(|i| {
            let id = VerifierId::from_name(&format!("verifier-{i}"));
            let fingerprint = if i % 3 == 0 { "QmMinority" } else { "QmMajority" };
            let proof = ContractProof {
                verifier_id: id.clone(),
                has_onchain_proof: true,
                content_fingerprint: Some(fingerprint.to_string()),
                ..Default::default()
            };
            (id, proof)
        })
        .collect()
}

/// Benchmark conflict detection across verifier counts
fn bench_conflict_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("conflict_detection");

    for count in [2, 8, 64, 512].iter() {
        let proofs = create_proofs(*count);
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("detect", count), &proofs, |b, proofs| {
            b.iter(|| black_box(detect_conflicts(proofs)));
        });
    }

    group.finish();
}

/// Benchmark query id extraction from signed messages
fn bench_boc_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("boc_parse");

    for payload in [8usize, 64, 120].iter() {
        let mut data = 42u64.to_be_bytes().to_vec();
        data.resize(*payload, 0xab);
        let cell = boc::encode_single_cell(&data);

        group.throughput(Throughput::Bytes(cell.len() as u64));
        group.bench_with_input(BenchmarkId::new("read_query_id", payload), &cell, |b, cell| {
            b.iter(|| black_box(boc::read_query_id(cell).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_conflict_detection, bench_boc_parse);
criterion_main!(benches);
