//! Common test utilities and fakes for integration tests

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use verifier_portal::config::BackendPools;
use verifier_portal::domain::{
    CompileOutcome, CompileResult, CompilerSettings, ContractContext, FuncSettings,
    LatestVerified, OutgoingMessage, SignerOutcome, SourceUpload, SubmissionManifest,
    VerifierConfig, VerifierId, VerifierRegistry, VerifyResponse,
};
use verifier_portal::infra::{
    boc, AnalyticsSink, BackendSelector, PortalError, ProofIndex, Result, TransactionSigner,
    VerifierBackend,
};
use verifier_portal::metrics::AnalyticsAction;
use verifier_portal::submission::SubmitRequest;

pub const CONTRACT: &str = "EQBvW8Z5huBkMJYdnfAEM5JqTNkuWX3diqYENkWsIL0XggGG";
pub const CODE_HASH: &str = "/rX/aCDi/w2Ug+fg1iyBfYRniftK5YDIeIZtlZ2r1cA=";
pub const SENDER: &str = "EQsender";

/// Minimal BoC whose root cell starts with `query_id`.
pub fn signed_cell(query_id: u64) -> Vec<u8> {
    let mut data = query_id.to_be_bytes().to_vec();
    data.extend_from_slice(b"payload");
    boc::encode_single_cell(&data)
}

pub fn verifier(name: &str, quorum: usize) -> VerifierConfig {
    VerifierConfig {
        id: VerifierId::from_name(name),
        name: name.to_string(),
        url: format!("https://{name}"),
        admin: "EQadmin".to_string(),
        quorum,
        pub_key_endpoints: BTreeMap::new(),
    }
}

pub fn registry(verifiers: &[(&str, usize)]) -> Arc<VerifierRegistry> {
    Arc::new(VerifierRegistry::new(
        "EQverifierRegistry",
        verifiers.iter().map(|(n, q)| verifier(n, *q)).collect(),
    ))
}

pub fn pools(groups: &[(&str, &[&str])]) -> BackendPools {
    groups
        .iter()
        .map(|(name, urls)| (name.to_string(), urls.iter().map(|u| u.to_string()).collect()))
        .collect()
}

pub fn func_settings() -> CompilerSettings {
    CompilerSettings::Func(FuncSettings {
        func_version: "0.4.4".to_string(),
        command_line: Some("-SPA stdlib.fc main.fc".to_string()),
    })
}

pub fn func_files() -> Vec<SourceUpload> {
    vec![
        SourceUpload::new("stdlib.fc", "() recv_internal() {}").stdlib(),
        SourceUpload::new("main.fc", "#include \"stdlib.fc\";").entrypoint(),
    ]
}

pub fn submit_request(verifiers: &[&str], registry: Arc<VerifierRegistry>) -> SubmitRequest {
    SubmitRequest {
        contract: ContractContext::new(CONTRACT, CODE_HASH),
        verifiers: verifiers.iter().map(|v| v.to_string()).collect(),
        files: func_files(),
        settings: func_settings(),
        sender: Some(SENDER.to_string()),
        registry: Some(registry),
    }
}

pub fn compile_response(outcome: CompileOutcome, msg_cell: Option<Vec<u8>>) -> VerifyResponse {
    VerifyResponse {
        compile_result: CompileResult {
            result: outcome,
            error: None,
            hash: Some(CODE_HASH.to_string()),
            func_cmd: None,
            compiler_settings: serde_json::Value::Null,
        },
        msg_cell,
    }
}

/// Always picks the first candidate.
pub struct FirstSelector;

impl BackendSelector for FirstSelector {
    fn choose(&self, candidates: &[String]) -> Option<usize> {
        (!candidates.is_empty()).then_some(0)
    }
}

/// In-memory verifier backend.
///
/// Every backend answers `/source` with the configured response and `/sign`
/// by echoing the cell, unless listed in `failing_signers`.
pub struct FakeBackend {
    pub response: Mutex<VerifyResponse>,
    pub failing_signers: Mutex<HashSet<String>>,
    pub source_calls: Mutex<Vec<String>>,
    pub sign_calls: Mutex<Vec<String>>,
    pub sign_gate: Mutex<Option<Arc<Semaphore>>>,
    pub latest: Vec<LatestVerified>,
}

impl FakeBackend {
    pub fn new(response: VerifyResponse) -> Self {
        Self {
            response: Mutex::new(response),
            failing_signers: Mutex::new(HashSet::new()),
            source_calls: Mutex::new(Vec::new()),
            sign_calls: Mutex::new(Vec::new()),
            sign_gate: Mutex::new(None),
            latest: Vec::new(),
        }
    }

    pub fn similar(query_id: u64) -> Self {
        Self::new(compile_response(
            CompileOutcome::Similar,
            Some(signed_cell(query_id)),
        ))
    }

    pub fn fail_sign_on(&self, backend: &str) {
        self.failing_signers
            .lock()
            .unwrap()
            .insert(backend.to_string());
    }

    /// Park every `/sign` call until the returned gate gets permits.
    pub fn hold_signatures(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.sign_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn set_response(&self, response: VerifyResponse) {
        *self.response.lock().unwrap() = response;
    }

    pub fn sign_calls(&self) -> Vec<String> {
        self.sign_calls.lock().unwrap().clone()
    }

    pub fn source_calls(&self) -> Vec<String> {
        self.source_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VerifierBackend for FakeBackend {
    async fn submit_source(
        &self,
        backend: &str,
        _manifest: &SubmissionManifest,
        _files: &[SourceUpload],
    ) -> Result<VerifyResponse> {
        self.source_calls.lock().unwrap().push(backend.to_string());
        Ok(self.response.lock().unwrap().clone())
    }

    async fn sign(&self, backend: &str, message_cell: &[u8]) -> Result<Vec<u8>> {
        self.sign_calls.lock().unwrap().push(backend.to_string());
        let gate = self.sign_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }
        if self.failing_signers.lock().unwrap().contains(backend) {
            return Err(PortalError::SignServer {
                backend: backend.to_string(),
                status: 500,
                body: "signer down".to_string(),
            });
        }
        Ok(message_cell.to_vec())
    }

    async fn latest_verified(&self, _backend: &str) -> Result<Vec<LatestVerified>> {
        Ok(self.latest.clone())
    }
}

/// Analytics sink that remembers every event.
#[derive(Default)]
pub struct RecordingSink {
    pub actions: Mutex<Vec<AnalyticsAction>>,
}

impl RecordingSink {
    pub fn actions(&self) -> Vec<AnalyticsAction> {
        self.actions.lock().unwrap().clone()
    }

    pub fn count(&self, action: AnalyticsAction) -> usize {
        self.actions().iter().filter(|a| **a == action).count()
    }
}

#[async_trait]
impl AnalyticsSink for RecordingSink {
    async fn record(&self, action: AnalyticsAction) -> Result<()> {
        self.actions.lock().unwrap().push(action);
        Ok(())
    }
}

/// Wallet stand-in answering every request with a fixed outcome.
pub struct FakeSigner {
    pub outcome: SignerOutcome,
    pub sent: Mutex<Vec<Vec<OutgoingMessage>>>,
}

impl FakeSigner {
    pub fn new(outcome: SignerOutcome) -> Self {
        Self {
            outcome,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<Vec<OutgoingMessage>> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransactionSigner for FakeSigner {
    async fn send_transaction(
        &self,
        messages: Vec<OutgoingMessage>,
        _valid_until_ms: i64,
    ) -> Result<SignerOutcome> {
        self.sent.lock().unwrap().push(messages);
        Ok(self.outcome)
    }
}

/// Proof index backed by a map that tests fill in as "blocks" land.
#[derive(Default)]
pub struct FakeProofIndex {
    pub items: Mutex<HashMap<VerifierId, String>>,
}

impl FakeProofIndex {
    pub fn publish(&self, verifier: &VerifierId, url: &str) {
        self.items
            .lock()
            .unwrap()
            .insert(verifier.clone(), url.to_string());
    }
}

#[async_trait]
impl ProofIndex for FakeProofIndex {
    async fn source_item_url(
        &self,
        _code_hash: &str,
        verifier: &VerifierId,
    ) -> Result<Option<String>> {
        Ok(self.items.lock().unwrap().get(verifier).cloned())
    }
}
