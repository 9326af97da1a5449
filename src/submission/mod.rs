//! Multi-verifier source submission and signature quorum collection
//!
//! A submission fans out to every target verifier concurrently. Within one
//! verifier the round is strictly sequential:
//!
//! 1. compile on one backend picked from the verifier's pool (`/source`)
//! 2. on a matching hash, walk the rest of the pool collecting countersignatures
//!    (`/sign`) until `quorum` distinct backends have signed
//! 3. read the query id from the final signed cell
//!
//! Every verifier owns its own entry in the [`SubmissionStore`]; a failure in
//! one round never touches another verifier's entry.

mod hints;
mod store;

pub use hints::hints_for;
pub use store::{entry_key, SubmissionStore};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::config::BackendPools;
use crate::domain::{
    CompileOutcome, CompilerSettings, ContractContext, SourceUpload, SubmissionEntry,
    SubmissionManifest, SubmissionResult, SubmissionStatus, VerifierConfig, VerifierRegistry,
    DEFAULT_VERIFIER,
};
use crate::infra::{
    boc, AnalyticsSink, BackendSelector, PortalError, RandomSelector, Result, VerifierBackend,
};
use crate::metrics::{emit, metric_names, timed_ms, AnalyticsAction, MetricsRegistry};

/// Everything a submission needs, captured at click time.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub contract: ContractContext,
    /// Target verifier names; empty means the default verifier
    pub verifiers: Vec<String>,
    pub files: Vec<SourceUpload>,
    pub settings: CompilerSettings,
    /// Connected wallet address
    pub sender: Option<String>,
    pub registry: Option<Arc<VerifierRegistry>>,
}

/// Per-verifier results of one `submit` call.
pub type SubmitOutcome = BTreeMap<String, Result<SubmissionResult>>;

/// Progress text shown while signatures are collected.
pub fn progress_text(collected: usize, required: usize) -> String {
    format!("Compile successful. Collected {collected}/{required}")
}

/// Deduplicate target names preserving order; empty selects the default verifier.
pub fn normalize_targets(verifiers: &[String]) -> Vec<String> {
    let mut targets: Vec<String> = Vec::with_capacity(verifiers.len());
    for name in verifiers {
        if !targets.contains(name) {
            targets.push(name.clone());
        }
    }
    if targets.is_empty() {
        targets.push(DEFAULT_VERIFIER.to_string());
    }
    targets
}

struct Validated<'a> {
    code_hash: &'a str,
    sender: &'a str,
    config: &'a VerifierConfig,
    pool: &'a [String],
}

/// Drives submission rounds and owns the keyed entry store.
pub struct SubmissionEngine {
    backend: Arc<dyn VerifierBackend>,
    pools: BackendPools,
    selector: Arc<dyn BackendSelector>,
    analytics: Arc<dyn AnalyticsSink>,
    store: Arc<SubmissionStore>,
    metrics: Option<Arc<MetricsRegistry>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SubmissionEngine {
    pub fn new(
        backend: Arc<dyn VerifierBackend>,
        pools: BackendPools,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        Self {
            backend,
            pools,
            selector: Arc::new(RandomSelector),
            analytics,
            store: Arc::new(SubmissionStore::new()),
            metrics: None,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn BackendSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_store(mut self, store: Arc<SubmissionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn store(&self) -> Arc<SubmissionStore> {
        self.store.clone()
    }

    pub async fn entry(&self, contract: &str, verifier: &str) -> SubmissionEntry {
        self.store.entry(&entry_key(contract, verifier)).await
    }

    pub async fn entries_for(&self, contract: &str) -> BTreeMap<String, SubmissionEntry> {
        self.store.entries_for(contract).await
    }

    /// Forget one verifier's entry; an in-flight round for it becomes orphaned.
    ///
    /// The key's round latch is dropped too, so a resubmit does not queue
    /// behind the orphaned round.
    pub async fn reset_entry(&self, contract: &str, verifier: &str) {
        let key = entry_key(contract, verifier);
        self.locks.lock().await.remove(&key);
        self.store.reset_entry(&key).await;
    }

    /// Forget every entry, e.g. when the contract context changes.
    pub async fn clear(&self) {
        self.locks.lock().await.clear();
        self.store.clear().await;
    }

    /// Submit sources to every target verifier.
    pub async fn submit(&self, request: SubmitRequest) -> SubmitOutcome {
        let targets = normalize_targets(&request.verifiers);
        info!(
            contract = %request.contract.address,
            verifiers = ?targets,
            files = request.files.len(),
            "Submitting sources"
        );

        let request = &request;
        let rounds = targets.iter().map(|verifier| async move {
            let round_id = Uuid::new_v4();
            let span = tracing::info_span!(
                "submission_round",
                verifier = %verifier,
                round_id = %round_id,
            );
            let result = self.run_round(request, verifier).instrument(span).await;
            (verifier.clone(), result)
        });

        join_all(rounds).await.into_iter().collect()
    }

    async fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn run_round(&self, request: &SubmitRequest, verifier: &str) -> Result<SubmissionResult> {
        let key = entry_key(&request.contract.address, verifier);

        // one round per key at a time
        let lock = self.lock_for(&key).await;
        let _guard = lock.lock().await;

        let generation = self.store.begin(&key).await;
        self.store
            .update(&key, generation, |e| {
                e.status = SubmissionStatus::Pending;
                e.is_loading = true;
            })
            .await;

        let round = self.execute(request, verifier, &key, generation);
        let result = match &self.metrics {
            Some(metrics) => {
                metrics.inc_counter(metric_names::ROUNDS_STARTED).await;
                let result = timed_ms(metrics, metric_names::ROUND_DURATION_MS, round).await;
                if result.is_err() {
                    metrics.inc_counter(metric_names::ROUNDS_FAILED).await;
                }
                result
            }
            None => round.await,
        };

        let applied = self
            .store
            .update(&key, generation, |e| {
                e.is_loading = false;
                match &result {
                    Ok(data) => {
                        e.status = SubmissionStatus::Success;
                        e.error = None;
                        e.compile_status = data.compile_status.clone();
                        e.data = Some(data.clone());
                    }
                    Err(err) => {
                        e.status = SubmissionStatus::Error;
                        e.error = Some(err.clone());
                    }
                }
            })
            .await;

        match &result {
            Ok(data) => info!(
                outcome = ?data.compile_result.result,
                signers = data.signers.len(),
                ready = data.is_ready(),
                "Submission round finished"
            ),
            Err(e) => warn!(error = %e, "Submission round failed"),
        }
        if !applied {
            info!("Entry was reset during the round, result discarded");
        }

        result
    }

    fn validate<'a>(&'a self, request: &'a SubmitRequest, verifier: &str) -> Result<Validated<'a>> {
        let code_hash = request
            .contract
            .code_hash
            .as_deref()
            .ok_or_else(|| PortalError::Precondition("contract code hash is not known".into()))?;

        if request.files.is_empty() {
            return Err(PortalError::Precondition("no source files selected".into()));
        }

        let sender = request
            .sender
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PortalError::Precondition("wallet not connected".into()))?;

        let registry = request
            .registry
            .as_deref()
            .ok_or_else(|| PortalError::Precondition("verifier registry not loaded".into()))?;

        let config = registry
            .find_by_name(verifier)
            .ok_or_else(|| {
                PortalError::Precondition(format!("verifier {verifier} is not in the registry"))
            })?;

        let pool = self
            .pools
            .get(verifier)
            .map(Vec::as_slice)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                PortalError::Precondition(format!("no backends configured for {verifier}"))
            })?;

        Ok(Validated {
            code_hash,
            sender,
            config,
            pool,
        })
    }

    fn pick(&self, candidates: &[String]) -> Option<String> {
        self.selector
            .choose(candidates)
            .and_then(|i| candidates.get(i))
            .cloned()
    }

    async fn execute(
        &self,
        request: &SubmitRequest,
        verifier: &str,
        key: &str,
        generation: u64,
    ) -> Result<SubmissionResult> {
        let checked = self.validate(request, verifier)?;

        emit(self.analytics.as_ref(), AnalyticsAction::CompileSubmit).await;

        let manifest = SubmissionManifest::build(
            &request.contract.address,
            checked.code_hash,
            &request.settings,
            &request.files,
            checked.sender,
        );

        let initiator = self
            .pick(checked.pool)
            .ok_or_else(|| PortalError::Internal("backend selector returned nothing".into()))?;

        let response = match self
            .backend
            .submit_source(&initiator, &manifest, &request.files)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                if matches!(e, PortalError::CompileServer { .. }) {
                    emit(self.analytics.as_ref(), AnalyticsAction::CompileServerError).await;
                }
                return Err(e);
            }
        };

        let outcome = response.compile_result.result;
        let action = match outcome {
            CompileOutcome::Similar => AnalyticsAction::CompileSuccessHashesMatch,
            CompileOutcome::NotSimilar => AnalyticsAction::CompileHashesNotSimilar,
            CompileOutcome::CompileError | CompileOutcome::UnknownError => {
                AnalyticsAction::CompileCompilationError
            }
        };
        emit(self.analytics.as_ref(), action).await;

        let mut result = SubmissionResult {
            compile_result: response.compile_result,
            signed_message: None,
            hints: hints_for(outcome, &request.files),
            query_id: None,
            signers: vec![initiator],
            compile_status: None,
        };

        if outcome != CompileOutcome::Similar {
            return Ok(result);
        }
        let Some(cell) = response.msg_cell else {
            return Ok(result);
        };

        self.collect_signatures(checked.config, checked.pool, cell, &mut result, key, generation)
            .await?;

        Ok(result)
    }

    async fn collect_signatures(
        &self,
        config: &VerifierConfig,
        pool: &[String],
        mut cell: Vec<u8>,
        result: &mut SubmissionResult,
        key: &str,
        generation: u64,
    ) -> Result<()> {
        let required = config.quorum.max(1);

        while result.signers.len() < required {
            let text = progress_text(result.signers.len(), required);
            self.report_progress(result, text, key, generation).await;

            let remaining: Vec<String> = pool
                .iter()
                .filter(|b| !result.signers.contains(*b))
                .cloned()
                .collect();

            let next = self
                .pick(&remaining)
                .ok_or_else(|| PortalError::InsufficientBackends {
                    verifier: config.name.clone(),
                    collected: result.signers.len(),
                    required,
                })?;

            cell = match self.backend.sign(&next, &cell).await {
                Ok(signed) => signed,
                Err(e) => {
                    if matches!(e, PortalError::SignServer { .. }) {
                        emit(self.analytics.as_ref(), AnalyticsAction::SignServerError).await;
                    }
                    return Err(e);
                }
            };
            emit(self.analytics.as_ref(), AnalyticsAction::SignServerSuccess).await;
            if let Some(metrics) = &self.metrics {
                metrics.inc_counter(metric_names::SIGNATURES_COLLECTED).await;
            }

            result.signers.push(next);
        }

        self.report_progress(result, progress_text(required, required), key, generation)
            .await;

        result.query_id = Some(boc::read_query_id(&cell)?);
        result.signed_message = Some(cell);
        Ok(())
    }

    async fn report_progress(
        &self,
        result: &mut SubmissionResult,
        text: String,
        key: &str,
        generation: u64,
    ) {
        self.store
            .update(key, generation, |e| e.compile_status = Some(text.clone()))
            .await;
        result.compile_status = Some(text);
    }
}
