//! Verifier Portal Library
//!
//! Client-side protocol of a multi-verifier smart-contract source
//! verification portal: source submission with signature quorums, proof
//! publishing, and cross-verifier conflict detection.
//!
//! ## Modules
//!
//! - [`domain`] - Core domain types (verifiers, proofs, submissions, transactions)
//! - [`infra`] - Collaborator traits, HTTP clients, content gateway, BoC reader
//! - [`registry`] - Verifier registry resolution and caching
//! - [`proof_loader`] - Published proof and source bundle loading
//! - [`conflict`] - Cross-verifier fingerprint conflict detection
//! - [`submission`] - Multi-verifier submission engine and entry store
//! - [`monitor`] - Keyed transaction lifecycle monitor
//! - [`publish`] - Proof publishing flow
//! - [`deploy`] - Contract deployment flow
//! - [`latest`] - Latest verified contracts feed
//! - [`config`] - Network and backend configuration
//! - [`metrics`] - Metrics registry and analytics events
//! - [`telemetry`] - Tracing and OpenTelemetry integration

pub mod config;
pub mod conflict;
pub mod deploy;
pub mod domain;
pub mod infra;
pub mod latest;
pub mod metrics;
pub mod monitor;
pub mod proof_loader;
pub mod publish;
pub mod registry;
pub mod submission;
pub mod telemetry;

// Re-export commonly used types
pub use domain::{
    CompileOutcome, CompilerKind, CompilerSettings, ContractContext, ContractProof,
    ContractProofMap, Hint, SourceUpload, SubmissionEntry, SubmissionResult, TxnStatus,
    VerifierConfig, VerifierId, VerifierRegistry,
};

pub use config::{Network, PortalConfig};
pub use conflict::{detect_conflicts, ConflictReport};
pub use infra::{PortalError, Result};
pub use monitor::TransactionMonitor;
pub use publish::{PublishEngine, PublishOutcome, PublishRequest};
pub use submission::{SubmissionEngine, SubmissionStore, SubmitRequest};
