//! Error types for the verifier portal

use thiserror::Error;

/// Errors raised by portal components.
///
/// Every error is scoped to the key that produced it (a verifier entry, a
/// transaction flow, a contract) and is stored alongside that key. Compile
/// outcomes such as `not_similar` are data, not errors, and never show up here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortalError {
    /// A submission precondition is not met (wallet, files, registry, hash)
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A publish selection names a verifier missing from the registry snapshot
    #[error("unknown verifier: {0}")]
    UnknownVerifier(String),

    /// `/source` answered with a non-200 status
    #[error("error compiling on {backend} ({status}): {body}")]
    CompileServer {
        backend: String,
        status: u16,
        body: String,
    },

    /// `/sign` answered with a non-200 status
    #[error("error collecting signatures from {backend} ({status}): {body}")]
    SignServer {
        backend: String,
        status: u16,
        body: String,
    },

    /// The backend pool ran out before the quorum was reached
    #[error("not enough backends to collect signatures for {verifier}: {collected}/{required}")]
    InsufficientBackends {
        verifier: String,
        collected: usize,
        required: usize,
    },

    /// Connection-level failure talking to a remote service
    #[error("transport error: {0}")]
    Transport(String),

    /// A signed message or cell payload could not be interpreted
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Content gateway answered with a non-retryable client status
    #[error("content {hash} not found ({status}): {body}")]
    IpfsNotFound {
        hash: String,
        status: u16,
        body: String,
    },

    /// Content gateway answered 403 or 5xx on every mirror
    #[error("content gateway error for {hash} ({status}): {body}")]
    IpfsServer {
        hash: String,
        status: u16,
        body: String,
    },

    /// Response body did not match the expected shape
    #[error("decode error: {0}")]
    Decode(String),

    /// Chain reader failure
    #[error("chain error: {0}")]
    Chain(String),

    /// Wallet / signer failure other than a user rejection
    #[error("signer error: {0}")]
    Signer(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl PortalError {
    /// Whether a content fetch failing with this error may be attempted again.
    pub fn is_retryable_fetch(&self) -> bool {
        matches!(self, PortalError::IpfsServer { .. } | PortalError::Transport(_))
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PortalError::Decode(err.to_string())
        } else {
            PortalError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PortalError {
    fn from(err: serde_json::Error) -> Self {
        PortalError::Decode(err.to_string())
    }
}

/// Result type for portal operations
pub type Result<T> = std::result::Result<T, PortalError>;
