//! Infrastructure layer for the verifier portal
//!
//! Contains trait definitions for external collaborators and the
//! implementations the portal ships with:
//! - Verifier backend client (reqwest, multipart `/source`, JSON `/sign`)
//! - Content gateway with mirror fallback and retry
//! - Bag-of-cells root reader for signed messages

pub mod boc;
mod error;
mod http;
mod ipfs;
mod retry;
mod traits;

pub use error::*;
pub use http::{fetch_remote_config, HttpContentFetcher, HttpVerifierBackend};
pub use ipfs::{GatewayResponse, IpfsGateway, DEFAULT_IPFS_MIRRORS};
pub use retry::{Retry, RetryConfig, RetryResult};
pub use traits::*;
