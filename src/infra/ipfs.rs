//! Content gateway with mirror fallback
//!
//! Mirrors are tried in a fixed order. A 403 or 5xx answer (or a transport
//! failure) moves on to the next mirror; any other status is final. The last
//! mirror's answer is always returned as-is.

use std::sync::Arc;

use tracing::{debug, warn};

use super::retry::{Retry, RetryConfig};
use super::traits::{ContentFetcher, FetchedContent};
use super::{PortalError, Result};

/// Default mirror order.
pub const DEFAULT_IPFS_MIRRORS: [&str; 3] = [
    "https://ipfs.ton.org/ipfs",
    "https://files.orbs.network/ipfs",
    "https://gateway.pinata.cloud/ipfs",
];

/// Response from the mirror that answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    pub content: FetchedContent,
    /// URL that produced `content`
    pub url: String,
}

fn should_try_next_mirror(status: u16) -> bool {
    status == 403 || status >= 500
}

/// Multi-mirror content gateway.
#[derive(Clone)]
pub struct IpfsGateway {
    fetcher: Arc<dyn ContentFetcher>,
    mirrors: Vec<String>,
    retry: Retry,
}

impl IpfsGateway {
    pub fn new(fetcher: Arc<dyn ContentFetcher>, mirrors: Vec<String>, retry: RetryConfig) -> Self {
        Self {
            fetcher,
            mirrors,
            retry: Retry::new(retry),
        }
    }

    pub fn with_default_mirrors(fetcher: Arc<dyn ContentFetcher>) -> Self {
        Self::new(
            fetcher,
            DEFAULT_IPFS_MIRRORS.iter().map(|m| m.to_string()).collect(),
            RetryConfig::content_gateway(),
        )
    }

    pub fn mirrors(&self) -> &[String] {
        &self.mirrors
    }

    pub fn mirror_url(mirror: &str, hash: &str) -> String {
        format!("{}/{}", mirror.trim_end_matches('/'), hash)
    }

    /// One pass over the mirror list, without status interpretation.
    pub async fn fetch_raw(&self, hash: &str) -> Result<GatewayResponse> {
        let last = self.mirrors.len().checked_sub(1).ok_or_else(|| {
            PortalError::Configuration("no content gateway mirrors configured".into())
        })?;

        for (i, mirror) in self.mirrors.iter().enumerate() {
            let url = Self::mirror_url(mirror, hash);
            match self.fetcher.get(&url).await {
                Ok(content) if i < last && should_try_next_mirror(content.status) => {
                    debug!(url = %url, status = content.status, "Mirror unavailable, trying next");
                }
                Ok(content) => return Ok(GatewayResponse { content, url }),
                Err(e) if i < last => {
                    warn!(url = %url, error = %e, "Mirror request failed, trying next");
                }
                Err(e) => return Err(e),
            }
        }

        Err(PortalError::Internal("mirror loop ended without a response".into()))
    }

    /// One pass over the mirrors with status classification.
    pub async fn fetch_once(&self, hash: &str) -> Result<GatewayResponse> {
        let response = self.fetch_raw(hash).await?;
        let status = response.content.status;

        if response.content.is_success() {
            Ok(response)
        } else if should_try_next_mirror(status) {
            Err(PortalError::IpfsServer {
                hash: hash.to_string(),
                status,
                body: response.content.text(),
            })
        } else {
            Err(PortalError::IpfsNotFound {
                hash: hash.to_string(),
                status,
                body: response.content.text(),
            })
        }
    }

    /// Fetch content, retrying server-side failures with backoff.
    pub async fn fetch(&self, hash: &str) -> Result<GatewayResponse> {
        self.retry
            .run_with_predicate(
                "ipfs_fetch",
                || self.fetch_once(hash),
                PortalError::is_retryable_fetch,
            )
            .await
            .into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::traits::MockContentFetcher;
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn content(status: u16, body: &str) -> FetchedContent {
        FetchedContent {
            status,
            body: body.as_bytes().to_vec(),
        }
    }

    fn gateway(mock: MockContentFetcher) -> IpfsGateway {
        IpfsGateway::new(
            Arc::new(mock),
            vec!["https://m1/ipfs".into(), "https://m2/ipfs/".into(), "https://m3/ipfs".into()],
            RetryConfig::none(),
        )
    }

    #[tokio::test]
    async fn test_falls_through_on_forbidden_and_server_errors() {
        let mut mock = MockContentFetcher::new();
        let mut seq = Sequence::new();
        mock.expect_get()
            .with(eq("https://m1/ipfs/QmA"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(content(403, "forbidden")));
        mock.expect_get()
            .with(eq("https://m2/ipfs/QmA"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(content(502, "bad gateway")));
        mock.expect_get()
            .with(eq("https://m3/ipfs/QmA"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(content(200, "hello")));

        let response = gateway(mock).fetch("QmA").await.unwrap();
        assert_eq!(response.url, "https://m3/ipfs/QmA");
        assert_eq!(response.content.text(), "hello");
    }

    #[tokio::test]
    async fn test_not_found_is_final_for_first_mirror() {
        let mut mock = MockContentFetcher::new();
        mock.expect_get()
            .with(eq("https://m1/ipfs/QmB"))
            .times(1)
            .returning(|_| Ok(content(404, "no link")));

        let err = gateway(mock).fetch("QmB").await.unwrap_err();
        assert_eq!(
            err,
            PortalError::IpfsNotFound {
                hash: "QmB".into(),
                status: 404,
                body: "no link".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_last_mirror_answer_is_returned() {
        let mut mock = MockContentFetcher::new();
        mock.expect_get()
            .times(3)
            .returning(|_| Ok(content(503, "unavailable")));

        let raw = gateway(mock).fetch_raw("QmC").await.unwrap();
        assert_eq!(raw.content.status, 503);
        assert_eq!(raw.url, "https://m3/ipfs/QmC");
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_are_retried() {
        let mut mock = MockContentFetcher::new();
        // three mirrors per pass, initial attempt + two retries
        mock.expect_get()
            .times(9)
            .returning(|_| Ok(content(500, "down")));

        let gw = IpfsGateway::new(
            Arc::new(mock),
            vec!["https://m1/ipfs".into(), "https://m2/ipfs".into(), "https://m3/ipfs".into()],
            RetryConfig::content_gateway(),
        );
        let err = gw.fetch("QmD").await.unwrap_err();
        assert!(matches!(err, PortalError::IpfsServer { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_empty_mirror_list_is_configuration_error() {
        let gw = IpfsGateway::new(
            Arc::new(MockContentFetcher::new()),
            vec![],
            RetryConfig::none(),
        );
        assert!(matches!(
            gw.fetch("QmE").await,
            Err(PortalError::Configuration(_))
        ));
    }
}
