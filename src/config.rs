//! Portal configuration.
//!
//! Network defaults mirror the public verifier deployment; every value can be
//! overridden from the environment.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::infra::{PortalError, Result, RetryConfig, DEFAULT_IPFS_MIRRORS};

/// Sources registry on mainnet.
pub const MAINNET_SOURCES_REGISTRY: &str = "EQD-BJSVUJviud_Qv7Ymfd3qzXdrmV525e3YDzWQoHIAiInL";
/// Sources registry on testnet.
pub const TESTNET_SOURCES_REGISTRY: &str = "EQCsdKYwUaXkgJkz2l0ol6qT_WxeRbE_wBCwnEybmR0u5TO8";

pub const DEFAULT_REMOTE_CONFIG_URL: &str =
    "https://raw.githubusercontent.com/ton-community/contract-verifier-config/main/config.json";

/// 0.5 TON in nano units.
pub const DEFAULT_PUBLISH_VALUE: u128 = 500_000_000;

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const TX_VALIDITY: Duration = Duration::from_secs(5 * 60);
/// Poll attempts allowed by the built-in success predicates.
pub const MAX_POLL_ATTEMPTS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(PortalError::Configuration(format!("unknown network: {other}"))),
        }
    }
}

/// Backend pools per verifier name.
pub type BackendPools = BTreeMap<String, Vec<String>>;

fn default_backends(network: Network) -> BackendPools {
    let pools: &[(&str, &[&str])] = match network {
        Network::Mainnet => &[
            ("verifier.ton.org", &["https://verifier-mainnet.tonstudio.io"]),
            (
                "orbs.com",
                &[
                    "https://ton-source-prod-1.herokuapp.com",
                    "https://ton-source-prod-2.herokuapp.com",
                    "https://ton-source-prod-3.herokuapp.com",
                ],
            ),
        ],
        Network::Testnet => &[
            ("verifier.ton.org", &["https://verifier-testnet.tonstudio.io"]),
            (
                "orbs-testnet",
                &["https://ton-source-prod-testnet-1.herokuapp.com"],
            ),
        ],
    };

    pools
        .iter()
        .map(|(name, urls)| {
            (
                name.to_string(),
                urls.iter().map(|u| u.to_string()).collect(),
            )
        })
        .collect()
}

/// Parse `name=url,url;name=url`.
pub fn parse_backend_pools(raw: &str) -> Result<BackendPools> {
    let mut pools = BackendPools::new();
    for group in raw.split(';').map(str::trim).filter(|g| !g.is_empty()) {
        let (name, urls) = group.split_once('=').ok_or_else(|| {
            PortalError::Configuration(format!("backend group without '=': {group}"))
        })?;
        let urls: Vec<String> = urls
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();
        if urls.is_empty() {
            return Err(PortalError::Configuration(format!(
                "verifier {} has no backends",
                name.trim()
            )));
        }
        pools.insert(name.trim().to_string(), urls);
    }
    Ok(pools)
}

/// Runtime configuration of the portal.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub network: Network,
    /// Sources registry contract address
    pub sources_registry: String,
    pub backends: BackendPools,
    pub ipfs_mirrors: Vec<String>,
    pub ipfs_retry: RetryConfig,
    pub http_timeout: Duration,
    pub poll_interval: Duration,
    pub tx_validity: Duration,
    pub max_poll_attempts: u32,
    /// Value attached to each publish message, nano units
    pub publish_value: u128,
    pub remote_config_url: String,
}

impl PortalConfig {
    /// Built-in defaults for a network.
    pub fn for_network(network: Network) -> Self {
        let sources_registry = match network {
            Network::Mainnet => MAINNET_SOURCES_REGISTRY,
            Network::Testnet => TESTNET_SOURCES_REGISTRY,
        };

        Self {
            network,
            sources_registry: sources_registry.to_string(),
            backends: default_backends(network),
            ipfs_mirrors: DEFAULT_IPFS_MIRRORS.iter().map(|m| m.to_string()).collect(),
            ipfs_retry: RetryConfig::content_gateway(),
            http_timeout: Duration::from_secs(30),
            poll_interval: POLL_INTERVAL,
            tx_validity: TX_VALIDITY,
            max_poll_attempts: MAX_POLL_ATTEMPTS,
            publish_value: DEFAULT_PUBLISH_VALUE,
            remote_config_url: DEFAULT_REMOTE_CONFIG_URL.to_string(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let network = match std::env::var("PORTAL_NETWORK") {
            Ok(v) => v.parse()?,
            Err(_) => Network::default(),
        };
        let mut config = Self::for_network(network);

        let registry_var = match network {
            Network::Mainnet => "SOURCES_REGISTRY",
            Network::Testnet => "SOURCES_REGISTRY_TESTNET",
        };
        if let Ok(address) = std::env::var(registry_var) {
            config.sources_registry = address;
        }

        if let Ok(raw) = std::env::var("VERIFIER_BACKENDS") {
            config.backends = parse_backend_pools(&raw)?;
        }

        if let Ok(raw) = std::env::var("IPFS_MIRRORS") {
            let mirrors: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect();
            if mirrors.is_empty() {
                return Err(PortalError::Configuration("IPFS_MIRRORS is empty".into()));
            }
            config.ipfs_mirrors = mirrors;
        }

        if let Some(secs) = std::env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.http_timeout = Duration::from_secs(secs);
        }

        if let Some(value) = std::env::var("PUBLISH_VALUE_NANO")
            .ok()
            .and_then(|v| v.parse::<u128>().ok())
        {
            config.publish_value = value;
        }

        if let Ok(url) = std::env::var("REMOTE_CONFIG_URL") {
            config.remote_config_url = url;
        }

        Ok(config)
    }

    /// Backend pool of a verifier, empty when none is configured.
    pub fn backends_for(&self, verifier: &str) -> &[String] {
        self.backends
            .get(verifier)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self::for_network(Network::Mainnet)
    }
}
