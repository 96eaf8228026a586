pub mod deribit;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::model::InstrumentRecord;

pub use deribit::DeribitClient;

pub const TESTNET_URL: &str = "https://test.deribit.com/api/v2/public";
pub const MAINNET_URL: &str = "https://www.deribit.com/api/v2/public";

// ── Network ─────────────────────────────────────────────────────────

/// Which Deribit environment to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    #[default]
    Testnet,
    Mainnet,
}

impl Network {
    pub fn base_url(&self) -> &'static str {
        match self {
            Network::Testnet => TESTNET_URL,
            Network::Mainnet => MAINNET_URL,
        }
    }
}

// ── Fetch config ────────────────────────────────────────────────────

/// Endpoint and query parameters for the instrument fetch.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    pub currency: String,
    pub kind: String,
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig::for_network(Network::default())
    }
}

impl FetchConfig {
    pub fn for_network(network: Network) -> Self {
        FetchConfig {
            base_url: network.base_url().to_string(),
            currency: "BTC".to_string(),
            kind: "option".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Full URL of the `get_instruments` method.
    pub fn instruments_url(&self) -> String {
        format!("{}/get_instruments", self.base_url.trim_end_matches('/'))
    }
}

// ── Source trait ────────────────────────────────────────────────────

/// Anything that can produce the instrument list for one run.
#[async_trait]
pub trait InstrumentSource: Send + Sync {
    /// Human-readable origin, used in progress output.
    fn describe(&self) -> String;

    /// One fetch, no retries.
    async fn fetch_instruments(&self) -> Result<Vec<InstrumentRecord>, FetchError>;
}
