use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

use super::{FetchConfig, InstrumentSource};
use crate::error::FetchError;
use crate::model::InstrumentRecord;

// ── Deribit API response types ──────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Vec<InstrumentRecord>>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

// ── Client ──────────────────────────────────────────────────────────

/// Fetches option instruments from Deribit's public JSON-RPC over HTTP API.
pub struct DeribitClient {
    client: reqwest::Client,
    config: FetchConfig,
}

impl DeribitClient {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("deribit-options/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network {
                url: config.instruments_url(),
                status: None,
                message: format!("creating HTTP client: {e}"),
            })?;
        Ok(DeribitClient { client, config })
    }
}

#[async_trait]
impl InstrumentSource for DeribitClient {
    fn describe(&self) -> String {
        format!(
            "{} (currency={}, kind={})",
            self.config.instruments_url(),
            self.config.currency,
            self.config.kind
        )
    }

    async fn fetch_instruments(&self) -> Result<Vec<InstrumentRecord>, FetchError> {
        let url = self.config.instruments_url();
        debug!("GET {url} currency={} kind={}", self.config.currency, self.config.kind);

        let network_error = |status: Option<u16>, message: String| FetchError::Network {
            url: url.clone(),
            status,
            message,
        };

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("currency", self.config.currency.as_str()),
                ("kind", self.config.kind.as_str()),
            ])
            .send()
            .await
            .map_err(|e| network_error(None, e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| network_error(Some(status.as_u16()), format!("reading body: {e}")))?;
        debug!("{url} -> {status}, {} bytes", body.len());

        if !status.is_success() {
            // Deribit reports rejected requests as JSON-RPC errors with a 4xx status.
            let detail = serde_json::from_str::<RpcResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .map(|e| format!("{} (code {})", e.message, e.code))
                .unwrap_or_else(|| {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                });
            return Err(network_error(
                Some(status.as_u16()),
                format!("HTTP {}: {detail}", status.as_u16()),
            ));
        }

        parse_instruments(&body).map_err(|message| FetchError::Decode { url, message })
    }
}

/// Decode a `get_instruments` body into its `result` array.
pub fn parse_instruments(body: &str) -> Result<Vec<InstrumentRecord>, String> {
    let resp: RpcResponse = serde_json::from_str(body).map_err(|e| e.to_string())?;
    match (resp.result, resp.error) {
        (Some(result), _) => Ok(result),
        (None, Some(err)) => Err(format!(
            "API returned error instead of result: {} (code {})",
            err.message, err.code
        )),
        (None, None) => Err("missing `result` field".to_string()),
    }
}
