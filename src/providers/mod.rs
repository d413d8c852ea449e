//! Provider adapters
//!
//! One module per external data source. Each adapter builds its own
//! requests, validates the response shape, and maps provider-native fields
//! into the neutral records defined here. Provider-specific field names
//! never leak past this layer. Every adapter waits on the shared
//! `RateLimiter` before each HTTP call, keyed by its credential role.

pub mod birdeye;
pub mod coingecko;
pub mod dexscreener;
pub mod geckoterminal;
pub mod helius;

use crate::error::ProviderError;
use crate::market::candle::Timeframe;
use async_trait::async_trait;
use serde::Serialize;

/// Provider-neutral OHLCV row, unix-second timestamp, pre-normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCandle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// One logical OHLCV request. `before` is a unix-second cursor for backward
/// pagination; `limit` is already clamped by the orchestrator.
#[derive(Debug, Clone)]
pub struct OhlcvRequest {
    pub address: String,
    pub timeframe: Timeframe,
    pub before: Option<i64>,
    pub limit: usize,
}

/// A provider that can serve candle data. An `Ok` with zero rows means the
/// provider had nothing for this request ("no data"), which is not an error:
/// the orchestrator advances to the next provider without retrying.
#[async_trait]
pub trait OhlcvProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch_ohlcv(&self, request: &OhlcvRequest) -> Result<Vec<RawCandle>, ProviderError>;
}

#[async_trait]
pub trait TrendingProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch_trending(&self, limit: usize) -> Result<Vec<TrendingToken>, ProviderError>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingToken {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub price: f64,
    pub change_24h: f64,
    pub volume_24h: f64,
    pub market_cap: f64,
    pub rank: u32,
}

/// Neutral token-security record. Absent fields mean the scanner did not
/// report them, not that they are safe.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityReport {
    pub address: String,
    pub creator: Option<String>,
    pub top10_holder_pct: Option<f64>,
    pub mintable: Option<bool>,
    pub freezeable: Option<bool>,
    pub mutable_metadata: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderAccount {
    pub address: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransaction {
    pub signature: String,
    pub time: Option<i64>,
    pub failed: bool,
}

/// Symbol/name metadata resolved for a token.
#[derive(Debug, Clone, Serialize)]
pub struct TokenMeta {
    pub symbol: String,
    pub name: String,
}

/// Reject non-2xx responses, honoring a Retry-After header when present.
pub(crate) fn ensure_success(
    provider: &'static str,
    response: &reqwest::Response,
) -> Result<(), ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let retry_after_ms = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .map(|secs| secs * 1_000);

    Err(ProviderError::from_status(
        provider,
        status.as_u16(),
        retry_after_ms,
    ))
}
