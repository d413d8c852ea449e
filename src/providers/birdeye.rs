//! Birdeye adapter: OHLCV by token address, token security, trending list.
//!
//! All calls carry the `X-API-KEY` credential header. OHLCV, security and
//! trending are distinct credential roles with independent rate-limit state.

use crate::error::ProviderError;
use crate::market::candle::Timeframe;
use crate::providers::{
    ensure_success, OhlcvProvider, OhlcvRequest, RawCandle, SecurityReport, TrendingProvider,
    TrendingToken,
};
use crate::rate_limiter::RateLimiter;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const PROVIDER: &str = "birdeye";
const BASE_URL: &str = "https://public-api.birdeye.so";

pub struct BirdeyeClient {
    client: reqwest::Client,
    api_key: String,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct OhlcvData {
    #[serde(default)]
    items: Vec<OhlcvItem>,
}

#[derive(Debug, Deserialize)]
struct OhlcvItem {
    #[serde(rename = "unixTime")]
    unix_time: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

#[derive(Debug, Deserialize)]
struct SecurityData {
    #[serde(rename = "creatorAddress")]
    creator_address: Option<String>,
    #[serde(rename = "top10HolderPercent")]
    top10_holder_percent: Option<f64>,
    #[serde(rename = "mutableMetadata")]
    mutable_metadata: Option<bool>,
    freezeable: Option<bool>,
    mintable: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct TrendingData {
    #[serde(default)]
    tokens: Vec<TrendingItem>,
}

#[derive(Debug, Deserialize)]
struct TrendingItem {
    address: String,
    name: Option<String>,
    symbol: Option<String>,
    price: Option<f64>,
    #[serde(rename = "price24hChangePercent")]
    price_24h_change_percent: Option<f64>,
    #[serde(rename = "volume24hUSD")]
    volume_24h_usd: Option<f64>,
    marketcap: Option<f64>,
    rank: Option<u32>,
}

impl BirdeyeClient {
    pub fn new(api_key: String, limiter: Arc<RateLimiter>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            limiter,
            timeout,
        }
    }

    fn interval(timeframe: Timeframe) -> &'static str {
        match timeframe {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1H",
            Timeframe::H4 => "4H",
            Timeframe::D1 => "1D",
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        credential: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        self.limiter.acquire(credential).await;

        let response = self
            .client
            .get(url)
            .query(query)
            .header("X-API-KEY", &self.api_key)
            .header("x-chain", "solana")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        ensure_success(PROVIDER, &response)?;

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        if !envelope.success {
            return Err(ProviderError::Malformed {
                provider: PROVIDER,
                detail: "response flagged success=false".to_string(),
            });
        }

        envelope.data.ok_or(ProviderError::Malformed {
            provider: PROVIDER,
            detail: "missing data object".to_string(),
        })
    }

    pub async fn fetch_security(&self, address: &str) -> Result<SecurityReport, ProviderError> {
        let url = format!("{}/defi/token_security", BASE_URL);
        let data: SecurityData = self
            .get_json(
                "birdeye:security",
                &url,
                &[("address", address.to_string())],
            )
            .await?;

        Ok(SecurityReport {
            address: address.to_string(),
            creator: data.creator_address,
            top10_holder_pct: data.top10_holder_percent,
            mintable: data.mintable,
            freezeable: data.freezeable,
            mutable_metadata: data.mutable_metadata,
        })
    }
}

#[async_trait]
impl OhlcvProvider for BirdeyeClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_ohlcv(&self, request: &OhlcvRequest) -> Result<Vec<RawCandle>, ProviderError> {
        let time_to = request
            .before
            .unwrap_or_else(|| chrono::Utc::now().timestamp());
        let time_from = time_to - request.timeframe.seconds() * request.limit as i64;

        let url = format!("{}/defi/ohlcv", BASE_URL);
        let data: OhlcvData = self
            .get_json(
                "birdeye:ohlcv",
                &url,
                &[
                    ("address", request.address.clone()),
                    ("type", Self::interval(request.timeframe).to_string()),
                    ("time_from", time_from.to_string()),
                    ("time_to", time_to.to_string()),
                ],
            )
            .await?;

        Ok(data
            .items
            .into_iter()
            .map(|item| RawCandle {
                time: item.unix_time,
                open: item.o,
                high: item.h,
                low: item.l,
                close: item.c,
                volume: item.v,
            })
            .collect())
    }
}

#[async_trait]
impl TrendingProvider for BirdeyeClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_trending(&self, limit: usize) -> Result<Vec<TrendingToken>, ProviderError> {
        let url = format!("{}/defi/token_trending", BASE_URL);
        let data: TrendingData = self
            .get_json(
                "birdeye:trending",
                &url,
                &[
                    ("sort_by", "rank".to_string()),
                    ("sort_type", "asc".to_string()),
                    ("offset", "0".to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        Ok(data
            .tokens
            .into_iter()
            .enumerate()
            .map(|(idx, item)| TrendingToken {
                address: item.address,
                name: item.name.unwrap_or_default(),
                symbol: item.symbol.unwrap_or_default(),
                price: item.price.unwrap_or(0.0),
                change_24h: item.price_24h_change_percent.unwrap_or(0.0),
                volume_24h: item.volume_24h_usd.unwrap_or(0.0),
                market_cap: item.marketcap.unwrap_or(0.0),
                rank: item.rank.unwrap_or(idx as u32 + 1),
            })
            .collect())
    }
}
