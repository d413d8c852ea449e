//! GeckoTerminal adapter: top-pool discovery, OHLCV by pool, trending pools.
//!
//! Unkeyed API. Candles are addressed by pool, so the adapter first resolves
//! the token's deepest pool (cached with its own TTL) and then pulls the
//! pool's OHLCV series. A token with no indexed pool is a "no data" outcome.

use crate::cache::CacheStore;
use crate::error::ProviderError;
use crate::market::candle::Timeframe;
use crate::providers::{
    ensure_success, OhlcvProvider, OhlcvRequest, RawCandle, TrendingProvider, TrendingToken,
};
use crate::rate_limiter::RateLimiter;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const PROVIDER: &str = "geckoterminal";
const BASE_URL: &str = "https://api.geckoterminal.com/api/v2";
const POOL_CACHE_TTL: Duration = Duration::from_secs(600);

pub struct GeckoTerminalClient {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    pool_cache: Arc<CacheStore<String>>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct PoolListResponse {
    #[serde(default)]
    data: Vec<PoolResource>,
}

#[derive(Debug, Deserialize)]
struct PoolResource {
    attributes: PoolAttributes,
    relationships: Option<PoolRelationships>,
}

#[derive(Debug, Deserialize)]
struct PoolAttributes {
    address: String,
    name: Option<String>,
    reserve_in_usd: Option<String>,
    base_token_price_usd: Option<String>,
    volume_usd: Option<VolumeUsd>,
    price_change_percentage: Option<PriceChange>,
    market_cap_usd: Option<String>,
    fdv_usd: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VolumeUsd {
    h24: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceChange {
    h24: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PoolRelationships {
    base_token: Option<Relationship>,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    data: Option<RelationshipData>,
}

#[derive(Debug, Deserialize)]
struct RelationshipData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OhlcvResponse {
    data: OhlcvResource,
}

#[derive(Debug, Deserialize)]
struct OhlcvResource {
    attributes: OhlcvAttributes,
}

#[derive(Debug, Deserialize)]
struct OhlcvAttributes {
    #[serde(default)]
    ohlcv_list: Vec<(i64, f64, f64, f64, f64, f64)>,
}

fn parse_num(value: &Option<String>) -> f64 {
    value
        .as_deref()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0)
}

impl GeckoTerminalClient {
    pub fn new(
        limiter: Arc<RateLimiter>,
        pool_cache: Arc<CacheStore<String>>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            limiter,
            pool_cache,
            timeout,
        }
    }

    fn bucket(timeframe: Timeframe) -> (&'static str, u32) {
        match timeframe {
            Timeframe::M1 => ("minute", 1),
            Timeframe::M5 => ("minute", 5),
            Timeframe::M15 => ("minute", 15),
            Timeframe::H1 => ("hour", 1),
            Timeframe::H4 => ("hour", 4),
            Timeframe::D1 => ("day", 1),
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
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        ensure_success(PROVIDER, &response)?;

        response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))
    }

    /// Resolve the deepest pool trading this token, by USD reserve.
    pub async fn top_pool(&self, address: &str) -> Result<Option<String>, ProviderError> {
        let cache_key = format!("geckoterminal:pool:{}", address);
        if let Some(pool) = self.pool_cache.get(&cache_key) {
            return Ok(Some(pool));
        }

        let url = format!("{}/networks/solana/tokens/{}/pools", BASE_URL, address);
        let listing: PoolListResponse = self
            .get_json("geckoterminal:pools", &url, &[("page", "1".to_string())])
            .await?;

        let best = listing
            .data
            .into_iter()
            .max_by(|a, b| {
                parse_num(&a.attributes.reserve_in_usd)
                    .total_cmp(&parse_num(&b.attributes.reserve_in_usd))
            })
            .map(|pool| pool.attributes.address);

        if let Some(pool) = &best {
            self.pool_cache.put(&cache_key, pool.clone(), POOL_CACHE_TTL);
        }
        Ok(best)
    }
}

#[async_trait]
impl OhlcvProvider for GeckoTerminalClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_ohlcv(&self, request: &OhlcvRequest) -> Result<Vec<RawCandle>, ProviderError> {
        let pool = match self.top_pool(&request.address).await? {
            Some(pool) => pool,
            None => return Ok(Vec::new()),
        };

        let (bucket, aggregate) = Self::bucket(request.timeframe);
        let url = format!(
            "{}/networks/solana/pools/{}/ohlcv/{}",
            BASE_URL, pool, bucket
        );

        let mut query = vec![
            ("aggregate", aggregate.to_string()),
            ("limit", request.limit.to_string()),
            ("currency", "usd".to_string()),
        ];
        if let Some(before) = request.before {
            query.push(("before_timestamp", before.to_string()));
        }

        let payload: OhlcvResponse = self
            .get_json("geckoterminal:ohlcv", &url, &query)
            .await?;

        Ok(payload
            .data
            .attributes
            .ohlcv_list
            .into_iter()
            .map(|(time, open, high, low, close, volume)| RawCandle {
                time,
                open,
                high,
                low,
                close,
                volume,
            })
            .collect())
    }
}

#[async_trait]
impl TrendingProvider for GeckoTerminalClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_trending(&self, limit: usize) -> Result<Vec<TrendingToken>, ProviderError> {
        let url = format!("{}/networks/solana/trending_pools", BASE_URL);
        let listing: PoolListResponse = self
            .get_json("geckoterminal:trending", &url, &[("page", "1".to_string())])
            .await?;

        Ok(listing
            .data
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(idx, pool)| {
                let attributes = pool.attributes;
                let address = pool
                    .relationships
                    .and_then(|r| r.base_token)
                    .and_then(|t| t.data)
                    .map(|d| d.id.trim_start_matches("solana_").to_string())
                    .unwrap_or_else(|| attributes.address.clone());
                // Pool names read "BASE / QUOTE"
                let name = attributes.name.clone().unwrap_or_default();
                let symbol = name
                    .split(" / ")
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                let market_cap = attributes
                    .market_cap_usd
                    .as_deref()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| parse_num(&attributes.fdv_usd));

                TrendingToken {
                    address,
                    name,
                    symbol,
                    price: parse_num(&attributes.base_token_price_usd),
                    change_24h: attributes
                        .price_change_percentage
                        .as_ref()
                        .map(|p| parse_num(&p.h24))
                        .unwrap_or(0.0),
                    volume_24h: attributes
                        .volume_usd
                        .as_ref()
                        .map(|v| parse_num(&v.h24))
                        .unwrap_or(0.0),
                    market_cap,
                    rank: idx as u32 + 1,
                }
            })
            .collect())
    }
}
