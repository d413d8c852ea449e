//! CoinGecko onchain adapter: OHLCV by pool.
//!
//! Third OHLCV fallback. The onchain API has no native 4h bucket, so 4h
//! requests pull hourly rows and fold them four-to-one.

use crate::cache::CacheStore;
use crate::error::ProviderError;
use crate::market::candle::Timeframe;
use crate::market::normalizer;
use crate::providers::{ensure_success, OhlcvProvider, OhlcvRequest, RawCandle};
use crate::rate_limiter::RateLimiter;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const PROVIDER: &str = "coingecko";
const BASE_URL: &str = "https://api.coingecko.com/api/v3/onchain";
const POOL_CACHE_TTL: Duration = Duration::from_secs(600);

pub struct CoinGeckoClient {
    client: reqwest::Client,
    api_key: String,
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
}

#[derive(Debug, Deserialize)]
struct PoolAttributes {
    address: String,
    reserve_in_usd: Option<String>,
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

impl CoinGeckoClient {
    pub fn new(
        api_key: String,
        limiter: Arc<RateLimiter>,
        pool_cache: Arc<CacheStore<String>>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            limiter,
            pool_cache,
            timeout,
        }
    }

    /// Native bucket and fold multiplier for a timeframe. 4h is synthesized
    /// from hourly rows.
    fn bucket(timeframe: Timeframe) -> (&'static str, u32, usize) {
        match timeframe {
            Timeframe::M1 => ("minute", 1, 1),
            Timeframe::M5 => ("minute", 5, 1),
            Timeframe::M15 => ("minute", 15, 1),
            Timeframe::H1 => ("hour", 1, 1),
            Timeframe::H4 => ("hour", 1, 4),
            Timeframe::D1 => ("day", 1, 1),
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
            .header("x-cg-demo-api-key", &self.api_key)
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

    async fn top_pool(&self, address: &str) -> Result<Option<String>, ProviderError> {
        let cache_key = format!("coingecko:pool:{}", address);
        if let Some(pool) = self.pool_cache.get(&cache_key) {
            return Ok(Some(pool));
        }

        let url = format!("{}/networks/solana/tokens/{}/pools", BASE_URL, address);
        let listing: PoolListResponse = self.get_json("coingecko:pools", &url, &[]).await?;

        let best = listing
            .data
            .into_iter()
            .max_by(|a, b| {
                reserve(&a.attributes).total_cmp(&reserve(&b.attributes))
            })
            .map(|pool| pool.attributes.address);

        if let Some(pool) = &best {
            self.pool_cache.put(&cache_key, pool.clone(), POOL_CACHE_TTL);
        }
        Ok(best)
    }
}

fn reserve(attributes: &PoolAttributes) -> f64 {
    attributes
        .reserve_in_usd
        .as_deref()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0)
}

#[async_trait]
impl OhlcvProvider for CoinGeckoClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_ohlcv(&self, request: &OhlcvRequest) -> Result<Vec<RawCandle>, ProviderError> {
        let pool = match self.top_pool(&request.address).await? {
            Some(pool) => pool,
            None => return Ok(Vec::new()),
        };

        let (bucket, aggregate, fold) = Self::bucket(request.timeframe);
        let url = format!(
            "{}/networks/solana/pools/{}/ohlcv/{}",
            BASE_URL, pool, bucket
        );

        let mut query = vec![
            ("aggregate", aggregate.to_string()),
            ("limit", (request.limit * fold).min(1_000).to_string()),
        ];
        if let Some(before) = request.before {
            query.push(("before_timestamp", before.to_string()));
        }

        let payload: OhlcvResponse = self.get_json("coingecko:ohlcv", &url, &query).await?;

        let mut rows: Vec<RawCandle> = payload
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
            .collect();

        if fold > 1 {
            // Folding requires ascending order; the API returns newest first.
            rows.sort_by_key(|row| row.time);
            rows = normalizer::aggregate(&rows, fold);
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_mapping_folds_four_hours() {
        assert_eq!(CoinGeckoClient::bucket(Timeframe::H1), ("hour", 1, 1));
        assert_eq!(CoinGeckoClient::bucket(Timeframe::H4), ("hour", 1, 4));
        assert_eq!(CoinGeckoClient::bucket(Timeframe::M15), ("minute", 15, 1));
    }

    #[test]
    fn test_ohlcv_parsing() {
        let body = r#"{"data":{"id":"x","attributes":{"ohlcv_list":[
            [1700000000,0.5,0.6,0.4,0.55,12000.0]
        ]}}}"#;

        let payload: OhlcvResponse = serde_json::from_str(body).unwrap();
        assert_eq!(payload.data.attributes.ohlcv_list.len(), 1);
    }

    #[test]
    fn test_pool_listing_parsing() {
        let body = r#"{"data":[
            {"attributes":{"address":"PoolA","reserve_in_usd":"10.0"}},
            {"attributes":{"address":"PoolB"}}
        ]}"#;

        let listing: PoolListResponse = serde_json::from_str(body).unwrap();
        assert_eq!(listing.data.len(), 2);
        assert_eq!(reserve(&listing.data[1].attributes), 0.0);
    }
}
