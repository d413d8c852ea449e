//! DexScreener adapter
//!
//! Serves two consumers: the price oracle (liquidity-weighted USD reference
//! price, highest-liquidity pair wins) and token metadata enrichment
//! (symbol/name for API responses). Unkeyed API.

use crate::error::ProviderError;
use crate::providers::{ensure_success, TokenMeta};
use crate::rate_limiter::RateLimiter;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const PROVIDER: &str = "dexscreener";
const BASE_URL: &str = "https://api.dexscreener.com";

pub struct DexScreenerClient {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexPair {
    #[serde(rename = "baseToken")]
    pub base_token: PairToken,
    #[serde(rename = "quoteToken")]
    pub quote_token: PairToken,
    #[serde(rename = "priceUsd")]
    pub price_usd: Option<String>,
    pub liquidity: Option<PairLiquidity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PairToken {
    pub address: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PairLiquidity {
    pub usd: Option<f64>,
}

impl DexPair {
    pub fn liquidity_usd(&self) -> f64 {
        self.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0)
    }

    pub fn price(&self) -> Option<f64> {
        self.price_usd.as_deref().and_then(|s| s.parse().ok())
    }
}

impl DexScreenerClient {
    pub fn new(limiter: Arc<RateLimiter>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            limiter,
            timeout,
        }
    }

    /// All indexed trading pairs for a token. Zero pairs is a valid outcome
    /// for unindexed tokens.
    pub async fn fetch_pairs(&self, address: &str) -> Result<Vec<DexPair>, ProviderError> {
        self.limiter.acquire("dexscreener:pairs").await;

        let url = format!("{}/token-pairs/v1/solana/{}", BASE_URL, address);
        let response = self
            .client
            .get(&url)
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

    /// USD price of the token taken from its highest-liquidity pair.
    pub async fn reference_price(&self, address: &str) -> Result<Option<f64>, ProviderError> {
        let pairs = self.fetch_pairs(address).await?;
        Ok(best_pair(&pairs).and_then(|pair| pair.price()))
    }

    /// Symbol/name metadata from the highest-liquidity pair's base token.
    pub async fn token_meta(&self, address: &str) -> Result<Option<TokenMeta>, ProviderError> {
        let pairs = self.fetch_pairs(address).await?;
        Ok(best_pair(&pairs).and_then(|pair| {
            let symbol = pair.base_token.symbol.clone()?;
            Some(TokenMeta {
                symbol,
                name: pair.base_token.name.clone().unwrap_or_default(),
            })
        }))
    }
}

fn best_pair(pairs: &[DexPair]) -> Option<&DexPair> {
    pairs
        .iter()
        .max_by(|a, b| a.liquidity_usd().total_cmp(&b.liquidity_usd()))
}
