//! Reference price oracle
//!
//! Background-refreshed table of USD prices for a small fixed set of
//! reference assets (SOL and the major stables). Prices come from the
//! liquidity-weighted DexScreener lookup: the highest-liquidity pair per
//! asset wins. A price older than the TTL is treated as absent by readers,
//! who then fall back to a configured default.

use crate::providers::dexscreener::DexScreenerClient;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const USDT_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";

/// Assets the refresh loop keeps priced.
pub const REFERENCE_ASSETS: &[(&str, &str)] = &[
    ("SOL", NATIVE_MINT),
    ("USDC", USDC_MINT),
    ("USDT", USDT_MINT),
];

pub fn is_stable(asset: &str) -> bool {
    asset == USDC_MINT || asset == USDT_MINT
}

#[derive(Debug, Clone, Copy)]
struct ReferencePrice {
    usd_price: f64,
    last_updated: Instant,
}

pub struct PriceOracleCache {
    prices: Mutex<HashMap<String, ReferencePrice>>,
    ttl: Duration,
    sol_fallback: f64,
}

impl PriceOracleCache {
    pub fn new(ttl: Duration, sol_fallback: f64) -> Self {
        Self {
            prices: Mutex::new(HashMap::new()),
            ttl,
            sol_fallback,
        }
    }

    /// Fresh USD price for an asset, or `None` when the cached value has
    /// aged past the TTL.
    pub fn price_of(&self, asset: &str) -> Option<f64> {
        let prices = self.prices.lock().unwrap();
        prices
            .get(asset)
            .filter(|price| price.last_updated.elapsed() <= self.ttl)
            .map(|price| price.usd_price)
    }

    pub fn set_price(&self, asset: &str, usd_price: f64) {
        self.prices.lock().unwrap().insert(
            asset.to_string(),
            ReferencePrice {
                usd_price,
                last_updated: Instant::now(),
            },
        );
    }

    pub fn usd_value(&self, amount: f64, asset: &str) -> Option<f64> {
        self.price_of(asset).map(|price| amount * price)
    }

    /// Hardcoded substitution used when the oracle has no fresh value:
    /// stables at par, the native asset at the configured default, anything
    /// else unpriced.
    pub fn price_or_fallback(&self, asset: &str) -> f64 {
        if let Some(price) = self.price_of(asset) {
            return price;
        }
        if is_stable(asset) {
            1.0
        } else if asset == NATIVE_MINT {
            self.sol_fallback
        } else {
            0.0
        }
    }

    /// USD price per tracked unit for a swap of `tracked_amount` against
    /// `counter_amount` of `counter_asset`. Stables are a direct ratio, the
    /// native asset goes through the oracle SOL price, and anything else
    /// falls back to pricing the counter side independently.
    pub fn swap_unit_price(
        &self,
        tracked_amount: f64,
        counter_amount: f64,
        counter_asset: &str,
    ) -> Option<f64> {
        if tracked_amount <= 0.0 {
            return None;
        }
        if is_stable(counter_asset) {
            return Some(counter_amount / tracked_amount);
        }
        self.price_of(counter_asset)
            .map(|price| counter_amount * price / tracked_amount)
    }

    /// Refresh every reference asset once. Returns how many were updated;
    /// a provider failure leaves the previous value in place.
    pub async fn refresh_once(&self, dex: &DexScreenerClient) -> usize {
        let mut updated = 0;
        for (symbol, mint) in REFERENCE_ASSETS {
            match dex.reference_price(mint).await {
                Ok(Some(price)) => {
                    self.set_price(mint, price);
                    updated += 1;
                    log::debug!("💰 {} = ${:.4}", symbol, price);
                }
                Ok(None) => {
                    log::warn!("⚠️  no priced pair for {}", symbol);
                }
                Err(e) => {
                    log::warn!("⚠️  price refresh failed for {}: {}", symbol, e);
                }
            }
        }
        updated
    }
}

/// Periodically refresh the oracle until the process exits.
pub fn spawn_refresher(
    oracle: Arc<PriceOracleCache>,
    dex: Arc<DexScreenerClient>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        log::info!("💰 Starting price refresher (every {:?})", every);
        let mut timer = tokio::time::interval(every);
        loop {
            timer.tick().await;
            let updated = oracle.refresh_once(&dex).await;
            if updated == 0 {
                log::warn!("⚠️  price refresh cycle updated no assets");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_price_readable() {
        let oracle = PriceOracleCache::new(Duration::from_secs(60), 150.0);
        oracle.set_price(NATIVE_MINT, 200.0);

        assert_eq!(oracle.price_of(NATIVE_MINT), Some(200.0));
        assert_eq!(oracle.usd_value(2.5, NATIVE_MINT), Some(500.0));
    }

    #[test]
    fn test_stale_price_treated_as_absent() {
        let oracle = PriceOracleCache::new(Duration::from_millis(10), 150.0);
        oracle.set_price(NATIVE_MINT, 200.0);

        std::thread::sleep(Duration::from_millis(25));

        assert_eq!(oracle.price_of(NATIVE_MINT), None);
        // Fallback takes over
        assert_eq!(oracle.price_or_fallback(NATIVE_MINT), 150.0);
    }

    #[test]
    fn test_fallback_prices() {
        let oracle = PriceOracleCache::new(Duration::from_secs(60), 150.0);

        assert_eq!(oracle.price_or_fallback(USDC_MINT), 1.0);
        assert_eq!(oracle.price_or_fallback(USDT_MINT), 1.0);
        assert_eq!(oracle.price_or_fallback("UnknownMint"), 0.0);
    }

    #[test]
    fn test_swap_unit_price_stable_direct_ratio() {
        let oracle = PriceOracleCache::new(Duration::from_secs(60), 150.0);

        // 5 USDC against 1000 tracked units
        assert_eq!(oracle.swap_unit_price(1000.0, 5.0, USDC_MINT), Some(0.005));
    }

    #[test]
    fn test_swap_unit_price_native_via_oracle() {
        let oracle = PriceOracleCache::new(Duration::from_secs(60), 150.0);
        oracle.set_price(NATIVE_MINT, 200.0);

        // 2 SOL at $200 against 1000 tracked units
        assert_eq!(
            oracle.swap_unit_price(1000.0, 2.0, NATIVE_MINT),
            Some(0.4)
        );
    }

    #[test]
    fn test_swap_unit_price_unpriced_counter() {
        let oracle = PriceOracleCache::new(Duration::from_secs(60), 150.0);

        assert_eq!(oracle.swap_unit_price(1000.0, 2.0, "SomeMint"), None);
        assert_eq!(oracle.swap_unit_price(0.0, 2.0, USDC_MINT), None);
    }
}
