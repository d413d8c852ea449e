//! Market-data orchestration
//!
//! Resolves one logical request ("candles for token X, timeframe Y") against
//! the configured provider priority list. Results are cached under a
//! fingerprint of every logical parameter. A provider failure or empty
//! result advances to the next provider; it never aborts the request. When
//! the whole list is exhausted the engine synthesizes a deterministic
//! placeholder series rather than answering "no data", and tags it so
//! consumers can flag the data as simulated.

use crate::cache::CacheStore;
use crate::coordinator::RequestCoordinator;
use crate::market::candle::{Candle, Timeframe};
use crate::market::{normalizer, synthetic};
use crate::providers::dexscreener::DexScreenerClient;
use crate::providers::{OhlcvProvider, OhlcvRequest, RawCandle, TokenMeta};
use std::sync::Arc;
use std::time::Duration;

/// Provider-side row cap; larger asks are clamped, not rejected.
pub const MAX_LIMIT: usize = 1_000;
pub const DEFAULT_LIMIT: usize = 500;

#[derive(Debug, Clone)]
pub struct MarketSeries {
    pub candles: Vec<Candle>,
    pub is_synthetic: bool,
    pub source: String,
    pub fallback_reason: Option<String>,
    pub last_update: i64,
}

pub struct MarketDataService {
    providers: Vec<Arc<dyn OhlcvProvider>>,
    coordinator: RequestCoordinator<Vec<RawCandle>>,
    cache: Arc<CacheStore<MarketSeries>>,
    meta_cache: Arc<CacheStore<Option<TokenMeta>>>,
    dex: Arc<DexScreenerClient>,
    cache_ttl: Duration,
    meta_ttl: Duration,
}

impl MarketDataService {
    pub fn new(
        providers: Vec<Arc<dyn OhlcvProvider>>,
        coordinator: RequestCoordinator<Vec<RawCandle>>,
        cache: Arc<CacheStore<MarketSeries>>,
        meta_cache: Arc<CacheStore<Option<TokenMeta>>>,
        dex: Arc<DexScreenerClient>,
        cache_ttl: Duration,
        meta_ttl: Duration,
    ) -> Self {
        Self {
            providers,
            coordinator,
            cache,
            meta_cache,
            dex,
            cache_ttl,
            meta_ttl,
        }
    }

    /// Candles for a token, walking the provider priority list. Always
    /// returns a series; synthesis is the final stage of the list.
    pub async fn get_market_data(
        &self,
        address: &str,
        timeframe: Timeframe,
        before: Option<i64>,
        limit: usize,
    ) -> MarketSeries {
        let limit = limit.clamp(1, MAX_LIMIT);
        let fingerprint = format!(
            "ohlcv:{}:{}:{}:{}",
            address,
            timeframe,
            before.unwrap_or(0),
            limit
        );

        if let Some(series) = self.cache.get(&fingerprint) {
            return series;
        }

        let request = OhlcvRequest {
            address: address.to_string(),
            timeframe,
            before,
            limit,
        };

        let mut reasons: Vec<String> = Vec::new();

        for provider in &self.providers {
            let provider_fp = format!("{}:{}", provider.name(), fingerprint);
            let outcome = self
                .coordinator
                .execute(&provider_fp, || provider.fetch_ohlcv(&request))
                .await;

            match outcome {
                Ok(rows) if rows.is_empty() => {
                    log::debug!("{} has no data for {}, advancing", provider.name(), address);
                    reasons.push(format!("{}: no data", provider.name()));
                }
                Ok(rows) => {
                    let candles = normalizer::normalize(rows, None);
                    let series = MarketSeries {
                        candles,
                        is_synthetic: false,
                        source: provider.name().to_string(),
                        fallback_reason: join_reasons(&reasons),
                        last_update: chrono::Utc::now().timestamp(),
                    };
                    log::info!(
                        "📈 {} served {} candles for {} ({})",
                        provider.name(),
                        series.candles.len(),
                        address,
                        timeframe
                    );
                    self.cache.put(&fingerprint, series.clone(), self.cache_ttl);
                    return series;
                }
                Err(e) => {
                    log::warn!("⚠️  {} failed for {}: {}", provider.name(), address, e);
                    reasons.push(e.to_string());
                }
            }
        }

        // Every real provider exhausted: answer with simulated data rather
        // than nothing, visibly tagged.
        let anchor = before.unwrap_or_else(|| chrono::Utc::now().timestamp());
        let candles = synthetic::generate(address, timeframe, limit, anchor);
        let series = MarketSeries {
            candles,
            is_synthetic: true,
            source: "synthetic".to_string(),
            fallback_reason: Some(
                join_reasons(&reasons).unwrap_or_else(|| "no providers configured".to_string()),
            ),
            last_update: chrono::Utc::now().timestamp(),
        };
        log::warn!(
            "🧪 all providers exhausted for {} ({}), serving synthetic series",
            address,
            timeframe
        );
        self.cache.put(&fingerprint, series.clone(), self.cache_ttl);
        series
    }

    /// Symbol/name for a token, cached. Absence is cached too, so unindexed
    /// tokens do not re-query every request.
    pub async fn token_meta(&self, address: &str) -> Option<TokenMeta> {
        let cache_key = format!("meta:{}", address);
        if let Some(meta) = self.meta_cache.get(&cache_key) {
            return meta;
        }

        match self.dex.token_meta(address).await {
            Ok(meta) => {
                self.meta_cache.put(&cache_key, meta.clone(), self.meta_ttl);
                meta
            }
            Err(e) => {
                log::debug!("metadata lookup failed for {}: {}", address, e);
                None
            }
        }
    }
}

fn join_reasons(reasons: &[String]) -> Option<String> {
    if reasons.is_empty() {
        None
    } else {
        Some(reasons.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::RetryPolicy;
    use crate::error::ProviderError;
    use crate::rate_limiter::RateLimiter;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedProvider {
        name: &'static str,
        rows: Result<Vec<RawCandle>, ProviderError>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(name: &'static str, rows: Result<Vec<RawCandle>, ProviderError>) -> Arc<Self> {
            Arc::new(Self {
                name,
                rows,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl OhlcvProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch_ohlcv(
            &self,
            _request: &OhlcvRequest,
        ) -> Result<Vec<RawCandle>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rows.clone()
        }
    }

    fn rows(n: usize) -> Vec<RawCandle> {
        (0..n)
            .map(|i| RawCandle {
                time: 1_700_000_000 + i as i64 * 60,
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
                volume: 100.0,
            })
            .collect()
    }

    fn service(providers: Vec<Arc<dyn OhlcvProvider>>) -> MarketDataService {
        let policy = RetryPolicy {
            max_retries: 0,
            base_delay_ms: 1,
            backoff_factor: 2.0,
            max_delay_ms: 2,
        };
        MarketDataService::new(
            providers,
            RequestCoordinator::new(policy),
            Arc::new(CacheStore::new()),
            Arc::new(CacheStore::new()),
            Arc::new(DexScreenerClient::new(
                Arc::new(RateLimiter::new(Duration::from_millis(1), 100)),
                Duration::from_secs(1),
            )),
            Duration::from_secs(30),
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn test_fallback_skips_empty_provider_and_stops_at_data() {
        let a = ScriptedProvider::new("a", Ok(Vec::new()));
        let b = ScriptedProvider::new("b", Ok(rows(5)));
        let c = ScriptedProvider::new("c", Ok(rows(9)));
        let svc = service(vec![
            a.clone() as Arc<dyn OhlcvProvider>,
            b.clone(),
            c.clone(),
        ]);

        let series = svc
            .get_market_data("Mint111", Timeframe::H1, None, 100)
            .await;

        assert!(!series.is_synthetic);
        assert_eq!(series.source, "b");
        assert_eq!(series.candles.len(), 5);
        assert_eq!(series.fallback_reason.as_deref(), Some("a: no data"));
        // C is never called
        assert_eq!(c.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_provider_error_advances_to_next() {
        let a = ScriptedProvider::new(
            "a",
            Err(ProviderError::Http {
                provider: "a",
                status: 404,
            }),
        );
        let b = ScriptedProvider::new("b", Ok(rows(3)));
        let svc = service(vec![a as Arc<dyn OhlcvProvider>, b]);

        let series = svc
            .get_market_data("Mint111", Timeframe::H1, None, 100)
            .await;

        assert!(!series.is_synthetic);
        assert_eq!(series.source, "b");
        assert!(series.fallback_reason.unwrap().contains("HTTP 404"));
    }

    #[tokio::test]
    async fn test_exhaustion_yields_tagged_synthetic_series() {
        let a = ScriptedProvider::new("a", Ok(Vec::new()));
        let svc = service(vec![a as Arc<dyn OhlcvProvider>]);

        let series = svc.get_market_data("Mint111", Timeframe::H1, None, 50).await;

        assert!(series.is_synthetic);
        assert_eq!(series.source, "synthetic");
        assert_eq!(series.candles.len(), 50);
        assert!(series.fallback_reason.is_some());
        // Synthetic output still honors the candle invariants
        for pair in series.candles.windows(2) {
            assert!(pair[0].time < pair[1].time);
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_providers() {
        let a = ScriptedProvider::new("a", Ok(rows(5)));
        let svc = service(vec![a.clone() as Arc<dyn OhlcvProvider>]);

        let first = svc
            .get_market_data("Mint111", Timeframe::H1, None, 100)
            .await;
        let second = svc
            .get_market_data("Mint111", Timeframe::H1, None, 100)
            .await;

        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.candles, second.candles);
    }

    #[tokio::test]
    async fn test_distinct_logical_params_are_distinct_fingerprints() {
        let a = ScriptedProvider::new("a", Ok(rows(5)));
        let svc = service(vec![a.clone() as Arc<dyn OhlcvProvider>]);

        svc.get_market_data("Mint111", Timeframe::H1, None, 100)
            .await;
        svc.get_market_data("Mint111", Timeframe::M5, None, 100)
            .await;
        svc.get_market_data("Mint111", Timeframe::H1, Some(1_690_000_000), 100)
            .await;

        assert_eq!(a.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_synthetic_result_is_cached_against_churn() {
        let svc = service(Vec::new());

        let first = svc.get_market_data("Mint111", Timeframe::H1, None, 10).await;
        let second = svc.get_market_data("Mint111", Timeframe::H1, None, 10).await;

        assert!(first.is_synthetic && second.is_synthetic);
        assert_eq!(first.last_update, second.last_update);
    }
}
