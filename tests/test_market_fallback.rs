//! Integration tests for the market-data path: request deduplication,
//! cache TTL behavior, provider fallback ordering, and retry handling,
//! exercised through the public service API the HTTP layer uses.

use async_trait::async_trait;
use solpulse::cache::CacheStore;
use solpulse::coordinator::{RequestCoordinator, RetryPolicy};
use solpulse::error::ProviderError;
use solpulse::market::{MarketDataService, Timeframe};
use solpulse::providers::dexscreener::DexScreenerClient;
use solpulse::providers::{OhlcvProvider, OhlcvRequest, RawCandle};
use solpulse::rate_limiter::RateLimiter;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Provider that scripts its response per call: the nth call gets the nth
/// outcome, the last outcome repeats.
struct ScriptedProvider {
    name: &'static str,
    outcomes: Vec<Result<Vec<RawCandle>, ProviderError>>,
    delay: Duration,
    calls: AtomicU32,
}

impl ScriptedProvider {
    fn new(name: &'static str, outcomes: Vec<Result<Vec<RawCandle>, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            outcomes,
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        })
    }

    fn slow(
        name: &'static str,
        outcomes: Vec<Result<Vec<RawCandle>, ProviderError>>,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            outcomes,
            delay,
            calls: AtomicU32::new(0),
        })
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OhlcvProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_ohlcv(&self, _request: &OhlcvRequest) -> Result<Vec<RawCandle>, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        if self.delay > Duration::ZERO {
            tokio::time::sleep(self.delay).await;
        }
        self.outcomes
            .get(call)
            .or_else(|| self.outcomes.last())
            .expect("scripted provider needs at least one outcome")
            .clone()
    }
}

fn rows(n: usize) -> Vec<RawCandle> {
    (0..n)
        .map(|i| RawCandle {
            time: 1_700_000_000 + i as i64 * 3_600,
            open: 1.0 + i as f64,
            high: 2.0 + i as f64,
            low: 0.5 + i as f64,
            close: 1.5 + i as f64,
            volume: 100.0,
        })
        .collect()
}

fn service_with_ttl(
    providers: Vec<Arc<dyn OhlcvProvider>>,
    cache_ttl: Duration,
) -> MarketDataService {
    let policy = RetryPolicy {
        max_retries: 2,
        base_delay_ms: 1,
        backoff_factor: 2.0,
        max_delay_ms: 5,
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
        cache_ttl,
        Duration::from_secs(60),
    )
}

#[tokio::test]
async fn test_concurrent_identical_requests_hit_provider_once() {
    let provider = ScriptedProvider::slow("a", vec![Ok(rows(5))], Duration::from_millis(50));
    let svc = Arc::new(service_with_ttl(
        vec![provider.clone() as Arc<dyn OhlcvProvider>],
        Duration::from_secs(30),
    ));

    let mut handles = Vec::new();
    for _ in 0..6 {
        let svc = Arc::clone(&svc);
        handles.push(tokio::spawn(async move {
            svc.get_market_data("Mint111", Timeframe::H1, None, 100).await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    // One provider call, identical results for every caller
    assert_eq!(provider.call_count(), 1);
    for series in &results {
        assert_eq!(series.candles, results[0].candles);
        assert!(!series.is_synthetic);
    }
}

#[tokio::test]
async fn test_cache_expiry_triggers_fresh_provider_call() {
    let provider = ScriptedProvider::new("a", vec![Ok(rows(3))]);
    let svc = service_with_ttl(
        vec![provider.clone() as Arc<dyn OhlcvProvider>],
        Duration::from_millis(80),
    );

    svc.get_market_data("Mint111", Timeframe::H1, None, 100).await;
    svc.get_market_data("Mint111", Timeframe::H1, None, 100).await;
    // Within the TTL the cache answers
    assert_eq!(provider.call_count(), 1);

    tokio::time::sleep(Duration::from_millis(120)).await;

    svc.get_market_data("Mint111", Timeframe::H1, None, 100).await;
    // Past the TTL the provider is consulted again
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn test_fallback_order_empty_then_data_skips_rest() {
    let a = ScriptedProvider::new("a", vec![Ok(Vec::new())]);
    let b = ScriptedProvider::new("b", vec![Ok(rows(5))]);
    let c = ScriptedProvider::new("c", vec![Ok(rows(9))]);
    let svc = service_with_ttl(
        vec![
            a.clone() as Arc<dyn OhlcvProvider>,
            b.clone(),
            c.clone(),
        ],
        Duration::from_secs(30),
    );

    let series = svc.get_market_data("Mint111", Timeframe::H1, None, 100).await;

    assert_eq!(series.source, "b");
    assert_eq!(series.candles.len(), 5);
    assert!(!series.is_synthetic);
    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 1);
    assert_eq!(c.call_count(), 0);
}

#[tokio::test]
async fn test_transient_failure_retried_before_fallback() {
    let flaky = ScriptedProvider::new(
        "flaky",
        vec![
            Err(ProviderError::Unavailable {
                provider: "flaky",
                status: 503,
            }),
            Err(ProviderError::Unavailable {
                provider: "flaky",
                status: 503,
            }),
            Ok(rows(4)),
        ],
    );
    let backup = ScriptedProvider::new("backup", vec![Ok(rows(7))]);
    let svc = service_with_ttl(
        vec![flaky.clone() as Arc<dyn OhlcvProvider>, backup.clone()],
        Duration::from_secs(30),
    );

    let series = svc.get_market_data("Mint111", Timeframe::H1, None, 100).await;

    // Retries exhaust the transient failures; the backup is never needed
    assert_eq!(series.source, "flaky");
    assert_eq!(flaky.call_count(), 3);
    assert_eq!(backup.call_count(), 0);
}

#[tokio::test]
async fn test_permanent_failure_falls_through_without_retry() {
    let broken = ScriptedProvider::new(
        "broken",
        vec![Err(ProviderError::Http {
            provider: "broken",
            status: 403,
        })],
    );
    let backup = ScriptedProvider::new("backup", vec![Ok(rows(2))]);
    let svc = service_with_ttl(
        vec![broken.clone() as Arc<dyn OhlcvProvider>, backup.clone()],
        Duration::from_secs(30),
    );

    let series = svc.get_market_data("Mint111", Timeframe::H1, None, 100).await;

    assert_eq!(series.source, "backup");
    assert_eq!(broken.call_count(), 1);
    assert!(series.fallback_reason.unwrap().contains("HTTP 403"));
}

#[tokio::test]
async fn test_exhaustion_synthesizes_with_candle_invariants() {
    // Messy provider: duplicates and disorder must never reach a caller
    let messy = ScriptedProvider::new(
        "messy",
        vec![Ok(vec![
            RawCandle {
                time: 1_700_007_200,
                open: 3.0,
                high: 3.0,
                low: 3.0,
                close: 3.0,
                volume: 1.0,
            },
            RawCandle {
                time: 1_700_000_000,
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 1.0,
            },
            RawCandle {
                time: 1_700_007_200,
                open: 9.0,
                high: 9.0,
                low: 9.0,
                close: 9.0,
                volume: 9.0,
            },
        ])],
    );
    let svc = service_with_ttl(
        vec![messy as Arc<dyn OhlcvProvider>],
        Duration::from_secs(30),
    );

    let series = svc.get_market_data("Mint111", Timeframe::H1, None, 100).await;
    assert_eq!(series.candles.len(), 2);
    for pair in series.candles.windows(2) {
        assert!(pair[0].time < pair[1].time);
    }

    // And total exhaustion still answers, flagged synthetic
    let empty_svc = service_with_ttl(Vec::new(), Duration::from_secs(30));
    let synthetic = empty_svc
        .get_market_data("Mint111", Timeframe::H1, None, 25)
        .await;
    assert!(synthetic.is_synthetic);
    assert_eq!(synthetic.candles.len(), 25);
    for pair in synthetic.candles.windows(2) {
        assert!(pair[0].time < pair[1].time);
    }
}
