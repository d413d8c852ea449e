use solpulse::api::{self, AppState};
use solpulse::cache::CacheStore;
use solpulse::config::Config;
use solpulse::coordinator::RequestCoordinator;
use solpulse::intel::TokenIntelService;
use solpulse::market::{MarketDataService, TrendingService};
use solpulse::oracle::{self, PriceOracleCache};
use solpulse::providers::birdeye::BirdeyeClient;
use solpulse::providers::coingecko::CoinGeckoClient;
use solpulse::providers::dexscreener::DexScreenerClient;
use solpulse::providers::geckoterminal::GeckoTerminalClient;
use solpulse::providers::helius::HeliusClient;
use solpulse::providers::{OhlcvProvider, TrendingProvider};
use solpulse::rate_limiter::RateLimiter;
use solpulse::stream::{ConnectionStatus, SwapEventDecoder, TradeStreamClient};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = Config::from_env()?;

    log::info!("🚀 Starting SolPulse...");
    log::info!("📊 Configuration:");
    log::info!("   Bind address: {}", config.bind_addr);
    log::info!(
        "   Birdeye key: {}",
        if config.birdeye_api_key.is_some() { "set" } else { "unset" }
    );
    log::info!(
        "   CoinGecko key: {}",
        if config.coingecko_api_key.is_some() { "set" } else { "unset" }
    );
    log::info!(
        "   Helius key: {}",
        if config.helius_api_key.is_some() { "set" } else { "unset" }
    );
    log::info!(
        "   Tracked mint: {}",
        config.tracked_mint.as_deref().unwrap_or("none (stream disabled)")
    );

    let limiter = Arc::new(RateLimiter::new(
        config.min_call_interval,
        config.rate_soft_limit,
    ));

    let dex = Arc::new(DexScreenerClient::new(
        Arc::clone(&limiter),
        config.http_timeout,
    ));

    // Oracle refresh runs for the process lifetime; no teardown needed.
    let oracle = Arc::new(PriceOracleCache::new(
        config.oracle_ttl,
        config.sol_fallback_price,
    ));
    oracle::spawn_refresher(
        Arc::clone(&oracle),
        Arc::clone(&dex),
        config.oracle_refresh_interval,
    );

    let pool_cache = Arc::new(CacheStore::new());
    let birdeye = config.birdeye_api_key.as_ref().map(|key| {
        Arc::new(BirdeyeClient::new(
            key.clone(),
            Arc::clone(&limiter),
            config.http_timeout,
        ))
    });
    let geckoterminal = Arc::new(GeckoTerminalClient::new(
        Arc::clone(&limiter),
        Arc::clone(&pool_cache),
        config.http_timeout,
    ));
    let coingecko = config.coingecko_api_key.as_ref().map(|key| {
        Arc::new(CoinGeckoClient::new(
            key.clone(),
            Arc::clone(&limiter),
            Arc::clone(&pool_cache),
            config.http_timeout,
        ))
    });
    let helius = config.helius_api_key.as_ref().map(|key| {
        Arc::new(HeliusClient::new(
            key,
            Arc::clone(&limiter),
            config.http_timeout,
        ))
    });

    // Priority order: keyed Birdeye first, unkeyed GeckoTerminal always,
    // CoinGecko last. Synthesis is the implicit final stage.
    let mut ohlcv_providers: Vec<Arc<dyn OhlcvProvider>> = Vec::new();
    if let Some(birdeye) = &birdeye {
        ohlcv_providers.push(Arc::clone(birdeye) as Arc<dyn OhlcvProvider>);
    }
    ohlcv_providers.push(Arc::clone(&geckoterminal) as Arc<dyn OhlcvProvider>);
    if let Some(coingecko) = &coingecko {
        ohlcv_providers.push(Arc::clone(coingecko) as Arc<dyn OhlcvProvider>);
    }

    let mut trending_providers: Vec<Arc<dyn TrendingProvider>> = Vec::new();
    if let Some(birdeye) = &birdeye {
        trending_providers.push(Arc::clone(birdeye) as Arc<dyn TrendingProvider>);
    }
    trending_providers.push(Arc::clone(&geckoterminal) as Arc<dyn TrendingProvider>);

    let market = MarketDataService::new(
        ohlcv_providers,
        RequestCoordinator::new(config.retry.clone()),
        Arc::new(CacheStore::new()),
        Arc::new(CacheStore::new()),
        Arc::clone(&dex),
        config.market_cache_ttl,
        config.meta_cache_ttl,
    );

    let trending = TrendingService::new(
        trending_providers,
        RequestCoordinator::new(config.retry.clone()),
        Arc::new(CacheStore::new()),
        config.trending_cache_ttl,
    );

    let intel = TokenIntelService::new(
        birdeye.clone(),
        helius.clone(),
        RequestCoordinator::new(config.retry.clone()),
        RequestCoordinator::new(config.retry.clone()),
        RequestCoordinator::new(config.retry.clone()),
        config.security_cache_ttl,
        config.holders_cache_ttl,
        config.transactions_cache_ttl,
    );

    if let (Some(mint), Some(ws_url)) = (config.tracked_mint.clone(), config.helius_ws_url()) {
        let decoder =
            SwapEventDecoder::new(mint.clone(), config.dust_threshold, Arc::clone(&oracle));
        let client = TradeStreamClient::new(
            ws_url,
            mint,
            config.stream_keepalive,
            config.stream_channel_buffer,
        );

        tokio::spawn(async move {
            let result = client
                .run(
                    decoder,
                    Arc::new(|event| {
                        log::debug!("trade event dispatched: {}", event.tx_id);
                    }),
                    Arc::new(|status| {
                        if status == ConnectionStatus::Disconnected {
                            log::warn!("🔌 Trade stream disconnected");
                        }
                    }),
                )
                .await;
            if let Err(e) = result {
                log::error!("❌ Trade stream stopped: {}", e);
            }
        });
    }

    let state = Arc::new(AppState {
        market,
        trending,
        intel,
        limiter,
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    log::info!("🌐 API listening on http://{}", config.bind_addr);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("Shutting down");
        })
        .await?;

    Ok(())
}
