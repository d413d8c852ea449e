//! Engine configuration from environment variables
//!
//! Every interval, TTL, buffer size and provider credential is tunable via
//! the environment; unset values fall back to defaults that work against the
//! public provider tiers. Provider keys are optional: an unkeyed engine
//! simply runs with fewer fallback stages.

use crate::coordinator::RetryPolicy;
use std::env;
use std::time::Duration;

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API binds to.
    pub bind_addr: String,

    pub birdeye_api_key: Option<String>,
    pub coingecko_api_key: Option<String>,
    pub helius_api_key: Option<String>,

    /// Mint whose trades the streaming decoder reconstructs. Streaming is
    /// disabled when unset.
    pub tracked_mint: Option<String>,

    pub http_timeout: Duration,
    pub retry: RetryPolicy,

    /// Minimum spacing between calls under one credential role.
    pub min_call_interval: Duration,
    /// Advisory calls-per-minute threshold per credential role.
    pub rate_soft_limit: u32,

    pub market_cache_ttl: Duration,
    pub meta_cache_ttl: Duration,
    pub trending_cache_ttl: Duration,
    pub security_cache_ttl: Duration,
    pub holders_cache_ttl: Duration,
    pub transactions_cache_ttl: Duration,

    pub oracle_refresh_interval: Duration,
    pub oracle_ttl: Duration,
    /// USD price substituted for the native asset when the oracle is stale.
    pub sol_fallback_price: f64,

    /// Minimum tracked-asset delta magnitude a record must move to count as
    /// a trade.
    pub dust_threshold: f64,
    pub stream_channel_buffer: usize,
    pub stream_keepalive: Duration,
}

fn env_u64(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("Invalid {} '{}', defaulting to {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

fn env_f64(name: &str, default: f64) -> f64 {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("Invalid {} '{}', defaulting to {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(env_u64(name, default))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let birdeye_api_key = env::var("BIRDEYE_API_KEY").ok().filter(|k| !k.is_empty());
        let coingecko_api_key = env::var("COINGECKO_API_KEY").ok().filter(|k| !k.is_empty());
        let helius_api_key = env::var("HELIUS_API_KEY").ok().filter(|k| !k.is_empty());

        let tracked_mint = env::var("TRACKED_MINT").ok().filter(|m| !m.is_empty());
        if let Some(mint) = &tracked_mint {
            if mint.len() < 32 || mint.len() > 44 {
                return Err(ConfigError::InvalidValue(format!(
                    "TRACKED_MINT must be 32-44 characters (base58 mint), got {}",
                    mint.len()
                )));
            }
            // The stream transport is Helius-backed; tracking without a key
            // cannot work.
            if helius_api_key.is_none() {
                return Err(ConfigError::MissingVariable("HELIUS_API_KEY".to_string()));
            }
        }

        let retry = RetryPolicy {
            max_retries: env_u64("RETRY_MAX_ATTEMPTS", 3) as u32,
            base_delay_ms: env_u64("RETRY_BASE_DELAY_MS", 500),
            backoff_factor: env_f64("RETRY_BACKOFF_FACTOR", 2.0),
            max_delay_ms: env_u64("RETRY_MAX_DELAY_MS", 8_000),
        };

        Ok(Self {
            bind_addr,
            birdeye_api_key,
            coingecko_api_key,
            helius_api_key,
            tracked_mint,
            http_timeout: Duration::from_millis(env_u64("HTTP_TIMEOUT_MS", 10_000)),
            retry,
            min_call_interval: Duration::from_millis(env_u64("MIN_CALL_INTERVAL_MS", 250)),
            rate_soft_limit: env_u64("RATE_SOFT_LIMIT_PER_MINUTE", 60) as u32,
            market_cache_ttl: env_secs("MARKET_CACHE_TTL_SECONDS", 30),
            meta_cache_ttl: env_secs("META_CACHE_TTL_SECONDS", 600),
            trending_cache_ttl: env_secs("TRENDING_CACHE_TTL_SECONDS", 60),
            security_cache_ttl: env_secs("SECURITY_CACHE_TTL_SECONDS", 300),
            holders_cache_ttl: env_secs("HOLDERS_CACHE_TTL_SECONDS", 60),
            transactions_cache_ttl: env_secs("TRANSACTIONS_CACHE_TTL_SECONDS", 30),
            oracle_refresh_interval: env_secs("ORACLE_REFRESH_SECONDS", 30),
            oracle_ttl: env_secs("ORACLE_TTL_SECONDS", 60),
            sol_fallback_price: env_f64("SOL_FALLBACK_PRICE", 150.0),
            dust_threshold: env_f64("DUST_THRESHOLD", 0.001),
            stream_channel_buffer: env_u64("STREAM_CHANNEL_BUFFER", 1_000) as usize,
            stream_keepalive: env_secs("STREAM_KEEPALIVE_SECONDS", 30),
        })
    }

    /// Helius websocket endpoint for the configured credential.
    pub fn helius_ws_url(&self) -> Option<String> {
        self.helius_api_key
            .as_ref()
            .map(|key| format!("wss://mainnet.helius-rpc.com/?api-key={}", key))
    }
}
