//! Trending token list with provider fallback
//!
//! Same priority-list discipline as the candle orchestrator: first provider
//! with rows wins, exhaustion falls back to a deterministic placeholder
//! list tagged as synthetic.

use crate::cache::CacheStore;
use crate::coordinator::RequestCoordinator;
use crate::market::synthetic::SyntheticProfile;
use crate::providers::{TrendingProvider, TrendingToken};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TRENDING_LIMIT: usize = 20;

const PLACEHOLDER_NAMES: &[(&str, &str)] = &[
    ("Aurora", "AUR"),
    ("Nebula", "NEB"),
    ("Quasar", "QSR"),
    ("Pulsar", "PLS"),
    ("Meteor", "MTR"),
    ("Comet", "CMT"),
    ("Nova", "NVA"),
    ("Eclipse", "ECL"),
    ("Zenith", "ZNT"),
    ("Orbit", "ORB"),
];

#[derive(Debug, Clone)]
pub struct TrendingList {
    pub tokens: Vec<TrendingToken>,
    pub is_synthetic: bool,
    pub source: String,
}

pub struct TrendingService {
    providers: Vec<Arc<dyn TrendingProvider>>,
    coordinator: RequestCoordinator<Vec<TrendingToken>>,
    cache: Arc<CacheStore<TrendingList>>,
    ttl: Duration,
}

impl TrendingService {
    pub fn new(
        providers: Vec<Arc<dyn TrendingProvider>>,
        coordinator: RequestCoordinator<Vec<TrendingToken>>,
        cache: Arc<CacheStore<TrendingList>>,
        ttl: Duration,
    ) -> Self {
        Self {
            providers,
            coordinator,
            cache,
            ttl,
        }
    }

    pub async fn get_trending(&self, limit: usize) -> TrendingList {
        let limit = limit.clamp(1, 100);
        let fingerprint = format!("trending:{}", limit);

        if let Some(list) = self.cache.get(&fingerprint) {
            return list;
        }

        for provider in &self.providers {
            let provider_fp = format!("{}:{}", provider.name(), fingerprint);
            let outcome = self
                .coordinator
                .execute(&provider_fp, || provider.fetch_trending(limit))
                .await;

            match outcome {
                Ok(tokens) if tokens.is_empty() => {
                    log::debug!("{} returned empty trending list, advancing", provider.name());
                }
                Ok(tokens) => {
                    let list = TrendingList {
                        tokens,
                        is_synthetic: false,
                        source: provider.name().to_string(),
                    };
                    self.cache.put(&fingerprint, list.clone(), self.ttl);
                    return list;
                }
                Err(e) => {
                    log::warn!("⚠️  {} trending failed: {}", provider.name(), e);
                }
            }
        }

        log::warn!("🧪 trending providers exhausted, serving placeholder list");
        let list = TrendingList {
            tokens: placeholder_tokens(limit),
            is_synthetic: true,
            source: "synthetic".to_string(),
        };
        self.cache.put(&fingerprint, list.clone(), self.ttl);
        list
    }
}

/// Deterministic placeholder list; prices and volumes come from each fake
/// token's synthetic profile so repeated generations agree.
fn placeholder_tokens(limit: usize) -> Vec<TrendingToken> {
    PLACEHOLDER_NAMES
        .iter()
        .take(limit.min(PLACEHOLDER_NAMES.len()))
        .enumerate()
        .map(|(idx, (name, symbol))| {
            let address = format!("Sim{}1111111111111111111111111111111111111", idx + 1);
            let profile = SyntheticProfile::for_token(&address);
            TrendingToken {
                address,
                name: name.to_string(),
                symbol: symbol.to_string(),
                price: profile.base_price,
                change_24h: profile.trend * 2_400.0,
                volume_24h: profile.base_price * 100_000.0,
                market_cap: profile.base_price * 10_000_000.0,
                rank: idx as u32 + 1,
            }
        })
        .collect()
}
