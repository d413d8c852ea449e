//! Token intelligence: security report, holder list, transaction history.
//!
//! Single-provider lookups with caching and dedup but, unlike candles, no
//! synthetic stage: a fabricated security report would be actively
//! misleading, so absent data surfaces as an explicit error or empty list.

use crate::cache::CacheStore;
use crate::coordinator::RequestCoordinator;
use crate::error::ProviderError;
use crate::providers::birdeye::BirdeyeClient;
use crate::providers::helius::HeliusClient;
use crate::providers::{HolderAccount, SecurityReport, TokenTransaction};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum IntelError {
    /// The backing provider has no credential configured.
    NotConfigured(&'static str),
    Provider(ProviderError),
}

impl std::fmt::Display for IntelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntelError::NotConfigured(provider) => {
                write!(f, "{} credential not configured", provider)
            }
            IntelError::Provider(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for IntelError {}

impl From<ProviderError> for IntelError {
    fn from(e: ProviderError) -> Self {
        IntelError::Provider(e)
    }
}

pub struct TokenIntelService {
    birdeye: Option<Arc<BirdeyeClient>>,
    helius: Option<Arc<HeliusClient>>,
    security_coordinator: RequestCoordinator<SecurityReport>,
    holders_coordinator: RequestCoordinator<Vec<HolderAccount>>,
    tx_coordinator: RequestCoordinator<Vec<TokenTransaction>>,
    security_cache: Arc<CacheStore<SecurityReport>>,
    holders_cache: Arc<CacheStore<Vec<HolderAccount>>>,
    tx_cache: Arc<CacheStore<Vec<TokenTransaction>>>,
    security_ttl: Duration,
    holders_ttl: Duration,
    tx_ttl: Duration,
}

impl TokenIntelService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        birdeye: Option<Arc<BirdeyeClient>>,
        helius: Option<Arc<HeliusClient>>,
        security_coordinator: RequestCoordinator<SecurityReport>,
        holders_coordinator: RequestCoordinator<Vec<HolderAccount>>,
        tx_coordinator: RequestCoordinator<Vec<TokenTransaction>>,
        security_ttl: Duration,
        holders_ttl: Duration,
        tx_ttl: Duration,
    ) -> Self {
        Self {
            birdeye,
            helius,
            security_coordinator,
            holders_coordinator,
            tx_coordinator,
            security_cache: Arc::new(CacheStore::new()),
            holders_cache: Arc::new(CacheStore::new()),
            tx_cache: Arc::new(CacheStore::new()),
            security_ttl,
            holders_ttl,
            tx_ttl,
        }
    }

    pub async fn token_security(&self, address: &str) -> Result<SecurityReport, IntelError> {
        let birdeye = self
            .birdeye
            .as_ref()
            .ok_or(IntelError::NotConfigured("birdeye"))?;

        let fingerprint = format!("security:{}", address);
        if let Some(report) = self.security_cache.get(&fingerprint) {
            return Ok(report);
        }

        let report = self
            .security_coordinator
            .execute(&fingerprint, || birdeye.fetch_security(address))
            .await?;
        self.security_cache
            .put(&fingerprint, report.clone(), self.security_ttl);
        Ok(report)
    }

    pub async fn top_holders(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<HolderAccount>, IntelError> {
        let helius = self
            .helius
            .as_ref()
            .ok_or(IntelError::NotConfigured("helius"))?;

        let fingerprint = format!("holders:{}:{}", address, limit);
        if let Some(holders) = self.holders_cache.get(&fingerprint) {
            return Ok(holders);
        }

        let holders = self
            .holders_coordinator
            .execute(&fingerprint, || helius.largest_accounts(address, limit))
            .await?;
        self.holders_cache
            .put(&fingerprint, holders.clone(), self.holders_ttl);
        Ok(holders)
    }

    pub async fn recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<TokenTransaction>, IntelError> {
        let helius = self
            .helius
            .as_ref()
            .ok_or(IntelError::NotConfigured("helius"))?;

        let fingerprint = format!("transactions:{}:{}", address, limit);
        if let Some(transactions) = self.tx_cache.get(&fingerprint) {
            return Ok(transactions);
        }

        let transactions = self
            .tx_coordinator
            .execute(&fingerprint, || helius.recent_transactions(address, limit))
            .await?;
        self.tx_cache
            .put(&fingerprint, transactions.clone(), self.tx_ttl);
        Ok(transactions)
    }
}
