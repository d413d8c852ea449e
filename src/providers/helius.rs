//! Helius adapter: JSON-RPC over HTTP for holder lists and token
//! transaction history.
//!
//! The same credential backs several roles; `helius:holders` and
//! `helius:transactions` keep independent rate-limit state so a holder-list
//! burst cannot starve transaction polling.

use crate::error::ProviderError;
use crate::providers::{ensure_success, HolderAccount, TokenTransaction};
use crate::rate_limiter::RateLimiter;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const PROVIDER: &str = "helius";

pub struct HeliusClient {
    client: reqwest::Client,
    rpc_url: String,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct LargestAccountsResult {
    #[serde(default)]
    value: Vec<LargestAccount>,
}

#[derive(Debug, Deserialize)]
struct LargestAccount {
    address: String,
    #[serde(rename = "uiAmount")]
    ui_amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SignatureInfo {
    signature: String,
    #[serde(rename = "blockTime")]
    block_time: Option<i64>,
    err: Option<Value>,
}

impl HeliusClient {
    pub fn new(api_key: &str, limiter: Arc<RateLimiter>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            rpc_url: format!("https://mainnet.helius-rpc.com/?api-key={}", api_key),
            limiter,
            timeout,
        }
    }

    async fn rpc_call<T: serde::de::DeserializeOwned>(
        &self,
        credential: &str,
        method: &str,
        params: Value,
    ) -> Result<T, ProviderError> {
        self.limiter.acquire(credential).await;

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        ensure_success(PROVIDER, &response)?;

        let payload: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        if let Some(err) = payload.error {
            // -32429 is the node's rate-limit code
            if err.code == -32_429 {
                return Err(ProviderError::RateLimited {
                    provider: PROVIDER,
                    retry_after_ms: None,
                });
            }
            return Err(ProviderError::Malformed {
                provider: PROVIDER,
                detail: format!("rpc error {}: {}", err.code, err.message),
            });
        }

        payload.result.ok_or(ProviderError::Malformed {
            provider: PROVIDER,
            detail: "missing result".to_string(),
        })
    }

    /// Largest token accounts for a mint, descending by balance.
    pub async fn largest_accounts(
        &self,
        mint: &str,
        limit: usize,
    ) -> Result<Vec<HolderAccount>, ProviderError> {
        let result: LargestAccountsResult = self
            .rpc_call("helius:holders", "getTokenLargestAccounts", json!([mint]))
            .await?;

        Ok(result
            .value
            .into_iter()
            .take(limit)
            .map(|account| HolderAccount {
                address: account.address,
                amount: account.ui_amount.unwrap_or(0.0),
            })
            .collect())
    }

    /// Recent transaction signatures touching a mint, newest first.
    pub async fn recent_transactions(
        &self,
        mint: &str,
        limit: usize,
    ) -> Result<Vec<TokenTransaction>, ProviderError> {
        let signatures: Vec<SignatureInfo> = self
            .rpc_call(
                "helius:transactions",
                "getSignaturesForAddress",
                json!([mint, { "limit": limit }]),
            )
            .await?;

        Ok(signatures
            .into_iter()
            .map(|info| TokenTransaction {
                signature: info.signature,
                time: info.block_time,
                failed: info.err.is_some(),
            })
            .collect())
    }
}
