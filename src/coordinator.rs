//! Request coordination: in-flight deduplication and retry with backoff
//!
//! `execute` wraps one unit of work under a fingerprint. Callers that arrive
//! while an identical call is outstanding do not issue a duplicate provider
//! call; they wait on the same eventual result. Transient failures are
//! retried with exponential backoff (optionally overridden by a
//! provider-supplied retry hint); permanent failures propagate immediately.

use crate::error::ProviderError;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Delay before retrying after the given zero-based attempt:
    /// `min(max_delay, base_delay * backoff_factor^attempt)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let raw = self.base_delay_ms as f64 * self.backoff_factor.powi(attempt as i32);
        Duration::from_millis(raw.min(self.max_delay_ms as f64) as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            backoff_factor: 2.0,
            max_delay_ms: 8_000,
        }
    }
}

type Settled<T> = Result<T, ProviderError>;

pub struct RequestCoordinator<T> {
    in_flight: Mutex<HashMap<String, broadcast::Sender<Settled<T>>>>,
    policy: RetryPolicy,
}

impl<T: Clone + Send + 'static> RequestCoordinator<T> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
            policy,
        }
    }

    /// Run `work` under `fingerprint`, retrying transient failures.
    ///
    /// If a call with the same fingerprint is already in flight, the caller
    /// receives that call's settled result instead of issuing its own.
    /// Bookkeeping for the fingerprint is removed once the call settles, so
    /// a later call starts fresh.
    pub async fn execute<F, Fut>(&self, fingerprint: &str, work: F) -> Settled<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Settled<T>>,
    {
        let mut rx = {
            let mut in_flight = self.in_flight.lock().unwrap();
            match in_flight.get(fingerprint) {
                Some(tx) => Some(tx.subscribe()),
                None => {
                    let (tx, _) = broadcast::channel(1);
                    in_flight.insert(fingerprint.to_string(), tx);
                    None
                }
            }
        };

        if let Some(rx) = rx.as_mut() {
            return match rx.recv().await {
                Ok(settled) => settled,
                Err(_) => Err(ProviderError::Network {
                    provider: "coordinator",
                    detail: "in-flight call dropped before settling".to_string(),
                }),
            };
        }

        let settled = self.run_with_retries(fingerprint, work).await;

        let tx = self.in_flight.lock().unwrap().remove(fingerprint);
        if let Some(tx) = tx {
            // No receivers is fine: nobody else asked for this fingerprint.
            let _ = tx.send(settled.clone());
        }

        settled
    }

    async fn run_with_retries<F, Fut>(&self, fingerprint: &str, work: F) -> Settled<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Settled<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match work().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.policy.max_retries => {
                    let delay = err.retry_hint().unwrap_or(self.policy.delay_for(attempt));
                    log::warn!(
                        "⏳ [{}] attempt {} of {} failed ({}), retrying in {:?}",
                        fingerprint,
                        attempt + 1,
                        self.policy.max_retries + 1,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
