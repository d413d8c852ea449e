//! Per-credential rate limiting
//!
//! Two independent mechanisms per credential id (e.g. `birdeye:ohlcv`,
//! `helius:holders`):
//!
//! - a rolling one-minute call counter. Exceeding the soft threshold never
//!   blocks a call; it is advisory bookkeeping surfaced through diagnostics
//!   so operators can spot credentials that need rotation.
//! - a hard minimum inter-call spacing. A call waits until
//!   `last_call + min_interval` has elapsed before proceeding.
//!
//! Distinct credential roles keep fully independent state, so congestion on
//! one role does not starve another.

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

#[derive(Debug)]
struct CredentialUsage {
    window_minute: u64,
    count: u32,
    last_call: Option<Instant>,
}

impl CredentialUsage {
    fn new() -> Self {
        Self {
            window_minute: current_minute(),
            count: 0,
            last_call: None,
        }
    }
}

fn current_minute() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
        / 60
}

pub struct RateLimiter {
    usage: Mutex<HashMap<String, CredentialUsage>>,
    min_interval: Duration,
    soft_limit: u32,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, soft_limit: u32) -> Self {
        Self {
            usage: Mutex::new(HashMap::new()),
            min_interval,
            soft_limit,
        }
    }

    /// Wait until the credential's spacing allows another call, then record
    /// it in the current minute window. Never rejects; only delays.
    pub async fn acquire(&self, credential: &str) {
        loop {
            let wait = {
                let mut usage = self.usage.lock().await;
                let entry = usage
                    .entry(credential.to_string())
                    .or_insert_with(CredentialUsage::new);

                let minute = current_minute();
                if minute > entry.window_minute {
                    entry.window_minute = minute;
                    entry.count = 0;
                }

                match entry.last_call {
                    Some(last) if last.elapsed() < self.min_interval => {
                        self.min_interval - last.elapsed()
                    }
                    _ => {
                        entry.last_call = Some(Instant::now());
                        entry.count += 1;
                        if entry.count == self.soft_limit + 1 {
                            log::warn!(
                                "🛑 [{}] exceeded soft limit of {} calls/minute",
                                credential,
                                self.soft_limit
                            );
                        }
                        return;
                    }
                }
            };

            tokio::time::sleep(wait).await;
        }
    }

    /// Calls recorded for this credential in the current minute window.
    pub async fn window_count(&self, credential: &str) -> u32 {
        let usage = self.usage.lock().await;
        match usage.get(credential) {
            Some(entry) if entry.window_minute == current_minute() => entry.count,
            _ => 0,
        }
    }

    /// Snapshot of all credential counters, for diagnostics.
    pub async fn snapshot(&self) -> Vec<(String, u32)> {
        let minute = current_minute();
        let usage = self.usage.lock().await;
        let mut counts: Vec<(String, u32)> = usage
            .iter()
            .map(|(credential, entry)| {
                let count = if entry.window_minute == minute {
                    entry.count
                } else {
                    0
                };
                (credential.clone(), count)
            })
            .collect();
        counts.sort();
        counts
    }
}
