//! Provider error taxonomy
//!
//! Every adapter maps its HTTP/parse outcomes into `ProviderError` so the
//! coordinator can decide retryability without knowing which provider it is
//! wrapping. Transient errors (429, 503, connection trouble) are retried
//! with backoff; permanent errors (other 4xx, malformed payloads) skip the
//! provider immediately. An empty-but-valid response is NOT an error: it is
//! `Ok` with zero rows, and the fallback loop advances without retrying.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// HTTP 429 or an explicit rate-limit signal. Carries the provider's
    /// retry hint when one was supplied.
    RateLimited {
        provider: &'static str,
        retry_after_ms: Option<u64>,
    },
    /// HTTP 503 or another explicitly temporary server condition.
    Unavailable { provider: &'static str, status: u16 },
    /// Connection reset, timeout, DNS failure.
    Network {
        provider: &'static str,
        detail: String,
    },
    /// Any other non-2xx status. Not retried.
    Http { provider: &'static str, status: u16 },
    /// Response parsed but did not match the provider's documented shape.
    Malformed {
        provider: &'static str,
        detail: String,
    },
}

impl ProviderError {
    /// Classify an HTTP status into the taxonomy.
    pub fn from_status(provider: &'static str, status: u16, retry_after_ms: Option<u64>) -> Self {
        match status {
            429 => ProviderError::RateLimited {
                provider,
                retry_after_ms,
            },
            503 => ProviderError::Unavailable { provider, status },
            _ => ProviderError::Http { provider, status },
        }
    }

    /// Map a reqwest transport error. Timeouts and connection failures are
    /// transient; body-decode failures mean the payload shape was wrong.
    pub fn from_reqwest(provider: &'static str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Malformed {
                provider,
                detail: err.to_string(),
            }
        } else {
            ProviderError::Network {
                provider,
                detail: err.to_string(),
            }
        }
    }

    pub fn provider(&self) -> &'static str {
        match self {
            ProviderError::RateLimited { provider, .. }
            | ProviderError::Unavailable { provider, .. }
            | ProviderError::Network { provider, .. }
            | ProviderError::Http { provider, .. }
            | ProviderError::Malformed { provider, .. } => provider,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. }
                | ProviderError::Unavailable { .. }
                | ProviderError::Network { .. }
        )
    }

    /// Provider-supplied retry hint, if any. Overrides the computed backoff.
    pub fn retry_hint(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited {
                retry_after_ms: Some(ms),
                ..
            } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::RateLimited {
                provider,
                retry_after_ms,
            } => match retry_after_ms {
                Some(ms) => write!(f, "{}: rate limited (retry after {}ms)", provider, ms),
                None => write!(f, "{}: rate limited", provider),
            },
            ProviderError::Unavailable { provider, status } => {
                write!(f, "{}: temporarily unavailable (HTTP {})", provider, status)
            }
            ProviderError::Network { provider, detail } => {
                write!(f, "{}: network error: {}", provider, detail)
            }
            ProviderError::Http { provider, status } => {
                write!(f, "{}: HTTP {}", provider, status)
            }
            ProviderError::Malformed { provider, detail } => {
                write!(f, "{}: unexpected payload: {}", provider, detail)
            }
        }
    }
}

impl std::error::Error for ProviderError {}
