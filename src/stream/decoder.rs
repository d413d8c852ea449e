//! Trade reconstruction from raw ledger records
//!
//! A record is a swap in the tracked asset when its balance-delta set moves
//! the tracked mint by more than the dust threshold. Direction comes from
//! the sign of the tracked delta, the price from the counter-asset leg, and
//! the USD value from the oracle. Everything here is a pure function of one
//! record plus oracle lookups; no state is kept between calls.

use crate::oracle::{PriceOracleCache, NATIVE_MINT};
use crate::stream::types::{TokenBalance, TransactionRecord};
use serde::Serialize;
use std::sync::Arc;

/// Native deltas below this are fee noise, not a trade leg.
const MIN_NATIVE_DELTA: f64 = 0.0001;

/// Venue program identifiers the decoder can label. Best effort: an unknown
/// venue never blocks the event.
const KNOWN_VENUES: &[(&str, &str)] = &[
    ("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8", "raydium"),
    ("whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc", "orca"),
    ("JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4", "jupiter"),
    ("6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P", "pumpfun"),
    ("pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA", "pumpswap"),
    ("MoonCVVNZFSYkqNXP6bxHLPL6QQJiMagDL3qcqUQTrG", "moonshot"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }
}

/// One reconstructed trade. Emitted to the subscriber and not retained.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeEvent {
    /// Unix seconds at decode time.
    pub time: i64,
    pub side: TradeSide,
    /// Tracked-asset amount, absolute.
    pub amount: f64,
    pub price_per_unit: f64,
    pub usd_value: f64,
    pub trader: Option<String>,
    pub tx_id: String,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct TokenDelta {
    mint: String,
    owner: Option<String>,
    ui_change: f64,
}

pub struct SwapEventDecoder {
    tracked_mint: String,
    dust_threshold: f64,
    oracle: Arc<PriceOracleCache>,
}

impl SwapEventDecoder {
    pub fn new(tracked_mint: String, dust_threshold: f64, oracle: Arc<PriceOracleCache>) -> Self {
        Self {
            tracked_mint,
            dust_threshold,
            oracle,
        }
    }

    /// Reconstruct a trade event from one record, or `None` when the record
    /// is not a qualifying swap in the tracked asset.
    pub fn decode(&self, record: &TransactionRecord) -> Option<TradeEvent> {
        let meta = &record.transaction.meta;

        if meta.err.is_some() {
            log::debug!("skipping failed transaction {}", record.signature);
            return None;
        }

        let deltas = token_deltas(&meta.pre_token_balances, &meta.post_token_balances);
        let trader = record.first_signer().map(|s| s.to_string());

        let tracked = pick_tracked_delta(&deltas, &self.tracked_mint, trader.as_deref())?;
        if tracked.ui_change.abs() < self.dust_threshold {
            log::debug!(
                "skipping dust delta {:.9} in {}",
                tracked.ui_change,
                record.signature
            );
            return None;
        }

        let side = if tracked.ui_change > 0.0 {
            TradeSide::Buy
        } else {
            TradeSide::Sell
        };

        let counter = pick_counter_delta(&deltas, &self.tracked_mint)
            .or_else(|| native_counter_delta(record))?;

        let amount = tracked.ui_change.abs();
        let counter_amount = counter.ui_change.abs();
        let price_per_unit = counter_amount / amount;
        let usd_value = counter_amount * self.oracle.price_or_fallback(&counter.mint);

        Some(TradeEvent {
            time: chrono::Utc::now().timestamp(),
            side,
            amount,
            price_per_unit,
            usd_value,
            trader,
            tx_id: record.signature.clone(),
            source: venue_label(record),
        })
    }
}

fn ui_value(balance: &TokenBalance) -> f64 {
    let amount = &balance.ui_token_amount;
    amount.ui_amount.unwrap_or_else(|| {
        amount.amount.parse::<f64>().unwrap_or(0.0) / 10f64.powi(amount.decimals as i32)
    })
}

/// Per-account balance deltas, joined on account index. Accounts that only
/// appear on one side are treated as zero on the other.
fn token_deltas(pre: &[TokenBalance], post: &[TokenBalance]) -> Vec<TokenDelta> {
    let mut deltas = Vec::new();

    for before in pre {
        let after = post
            .iter()
            .find(|balance| balance.account_index == before.account_index);
        let change = after.map(ui_value).unwrap_or(0.0) - ui_value(before);
        if change != 0.0 {
            deltas.push(TokenDelta {
                mint: before.mint.clone(),
                owner: before.owner.clone(),
                ui_change: change,
            });
        }
    }

    for after in post {
        let seen = pre
            .iter()
            .any(|balance| balance.account_index == after.account_index);
        if !seen {
            let change = ui_value(after);
            if change != 0.0 {
                deltas.push(TokenDelta {
                    mint: after.mint.clone(),
                    owner: after.owner.clone(),
                    ui_change: change,
                });
            }
        }
    }

    deltas
}

/// The tracked asset's delta for the record. A swap moves both the trader's
/// account and the pool's, with opposite signs; the trader-owned delta is
/// the one that carries the fill, so it wins when present.
fn pick_tracked_delta<'a>(
    deltas: &'a [TokenDelta],
    tracked_mint: &str,
    trader: Option<&str>,
) -> Option<&'a TokenDelta> {
    let tracked: Vec<&TokenDelta> = deltas
        .iter()
        .filter(|delta| delta.mint == tracked_mint)
        .collect();

    if let Some(trader) = trader {
        if let Some(owned) = tracked
            .iter()
            .find(|delta| delta.owner.as_deref() == Some(trader))
        {
            return Some(owned);
        }
    }

    tracked
        .into_iter()
        .max_by(|a, b| a.ui_change.abs().total_cmp(&b.ui_change.abs()))
}

/// Counter asset: the non-tracked mint with the largest-magnitude delta.
fn pick_counter_delta(deltas: &[TokenDelta], tracked_mint: &str) -> Option<TokenDelta> {
    deltas
        .iter()
        .filter(|delta| delta.mint != tracked_mint)
        .max_by(|a, b| a.ui_change.abs().total_cmp(&b.ui_change.abs()))
        .cloned()
}

/// Fallback counter leg from native balance deltas when no counter token
/// balance moved (direct SOL swaps).
fn native_counter_delta(record: &TransactionRecord) -> Option<TokenDelta> {
    let meta = &record.transaction.meta;
    meta.pre_balances
        .iter()
        .zip(meta.post_balances.iter())
        .map(|(pre, post)| (*post as i128 - *pre as i128) as f64 / 1_000_000_000.0)
        .filter(|change| change.abs() >= MIN_NATIVE_DELTA)
        .max_by(|a, b| a.abs().total_cmp(&b.abs()))
        .map(|ui_change| TokenDelta {
            mint: NATIVE_MINT.to_string(),
            owner: None,
            ui_change,
        })
}

fn venue_label(record: &TransactionRecord) -> Option<String> {
    record.program_ids().find_map(|program| {
        KNOWN_VENUES
            .iter()
            .find(|(id, _)| *id == program)
            .map(|(_, label)| label.to_string())
    })
}
