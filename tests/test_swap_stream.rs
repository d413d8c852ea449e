//! Integration tests for the streaming path: records flow through a bounded
//! channel into the decoder in strict arrival order, and qualifying swaps
//! are dispatched to the subscriber callback exactly as the transport task
//! would dispatch them.

use solpulse::oracle::{PriceOracleCache, NATIVE_MINT, USDC_MINT};
use solpulse::stream::types::{
    AccountKey, InstructionRef, TokenBalance, TransactionBody, TransactionEnvelope,
    TransactionMessage, TransactionMeta, TransactionRecord, UiTokenAmount,
};
use solpulse::stream::{SwapEventDecoder, TradeEvent, TradeSide};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const TRACKED: &str = "Trk1111111111111111111111111111111111111111";

fn balance(account_index: usize, mint: &str, owner: &str, ui_amount: f64) -> TokenBalance {
    TokenBalance {
        account_index,
        mint: mint.to_string(),
        owner: Some(owner.to_string()),
        ui_token_amount: UiTokenAmount {
            amount: format!("{}", (ui_amount * 1_000_000.0) as u64),
            decimals: 6,
            ui_amount: Some(ui_amount),
        },
    }
}

fn swap_record(
    signature: &str,
    tracked_pre: f64,
    tracked_post: f64,
    counter_mint: &str,
    counter_pre: f64,
    counter_post: f64,
) -> TransactionRecord {
    TransactionRecord {
        signature: signature.to_string(),
        transaction: TransactionEnvelope {
            transaction: TransactionBody {
                message: TransactionMessage {
                    account_keys: vec![AccountKey {
                        pubkey: "Trader111".to_string(),
                        signer: true,
                    }],
                    instructions: vec![InstructionRef {
                        program_id: Some(
                            "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4".to_string(),
                        ),
                    }],
                },
                signatures: vec![signature.to_string()],
            },
            meta: TransactionMeta {
                err: None,
                pre_balances: vec![1_000_000_000],
                post_balances: vec![999_995_000],
                pre_token_balances: vec![
                    balance(1, TRACKED, "Trader111", tracked_pre),
                    balance(2, counter_mint, "Pool111", counter_pre),
                ],
                post_token_balances: vec![
                    balance(1, TRACKED, "Trader111", tracked_post),
                    balance(2, counter_mint, "Pool111", counter_post),
                ],
            },
        },
    }
}

fn oracle_with_sol(price: f64) -> Arc<PriceOracleCache> {
    let oracle = Arc::new(PriceOracleCache::new(Duration::from_secs(60), 150.0));
    oracle.set_price(NATIVE_MINT, price);
    oracle
}

/// Drive records through the same channel-then-decode flow the stream
/// client runs, collecting dispatched events.
async fn run_through_channel(
    decoder: SwapEventDecoder,
    records: Vec<TransactionRecord>,
) -> Vec<TradeEvent> {
    let (tx, mut rx) = mpsc::channel::<TransactionRecord>(16);
    let events: Arc<Mutex<Vec<TradeEvent>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&events);
    let decode_task = tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            if let Some(event) = decoder.decode(&record) {
                sink.lock().unwrap().push(event);
            }
        }
    });

    for record in records {
        tx.send(record).await.unwrap();
    }
    drop(tx);
    decode_task.await.unwrap();

    Arc::try_unwrap(events).unwrap().into_inner().unwrap()
}

#[tokio::test]
async fn test_buy_priced_against_sol_counter() {
    // Tracked delta +1000, counter wrapped-SOL delta +5 on the pool side,
    // SOL priced at $200: price 0.005 per unit, $1000 notional.
    let decoder = SwapEventDecoder::new(TRACKED.to_string(), 0.001, oracle_with_sol(200.0));
    let record = swap_record("SigBuy", 0.0, 1000.0, NATIVE_MINT, 100.0, 105.0);

    let events = run_through_channel(decoder, vec![record]).await;

    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.side, TradeSide::Buy);
    assert_eq!(event.amount, 1000.0);
    assert_eq!(event.price_per_unit, 0.005);
    assert_eq!(event.usd_value, 1000.0);
    assert_eq!(event.trader.as_deref(), Some("Trader111"));
    assert_eq!(event.tx_id, "SigBuy");
    assert_eq!(event.source.as_deref(), Some("jupiter"));
}

#[tokio::test]
async fn test_events_dispatch_in_arrival_order() {
    let decoder = SwapEventDecoder::new(TRACKED.to_string(), 0.001, oracle_with_sol(200.0));

    let records = vec![
        swap_record("Sig1", 0.0, 100.0, USDC_MINT, 50.0, 55.0),
        swap_record("Sig2", 100.0, 40.0, USDC_MINT, 55.0, 58.0),
        swap_record("Sig3", 40.0, 140.0, USDC_MINT, 58.0, 63.0),
    ];

    let events = run_through_channel(decoder, records).await;

    let ids: Vec<&str> = events.iter().map(|e| e.tx_id.as_str()).collect();
    assert_eq!(ids, vec!["Sig1", "Sig2", "Sig3"]);
    assert_eq!(events[0].side, TradeSide::Buy);
    assert_eq!(events[1].side, TradeSide::Sell);
    assert_eq!(events[2].side, TradeSide::Buy);
}

#[tokio::test]
async fn test_non_qualifying_records_are_silently_skipped() {
    let decoder = SwapEventDecoder::new(TRACKED.to_string(), 0.5, oracle_with_sol(200.0));

    let mut failed = swap_record("SigFailed", 0.0, 100.0, USDC_MINT, 50.0, 55.0);
    failed.transaction.meta.err = Some(serde_json::json!({"InstructionError": [0, "Custom"]}));

    let records = vec![
        failed,
        // Dust: below the 0.5 threshold
        swap_record("SigDust", 100.0, 100.2, USDC_MINT, 50.0, 50.1),
        // Untracked mint only
        swap_record("SigOther", 0.0, 0.0, USDC_MINT, 10.0, 20.0),
        // The one real trade
        swap_record("SigReal", 0.0, 10.0, USDC_MINT, 50.0, 51.0),
    ];

    let events = run_through_channel(decoder, records).await;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].tx_id, "SigReal");
    // USDC at par: 1 USDC for 10 units
    assert_eq!(events[0].price_per_unit, 0.1);
    assert_eq!(events[0].usd_value, 1.0);
}

#[tokio::test]
async fn test_stale_oracle_substitutes_fallback_price() {
    // Oracle never refreshed: the configured fallback prices SOL legs
    let oracle = Arc::new(PriceOracleCache::new(Duration::from_secs(60), 150.0));
    let decoder = SwapEventDecoder::new(TRACKED.to_string(), 0.001, oracle);

    let record = swap_record("SigStale", 0.0, 100.0, NATIVE_MINT, 10.0, 12.0);
    let events = run_through_channel(decoder, vec![record]).await;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].usd_value, 2.0 * 150.0);
}
