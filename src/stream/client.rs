//! Streaming transport: JSON-RPC subscribe over a persistent websocket
//!
//! One task owns the socket: it subscribes on connect, answers with periodic
//! keepalive pings, and forwards every transaction notification into a
//! bounded channel. A second task drains the channel, decodes each record in
//! arrival order, and dispatches the resulting trade events to the
//! subscriber callback. Disconnects reconnect with bounded exponential
//! backoff; a successful connect resets the backoff.

use crate::stream::decoder::{SwapEventDecoder, TradeEvent};
use crate::stream::types::{RpcFrame, TransactionRecord};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

pub type TradeCallback = Arc<dyn Fn(TradeEvent) + Send + Sync>;
pub type StatusCallback = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

#[derive(Debug)]
pub enum StreamError {
    Connection(String),
    MaxRetries,
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::Connection(msg) => write!(f, "Connection error: {}", msg),
            StreamError::MaxRetries => write!(f, "Maximum reconnect attempts exceeded"),
        }
    }
}

impl std::error::Error for StreamError {}

#[derive(Debug)]
pub struct ReconnectBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_retries: u32,
    current_attempt: u32,
}

impl ReconnectBackoff {
    pub fn new(initial_delay: Duration, max_delay: Duration, max_retries: u32) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_retries,
            current_attempt: 0,
        }
    }

    /// Delay before the next attempt, or `None` when attempts are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.current_attempt >= self.max_retries {
            return None;
        }
        let delay = std::cmp::min(
            self.initial_delay * 2u32.saturating_pow(self.current_attempt),
            self.max_delay,
        );
        self.current_attempt += 1;
        Some(delay)
    }

    pub async fn sleep(&mut self) -> Result<(), StreamError> {
        match self.next_delay() {
            Some(delay) => {
                log::warn!(
                    "⏳ Reconnect attempt {} of {} in {:?}",
                    self.current_attempt,
                    self.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
                Ok(())
            }
            None => Err(StreamError::MaxRetries),
        }
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }
}

pub struct TradeStreamClient {
    url: String,
    tracked_mint: String,
    keepalive: Duration,
    channel_buffer: usize,
}

impl TradeStreamClient {
    pub fn new(url: String, tracked_mint: String, keepalive: Duration, channel_buffer: usize) -> Self {
        Self {
            url,
            tracked_mint,
            keepalive,
            channel_buffer,
        }
    }

    /// Run the transport and decode tasks until reconnect attempts are
    /// exhausted. Records are decoded strictly in arrival order.
    pub async fn run(
        &self,
        decoder: SwapEventDecoder,
        on_trade: TradeCallback,
        on_status: StatusCallback,
    ) -> Result<(), StreamError> {
        let (tx, mut rx) = mpsc::channel::<TransactionRecord>(self.channel_buffer);

        let decode_task = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Some(event) = decoder.decode(&record) {
                    log::info!(
                        "💱 {} {:.4} @ {:.9} (${:.2}) via {}",
                        event.side.as_str(),
                        event.amount,
                        event.price_per_unit,
                        event.usd_value,
                        event.source.as_deref().unwrap_or("unknown")
                    );
                    on_trade(event);
                }
            }
        });

        let result = self.run_with_reconnect(&tx, &on_status).await;

        // Closing the sender lets the decode task drain and exit.
        drop(tx);
        let _ = decode_task.await;
        result
    }

    async fn run_with_reconnect(
        &self,
        tx: &mpsc::Sender<TransactionRecord>,
        on_status: &StatusCallback,
    ) -> Result<(), StreamError> {
        let mut backoff = ReconnectBackoff::new(Duration::from_secs(5), Duration::from_secs(60), 10);

        loop {
            on_status(ConnectionStatus::Connecting);

            match connect_async(&self.url).await {
                Ok((socket, _)) => {
                    log::info!("✅ Connected to trade stream");
                    on_status(ConnectionStatus::Connected);
                    backoff.reset();

                    if let Err(e) = self.pump(socket, tx).await {
                        log::error!("❌ Stream error: {}", e);
                    } else {
                        log::warn!("Stream closed by remote");
                    }

                    on_status(ConnectionStatus::Disconnected);
                    backoff.sleep().await?;
                }
                Err(e) => {
                    log::error!("❌ Connection failed: {}", e);
                    on_status(ConnectionStatus::Disconnected);
                    backoff.sleep().await?;
                }
            }
        }
    }

    async fn pump(
        &self,
        socket: tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        tx: &mpsc::Sender<TransactionRecord>,
    ) -> Result<(), StreamError> {
        let (mut write, mut read) = socket.split();

        let subscribe = build_subscribe(&self.tracked_mint);
        write
            .send(Message::Text(subscribe.to_string()))
            .await
            .map_err(|e| StreamError::Connection(e.to_string()))?;

        let mut keepalive = tokio::time::interval(self.keepalive);
        keepalive.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                message = read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(record) = parse_notification(&text) {
                                // Bounded send preserves arrival order and
                                // backpressures the socket instead of
                                // dropping records.
                                if tx.send(record).await.is_err() {
                                    return Ok(());
                                }
                            }
                        }
                        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                        Some(Ok(Message::Close(_))) | None => return Ok(()),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(StreamError::Connection(e.to_string())),
                    }
                }
                _ = keepalive.tick() => {
                    write
                        .send(Message::Ping(Vec::new()))
                        .await
                        .map_err(|e| StreamError::Connection(e.to_string()))?;
                }
            }
        }
    }
}

fn build_subscribe(tracked_mint: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "transactionSubscribe",
        "params": [
            {
                "accountInclude": [tracked_mint],
                "failed": false,
                "vote": false,
            },
            {
                "commitment": "confirmed",
                "encoding": "jsonParsed",
                "transactionDetails": "full",
                "showRewards": false,
                "maxSupportedTransactionVersion": 0,
            }
        ]
    })
}

/// Extract the transaction record from a frame, if it is a notification.
/// Acks and unknown frames are logged and dropped.
fn parse_notification(text: &str) -> Option<TransactionRecord> {
    let frame: RpcFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            log::debug!("unparseable frame: {}", e);
            return None;
        }
    };

    if let Some(id) = frame.id {
        log::info!(
            "📡 Subscription ack (id {}): {:?}",
            id,
            frame.result.unwrap_or(Value::Null)
        );
        return None;
    }

    match frame.method.as_deref() {
        Some("transactionNotification") => frame.params.and_then(|params| params.result),
        other => {
            log::debug!("ignoring frame method {:?}", other);
            None
        }
    }
}
