pub mod client;
pub mod decoder;
pub mod types;

pub use client::{ConnectionStatus, StatusCallback, TradeCallback, TradeStreamClient};
pub use decoder::{SwapEventDecoder, TradeEvent, TradeSide};
