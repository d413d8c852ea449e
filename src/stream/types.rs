//! Raw ledger-record payloads from the JSON-RPC websocket.
//!
//! These mirror the transport wire shape; nothing outside the stream module
//! touches them. Parsing either yields a typed record or the message is
//! dropped with a debug log, never a best-effort guess.

use serde::Deserialize;
use serde_json::Value;

/// Top-level frame: either a subscription ack (`id` + `result`) or a
/// notification (`method` + `params`).
#[derive(Debug, Deserialize)]
pub struct RpcFrame {
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub method: Option<String>,
    pub params: Option<NotificationParams>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationParams {
    pub subscription: Option<u64>,
    pub result: Option<TransactionRecord>,
}

/// One raw per-transaction ledger record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub signature: String,
    pub transaction: TransactionEnvelope,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEnvelope {
    pub transaction: TransactionBody,
    pub meta: TransactionMeta,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBody {
    pub message: TransactionMessage,
    #[serde(default)]
    pub signatures: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMessage {
    #[serde(default)]
    pub account_keys: Vec<AccountKey>,
    #[serde(default)]
    pub instructions: Vec<InstructionRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountKey {
    pub pubkey: String,
    #[serde(default)]
    pub signer: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionRef {
    pub program_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    pub err: Option<Value>,
    #[serde(default)]
    pub pre_balances: Vec<u64>,
    #[serde(default)]
    pub post_balances: Vec<u64>,
    #[serde(default)]
    pub pre_token_balances: Vec<TokenBalance>,
    #[serde(default)]
    pub post_token_balances: Vec<TokenBalance>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub account_index: usize,
    pub mint: String,
    pub owner: Option<String>,
    pub ui_token_amount: UiTokenAmount,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiTokenAmount {
    pub amount: String,
    pub decimals: u8,
    pub ui_amount: Option<f64>,
}

impl TransactionRecord {
    /// First signer of the record, if any.
    pub fn first_signer(&self) -> Option<&str> {
        self.transaction
            .transaction
            .message
            .account_keys
            .iter()
            .find(|key| key.signer)
            .map(|key| key.pubkey.as_str())
    }

    /// Every program identifier referenced by the record's instructions.
    pub fn program_ids(&self) -> impl Iterator<Item = &str> {
        self.transaction
            .transaction
            .message
            .instructions
            .iter()
            .filter_map(|ix| ix.program_id.as_deref())
    }
}
