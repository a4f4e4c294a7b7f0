//! src/chain/client.rs - ChainClient capability
//!
//! The engine consumes chain access exclusively through this trait. Query
//! helpers return normalized JSON projections; signing and broadcast live
//! behind the same seam so the core never touches key material.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::markets::book::Orderbook;
use crate::markets::types::uint128_string;

/// Relay result code for "no block builder available this height".
pub const RELAY_CODE_NO_BUILDER: u32 = 4;

/// Cosmos SDK sdkerrors code for an account sequence mismatch.
pub const CODE_SEQUENCE_MISMATCH: u32 = 32;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// One denomination/amount pair, the bank-module coin shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Coin {
    pub denom: String,
    #[serde(with = "uint128_string")]
    pub amount: u128,
}

/// Transaction fee: coins plus a gas limit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fee {
    pub amount: Vec<Coin>,
    pub gas: u64,
}

/// A chain-native message ready for signing: proto type URL plus its JSON
/// projection. Encoders produce these; the signer turns them into bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainMessage {
    pub type_url: String,
    pub value: Value,
}

/// Pending-transaction snapshot as reported by the node: a byte counter used
/// for cheap change detection and the raw base64 entries.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MempoolSnapshot {
    pub total_bytes: u64,
    pub txs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastResult {
    pub height: u64,
    pub code: u32,
    pub tx_hash: String,
    pub raw_log: String,
}

impl BroadcastResult {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    /// Whether the rejection was a local/remote account sequence gap.
    pub fn is_sequence_mismatch(&self) -> bool {
        self.code == CODE_SEQUENCE_MISMATCH || self.raw_log.contains("account sequence mismatch")
    }
}

/// Per-sub-transaction outcome inside a relay bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTxResult {
    pub code_check: u32,
    pub code_deliver: u32,
    #[serde(default)]
    pub log: String,
}

impl SubTxResult {
    pub fn failed(&self) -> bool {
        self.code_check != 0 || self.code_deliver != 0
    }
}

/// Relay response for a bundle submission. `txs` is ordered the same way the
/// bundle was: an optional backrun target first, then the bot's own tx.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleResult {
    pub code: u32,
    #[serde(default)]
    pub txs: Vec<SubTxResult>,
    #[serde(default)]
    pub raw_log: String,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Smart-queries a wasm contract, returning the JSON response body.
    async fn query_contract_state(&self, address: &str, query: &Value)
        -> Result<Value, ChainError>;

    /// Fetches the node's pending-transaction set.
    async fn query_mempool(&self) -> Result<MempoolSnapshot, ChainError>;

    /// Fetches fresh book snapshots for the given spot markets.
    async fn query_orderbooks(&self, market_ids: &[String]) -> Result<Vec<Orderbook>, ChainError>;

    /// Current on-chain account sequence for the signing account.
    async fn query_sequence(&self) -> Result<u64, ChainError>;

    /// Signs and broadcasts one transaction at the given sequence.
    async fn sign_and_broadcast(
        &self,
        msgs: &[ChainMessage],
        fee: &Fee,
        sequence: u64,
    ) -> Result<BroadcastResult, ChainError>;

    /// Submits a bundle through the private relay, optionally pinning a
    /// mempool transaction to backrun atomically.
    async fn sign_and_broadcast_bundle(
        &self,
        msgs: &[ChainMessage],
        fee: &Fee,
        sequence: u64,
        backrun_tx: Option<&str>,
    ) -> Result<BundleResult, ChainError>;

    /// Reconnects and resyncs signing state after a sequence gap.
    async fn reset(&self) -> Result<(), ChainError>;

    fn sender_address(&self) -> &str;
}
