//! src/mempool/decoder.rs - Pending-transaction decoding
//!
//! Mempool entries arrive as base64 blobs of the client's JSON transaction
//! projection. Decoding goes through closed tagged unions with validated
//! discriminants; an entry whose shape is not recognized is skipped on its
//! own, never aborting the rest of the batch. The per-window dedup set is
//! owned by the decoder instance: the same transaction hash re-observed by a
//! later poll inside one tick window is dropped before it can be re-applied.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::debug;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use thiserror::Error;

use crate::arbitrage::cooldown::IgnoredAddresses;
use crate::chain::client::{Coin, MempoolSnapshot};
use crate::markets::types::{uint128_string, Asset, AssetInfo};

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("unrecognized transaction shape: {0}")]
    Shape(#[from] serde_json::Error),
}

/// JSON projection of one pending transaction.
#[derive(Debug, Deserialize)]
struct TxEnvelope {
    #[serde(default)]
    hash: Option<String>,
    sender: String,
    msgs: Vec<TxMsg>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TxMsg {
    ExecuteContract {
        contract: String,
        msg: serde_json::Value,
        #[serde(default)]
        funds: Vec<Coin>,
    },
}

/// Closed set of execute payloads the bot reacts to. Anything else fails the
/// discriminant check and the message is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ExecuteMsg {
    Swap {
        offer_asset: Asset,
    },
    Send {
        contract: String,
        #[serde(with = "uint128_string")]
        amount: u128,
        msg: String,
    },
    ExecuteSwapOperations {
        operations: Vec<SwapOperation>,
    },
}

/// Payload carried inside a cw20 `send`, where the offer amount lives on the
/// outer message instead.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum InnerMsg {
    Swap {},
    ExecuteSwapOperations { operations: Vec<SwapOperation> },
}

/// One hop of a router-wrapped multi-hop swap.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SwapOperation {
    pub offer_asset_info: AssetInfo,
    pub ask_asset_info: AssetInfo,
}

/// A normalized trade affecting a tracked pool or router.
#[derive(Debug, Clone)]
pub enum TradeIntent {
    PoolSwap {
        pool: String,
        offer: Asset,
    },
    RouterSwap {
        router: String,
        offer: Asset,
        operations: Vec<SwapOperation>,
    },
}

impl TradeIntent {
    /// Contract the intent lands on.
    pub fn target(&self) -> &str {
        match self {
            TradeIntent::PoolSwap { pool, .. } => pool,
            TradeIntent::RouterSwap { router, .. } => router,
        }
    }
}

/// One decoded pending transaction with its raw blob kept for backrunning.
#[derive(Debug, Clone)]
pub struct DecodedTx {
    pub hash: String,
    pub sender: String,
    pub intents: Vec<TradeIntent>,
    pub raw: String,
}

/// Stateful decoder for one engine instance. Holds the per-window dedup set;
/// nothing here is global, so independent loops never share hidden state.
#[derive(Debug, Default)]
pub struct MempoolDecoder {
    seen: FxHashSet<String>,
}

impl MempoolDecoder {
    pub fn new() -> Self {
        MempoolDecoder::default()
    }

    /// Starts a fresh tick window, forgetting previously seen hashes.
    pub fn begin_window(&mut self) {
        self.seen.clear();
    }

    /// Decodes a mempool snapshot into trade intents, dropping entries from
    /// ignored senders and transactions already seen in this window.
    pub fn decode_batch(
        &mut self,
        snapshot: &MempoolSnapshot,
        ignored: &IgnoredAddresses,
        tick: u64,
    ) -> Vec<DecodedTx> {
        let mut decoded = Vec::new();
        for blob in &snapshot.txs {
            match decode_blob(blob) {
                Ok(envelope) => {
                    let hash = envelope
                        .hash
                        .clone()
                        .unwrap_or_else(|| fallback_hash(blob));
                    if !self.seen.insert(hash.clone()) {
                        continue;
                    }
                    if ignored.contains(&envelope.sender, tick) {
                        debug!("Dropping mempool tx from ignored sender {}", envelope.sender);
                        continue;
                    }
                    let intents = extract_intents(&envelope);
                    if intents.is_empty() {
                        continue;
                    }
                    decoded.push(DecodedTx {
                        hash,
                        sender: envelope.sender,
                        intents,
                        raw: blob.clone(),
                    });
                }
                Err(e) => {
                    debug!("Skipping undecodable mempool entry: {}", e);
                }
            }
        }
        decoded
    }
}

fn decode_blob(blob: &str) -> Result<TxEnvelope, DecodeError> {
    let bytes = BASE64.decode(blob.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Stable-within-process fallback identity for entries the node did not hash.
fn fallback_hash(blob: &str) -> String {
    let mut hasher = DefaultHasher::new();
    blob.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn extract_intents(envelope: &TxEnvelope) -> Vec<TradeIntent> {
    let mut intents = Vec::new();
    for msg in &envelope.msgs {
        let TxMsg::ExecuteContract { contract, msg, funds } = msg;
        let Ok(execute) = serde_json::from_value::<ExecuteMsg>(msg.clone()) else {
            continue;
        };
        match execute {
            ExecuteMsg::Swap { offer_asset } => {
                intents.push(TradeIntent::PoolSwap {
                    pool: contract.clone(),
                    offer: offer_asset,
                });
            }
            ExecuteMsg::ExecuteSwapOperations { operations } => {
                let Some(coin) = funds.first() else {
                    continue;
                };
                intents.push(TradeIntent::RouterSwap {
                    router: contract.clone(),
                    offer: Asset::new(AssetInfo::native(&coin.denom), coin.amount),
                    operations,
                });
            }
            ExecuteMsg::Send {
                contract: receiver,
                amount,
                msg: inner,
            } => {
                // cw20 send: the token is the outer contract, the amount
                // rides on the send, the action hides in the inner payload.
                let offer = Asset::new(AssetInfo::token(contract), amount);
                let Some(inner) = decode_inner(&inner) else {
                    continue;
                };
                match inner {
                    InnerMsg::Swap {} => {
                        intents.push(TradeIntent::PoolSwap {
                            pool: receiver,
                            offer,
                        });
                    }
                    InnerMsg::ExecuteSwapOperations { operations } => {
                        intents.push(TradeIntent::RouterSwap {
                            router: receiver,
                            offer,
                            operations,
                        });
                    }
                }
            }
        }
    }
    intents
}

fn decode_inner(encoded: &str) -> Option<InnerMsg> {
    let bytes = BASE64.decode(encoded.trim()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use serde_json::{json, Value};

    pub fn encode_tx(value: &Value) -> String {
        BASE64.encode(serde_json::to_vec(value).unwrap())
    }

    /// Native swap tx blob against `pool` for `amount` of `denom`.
    pub fn native_swap_blob(hash: &str, sender: &str, pool: &str, denom: &str, amount: u128) -> String {
        encode_tx(&json!({
            "hash": hash,
            "sender": sender,
            "msgs": [{
                "execute_contract": {
                    "contract": pool,
                    "msg": {
                        "swap": {
                            "offer_asset": {
                                "info": { "native_token": { "denom": denom } },
                                "amount": amount.to_string()
                            },
                            "max_spread": "0.05"
                        }
                    },
                    "funds": [{ "denom": denom, "amount": amount.to_string() }]
                }
            }]
        }))
    }
}
