//! src/chain/encoder.rs - MessageEncoder capability
//!
//! One encoder per contract dialect, selected through the pool's static
//! `DexVariant` metadata. The registry presents one uniform signature to the
//! loop: trade in, chain-native message list plus an operation count out.
//! The operation count drives fee-tier selection.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use thiserror::Error;

use crate::arbitrage::types::{ChosenTrade, TradeSequence};
use crate::chain::client::ChainMessage;
use crate::markets::book::Orderbook;
use crate::markets::pools::PoolBook;
use crate::markets::types::{Asset, AssetInfo, DexVariant, Pool};

pub const WASM_EXECUTE_TYPE_URL: &str = "/cosmwasm.wasm.v1.MsgExecuteContract";
pub const SPOT_MARKET_ORDER_TYPE_URL: &str = "/injective.exchange.v1beta1.MsgCreateSpotMarketOrder";

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("pool {0} is not tracked")]
    MissingPool(String),

    #[error("orderbook {0} is not tracked")]
    MissingBook(String),

    #[error("no encoder registered for dialect {0}")]
    UnsupportedVariant(String),

    #[error("trade replay failed on pool {0}")]
    ReplayFailed(String),
}

/// Encodes one swap hop in a specific contract dialect.
pub trait MessageEncoder: Send + Sync {
    fn encode_swap(
        &self,
        pool: &Pool,
        offer: &Asset,
        sender: &str,
    ) -> Result<ChainMessage, EncodeError>;
}

/// Terraswap-style dialect: native offers ride on `swap` with funds, cw20
/// offers go through the token's `send` hook.
pub struct ConstantProductEncoder;

impl MessageEncoder for ConstantProductEncoder {
    fn encode_swap(
        &self,
        pool: &Pool,
        offer: &Asset,
        sender: &str,
    ) -> Result<ChainMessage, EncodeError> {
        let value = match &offer.info {
            AssetInfo::NativeToken { denom } => json!({
                "sender": sender,
                "contract": pool.address,
                "msg": {
                    "swap": {
                        "offer_asset": offer,
                        "max_spread": "0.5"
                    }
                },
                "funds": [{ "denom": denom, "amount": offer.amount.to_string() }]
            }),
            AssetInfo::Token { contract_addr } => json!({
                "sender": sender,
                "contract": contract_addr,
                "msg": {
                    "send": {
                        "contract": pool.address,
                        "amount": offer.amount.to_string(),
                        "msg": BASE64.encode(b"{\"swap\":{}}")
                    }
                },
                "funds": []
            }),
        };
        Ok(ChainMessage {
            type_url: WASM_EXECUTE_TYPE_URL.to_string(),
            value,
        })
    }
}

/// Junoswap dialect: sides are addressed positionally as Token1/Token2.
pub struct JunoswapEncoder;

impl MessageEncoder for JunoswapEncoder {
    fn encode_swap(
        &self,
        pool: &Pool,
        offer: &Asset,
        sender: &str,
    ) -> Result<ChainMessage, EncodeError> {
        let input_token = if pool.assets[0].info == offer.info {
            "Token1"
        } else {
            "Token2"
        };
        let funds = match &offer.info {
            AssetInfo::NativeToken { denom } => {
                json!([{ "denom": denom, "amount": offer.amount.to_string() }])
            }
            AssetInfo::Token { .. } => json!([]),
        };
        Ok(ChainMessage {
            type_url: WASM_EXECUTE_TYPE_URL.to_string(),
            value: json!({
                "sender": sender,
                "contract": pool.address,
                "msg": {
                    "swap": {
                        "input_token": input_token,
                        "input_amount": offer.amount.to_string(),
                        "min_output": "0"
                    }
                },
                "funds": funds
            }),
        })
    }
}

/// Encoded trade: the signable message list and the number of constituent
/// swap/market-order operations.
#[derive(Debug, Clone)]
pub struct EncodedTrade {
    pub msgs: Vec<ChainMessage>,
    pub operations: usize,
}

/// Per-dialect encoder table. Built once at startup; pools carry the variant
/// key in their static metadata.
pub struct EncoderRegistry {
    encoders: FxHashMap<DexVariant, Arc<dyn MessageEncoder>>,
}

impl EncoderRegistry {
    pub fn standard() -> Self {
        let constant_product: Arc<dyn MessageEncoder> = Arc::new(ConstantProductEncoder);
        let junoswap: Arc<dyn MessageEncoder> = Arc::new(JunoswapEncoder);
        let mut encoders: FxHashMap<DexVariant, Arc<dyn MessageEncoder>> = FxHashMap::default();
        encoders.insert(DexVariant::ConstantProduct, constant_product.clone());
        encoders.insert(DexVariant::Wynd, constant_product.clone());
        encoders.insert(DexVariant::Osmosis, constant_product.clone());
        encoders.insert(DexVariant::ConcentratedLiquidity, constant_product);
        encoders.insert(DexVariant::Junoswap, junoswap);
        EncoderRegistry { encoders }
    }

    fn for_variant(&self, variant: DexVariant) -> Result<&Arc<dyn MessageEncoder>, EncodeError> {
        self.encoders
            .get(&variant)
            .ok_or_else(|| EncodeError::UnsupportedVariant(variant.to_string()))
    }

    /// Uniform capability entry point: builds the chain-native messages for a
    /// chosen trade, optionally funding it through a flashloan router.
    pub fn encode_trade(
        &self,
        trade: &ChosenTrade,
        pools: &PoolBook,
        books: &FxHashMap<String, Orderbook>,
        sender: &str,
        flashloan_router: Option<&str>,
    ) -> Result<EncodedTrade, EncodeError> {
        match trade {
            ChosenTrade::Amm(amm) => {
                let mut msgs = Vec::with_capacity(amm.path.hops());
                let mut current = amm.offer.clone();
                for address in &amm.path.pool_addresses {
                    let pool = pools
                        .get(address)
                        .ok_or_else(|| EncodeError::MissingPool(address.clone()))?;
                    let msg = self.for_variant(pool.variant)?.encode_swap(pool, &current, sender)?;
                    msgs.push(msg);
                    current = pool
                        .out_given_in(&current)
                        .map_err(|_| EncodeError::ReplayFailed(address.clone()))?;
                }
                let operations = msgs.len();
                let msgs = match flashloan_router {
                    Some(router) => vec![wrap_flashloan(router, sender, &amm.offer, &msgs)],
                    None => msgs,
                };
                Ok(EncodedTrade { msgs, operations })
            }
            ChosenTrade::Orderbook(ob) => {
                let pool = pools
                    .get(&ob.path.pool_address)
                    .ok_or_else(|| EncodeError::MissingPool(ob.path.pool_address.clone()))?;
                let book = books
                    .get(&ob.path.market_id)
                    .ok_or_else(|| EncodeError::MissingBook(ob.path.market_id.clone()))?;
                let encoder = self.for_variant(pool.variant)?;
                let msgs = match ob.path.sequence {
                    TradeSequence::AmmFirst => {
                        let amm_msg = encoder.encode_swap(pool, &ob.offer, sender)?;
                        let base_out = pool
                            .out_given_in(&ob.offer)
                            .map_err(|_| EncodeError::ReplayFailed(pool.address.clone()))?;
                        let quantity =
                            book.round_to_lot(base_out.amount as f64 / book.base_factor());
                        let order =
                            market_order(book, sender, "SELL", quantity, ob.worst_acceptable_price);
                        vec![amm_msg, order]
                    }
                    TradeSequence::OrderbookFirst => {
                        let quantity = book.round_to_lot(ob.orderbook_leg_output);
                        let order =
                            market_order(book, sender, "BUY", quantity, ob.worst_acceptable_price);
                        let base_units = (quantity * book.base_factor()).floor() as u128;
                        let amm_offer = Asset::new(book.base_asset.clone(), base_units);
                        let amm_msg = encoder.encode_swap(pool, &amm_offer, sender)?;
                        vec![order, amm_msg]
                    }
                };
                Ok(EncodedTrade {
                    operations: msgs.len(),
                    msgs,
                })
            }
        }
    }
}

/// Wraps already-encoded wasm executes into a single flashloan call on the
/// router, which repays the borrowed offer out of the route's proceeds.
fn wrap_flashloan(
    router: &str,
    sender: &str,
    offer: &Asset,
    msgs: &[ChainMessage],
) -> ChainMessage {
    let inner: Vec<Value> = msgs.iter().map(to_cosmos_msg).collect();
    ChainMessage {
        type_url: WASM_EXECUTE_TYPE_URL.to_string(),
        value: json!({
            "sender": sender,
            "contract": router,
            "msg": {
                "flash_loan": {
                    "assets": [offer],
                    "msgs": inner
                }
            },
            "funds": []
        }),
    }
}

/// Re-expresses a signable wasm execute as the CosmosMsg JSON a contract
/// dispatches internally.
fn to_cosmos_msg(msg: &ChainMessage) -> Value {
    let contract = msg.value.get("contract").cloned().unwrap_or(Value::Null);
    let funds = msg.value.get("funds").cloned().unwrap_or_else(|| json!([]));
    let inner = msg.value.get("msg").cloned().unwrap_or(Value::Null);
    let encoded = BASE64.encode(serde_json::to_vec(&inner).unwrap_or_default());
    json!({
        "wasm": {
            "execute": {
                "contract_addr": contract,
                "msg": encoded,
                "funds": funds
            }
        }
    })
}

fn market_order(
    book: &Orderbook,
    sender: &str,
    order_type: &str,
    quantity: f64,
    worst_price: f64,
) -> ChainMessage {
    ChainMessage {
        type_url: SPOT_MARKET_ORDER_TYPE_URL.to_string(),
        value: json!({
            "sender": sender,
            "order": {
                "market_id": book.market_id,
                "order_info": {
                    "subaccount_id": sender,
                    "price": format!("{}", worst_price),
                    "quantity": format!("{}", quantity)
                },
                "order_type": order_type
            }
        }),
    }
}
