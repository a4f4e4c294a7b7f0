//! src/chain/rpc.rs - HTTP ChainClient
//!
//! Queries go straight to the node (CometBFT RPC + LCD); signing and
//! broadcast are delegated to the signer sidecar, which owns the key
//! material and the proto encoding. The engine never sees either.

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::{json, Value};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::chain::client::{
    BroadcastResult, BundleResult, ChainClient, ChainError, ChainMessage, Fee, MempoolSnapshot,
};
use crate::common::config::OrderbookConfig;
use crate::markets::book::{Order, OrderSide, Orderbook};

pub struct HttpChainClient {
    http: Client,
    rpc_url: String,
    lcd_url: String,
    signer_url: String,
    sender: String,
    orderbook_meta: FxHashMap<String, OrderbookConfig>,
}

impl HttpChainClient {
    pub fn new(
        rpc_url: String,
        lcd_url: String,
        signer_url: String,
        sender: String,
        orderbooks: &[OrderbookConfig],
    ) -> Self {
        let orderbook_meta = orderbooks
            .iter()
            .map(|cfg| (cfg.market_id.clone(), cfg.clone()))
            .collect();
        HttpChainClient {
            http: Client::new(),
            rpc_url,
            lcd_url,
            signer_url,
            sender,
            orderbook_meta,
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value, ChainError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ChainError::Rejected(format!(
                "{} -> {}",
                url,
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| ChainError::MalformedResponse(e.to_string()))
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, ChainError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ChainError::Rejected(format!(
                "{} -> {}",
                url,
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| ChainError::MalformedResponse(e.to_string()))
    }

    fn hydrate_book(
        &self,
        market_id: &str,
        levels: OrderbookLevels,
    ) -> Result<Orderbook, ChainError> {
        let meta = self.orderbook_meta.get(market_id).ok_or_else(|| {
            ChainError::MalformedResponse(format!("untracked market {}", market_id))
        })?;
        let mut buys = parse_levels(&levels.buys, OrderSide::Buy)?;
        let mut sells = parse_levels(&levels.sells, OrderSide::Sell)?;
        buys.sort_by(|a, b| b.price.total_cmp(&a.price));
        sells.sort_by(|a, b| a.price.total_cmp(&b.price));
        Ok(Orderbook {
            market_id: market_id.to_string(),
            base_asset: meta.base_asset.clone(),
            quote_asset: meta.quote_asset.clone(),
            base_decimals: meta.base_decimals,
            quote_decimals: meta.quote_decimals,
            min_quantity_increment: meta.min_quantity_increment,
            min_price_increment: meta.min_price_increment,
            buys,
            sells,
            maker_fee_rate: meta.maker_fee_rate,
            taker_fee_rate: meta.taker_fee_rate,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SmartQueryResponse {
    data: Value,
}

#[derive(Debug, Deserialize)]
struct UnconfirmedTxsWrapper {
    result: UnconfirmedTxs,
}

#[derive(Debug, Deserialize)]
struct UnconfirmedTxs {
    total_bytes: String,
    #[serde(default)]
    txs: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct OrderbookWrapper {
    orderbook: OrderbookLevels,
}

#[derive(Debug, Deserialize, Default)]
struct OrderbookLevels {
    #[serde(default)]
    buys: Vec<PriceLevel>,
    #[serde(default)]
    sells: Vec<PriceLevel>,
}

#[derive(Debug, Deserialize)]
struct PriceLevel {
    price: String,
    quantity: String,
}

#[derive(Debug, Deserialize)]
struct AccountWrapper {
    account: AccountInfo,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    sequence: String,
}

fn parse_levels(levels: &[PriceLevel], side: OrderSide) -> Result<Vec<Order>, ChainError> {
    levels
        .iter()
        .map(|level| {
            let price = level
                .price
                .parse::<f64>()
                .map_err(|e| ChainError::MalformedResponse(format!("price: {}", e)))?;
            let quantity = level
                .quantity
                .parse::<f64>()
                .map_err(|e| ChainError::MalformedResponse(format!("quantity: {}", e)))?;
            Ok(Order {
                price,
                quantity,
                side,
            })
        })
        .collect()
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn query_contract_state(
        &self,
        address: &str,
        query: &Value,
    ) -> Result<Value, ChainError> {
        let encoded = BASE64.encode(serde_json::to_vec(query).unwrap_or_default());
        let url = format!(
            "{}/cosmwasm/wasm/v1/contract/{}/smart/{}",
            self.lcd_url, address, encoded
        );
        let value = self.get_json(&url).await?;
        let response: SmartQueryResponse = serde_json::from_value(value)
            .map_err(|e| ChainError::MalformedResponse(e.to_string()))?;
        Ok(response.data)
    }

    async fn query_mempool(&self) -> Result<MempoolSnapshot, ChainError> {
        let url = format!("{}/unconfirmed_txs?limit=100", self.rpc_url);
        let value = self.get_json(&url).await?;
        let wrapper: UnconfirmedTxsWrapper = serde_json::from_value(value)
            .map_err(|e| ChainError::MalformedResponse(e.to_string()))?;
        let total_bytes = wrapper
            .result
            .total_bytes
            .parse::<u64>()
            .map_err(|e| ChainError::MalformedResponse(format!("total_bytes: {}", e)))?;
        Ok(MempoolSnapshot {
            total_bytes,
            txs: wrapper.result.txs.unwrap_or_default(),
        })
    }

    async fn query_orderbooks(&self, market_ids: &[String]) -> Result<Vec<Orderbook>, ChainError> {
        let futures = market_ids.iter().map(|market_id| async move {
            let url = format!(
                "{}/injective/exchange/v1beta1/spot/orderbook/{}",
                self.lcd_url, market_id
            );
            (market_id, self.get_json(&url).await)
        });
        let mut books = Vec::with_capacity(market_ids.len());
        for (market_id, result) in join_all(futures).await {
            let value = result?;
            let wrapper: OrderbookWrapper = serde_json::from_value(value)
                .map_err(|e| ChainError::MalformedResponse(e.to_string()))?;
            books.push(self.hydrate_book(market_id, wrapper.orderbook)?);
        }
        Ok(books)
    }

    async fn query_sequence(&self) -> Result<u64, ChainError> {
        let url = format!("{}/cosmos/auth/v1beta1/accounts/{}", self.lcd_url, self.sender);
        let value = self.get_json(&url).await?;
        let wrapper: AccountWrapper = serde_json::from_value(value)
            .map_err(|e| ChainError::MalformedResponse(e.to_string()))?;
        wrapper
            .account
            .sequence
            .parse::<u64>()
            .map_err(|e| ChainError::MalformedResponse(format!("sequence: {}", e)))
    }

    async fn sign_and_broadcast(
        &self,
        msgs: &[ChainMessage],
        fee: &Fee,
        sequence: u64,
    ) -> Result<BroadcastResult, ChainError> {
        let url = format!("{}/v1/sign_and_broadcast", self.signer_url);
        let body = json!({ "msgs": msgs, "fee": fee, "sequence": sequence });
        let value = self.post_json(&url, &body).await?;
        serde_json::from_value(value).map_err(|e| ChainError::MalformedResponse(e.to_string()))
    }

    async fn sign_and_broadcast_bundle(
        &self,
        msgs: &[ChainMessage],
        fee: &Fee,
        sequence: u64,
        backrun_tx: Option<&str>,
    ) -> Result<BundleResult, ChainError> {
        let url = format!("{}/v1/bundle", self.signer_url);
        let body = json!({
            "msgs": msgs,
            "fee": fee,
            "sequence": sequence,
            "backrun_tx": backrun_tx,
        });
        let value = self.post_json(&url, &body).await?;
        serde_json::from_value(value).map_err(|e| ChainError::MalformedResponse(e.to_string()))
    }

    async fn reset(&self) -> Result<(), ChainError> {
        let url = format!("{}/v1/reset", self.signer_url);
        self.post_json(&url, &json!({})).await.map(|_| ())
    }

    fn sender_address(&self) -> &str {
        &self.sender
    }
}
