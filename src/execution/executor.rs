//! src/execution/executor.rs - Trade submission
//!
//! Exactly one submission is ever in flight: the scheduler calls submit and
//! awaits it before making another decision. Direct broadcasts track the
//! account sequence locally and bump it on every accepted transaction; the
//! chain is only re-asked after an explicit reset, never mid-burst. Relay
//! bundles attach a profit-fraction bid payment and can pin a mempool
//! transaction to backrun.

use std::sync::Arc;

use log::{info, warn};
use rustc_hash::FxHashMap;
use serde_json::json;
use thiserror::Error;

use crate::arbitrage::types::ChosenTrade;
use crate::chain::client::{
    ChainClient, ChainError, ChainMessage, Coin, Fee, RELAY_CODE_NO_BUILDER,
};
use crate::chain::encoder::{EncodeError, EncoderRegistry};
use crate::common::config::{Config, RelayConfig, SubmissionMode};
use crate::markets::book::Orderbook;
use crate::markets::pools::PoolBook;

pub const BANK_SEND_TYPE_URL: &str = "/cosmos.bank.v1beta1.MsgSend";

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// What happened to a submission, as far as the loop needs to care.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Direct broadcast accepted by the node.
    Executed { tx_hash: String, height: u64 },
    /// Bundle accepted by the relay.
    BundleAccepted,
    /// The pinned backrun target itself failed check/deliver; its sender is
    /// a candidate for the ignore list.
    BackrunTargetFailed,
    /// Relay had no block builder this round (code 4).
    RelayUnavailable,
    Rejected { code: u32, raw_log: String },
}

pub struct TradeSubmitter {
    client: Arc<dyn ChainClient>,
    registry: EncoderRegistry,
    mode: SubmissionMode,
    relay: Option<RelayConfig>,
    fee_denom: String,
    fee_tiers: Vec<crate::common::config::FeeTier>,
    flashloan_router: Option<String>,
    sequence: u64,
    consecutive_no_builder: u32,
    forced_direct: bool,
}

impl TradeSubmitter {
    /// Builds the submitter and syncs the starting sequence from chain.
    pub async fn init(
        client: Arc<dyn ChainClient>,
        config: &Config,
    ) -> Result<Self, SubmitError> {
        let sequence = client.query_sequence().await?;
        Ok(TradeSubmitter {
            client,
            registry: EncoderRegistry::standard(),
            mode: config.submission,
            relay: config.relay.clone(),
            fee_denom: config.fee_denom.clone(),
            fee_tiers: config.fee_tiers.clone(),
            flashloan_router: config.flashloan_router.clone(),
            sequence,
            consecutive_no_builder: 0,
            forced_direct: false,
        })
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    fn fee_for_operations(&self, operations: usize) -> Fee {
        let tier = self
            .fee_tiers
            .iter()
            .find(|t| t.max_operations >= operations)
            .or_else(|| self.fee_tiers.last())
            .expect("config validation guarantees at least one fee tier");
        Fee {
            amount: vec![Coin {
                denom: self.fee_denom.clone(),
                amount: u128::from(tier.amount),
            }],
            gas: tier.gas,
        }
    }

    /// Bid payment to the relay's fee-share address: a configured fraction of
    /// the expected profit, floored at the relay minimum.
    fn bid_msg(&self, relay: &RelayConfig, profit: i128) -> ChainMessage {
        let scaled = (profit.max(0) as f64 * relay.bid_rate).floor() as u128;
        let bid = scaled.max(u128::from(relay.min_bid));
        ChainMessage {
            type_url: BANK_SEND_TYPE_URL.to_string(),
            value: json!({
                "from_address": self.client.sender_address(),
                "to_address": relay.fee_share_address,
                "amount": [{ "denom": self.fee_denom, "amount": bid.to_string() }]
            }),
        }
    }

    /// Submits one chosen trade. Never called concurrently.
    pub async fn submit(
        &mut self,
        trade: &ChosenTrade,
        pools: &PoolBook,
        books: &FxHashMap<String, Orderbook>,
        backrun_tx: Option<&str>,
    ) -> Result<SubmitOutcome, SubmitError> {
        let encoded = self.registry.encode_trade(
            trade,
            pools,
            books,
            self.client.sender_address(),
            self.flashloan_router.as_deref(),
        )?;
        let fee = self.fee_for_operations(encoded.operations);

        if self.mode == SubmissionMode::Relay && !self.forced_direct {
            self.submit_bundle(encoded.msgs, fee, trade.profit(), backrun_tx)
                .await
        } else {
            self.submit_direct(encoded.msgs, fee).await
        }
    }

    async fn submit_direct(
        &mut self,
        msgs: Vec<ChainMessage>,
        fee: Fee,
    ) -> Result<SubmitOutcome, SubmitError> {
        let result = self
            .client
            .sign_and_broadcast(&msgs, &fee, self.sequence)
            .await?;
        if result.is_ok() {
            // Bump locally right away; re-querying here races the next burst.
            self.sequence += 1;
            info!("✅ Broadcast accepted: {} at height {}", result.tx_hash, result.height);
            return Ok(SubmitOutcome::Executed {
                tx_hash: result.tx_hash,
                height: result.height,
            });
        }
        if result.is_sequence_mismatch() {
            warn!("Sequence mismatch on broadcast, resyncing client");
            self.client.reset().await?;
            self.sequence = self.client.query_sequence().await?;
        }
        Ok(SubmitOutcome::Rejected {
            code: result.code,
            raw_log: result.raw_log,
        })
    }

    async fn submit_bundle(
        &mut self,
        mut msgs: Vec<ChainMessage>,
        fee: Fee,
        profit: i128,
        backrun_tx: Option<&str>,
    ) -> Result<SubmitOutcome, SubmitError> {
        let relay = self
            .relay
            .clone()
            .expect("relay mode validated to carry a relay config");
        msgs.push(self.bid_msg(&relay, profit));

        let result = self
            .client
            .sign_and_broadcast_bundle(&msgs, &fee, self.sequence, backrun_tx)
            .await?;

        if result.code == 0 {
            self.sequence += 1;
            self.consecutive_no_builder = 0;
            info!("✅ Bundle accepted by relay");
            return Ok(SubmitOutcome::BundleAccepted);
        }
        if result.code == RELAY_CODE_NO_BUILDER {
            self.consecutive_no_builder += 1;
            if relay.fallback_on_no_builder
                && self.consecutive_no_builder >= relay.no_builder_fallback_after
            {
                warn!(
                    "Relay reported no block builder {} times, falling back to direct broadcast",
                    self.consecutive_no_builder
                );
                self.forced_direct = true;
            }
            return Ok(SubmitOutcome::RelayUnavailable);
        }
        self.consecutive_no_builder = 0;
        // The backrun target rides first in the bundle; a failure on its
        // check/deliver step points at the addressed sender, not at us.
        if backrun_tx.is_some() && result.txs.first().is_some_and(|tx| tx.failed()) {
            return Ok(SubmitOutcome::BackrunTargetFailed);
        }
        Ok(SubmitOutcome::Rejected {
            code: result.code,
            raw_log: result.raw_log,
        })
    }
}
