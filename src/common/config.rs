//! src/common/config.rs - Trading configuration loaded from config.json

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;

use crate::markets::types::{AssetInfo, ClParams, DexVariant, PairType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub address: String,
    #[serde(default)]
    pub variant: DexVariant,
    pub pair_type: PairType,
    // Manual fee overrides; dialect defaults apply when absent.
    pub input_fee_bps: Option<u16>,
    pub output_fee_bps: Option<u16>,
    #[serde(default)]
    pub factory_addr: Option<String>,
    #[serde(default)]
    pub router_addr: Option<String>,
    #[serde(default)]
    pub cl_params: Option<ClParams>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderbookConfig {
    pub market_id: String,
    pub base_asset: AssetInfo,
    pub quote_asset: AssetInfo,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub min_quantity_increment: f64,
    pub min_price_increment: f64,
    pub maker_fee_rate: f64,
    pub taker_fee_rate: f64,
    /// Minimum acceptable profit for trades over this market.
    #[serde(default)]
    pub min_profit: u64,
    /// Expected transaction fee for this trade shape.
    #[serde(default)]
    pub expected_fee: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionMode {
    Direct,
    Relay,
}

fn default_min_bid() -> u64 {
    // Relay floor: bids below this are rejected outright.
    651
}

fn default_no_builder_fallback_after() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Fraction of expected profit paid to the relay's fee-share address.
    pub bid_rate: f64,
    #[serde(default = "default_min_bid")]
    pub min_bid: u64,
    pub fee_share_address: String,
    /// Fall back to direct broadcast after repeated code-4 responses.
    #[serde(default)]
    pub fallback_on_no_builder: bool,
    #[serde(default = "default_no_builder_fallback_after")]
    pub no_builder_fallback_after: u32,
}

/// Fee tier selected by the encoded trade's operation count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeTier {
    pub max_operations: usize,
    pub gas: u64,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub chain_id: String,
    /// Root offer asset every route cycles back to.
    pub root_asset: AssetInfo,
    /// Maximum pools per route (2 or 3 in practice).
    pub max_hops: usize,
    pub pools: Vec<PoolConfig>,
    #[serde(default)]
    pub orderbooks: Vec<OrderbookConfig>,
    /// Minimum profit per hop count, covering variable transaction cost.
    #[serde(default)]
    pub profit_thresholds: HashMap<u8, u64>,

    pub cooldown_self_ticks: Option<u64>,     // Default: 10
    pub cooldown_conflict_ticks: Option<u64>, // Default: 5
    pub ignore_ttl_ticks: Option<u64>,        // Default: 600

    /// Whether to run the blocking mempool poll between refreshes.
    pub mempool_enabled: bool,
    pub submission: SubmissionMode,
    pub relay: Option<RelayConfig>,
    #[serde(default)]
    pub flashloan_router: Option<String>,

    pub fee_denom: String,
    pub fee_tiers: Vec<FeeTier>,

    pub resync_after_ms: Option<u64>,   // Default: 30_000
    pub tick_interval_ms: Option<u64>,  // Default: 1_000 (no-mempool mode)
    pub sign_of_life_ticks: Option<u64>, // Default: 600
}

impl Config {
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config_str = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_str)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.pools.is_empty() {
            return Err("config lists no pools".into());
        }
        if self.max_hops < 2 {
            return Err("max_hops must be at least 2".into());
        }
        if self.submission == SubmissionMode::Relay && self.relay.is_none() {
            return Err("relay submission selected without a relay section".into());
        }
        if self.fee_tiers.is_empty() {
            return Err("config lists no fee tiers".into());
        }
        Ok(())
    }

    pub fn cooldown_self_ticks(&self) -> u64 {
        self.cooldown_self_ticks.unwrap_or(10)
    }

    pub fn cooldown_conflict_ticks(&self) -> u64 {
        self.cooldown_conflict_ticks.unwrap_or(5)
    }

    pub fn ignore_ttl_ticks(&self) -> u64 {
        self.ignore_ttl_ticks.unwrap_or(600)
    }

    pub fn resync_after_ms(&self) -> u64 {
        self.resync_after_ms.unwrap_or(30_000)
    }

    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms.unwrap_or(1_000)
    }

    pub fn sign_of_life_ticks(&self) -> u64 {
        self.sign_of_life_ticks.unwrap_or(600)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Minimal direct-mode config over the given pools.
    pub fn direct_config(root_denom: &str, pools: Vec<PoolConfig>) -> Config {
        Config {
            chain_id: "juno-1".to_string(),
            root_asset: AssetInfo::native(root_denom),
            max_hops: 3,
            pools,
            orderbooks: Vec::new(),
            profit_thresholds: HashMap::new(),
            cooldown_self_ticks: None,
            cooldown_conflict_ticks: None,
            ignore_ttl_ticks: None,
            mempool_enabled: true,
            submission: SubmissionMode::Direct,
            relay: None,
            flashloan_router: None,
            fee_denom: root_denom.to_string(),
            fee_tiers: vec![
                FeeTier {
                    max_operations: 2,
                    gas: 600_000,
                    amount: 900,
                },
                FeeTier {
                    max_operations: 4,
                    gas: 1_200_000,
                    amount: 1_800,
                },
            ],
            resync_after_ms: None,
            tick_interval_ms: None,
            sign_of_life_ticks: None,
        }
    }

    pub fn xyk_pool_config(address: &str) -> PoolConfig {
        PoolConfig {
            address: address.to_string(),
            variant: DexVariant::ConstantProduct,
            pair_type: PairType::Xyk,
            input_fee_bps: Some(30),
            output_fee_bps: Some(0),
            factory_addr: None,
            router_addr: None,
            cl_params: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_mode_requires_relay_section() {
        let mut config = testing::direct_config("ujuno", vec![testing::xyk_pool_config("pool1")]);
        config.submission = SubmissionMode::Relay;
        assert!(config.validate().is_err());
        config.relay = Some(RelayConfig {
            bid_rate: 0.4,
            min_bid: default_min_bid(),
            fee_share_address: "juno1relay".to_string(),
            fallback_on_no_builder: true,
            no_builder_fallback_after: 3,
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn defaults_match_the_documented_asymmetry() {
        let config = testing::direct_config("ujuno", vec![testing::xyk_pool_config("pool1")]);
        assert_eq!(config.cooldown_self_ticks(), 10);
        assert_eq!(config.cooldown_conflict_ticks(), 5);
        assert_eq!(default_min_bid(), 651);
    }
}
