//! src/arbitrage/types.rs - Route and solver output types
//!
//! Paths are built once per graph build and immutable afterwards; whether a
//! path is currently tradable lives in the cooldown tracker, not in the path.
//! Solver outputs are transient and recomputed every tick.

use rustc_hash::FxHashSet;
use strum_macros::Display;

use crate::markets::types::{Asset, AssetInfo};

/// A cyclic route of 2..=N pools returning to the root offer asset.
///
/// `pool_addresses` is the ordered hop sequence; `route` is the asset visited
/// before each hop, with the root repeated at the end. Pools are looked up by
/// address at solve time so a path never holds stale reserves.
#[derive(Debug, Clone)]
pub struct Path {
    /// Deterministic identity: the ordered pool addresses concatenated.
    pub id: String,
    pub pool_addresses: Vec<String>,
    pub route: Vec<AssetInfo>,
    /// Paths that must cool down together with this one.
    pub conflicts: FxHashSet<String>,
}

impl Path {
    pub fn new(pool_addresses: Vec<String>, route: Vec<AssetInfo>) -> Self {
        let id = pool_addresses.concat();
        Path {
            id,
            pool_addresses,
            route,
            conflicts: FxHashSet::default(),
        }
    }

    pub fn hops(&self) -> usize {
        self.pool_addresses.len()
    }
}

/// Leg ordering of an orderbook/AMM pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TradeSequence {
    AmmFirst,
    OrderbookFirst,
}

/// One AMM pool paired with one orderbook market.
#[derive(Debug, Clone)]
pub struct OrderbookPath {
    pub id: String,
    pub pool_address: String,
    pub market_id: String,
    pub sequence: TradeSequence,
    /// Minimum acceptable profit, in the fee-denominated unit.
    pub min_profit: u128,
    /// Expected transaction fee for this trade shape.
    pub expected_fee: u128,
    pub conflicts: FxHashSet<String>,
}

impl OrderbookPath {
    pub fn new(
        pool_address: String,
        market_id: String,
        sequence: TradeSequence,
        min_profit: u128,
        expected_fee: u128,
    ) -> Self {
        let id = format!("{}{}{}", pool_address, market_id, sequence);
        OrderbookPath {
            id,
            pool_address,
            market_id,
            sequence,
            min_profit,
            expected_fee,
            conflicts: FxHashSet::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TradeType {
    Amm,
    OrderbookAmm,
}

/// Profit-maximizing trade over a pure AMM cycle.
#[derive(Debug, Clone)]
pub struct OptimalTrade {
    pub path: Path,
    pub offer: Asset,
    /// Confirmed profit in offer-asset units, from the discrete replay pass.
    pub profit: i128,
    pub trade_type: TradeType,
}

/// Profit-maximizing trade over an orderbook/AMM pairing.
#[derive(Debug, Clone)]
pub struct OptimalOrderbookTrade {
    pub path: OrderbookPath,
    pub offer: Asset,
    pub profit: i128,
    pub trade_type: TradeType,
    /// Price of the worst book level the trade is allowed to touch.
    pub worst_acceptable_price: f64,
    pub average_execution_price: f64,
    /// Output of the orderbook leg: quote proceeds when selling, base
    /// quantity when buying.
    pub orderbook_leg_output: f64,
}

/// Winner of one tick's solve step, whichever solver produced it.
#[derive(Debug, Clone)]
pub enum ChosenTrade {
    Amm(OptimalTrade),
    Orderbook(OptimalOrderbookTrade),
}

impl ChosenTrade {
    pub fn profit(&self) -> i128 {
        match self {
            ChosenTrade::Amm(t) => t.profit,
            ChosenTrade::Orderbook(t) => t.profit,
        }
    }

    pub fn offer(&self) -> &Asset {
        match self {
            ChosenTrade::Amm(t) => &t.offer,
            ChosenTrade::Orderbook(t) => &t.offer,
        }
    }

    pub fn path_id(&self) -> &str {
        match self {
            ChosenTrade::Amm(t) => &t.path.id,
            ChosenTrade::Orderbook(t) => &t.path.id,
        }
    }

    pub fn conflicts(&self) -> &FxHashSet<String> {
        match self {
            ChosenTrade::Amm(t) => &t.path.conflicts,
            ChosenTrade::Orderbook(t) => &t.path.conflicts,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ChosenTrade::Amm(t) => format!(
                "AMM cycle {} hops, offer {} {}, profit {}",
                t.path.hops(),
                t.offer.amount,
                t.offer.info.id(),
                t.profit
            ),
            ChosenTrade::Orderbook(t) => format!(
                "{} via {} on {}, offer {} {}, profit {}",
                t.path.sequence,
                t.path.pool_address,
                t.path.market_id,
                t.offer.amount,
                t.offer.info.id(),
                t.profit
            ),
        }
    }
}
