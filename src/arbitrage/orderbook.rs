//! src/arbitrage/orderbook.rs - Optimal trade over an orderbook/AMM pairing
//!
//! No closed form exists once a book walk is involved, so the solver scans a
//! fixed grid of candidate sizes and refines the best bracket with a
//! ternary-style probe: evaluate the midpoint and its immediate neighbors,
//! stop when the midpoint beats both, otherwise recurse into the half that
//! trends upward. Every traded base quantity is rounded down to the venue's
//! lot size before it feeds the next leg.

use log::debug;
use rustc_hash::FxHashMap;

use crate::arbitrage::types::{
    OptimalOrderbookTrade, OrderbookPath, TradeSequence, TradeType,
};
use crate::markets::book::Orderbook;
use crate::markets::pools::PoolBook;
use crate::markets::types::{Asset, AssetInfo, Pool};

/// Number of coarse grid probes before refinement.
const GRID_POINTS: u128 = 32;

#[derive(Debug, Clone, Copy)]
struct Eval {
    /// Root-asset outlay in chain units.
    offer_units: u128,
    profit: i128,
    worst_price: f64,
    average_price: f64,
    leg_output: f64,
}

/// Solves one orderbook path against current pool and book state. Returns
/// None when no candidate size clears zero and the path's own threshold.
pub fn solve_orderbook_path(
    path: &OrderbookPath,
    pools: &PoolBook,
    books: &FxHashMap<String, Orderbook>,
    root: &AssetInfo,
) -> Option<OptimalOrderbookTrade> {
    let pool = pools.get(&path.pool_address)?;
    let book = books.get(&path.market_id)?;
    if &book.quote_asset != root || !pool.has_asset(root) || !pool.has_asset(&book.base_asset) {
        return None;
    }

    let best = match path.sequence {
        TradeSequence::AmmFirst => {
            let cap = pool.reserve(root)?.amount / 2;
            search(cap, 1, |x| eval_amm_first(pool, book, root, x))
        }
        TradeSequence::OrderbookFirst => {
            let lot = book.min_quantity_increment;
            if lot <= 0.0 {
                return None;
            }
            let cap_lots = (book.sell_side_depth() / lot).floor() as u128;
            search(cap_lots, 1, |lots| {
                eval_orderbook_first(pool, book, root, lots as f64 * lot)
            })
        }
    }?;

    if best.profit <= 0 {
        return None;
    }
    if (best.profit as u128) < path.min_profit + path.expected_fee {
        debug!(
            "Orderbook path {} below threshold: {} < {} + {}",
            path.id, best.profit, path.min_profit, path.expected_fee
        );
        return None;
    }
    Some(OptimalOrderbookTrade {
        path: path.clone(),
        offer: Asset::new(root.clone(), best.offer_units),
        profit: best.profit,
        trade_type: TradeType::OrderbookAmm,
        worst_acceptable_price: best.worst_price,
        average_execution_price: best.average_price,
        orderbook_leg_output: best.leg_output,
    })
}

/// AMM leg first: offer `x` root into the pool, sell the base output into the
/// resting buys, collect quote proceeds net of the taker fee.
fn eval_amm_first(pool: &Pool, book: &Orderbook, root: &AssetInfo, x: u128) -> Option<Eval> {
    if x == 0 {
        return None;
    }
    let base_out = pool.out_given_in(&Asset::new(root.clone(), x)).ok()?;
    let quantity = book.round_to_lot(base_out.amount as f64 / book.base_factor());
    if quantity <= 0.0 {
        return None;
    }
    let fill = book.fill_sell(quantity)?;
    let proceeds = fill.quote_value * (1.0 - book.taker_fee_rate);
    let proceeds_units = (proceeds * book.quote_factor()).floor();
    if !proceeds_units.is_finite() || proceeds_units < 0.0 {
        return None;
    }
    Some(Eval {
        offer_units: x,
        profit: proceeds_units as i128 - x as i128,
        worst_price: fill.worst_price,
        average_price: fill.average_price,
        leg_output: proceeds,
    })
}

/// Orderbook leg first: lift the resting sells for `quantity` base (taker fee
/// on the quote cost), then sell the bought base into the AMM for root.
fn eval_orderbook_first(
    pool: &Pool,
    book: &Orderbook,
    root: &AssetInfo,
    quantity: f64,
) -> Option<Eval> {
    if quantity <= 0.0 {
        return None;
    }
    let fill = book.fill_buy(quantity)?;
    let bought = book.round_to_lot(fill.filled_quantity);
    if bought <= 0.0 {
        return None;
    }
    let cost = fill.quote_value * (1.0 + book.taker_fee_rate);
    let cost_units = (cost * book.quote_factor()).ceil();
    if !cost_units.is_finite() || cost_units < 0.0 {
        return None;
    }
    let base_units = (bought * book.base_factor()).floor() as u128;
    if base_units == 0 {
        return None;
    }
    let root_out = pool
        .out_given_in(&Asset::new(book.base_asset.clone(), base_units))
        .ok()?;
    if &root_out.info != root {
        return None;
    }
    Some(Eval {
        offer_units: cost_units as u128,
        profit: root_out.amount as i128 - cost_units as i128,
        worst_price: fill.worst_price,
        average_price: fill.average_price,
        leg_output: bought,
    })
}

/// Coarse grid over 1..=cap followed by the neighbor-probe refinement around
/// the best grid point. `eval` returning None marks an infeasible size.
fn search<F>(cap: u128, min_step: u128, eval: F) -> Option<Eval>
where
    F: Fn(u128) -> Option<Eval>,
{
    if cap == 0 || min_step == 0 || cap < min_step {
        return None;
    }
    let step = (cap / GRID_POINTS).max(min_step);
    let mut best: Option<(u128, Eval)> = None;
    let probe = |x: u128, best: &mut Option<(u128, Eval)>| {
        if x == 0 || x > cap {
            return;
        }
        if let Some(candidate) = eval(x) {
            let beats = best
                .as_ref()
                .map_or(true, |(_, b)| candidate.profit > b.profit);
            if beats {
                *best = Some((x, candidate));
            }
        }
    };

    let mut x = step;
    while x <= cap {
        probe(x, &mut best);
        x += step;
    }
    let (anchor, _) = best?;

    let mut lo = anchor.saturating_sub(step).max(min_step);
    let mut hi = (anchor + step).min(cap);
    while hi > lo && hi - lo > 2 * min_step {
        let mid = lo + (hi - lo) / 2;
        let left = eval(mid.saturating_sub(min_step)).map(|e| e.profit);
        let center = eval(mid).map(|e| e.profit);
        let right = eval((mid + min_step).min(cap)).map(|e| e.profit);
        probe(mid.saturating_sub(min_step), &mut best);
        probe(mid, &mut best);
        probe((mid + min_step).min(cap), &mut best);
        match (left, center, right) {
            (Some(l), Some(c), Some(r)) => {
                if c >= l && c >= r {
                    break;
                }
                if r > l {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
            _ => break,
        }
    }
    best.map(|(_, eval)| eval)
}

/// Runs the solver across every candidate orderbook path, returning the
/// strictly best trade; ties go to the first-seen path.
pub fn best_orderbook_trade<'p, I>(
    paths: I,
    pools: &PoolBook,
    books: &FxHashMap<String, Orderbook>,
    root: &AssetInfo,
) -> Option<OptimalOrderbookTrade>
where
    I: IntoIterator<Item = &'p OrderbookPath>,
{
    let mut best: Option<OptimalOrderbookTrade> = None;
    for path in paths {
        let Some(trade) = solve_orderbook_path(path, pools, books, root) else {
            continue;
        };
        let beats = best.as_ref().map_or(true, |b| trade.profit > b.profit);
        if beats {
            best = Some(trade);
        }
    }
    best
}
