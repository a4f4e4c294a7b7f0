//! src/arbitrage/solver.rs - Closed-form optimal trade over an AMM cycle
//!
//! The N-hop route is compressed into a single virtual constant-product pool
//! by folding one hop at a time: a hop with reserves (r_in, r_out) and fee
//! multipliers (f_in, f_out) is the fee-less virtual pool
//! (r_in / f_in, r_out * f_out), and two virtual pools (A1, B1), (A2, B2)
//! compose into (A1*A2 / (A2 + B1), B1*B2 / (A2 + B1)). The optimum of the
//! final system, sqrt(A*B) - A, is continuous-math only; the returned amount
//! is trusted only after a discrete hop-by-hop replay with the same flooring
//! the contracts apply.

use log::debug;
use rustc_hash::FxHashMap;

use crate::arbitrage::types::{OptimalTrade, Path, TradeType};
use crate::markets::pools::PoolBook;
use crate::markets::types::Asset;

#[derive(Debug, Clone, Copy)]
struct VirtualPool {
    a: f64,
    b: f64,
}

fn compose(first: VirtualPool, second: VirtualPool) -> VirtualPool {
    let denom = second.a + first.b;
    VirtualPool {
        a: first.a * second.a / denom,
        b: first.b * second.b / denom,
    }
}

/// Folds the route into one virtual pool. Returns None when a hop is missing
/// from the tracked set or the numbers degenerate.
fn reduce_path(path: &Path, book: &PoolBook) -> Option<VirtualPool> {
    let mut offer_info = path.route.first()?.clone();
    let mut reduced: Option<VirtualPool> = None;
    for address in &path.pool_addresses {
        let pool = book.get(address)?;
        let reserve_in = pool.reserve(&offer_info)?;
        let reserve_out = pool.other_side(&offer_info)?;
        let (f_in, f_out) = pool.fee_multipliers();
        let hop = VirtualPool {
            a: reserve_in.amount as f64 / f_in,
            b: reserve_out.amount as f64 * f_out,
        };
        reduced = Some(match reduced {
            None => hop,
            Some(prev) => compose(prev, hop),
        });
        offer_info = reserve_out.info.clone();
    }
    let reduced = reduced?;
    if !reduced.a.is_finite() || !reduced.b.is_finite() || reduced.a <= 0.0 || reduced.b <= 0.0 {
        return None;
    }
    Some(reduced)
}

/// Closed-form profit-maximizing offer amount for the route, floored to an
/// integer. Negative or non-finite optima mean "not profitable".
pub fn optimal_offer(path: &Path, book: &PoolBook) -> Option<u128> {
    let reduced = reduce_path(path, book)?;
    let delta = (reduced.a * reduced.b).sqrt() - reduced.a;
    if !delta.is_finite() || delta <= 0.0 {
        return None;
    }
    let floored = delta.floor();
    if floored <= 0.0 {
        return None;
    }
    Some(floored as u128)
}

/// Replays `offer` hop-by-hop with the production `out_given_in` flooring and
/// returns the realized profit in offer-asset units.
pub fn simulate_route(path: &Path, book: &PoolBook, offer: u128) -> Option<i128> {
    let root = path.route.first()?;
    let mut asset = Asset::new(root.clone(), offer);
    for address in &path.pool_addresses {
        let pool = book.get(address)?;
        asset = pool.out_given_in(&asset).ok()?;
    }
    if &asset.info != root {
        return None;
    }
    Some(asset.amount as i128 - offer as i128)
}

/// Solves one path: closed form, then the confirmation replay. The trade is
/// only returned when the replayed profit is positive.
pub fn solve_path(path: &Path, book: &PoolBook) -> Option<OptimalTrade> {
    let offer = optimal_offer(path, book)?;
    let profit = simulate_route(path, book, offer)?;
    if profit <= 0 {
        return None;
    }
    let root = path.route.first()?.clone();
    Some(OptimalTrade {
        path: path.clone(),
        offer: Asset::new(root, offer),
        profit,
        trade_type: TradeType::Amm,
    })
}

/// Runs the solver across all candidate paths and returns the single trade
/// with strictly maximal positive profit clearing the per-hop-count
/// threshold. Ties go to the first-seen path, which is deterministic because
/// path order is.
pub fn best_trade<'p, I>(
    paths: I,
    book: &PoolBook,
    profit_thresholds: &FxHashMap<u8, u128>,
) -> Option<OptimalTrade>
where
    I: IntoIterator<Item = &'p Path>,
{
    let mut best: Option<OptimalTrade> = None;
    for path in paths {
        let Some(trade) = solve_path(path, book) else {
            continue;
        };
        let threshold = profit_thresholds
            .get(&(path.hops() as u8))
            .copied()
            .unwrap_or(0);
        if (trade.profit as u128) < threshold {
            debug!(
                "Path {} below profit threshold: {} < {}",
                path.id, trade.profit, threshold
            );
            continue;
        }
        let beats = best.as_ref().map_or(true, |b| trade.profit > b.profit);
        if beats {
            best = Some(trade);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::graph::get_paths;
    use crate::markets::types::testing::xyk_pool;
    use crate::markets::types::{AssetInfo, Pool};

    fn info(denom: &str) -> AssetInfo {
        AssetInfo::native(denom)
    }

    fn pool(addr: &str, a: &str, amount_a: u128, b: &str, amount_b: u128, fee: u16) -> Pool {
        xyk_pool(
            addr,
            Asset::new(info(a), amount_a),
            Asset::new(info(b), amount_b),
            fee,
        )
    }

    fn skewed_book() -> PoolBook {
        PoolBook::new(vec![
            pool("pool1", "uA", 1_000_000, "uB", 1_000_000, 30),
            pool("pool2", "uB", 1_000_000, "uA", 900_000, 30),
        ])
        .unwrap()
    }

    #[test]
    fn confirmation_matches_simulated_profit() {
        let book = skewed_book();
        let paths = get_paths(&book, &info("uA"), 2);
        for path in &paths {
            if let Some(trade) = solve_path(path, &book) {
                let replayed = simulate_route(path, &book, trade.offer.amount).unwrap();
                assert_eq!(trade.profit, replayed);
            }
        }
    }

    #[test]
    fn balanced_pools_yield_no_trade() {
        let book = PoolBook::new(vec![
            pool("pool1", "uA", 1_000_000, "uB", 1_000_000, 30),
            pool("pool2", "uB", 1_000_000, "uA", 1_000_000, 30),
        ])
        .unwrap();
        for path in get_paths(&book, &info("uA"), 2) {
            assert!(
                solve_path(&path, &book).is_none(),
                "false positive on balanced path {}",
                path.id
            );
        }
    }

    #[test]
    fn skewed_pools_yield_one_profitable_orientation() {
        let book = skewed_book();
        let paths = get_paths(&book, &info("uA"), 2);
        assert_eq!(paths.len(), 2);
        let trades: Vec<OptimalTrade> = paths
            .iter()
            .filter_map(|p| solve_path(p, &book))
            .collect();
        // uA is worth more in pool2, so only selling uA into pool2 first and
        // buying it back on pool1 closes the gap profitably.
        assert_eq!(trades.len(), 1);
        let trade = &trades[0];
        assert_eq!(trade.path.pool_addresses[0], "pool2");
        assert!(trade.offer.amount > 0);
        assert!(trade.profit > 0);
        assert_eq!(trade.offer.info, info("uA"));
    }

    #[test]
    fn three_hop_cycle_solves_with_the_same_fold() {
        let book = PoolBook::new(vec![
            pool("poolAB", "uA", 1_000_000, "uB", 2_000_000, 30),
            pool("poolBC", "uB", 2_000_000, "uC", 1_000_000, 30),
            // uC fetches far more uA here than the cycle paid for it.
            pool("poolCA", "uC", 1_000_000, "uA", 1_300_000, 30),
        ])
        .unwrap();
        let paths = get_paths(&book, &info("uA"), 3);
        let best = best_trade(paths.iter(), &book, &FxHashMap::default()).unwrap();
        assert_eq!(best.path.hops(), 3);
        let replayed = simulate_route(&best.path, &book, best.offer.amount).unwrap();
        assert_eq!(best.profit, replayed);
        assert!(best.profit > 0);
    }

    #[test]
    fn threshold_filters_small_profits() {
        let book = skewed_book();
        let paths = get_paths(&book, &info("uA"), 2);
        let unfiltered = best_trade(paths.iter(), &book, &FxHashMap::default()).unwrap();
        let mut thresholds = FxHashMap::default();
        thresholds.insert(2u8, unfiltered.profit as u128 + 1);
        assert!(best_trade(paths.iter(), &book, &thresholds).is_none());
    }

    #[test]
    fn missing_pool_is_no_opportunity() {
        let book = skewed_book();
        let path = Path::new(
            vec!["pool1".to_string(), "ghost".to_string()],
            vec![info("uA"), info("uB"), info("uA")],
        );
        assert!(solve_path(&path, &book).is_none());
    }
}
