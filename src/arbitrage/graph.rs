//! src/arbitrage/graph.rs - Route graph construction and cycle enumeration
//!
//! Assets are vertices, pools are undirected edges (parallel pools stack on
//! the same vertex pair). Cycle enumeration is a bounded depth-first search
//! from the root asset back to itself; every vertex-level cycle is then
//! expanded combinatorially across the parallel pools on each edge, with the
//! constraint that no pool address appears twice in one candidate route.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::info;
use rustc_hash::FxHashMap;

use crate::arbitrage::types::{OrderbookPath, Path, TradeSequence};
use crate::common::config::OrderbookConfig;
use crate::markets::pools::PoolBook;
use crate::markets::types::{AssetInfo, PairType};

/// Enumerates every simple cycle of 2..=`max_hops` pools from `root` back to
/// itself. A root asset absent from the graph yields an empty result, not an
/// error. Output order is deterministic (sorted by path identity) so that
/// identifiers are stable cooldown-map keys across rebuilds.
pub fn get_paths(book: &PoolBook, root: &AssetInfo, max_hops: usize) -> Vec<Path> {
    // Only constant-product curves are routed: the closed-form solver is
    // exact for xyk only. Other pair types stay tracked for projection.
    let mut adjacency: BTreeMap<&str, BTreeMap<&str, Vec<&str>>> = BTreeMap::new();
    let mut infos: FxHashMap<&str, &AssetInfo> = FxHashMap::default();
    for pool in book.iter().filter(|p| p.pair_type == PairType::Xyk) {
        let a = &pool.assets[0].info;
        let b = &pool.assets[1].info;
        infos.insert(a.id(), a);
        infos.insert(b.id(), b);
        adjacency
            .entry(a.id())
            .or_default()
            .entry(b.id())
            .or_default()
            .push(&pool.address);
        adjacency
            .entry(b.id())
            .or_default()
            .entry(a.id())
            .or_default()
            .push(&pool.address);
    }

    if !adjacency.contains_key(root.id()) {
        return Vec::new();
    }

    let mut cycles: Vec<Vec<(&str, &str)>> = Vec::new();
    let mut trail: Vec<(&str, &str)> = Vec::new();
    let mut visited: Vec<&str> = Vec::new();
    walk(
        &adjacency,
        root.id(),
        root.id(),
        max_hops,
        &mut trail,
        &mut visited,
        &mut cycles,
    );

    let mut paths = Vec::new();
    for cycle in cycles {
        let groups: Vec<&Vec<&str>> = cycle
            .iter()
            .map(|&(from, to)| &adjacency[from][to])
            .collect();
        for combo in groups.iter().map(|g| g.iter()).multi_cartesian_product() {
            let addresses: Vec<String> = combo.iter().map(|addr| (**addr).to_string()).collect();
            // A venue may only appear once per route.
            let distinct = addresses
                .iter()
                .enumerate()
                .all(|(i, addr)| !addresses[..i].contains(addr));
            if !distinct {
                continue;
            }
            let mut route: Vec<AssetInfo> = Vec::with_capacity(cycle.len() + 1);
            route.push(root.clone());
            for &(_, to) in &cycle {
                route.push((*infos.get(to).expect("vertex has an asset")).clone());
            }
            paths.push(Path::new(addresses, route));
        }
    }
    paths.sort_by(|a, b| a.id.cmp(&b.id));
    info!(
        "🗺️ Route graph: {} paths of <= {} hops from {}",
        paths.len(),
        max_hops,
        root.id()
    );
    paths
}

fn walk<'g>(
    adjacency: &'g BTreeMap<&'g str, BTreeMap<&'g str, Vec<&'g str>>>,
    root: &'g str,
    current: &'g str,
    max_hops: usize,
    trail: &mut Vec<(&'g str, &'g str)>,
    visited: &mut Vec<&'g str>,
    cycles: &mut Vec<Vec<(&'g str, &'g str)>>,
) {
    let Some(neighbors) = adjacency.get(current) else {
        return;
    };
    for (&next, _) in neighbors.iter() {
        let depth = trail.len() + 1;
        if next == root {
            if depth >= 2 {
                let mut cycle = trail.clone();
                cycle.push((current, next));
                cycles.push(cycle);
            }
            continue;
        }
        if depth < max_hops && !visited.contains(&next) {
            trail.push((current, next));
            visited.push(next);
            walk(adjacency, root, next, max_hops, trail, visited, cycles);
            visited.pop();
            trail.pop();
        }
    }
}

/// Pairs each configured market whose quote asset is the root with every
/// routed pool carrying the root and the market's base asset, in both leg
/// orderings. Built from static market metadata so paths exist before the
/// first book snapshot lands.
pub fn get_orderbook_paths(
    book: &PoolBook,
    markets: &[OrderbookConfig],
    root: &AssetInfo,
) -> Vec<OrderbookPath> {
    let mut paths = Vec::new();
    for market in markets {
        if &market.quote_asset != root {
            continue;
        }
        let mut pool_addresses: Vec<&String> = book
            .iter()
            .filter(|p| {
                p.pair_type == PairType::Xyk
                    && p.has_asset(root)
                    && p.has_asset(&market.base_asset)
            })
            .map(|p| &p.address)
            .collect();
        pool_addresses.sort();
        for address in pool_addresses {
            for sequence in [TradeSequence::AmmFirst, TradeSequence::OrderbookFirst] {
                paths.push(OrderbookPath::new(
                    address.clone(),
                    market.market_id.clone(),
                    sequence,
                    u128::from(market.min_profit),
                    u128::from(market.expected_fee),
                ));
            }
        }
    }
    paths
}

/// Conflict heuristic between two ordered pool-address sequences: the paths
/// must cool down together when they intersect in strictly more than half of
/// the shorter path's pools AND either at least half of the shared pools sit
/// at the same hop index in both, or both end on the same pool.
fn conflicting(a: &[String], b: &[String]) -> bool {
    let shorter = a.len().min(b.len());
    let shared: Vec<&String> = a.iter().filter(|addr| b.contains(*addr)).collect();
    if shared.len() * 2 <= shorter {
        return false;
    }
    let same_index = shared
        .iter()
        .filter(|addr| {
            a.iter().position(|x| x == **addr) == b.iter().position(|x| x == **addr)
        })
        .count();
    same_index * 2 >= shared.len() || a.last() == b.last()
}

/// Second pass after path generation: fills in every path's conflict set,
/// across AMM paths and orderbook paths alike.
pub fn compute_conflicts(paths: &mut [Path], orderbook_paths: &mut [OrderbookPath]) {
    let mut sequences: Vec<(String, Vec<String>)> = Vec::new();
    for path in paths.iter() {
        sequences.push((path.id.clone(), path.pool_addresses.clone()));
    }
    for path in orderbook_paths.iter() {
        sequences.push((path.id.clone(), vec![path.pool_address.clone()]));
    }

    let mut conflict_ids: Vec<Vec<String>> = vec![Vec::new(); sequences.len()];
    for i in 0..sequences.len() {
        for j in (i + 1)..sequences.len() {
            if conflicting(&sequences[i].1, &sequences[j].1) {
                conflict_ids[i].push(sequences[j].0.clone());
                conflict_ids[j].push(sequences[i].0.clone());
            }
        }
    }

    let split = paths.len();
    for (i, path) in paths.iter_mut().enumerate() {
        path.conflicts = conflict_ids[i].iter().cloned().collect();
    }
    for (j, path) in orderbook_paths.iter_mut().enumerate() {
        path.conflicts = conflict_ids[split + j].iter().cloned().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markets::types::testing::xyk_pool;
    use crate::markets::types::Asset;

    fn info(denom: &str) -> AssetInfo {
        AssetInfo::native(denom)
    }

    fn pool(addr: &str, a: &str, b: &str) -> crate::markets::types::Pool {
        xyk_pool(
            addr,
            Asset::new(info(a), 1_000_000),
            Asset::new(info(b), 1_000_000),
            30,
        )
    }

    #[test]
    fn triangle_is_enumerated_in_both_orientations() {
        let book = PoolBook::new(vec![
            pool("poolAB", "uA", "uB"),
            pool("poolBC", "uB", "uC"),
            pool("poolCA", "uC", "uA"),
        ])
        .unwrap();
        // Two hops cannot close the triangle without reusing a pool.
        assert!(get_paths(&book, &info("uA"), 2).is_empty());

        let paths = get_paths(&book, &info("uA"), 3);
        assert_eq!(paths.len(), 2);
        let ids: Vec<&str> = paths.iter().map(|p| p.id.as_str()).collect();
        assert!(ids.contains(&"poolABpoolBCpoolCA"));
        assert!(ids.contains(&"poolCApoolBCpoolAB"));
        for path in &paths {
            assert_eq!(path.route.first(), path.route.last());
            assert_eq!(path.route.len(), 4);
        }
    }

    #[test]
    fn parallel_pools_give_two_hop_cycles() {
        let book =
            PoolBook::new(vec![pool("pool1", "uA", "uB"), pool("pool2", "uA", "uB")]).unwrap();
        let paths = get_paths(&book, &info("uA"), 2);
        assert_eq!(paths.len(), 2);
        // Never the same venue twice: no pool1-pool1 degenerate cycle.
        for path in &paths {
            assert_ne!(path.pool_addresses[0], path.pool_addresses[1]);
        }
    }

    #[test]
    fn missing_root_is_an_empty_result() {
        let book = PoolBook::new(vec![pool("pool1", "uA", "uB")]).unwrap();
        assert!(get_paths(&book, &info("uZ"), 3).is_empty());
    }

    #[test]
    fn identifiers_are_stable_across_rebuilds() {
        let pools = || {
            vec![
                pool("pool1", "uA", "uB"),
                pool("pool2", "uA", "uB"),
                pool("pool3", "uB", "uC"),
                pool("pool4", "uC", "uA"),
            ]
        };
        let first = get_paths(&PoolBook::new(pools()).unwrap(), &info("uA"), 3);
        let second = get_paths(&PoolBook::new(pools()).unwrap(), &info("uA"), 3);
        let ids_a: Vec<_> = first.iter().map(|p| p.id.clone()).collect();
        let ids_b: Vec<_> = second.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids_a, ids_b);
        assert!(!ids_a.is_empty());
    }

    #[test]
    fn shared_tail_at_same_hop_indices_conflicts() {
        let book = PoolBook::new(vec![
            pool("poolAB1", "uA", "uB"),
            pool("poolAB2", "uA", "uB"),
            pool("poolBC", "uB", "uC"),
            pool("poolCA", "uC", "uA"),
        ])
        .unwrap();
        let mut paths = get_paths(&book, &info("uA"), 3);
        let mut ob: Vec<OrderbookPath> = Vec::new();
        compute_conflicts(&mut paths, &mut ob);

        // Same B->C->A tail at the same hop indices, different first hop.
        let p1 = paths.iter().find(|p| p.id == "poolAB1poolBCpoolCA").unwrap();
        let p2 = paths.iter().find(|p| p.id == "poolAB2poolBCpoolCA").unwrap();
        assert!(p1.conflicts.contains(&p2.id));
        assert!(p2.conflicts.contains(&p1.id));

        // Reversed orientations share every pool but at mirrored indices and
        // different final pools: the heuristic leaves them independent.
        let fwd = paths.iter().find(|p| p.id == "poolAB1poolBCpoolCA").unwrap();
        let rev = paths.iter().find(|p| p.id == "poolCApoolBCpoolAB1").unwrap();
        assert!(!fwd.conflicts.contains(&rev.id));
    }

    #[test]
    fn orderbook_path_conflicts_with_amm_path_sharing_its_pool() {
        let book =
            PoolBook::new(vec![pool("pool1", "uA", "uB"), pool("pool2", "uA", "uB")]).unwrap();
        let mut paths = get_paths(&book, &info("uA"), 2);
        let mut ob = vec![OrderbookPath::new(
            "pool1".to_string(),
            "0xmarket".to_string(),
            TradeSequence::AmmFirst,
            0,
            0,
        )];
        compute_conflicts(&mut paths, &mut ob);
        // pool1 is the orderbook path's only pool; any AMM path using pool1
        // at hop 0 or as its final pool is a conflict.
        let p12 = paths.iter().find(|p| p.id == "pool1pool2").unwrap();
        let p21 = paths.iter().find(|p| p.id == "pool2pool1").unwrap();
        assert!(ob[0].conflicts.contains(&p12.id));
        assert!(ob[0].conflicts.contains(&p21.id));
        assert!(p12.conflicts.contains(&ob[0].id));
        assert!(p21.conflicts.contains(&ob[0].id));
    }
}
