//! src/markets/pools.rs - Tracked pool set and live-state refresh

use futures::future::join_all;
use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::json;

use crate::chain::client::ChainClient;
use crate::common::config::PoolConfig;
use crate::markets::errors::MarketError;
use crate::markets::types::{uint128_string, Asset, AssetInfo, DexVariant, Pool};

/// Wasm smart-query response for `{"pool": {}}`.
#[derive(Debug, Deserialize)]
pub struct PoolStateResponse {
    pub assets: Vec<Asset>,
    #[serde(with = "uint128_string")]
    pub total_share: u128,
}

/// Dialect-default swap fees, used when the config carries no manual
/// override for a pool.
pub fn default_fee_bps(variant: DexVariant) -> (u16, u16) {
    match variant {
        DexVariant::ConstantProduct => (30, 0),
        DexVariant::Wynd => (0, 30),
        DexVariant::Junoswap => (30, 0),
        DexVariant::Osmosis => (20, 0),
        DexVariant::ConcentratedLiquidity => (26, 0),
    }
}

/// All tracked pools keyed by address, plus an index from router address to
/// the pools routed through it. Owned exclusively by the engine loop; the
/// projector mutates reserves through `get_mut` from that single thread.
#[derive(Debug, Default)]
pub struct PoolBook {
    pools: FxHashMap<String, Pool>,
    routers: FxHashMap<String, Vec<String>>,
}

impl PoolBook {
    pub fn new(pools: Vec<Pool>) -> Result<Self, MarketError> {
        let mut book = PoolBook::default();
        for pool in pools {
            book.insert(pool)?;
        }
        Ok(book)
    }

    fn insert(&mut self, pool: Pool) -> Result<(), MarketError> {
        if self.pools.contains_key(&pool.address) {
            return Err(MarketError::MalformedState {
                pool: pool.address,
                details: "duplicate pool address in tracked set".to_string(),
            });
        }
        if let Some(router) = &pool.router_addr {
            self.routers
                .entry(router.clone())
                .or_default()
                .push(pool.address.clone());
        }
        self.pools.insert(pool.address.clone(), pool);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn get(&self, address: &str) -> Option<&Pool> {
        self.pools.get(address)
    }

    pub fn get_mut(&mut self, address: &str) -> Option<&mut Pool> {
        self.pools.get_mut(address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.pools.contains_key(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pool> {
        self.pools.values()
    }

    pub fn is_router(&self, address: &str) -> bool {
        self.routers.contains_key(address)
    }

    /// Pool under `router` carrying exactly the `offer`/`ask` pair, used to
    /// unroll router-wrapped multi-hop intents.
    pub fn router_pool_for_pair(
        &self,
        router: &str,
        offer: &AssetInfo,
        ask: &AssetInfo,
    ) -> Option<&Pool> {
        let addresses = self.routers.get(router)?;
        addresses
            .iter()
            .filter_map(|addr| self.pools.get(addr))
            .find(|pool| pool.has_asset(offer) && pool.has_asset(ask))
    }

    /// Pulls live reserves for every tracked pool. Queries fan out
    /// concurrently; a failed query leaves that pool stale and is logged,
    /// never aborting the rest of the refresh.
    pub async fn refresh(&mut self, client: &dyn ChainClient) -> usize {
        let query = json!({ "pool": {} });
        let addresses: Vec<String> = self.pools.keys().cloned().collect();
        let futures = addresses.iter().map(|addr| {
            let query = &query;
            async move { (addr.clone(), client.query_contract_state(addr, query).await) }
        });

        let mut fresh = 0;
        for (address, result) in join_all(futures).await {
            match result {
                Ok(value) => match serde_json::from_value::<PoolStateResponse>(value) {
                    Ok(state) => {
                        if self.apply_state(&address, state) {
                            fresh += 1;
                        }
                    }
                    Err(e) => {
                        warn!("Malformed pool state for {}: {}", address, e);
                    }
                },
                Err(e) => {
                    debug!("Pool refresh failed for {}: {} (keeping stale state)", address, e);
                }
            }
        }
        info!("💦 Fresh reserves for {}/{} pools", fresh, self.pools.len());
        fresh
    }

    /// Full replace of one pool's reserves from a query response. A zero
    /// reserve in the response leaves the previous state in place.
    fn apply_state(&mut self, address: &str, state: PoolStateResponse) -> bool {
        let Some(pool) = self.pools.get_mut(address) else {
            return false;
        };
        if state.assets.len() != 2 {
            warn!("Pool {} returned {} assets, expected 2", address, state.assets.len());
            return false;
        }
        if state.assets.iter().any(|a| a.amount == 0) {
            warn!("Pool {} reported an empty reserve, keeping stale state", address);
            return false;
        }
        let mut ordered: [Asset; 2] = [state.assets[0].clone(), state.assets[1].clone()];
        // Keep the constructed asset order stable across refreshes.
        if ordered[0].info != pool.assets[0].info {
            ordered.swap(0, 1);
        }
        if ordered[0].info != pool.assets[0].info || ordered[1].info != pool.assets[1].info {
            warn!("Pool {} reported an unexpected asset pair, keeping stale state", address);
            return false;
        }
        pool.assets = ordered;
        pool.total_share = state.total_share;
        true
    }
}

/// Builds the tracked set from config, fetching initial reserves for every
/// pool. Any missing or malformed required pool is fatal: the process must
/// not trade against a partially known venue set.
pub async fn load_pool_book(
    client: &dyn ChainClient,
    configs: &[PoolConfig],
) -> anyhow::Result<PoolBook> {
    use anyhow::Context;

    let query = json!({ "pool": {} });
    let futures = configs.iter().map(|cfg| {
        let query = &query;
        async move { (cfg, client.query_contract_state(&cfg.address, query).await) }
    });

    let mut pools = Vec::with_capacity(configs.len());
    for (cfg, result) in join_all(futures).await {
        let value = result.with_context(|| format!("initial state query for pool {}", cfg.address))?;
        let state: PoolStateResponse = serde_json::from_value(value)
            .with_context(|| format!("decoding pool state for {}", cfg.address))?;
        if state.assets.len() != 2 {
            anyhow::bail!("pool {} returned {} assets, expected 2", cfg.address, state.assets.len());
        }
        let (default_in, default_out) = default_fee_bps(cfg.variant);
        let pool = Pool::new(
            cfg.address.clone(),
            [state.assets[0].clone(), state.assets[1].clone()],
            state.total_share,
            cfg.variant,
            cfg.pair_type,
            cfg.input_fee_bps.unwrap_or(default_in),
            cfg.output_fee_bps.unwrap_or(default_out),
            cfg.factory_addr.clone(),
            cfg.router_addr.clone(),
            cfg.cl_params,
        )
        .with_context(|| format!("constructing pool {}", cfg.address))?;
        pools.push(pool);
    }
    let book = PoolBook::new(pools)?;
    info!("🏊 {} pools loaded into the tracked set", book.len());
    Ok(book)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markets::types::testing::xyk_pool;

    fn pool(addr: &str, router: Option<&str>) -> Pool {
        let mut p = xyk_pool(
            addr,
            Asset::new(AssetInfo::native("uatom"), 1_000),
            Asset::new(AssetInfo::native("uosmo"), 1_000),
            30,
        );
        p.router_addr = router.map(str::to_string);
        p
    }

    #[test]
    fn duplicate_addresses_are_rejected() {
        let res = PoolBook::new(vec![pool("pool1", None), pool("pool1", None)]);
        assert!(res.is_err());
    }

    #[test]
    fn router_index_finds_pair() {
        let book = PoolBook::new(vec![pool("pool1", Some("router1")), pool("pool2", None)]).unwrap();
        assert!(book.is_router("router1"));
        let found = book
            .router_pool_for_pair(
                "router1",
                &AssetInfo::native("uatom"),
                &AssetInfo::native("uosmo"),
            )
            .unwrap();
        assert_eq!(found.address, "pool1");
        assert!(book
            .router_pool_for_pair(
                "router1",
                &AssetInfo::native("uatom"),
                &AssetInfo::native("ujuno"),
            )
            .is_none());
    }

    #[test]
    fn apply_state_keeps_order_and_rejects_zero() {
        let mut book = PoolBook::new(vec![pool("pool1", None)]).unwrap();
        let flipped = PoolStateResponse {
            assets: vec![
                Asset::new(AssetInfo::native("uosmo"), 5_000),
                Asset::new(AssetInfo::native("uatom"), 4_000),
            ],
            total_share: 42,
        };
        assert!(book.apply_state("pool1", flipped));
        let p = book.get("pool1").unwrap();
        assert_eq!(p.assets[0].info, AssetInfo::native("uatom"));
        assert_eq!(p.assets[0].amount, 4_000);
        assert_eq!(p.total_share, 42);

        let empty = PoolStateResponse {
            assets: vec![
                Asset::new(AssetInfo::native("uatom"), 0),
                Asset::new(AssetInfo::native("uosmo"), 1),
            ],
            total_share: 0,
        };
        assert!(!book.apply_state("pool1", empty));
        assert_eq!(book.get("pool1").unwrap().assets[0].amount, 4_000);
    }
}
