//! src/execution/scheduler.rs - The per-tick decision loop
//!
//! Single-writer by construction: the engine owns the pool set, the books,
//! the cooldown and ignore maps, and mutates them only from its own tick.
//! Per tick: refresh live state (concurrent fan-out, full join), solve both
//! solvers against the active path sets, submit the better candidate, then
//! cool the winner and its conflict set. With no candidate the loop drops
//! into the latency-critical mempool poll: the pending set's byte counter is
//! the cheap change detector, new transactions are decoded and projected
//! onto the paper state, and the solvers re-run against that speculative
//! future until the resync deadline sends the loop back to a full refresh.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::{debug, info, warn};
use rustc_hash::FxHashMap;

use crate::arbitrage::cooldown::{CooldownTracker, IgnoredAddresses};
use crate::arbitrage::graph;
use crate::arbitrage::orderbook::best_orderbook_trade;
use crate::arbitrage::solver::best_trade;
use crate::arbitrage::types::{ChosenTrade, OrderbookPath, Path, TradeSequence};
use crate::chain::client::ChainClient;
use crate::chain::notifier::{Notifier, Severity};
use crate::common::config::Config;
use crate::execution::executor::{SubmitOutcome, TradeSubmitter};
use crate::markets::book::Orderbook;
use crate::markets::pools::{load_pool_book, PoolBook};
use crate::markets::types::Asset;
use crate::mempool::decoder::MempoolDecoder;
use crate::mempool::projector;
use crate::telemetry::Metrics;

pub struct ArbEngine {
    client: Arc<dyn ChainClient>,
    config: Config,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<Metrics>,

    pools: PoolBook,
    books: FxHashMap<String, Orderbook>,
    paths: Vec<Path>,
    orderbook_paths: Vec<OrderbookPath>,
    profit_thresholds: FxHashMap<u8, u128>,

    cooldowns: CooldownTracker,
    ignored: IgnoredAddresses,
    decoder: MempoolDecoder,
    submitter: TradeSubmitter,

    tick: u64,
    last_mempool_bytes: u64,
}

impl ArbEngine {
    /// Builds the engine: initial pool load (fatal on any missing required
    /// pool), graph build, conflict pass, sequence sync.
    pub async fn init(
        client: Arc<dyn ChainClient>,
        config: Config,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<Metrics>,
    ) -> anyhow::Result<Self> {
        let pools = load_pool_book(client.as_ref(), &config.pools)
            .await
            .context("initial pool load")?;

        let mut paths = graph::get_paths(&pools, &config.root_asset, config.max_hops);
        let mut orderbook_paths =
            graph::get_orderbook_paths(&pools, &config.orderbooks, &config.root_asset);
        graph::compute_conflicts(&mut paths, &mut orderbook_paths);
        info!(
            "📈 {} AMM paths and {} orderbook paths over {} pools",
            paths.len(),
            orderbook_paths.len(),
            pools.len()
        );

        let profit_thresholds = config
            .profit_thresholds
            .iter()
            .map(|(hops, min)| (*hops, u128::from(*min)))
            .collect();

        let submitter = TradeSubmitter::init(client.clone(), &config)
            .await
            .context("sequence sync")?;

        let cooldowns = CooldownTracker::new(
            config.cooldown_self_ticks(),
            config.cooldown_conflict_ticks(),
        );
        let ignored = IgnoredAddresses::new(config.ignore_ttl_ticks());

        Ok(ArbEngine {
            client,
            config,
            notifier,
            metrics,
            pools,
            books: FxHashMap::default(),
            paths,
            orderbook_paths,
            profit_thresholds,
            cooldowns,
            ignored,
            decoder: MempoolDecoder::new(),
            submitter,
            tick: 0,
            last_mempool_bytes: 0,
        })
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        info!("🚀 Arbitrage engine started ({} mode)", if self.config.mempool_enabled { "mempool" } else { "polling" });
        loop {
            self.run_tick().await;
        }
    }

    /// One pass of the tick state machine. Public so tests can drive the
    /// loop deterministically.
    pub async fn run_tick(&mut self) {
        self.tick += 1;
        self.metrics.inc_ticks();
        self.cooldowns.purge(self.tick);
        self.ignored.purge(self.tick);
        self.decoder.begin_window();

        // 1. Refresh: all queries fan out, all results land before solving.
        let fresh = self.pools.refresh(self.client.as_ref()).await;
        self.metrics.add_pools_refreshed(fresh as u64);
        self.refresh_books().await;

        if self.tick % self.config.sign_of_life_ticks() == 0 {
            self.sign_of_life().await;
        }

        // 2. Solve against live state.
        if let Some(trade) = self.solve() {
            self.execute(trade, None).await;
            return;
        }

        // 3. Wait: either a plain sleep, or the blocking mempool poll.
        if !self.config.mempool_enabled {
            tokio::time::sleep(Duration::from_millis(self.config.tick_interval_ms())).await;
            return;
        }
        self.mempool_phase().await;
    }

    /// Blocking mempool poll until a trade fires or the resync deadline
    /// passes. Sub-block reaction latency lives or dies here.
    async fn mempool_phase(&mut self) {
        let deadline = tokio::time::Instant::now()
            + Duration::from_millis(self.config.resync_after_ms());
        while tokio::time::Instant::now() < deadline {
            let snapshot = match self.client.query_mempool().await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    debug!("Mempool poll degraded: {}", e);
                    return;
                }
            };
            if snapshot.total_bytes <= self.last_mempool_bytes {
                // Unchanged or shrunk: nothing new. Yield instead of spinning
                // so the runtime's other tasks are never starved.
                tokio::task::yield_now().await;
                continue;
            }
            self.last_mempool_bytes = snapshot.total_bytes;

            let decoded = self
                .decoder
                .decode_batch(&snapshot, &self.ignored, self.tick);
            self.metrics.add_mempool_txs_decoded(decoded.len() as u64);

            let mut backrun: Option<(String, String)> = None;
            for tx in &decoded {
                let applied = projector::project_tx(tx, &mut self.pools);
                if applied > 0 {
                    self.metrics.add_intents_projected(applied as u64);
                    backrun = Some((tx.raw.clone(), tx.sender.clone()));
                }
            }

            if let Some(trade) = self.solve() {
                self.execute(trade, backrun).await;
                return;
            }
        }
    }

    /// Runs both solvers over the non-cooling path sets and keeps the higher
    /// profit. The AMM side wins ties.
    fn solve(&self) -> Option<ChosenTrade> {
        let amm = best_trade(
            self.paths
                .iter()
                .filter(|p| !self.cooldowns.is_cooling(&p.id, self.tick)),
            &self.pools,
            &self.profit_thresholds,
        );
        let orderbook = best_orderbook_trade(
            self.orderbook_paths
                .iter()
                .filter(|p| !self.cooldowns.is_cooling(&p.id, self.tick)),
            &self.pools,
            &self.books,
            &self.config.root_asset,
        );
        let chosen = match (amm, orderbook) {
            (Some(a), Some(o)) => {
                if o.profit > a.profit {
                    ChosenTrade::Orderbook(o)
                } else {
                    ChosenTrade::Amm(a)
                }
            }
            (Some(a), None) => ChosenTrade::Amm(a),
            (None, Some(o)) => ChosenTrade::Orderbook(o),
            (None, None) => return None,
        };
        Some(chosen)
    }

    /// Submission plus post-trade bookkeeping.
    async fn execute(&mut self, trade: ChosenTrade, backrun: Option<(String, String)>) {
        self.metrics.inc_opportunities_discovered();
        let (backrun_raw, backrun_sender) = match backrun {
            Some((raw, sender)) => (Some(raw), Some(sender)),
            None => (None, None),
        };
        let outcome = self
            .submitter
            .submit(&trade, &self.pools, &self.books, backrun_raw.as_deref())
            .await;
        match outcome {
            Ok(SubmitOutcome::Executed { .. }) | Ok(SubmitOutcome::BundleAccepted) => {
                self.metrics.inc_trades_submitted_success();
                self.notifier
                    .send(&format!("Trade submitted: {}", trade.describe()), Severity::Info)
                    .await;
                // The projected state must show the trade we just took, or
                // the very next solve re-fires on reserves we already moved.
                self.apply_own_trade(&trade);
                self.cooldowns
                    .place(trade.path_id(), trade.conflicts(), self.tick);
            }
            Ok(SubmitOutcome::BackrunTargetFailed) => {
                self.metrics.inc_trades_submitted_failure();
                if let Some(sender) = backrun_sender {
                    warn!("Backrun target from {} failed in bundle, ignoring sender", sender);
                    self.ignored.insert(&sender, self.tick);
                    self.metrics.inc_senders_ignored();
                    self.notifier
                        .send(
                            &format!("Ignoring misbehaving sender {}", sender),
                            Severity::Warning,
                        )
                        .await;
                }
            }
            Ok(SubmitOutcome::RelayUnavailable) => {
                self.metrics.inc_trades_submitted_failure();
                self.notifier
                    .send("Relay reported no block builder for this round", Severity::Warning)
                    .await;
            }
            Ok(SubmitOutcome::Rejected { code, raw_log }) => {
                self.metrics.inc_trades_submitted_failure();
                self.notifier
                    .send(
                        &format!(
                            "Trade rejected (code {}): {} | {}",
                            code,
                            trade.describe(),
                            raw_log
                        ),
                        Severity::Alert,
                    )
                    .await;
            }
            Err(e) => {
                self.metrics.inc_trades_submitted_failure();
                self.notifier
                    .send(&format!("Submission failed: {}", e), Severity::Alert)
                    .await;
            }
        }
    }

    /// Replays an accepted trade onto the in-memory reserves, exactly like a
    /// projected mempool intent.
    fn apply_own_trade(&mut self, trade: &ChosenTrade) {
        match trade {
            ChosenTrade::Amm(t) => {
                let mut current = t.offer.clone();
                for address in &t.path.pool_addresses {
                    let Some(pool) = self.pools.get_mut(address) else {
                        return;
                    };
                    match pool.apply_swap(&current) {
                        Ok(out) => current = out,
                        Err(e) => {
                            debug!("Own-trade projection stopped on {}: {}", address, e);
                            return;
                        }
                    }
                }
            }
            ChosenTrade::Orderbook(t) => {
                let Some(book) = self.books.get(&t.path.market_id) else {
                    return;
                };
                let offer = match t.path.sequence {
                    TradeSequence::AmmFirst => t.offer.clone(),
                    TradeSequence::OrderbookFirst => {
                        let quantity = book.round_to_lot(t.orderbook_leg_output);
                        Asset::new(
                            book.base_asset.clone(),
                            (quantity * book.base_factor()).floor() as u128,
                        )
                    }
                };
                if let Some(pool) = self.pools.get_mut(&t.path.pool_address) {
                    if let Err(e) = pool.apply_swap(&offer) {
                        debug!("Own-trade projection stopped on {}: {}", t.path.pool_address, e);
                    }
                }
                // The book side is left alone: it is replaced wholesale on
                // the next refresh anyway.
            }
        }
    }

    async fn refresh_books(&mut self) {
        if self.config.orderbooks.is_empty() {
            return;
        }
        let market_ids: Vec<String> = self
            .config
            .orderbooks
            .iter()
            .map(|cfg| cfg.market_id.clone())
            .collect();
        match self.client.query_orderbooks(&market_ids).await {
            Ok(books) => {
                self.books = books
                    .into_iter()
                    .map(|book| (book.market_id.clone(), book))
                    .collect();
            }
            Err(e) => {
                warn!("Orderbook refresh failed: {} (keeping stale books)", e);
            }
        }
    }

    async fn sign_of_life(&self) {
        let text = format!(
            "Tick {}: {} pools tracked, {} AMM paths ({} cooling), {} books, {} ignored senders",
            self.tick,
            self.pools.len(),
            self.paths.len(),
            self.cooldowns.len(),
            self.books.len(),
            self.ignored.len()
        );
        self.notifier.send(&text, Severity::Info).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::client::{BundleResult, MempoolSnapshot, SubTxResult};
    use crate::chain::encoder::SPOT_MARKET_ORDER_TYPE_URL;
    use crate::chain::mock::MockChainClient;
    use crate::chain::notifier::testing::RecordingNotifier;
    use crate::common::config::testing::{direct_config, xyk_pool_config};
    use crate::common::config::{OrderbookConfig, RelayConfig, SubmissionMode};
    use crate::markets::book::{Order, OrderSide};
    use crate::markets::types::testing::xyk_pool;
    use crate::markets::types::{AssetInfo, Pool};
    use crate::mempool::decoder::testing::native_swap_blob;

    fn info(denom: &str) -> AssetInfo {
        AssetInfo::native(denom)
    }

    fn pool(addr: &str, a: &str, amount_a: u128, b: &str, amount_b: u128) -> Pool {
        xyk_pool(
            addr,
            Asset::new(info(a), amount_a),
            Asset::new(info(b), amount_b),
            30,
        )
    }

    async fn engine_with(
        client: Arc<MockChainClient>,
        config: Config,
    ) -> (ArbEngine, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = ArbEngine::init(
            client,
            config,
            notifier.clone(),
            crate::telemetry::Metrics::new(),
        )
        .await
        .expect("engine init");
        (engine, notifier)
    }

    #[tokio::test]
    async fn end_to_end_trade_closes_the_arbitrage() {
        let client = Arc::new(MockChainClient::new("juno1bot"));
        // Pool2 undervalues uB: selling uA there and buying it back on pool1
        // is the one profitable orientation.
        client.set_pool(&pool("pool1", "uA", 1_000_000_000, "uB", 1_000_000_000));
        client.set_pool(&pool("pool2", "uB", 1_000_000_000, "uA", 900_000_000));
        let config = direct_config(
            "uA",
            vec![xyk_pool_config("pool1"), xyk_pool_config("pool2")],
        );
        let (mut engine, notifier) = engine_with(client.clone(), config).await;
        assert_eq!(engine.paths.len(), 2);

        engine.run_tick().await;

        let broadcasts = client.broadcasts.lock().unwrap().len();
        assert_eq!(broadcasts, 1);
        {
            let recorded = client.broadcasts.lock().unwrap();
            let (msgs, _, _) = recorded.last().unwrap();
            assert_eq!(msgs[0].value["contract"], "pool2");
            assert_eq!(msgs[1].value["contract"], "pool1");
        }
        assert!(!notifier.messages.lock().unwrap().is_empty());

        // The winning path cools down together with nothing shortening it.
        assert!(engine.cooldowns.is_cooling("pool2pool1", engine.tick));

        // The submitted trade was replayed onto the paper state: the same
        // solver run on the projected reserves finds nothing left to take.
        assert!(engine.solve().is_none());
    }

    #[tokio::test]
    async fn cooled_path_reappears_exactly_on_schedule() {
        let client = Arc::new(MockChainClient::new("juno1bot"));
        client.set_pool(&pool("pool1", "uA", 1_000_000_000, "uB", 1_000_000_000));
        client.set_pool(&pool("pool2", "uB", 1_000_000_000, "uA", 900_000_000));
        let config = direct_config(
            "uA",
            vec![xyk_pool_config("pool1"), xyk_pool_config("pool2")],
        );
        let (mut engine, _notifier) = engine_with(client.clone(), config).await;

        engine.run_tick().await; // tick 1: trades, cooldown until tick 11
        assert_eq!(client.broadcasts.lock().unwrap().len(), 1);

        // Every refresh restores the scripted (still-skewed) reserves, so
        // only the cooldown is holding the path back.
        for _ in 2..=10 {
            engine.run_tick().await;
            assert_eq!(client.broadcasts.lock().unwrap().len(), 1);
        }
        engine.run_tick().await; // tick 11: active again
        assert_eq!(engine.tick, 11);
        assert_eq!(client.broadcasts.lock().unwrap().len(), 2);
    }

    fn relay(mut config: Config) -> Config {
        config.submission = SubmissionMode::Relay;
        config.relay = Some(RelayConfig {
            bid_rate: 0.4,
            min_bid: 651,
            fee_share_address: "juno1relayfee".to_string(),
            fallback_on_no_builder: false,
            no_builder_fallback_after: 3,
        });
        config
    }

    #[tokio::test]
    async fn mempool_tx_is_projected_and_backrun() {
        let client = Arc::new(MockChainClient::new("juno1bot"));
        // Balanced pools: nothing to take until the whale shows up pending.
        client.set_pool(&pool("pool1", "uA", 1_000_000_000, "uB", 1_000_000_000));
        client.set_pool(&pool("pool2", "uB", 1_000_000_000, "uA", 1_000_000_000));
        let config = relay(direct_config(
            "uA",
            vec![xyk_pool_config("pool1"), xyk_pool_config("pool2")],
        ));
        let (mut engine, _notifier) = engine_with(client.clone(), config).await;

        let blob = native_swap_blob("WHALE1", "juno1whale", "pool1", "uA", 200_000_000);
        client.push_mempool(MempoolSnapshot {
            total_bytes: 5_000,
            txs: vec![blob.clone()],
        });

        engine.run_tick().await;

        let bundles = client.bundles.lock().unwrap();
        assert_eq!(bundles.len(), 1);
        let (msgs, _, _, backrun) = bundles.last().unwrap();
        // The pending whale swap is pinned for atomic backrun, and the bid
        // payment rides last in the bundle.
        assert_eq!(backrun.as_deref(), Some(blob.as_str()));
        assert_eq!(
            msgs.last().unwrap().type_url,
            crate::execution::executor::BANK_SEND_TYPE_URL
        );
    }

    #[tokio::test]
    async fn failed_backrun_target_lands_its_sender_on_the_ignore_list() {
        let client = Arc::new(MockChainClient::new("juno1bot"));
        client.set_pool(&pool("pool1", "uA", 1_000_000_000, "uB", 1_000_000_000));
        client.set_pool(&pool("pool2", "uB", 1_000_000_000, "uA", 1_000_000_000));
        let config = relay(direct_config(
            "uA",
            vec![xyk_pool_config("pool1"), xyk_pool_config("pool2")],
        ));
        let (mut engine, _notifier) = engine_with(client.clone(), config).await;

        let blob = native_swap_blob("WHALE1", "juno1whale", "pool1", "uA", 200_000_000);
        client.push_mempool(MempoolSnapshot {
            total_bytes: 5_000,
            txs: vec![blob.clone()],
        });
        client.push_bundle_result(BundleResult {
            code: 1,
            txs: vec![
                SubTxResult {
                    code_check: 5,
                    code_deliver: 0,
                    log: "out of gas".to_string(),
                },
                SubTxResult {
                    code_check: 0,
                    code_deliver: 0,
                    log: String::new(),
                },
            ],
            raw_log: String::new(),
        });

        engine.run_tick().await;
        assert_eq!(client.bundles.lock().unwrap().len(), 1);
        assert!(engine.ignored.contains("juno1whale", engine.tick));

        // The same sender resurfacing next tick is filtered before decode
        // can feed the projector, so no second bundle fires.
        client.push_mempool(MempoolSnapshot {
            total_bytes: 6_000,
            txs: vec![blob],
        });
        engine.run_tick().await;
        assert_eq!(client.bundles.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn orderbook_candidate_flows_through_the_engine() {
        let client = Arc::new(MockChainClient::new("juno1bot"));
        // AMM prices uB at ~12 uA while the book sells it at 10-11.
        client.set_pool(&pool("pool1", "uB", 1_000_000_000, "uA", 12_000_000_000));
        *client.books.lock().unwrap() = vec![Orderbook {
            market_id: "0xmarket".to_string(),
            base_asset: info("uB"),
            quote_asset: info("uA"),
            base_decimals: 6,
            quote_decimals: 6,
            min_quantity_increment: 0.1,
            min_price_increment: 0.01,
            buys: vec![Order {
                price: 9.9,
                quantity: 50.0,
                side: OrderSide::Buy,
            }],
            sells: vec![
                Order {
                    price: 10.0,
                    quantity: 50.0,
                    side: OrderSide::Sell,
                },
                Order {
                    price: 11.0,
                    quantity: 100.0,
                    side: OrderSide::Sell,
                },
            ],
            maker_fee_rate: 0.0005,
            taker_fee_rate: 0.001,
        }];

        let mut config = direct_config("uA", vec![xyk_pool_config("pool1")]);
        config.orderbooks = vec![OrderbookConfig {
            market_id: "0xmarket".to_string(),
            base_asset: info("uB"),
            quote_asset: info("uA"),
            base_decimals: 6,
            quote_decimals: 6,
            min_quantity_increment: 0.1,
            min_price_increment: 0.01,
            maker_fee_rate: 0.0005,
            taker_fee_rate: 0.001,
            min_profit: 0,
            expected_fee: 0,
        }];
        let (mut engine, _notifier) = engine_with(client.clone(), config).await;
        // One pool cannot form a cycle; only the orderbook pairing exists.
        assert!(engine.paths.is_empty());
        assert_eq!(engine.orderbook_paths.len(), 2);

        engine.run_tick().await;

        let broadcasts = client.broadcasts.lock().unwrap();
        assert_eq!(broadcasts.len(), 1);
        let (msgs, _, _) = broadcasts.last().unwrap();
        // Orderbook-first: lift the asks, then dump the base into the AMM.
        assert_eq!(msgs[0].type_url, SPOT_MARKET_ORDER_TYPE_URL);
        assert_eq!(msgs[1].value["contract"], "pool1");
    }
}
