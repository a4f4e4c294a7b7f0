//! src/telemetry.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct Metrics {
    pub ticks: Arc<AtomicU64>,
    pub pools_refreshed: Arc<AtomicU64>,
    pub opportunities_discovered: Arc<AtomicU64>,
    pub trades_submitted_success: Arc<AtomicU64>,
    pub trades_submitted_failure: Arc<AtomicU64>,
    pub mempool_txs_decoded: Arc<AtomicU64>,
    pub intents_projected: Arc<AtomicU64>,
    pub senders_ignored: Arc<AtomicU64>,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Metrics::default())
    }

    pub fn inc_ticks(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_pools_refreshed(&self, count: u64) {
        self.pools_refreshed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_opportunities_discovered(&self) {
        self.opportunities_discovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_trades_submitted_success(&self) {
        self.trades_submitted_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_trades_submitted_failure(&self) {
        self.trades_submitted_failure.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_mempool_txs_decoded(&self, count: u64) {
        self.mempool_txs_decoded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_intents_projected(&self, count: u64) {
        self.intents_projected.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_senders_ignored(&self) {
        self.senders_ignored.fetch_add(1, Ordering::Relaxed);
    }
}
