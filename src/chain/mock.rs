//! src/chain/mock.rs - Scripted ChainClient for unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::{json, Value};

use crate::chain::client::{
    BroadcastResult, BundleResult, ChainClient, ChainError, ChainMessage, Fee, MempoolSnapshot,
};
use crate::markets::book::Orderbook;
use crate::markets::types::Pool;

/// In-memory chain double. Pool states and mempool snapshots are scripted by
/// the test; every broadcast and bundle is recorded for assertions. A drained
/// mempool queue reports a transport failure, which the engine treats as a
/// degraded poll and backs out of the inner loop.
#[derive(Default)]
pub struct MockChainClient {
    pub pool_states: Mutex<FxHashMap<String, Value>>,
    pub mempool: Mutex<VecDeque<MempoolSnapshot>>,
    pub books: Mutex<Vec<Orderbook>>,
    pub broadcasts: Mutex<Vec<(Vec<ChainMessage>, Fee, u64)>>,
    pub bundles: Mutex<Vec<(Vec<ChainMessage>, Fee, u64, Option<String>)>>,
    pub broadcast_results: Mutex<VecDeque<BroadcastResult>>,
    pub bundle_results: Mutex<VecDeque<BundleResult>>,
    pub chain_sequence: AtomicU64,
    pub resets: AtomicU64,
    pub sender: String,
}

impl MockChainClient {
    pub fn new(sender: &str) -> Self {
        MockChainClient {
            sender: sender.to_string(),
            ..Default::default()
        }
    }

    /// Registers the smart-query response for a pool's current reserves.
    pub fn set_pool(&self, pool: &Pool) {
        self.pool_states.lock().unwrap().insert(
            pool.address.clone(),
            json!({
                "assets": pool.assets,
                "total_share": pool.total_share.to_string(),
            }),
        );
    }

    pub fn push_mempool(&self, snapshot: MempoolSnapshot) {
        self.mempool.lock().unwrap().push_back(snapshot);
    }

    pub fn push_broadcast_result(&self, result: BroadcastResult) {
        self.broadcast_results.lock().unwrap().push_back(result);
    }

    pub fn push_bundle_result(&self, result: BundleResult) {
        self.bundle_results.lock().unwrap().push_back(result);
    }

    pub fn ok_broadcast(tx_hash: &str) -> BroadcastResult {
        BroadcastResult {
            height: 1,
            code: 0,
            tx_hash: tx_hash.to_string(),
            raw_log: String::new(),
        }
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn query_contract_state(
        &self,
        address: &str,
        _query: &Value,
    ) -> Result<Value, ChainError> {
        self.pool_states
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or_else(|| ChainError::Rejected(format!("no scripted state for {}", address)))
    }

    async fn query_mempool(&self) -> Result<MempoolSnapshot, ChainError> {
        self.mempool
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ChainError::Transport("mempool script drained".to_string()))
    }

    async fn query_orderbooks(&self, _market_ids: &[String]) -> Result<Vec<Orderbook>, ChainError> {
        Ok(self.books.lock().unwrap().clone())
    }

    async fn query_sequence(&self) -> Result<u64, ChainError> {
        Ok(self.chain_sequence.load(Ordering::SeqCst))
    }

    async fn sign_and_broadcast(
        &self,
        msgs: &[ChainMessage],
        fee: &Fee,
        sequence: u64,
    ) -> Result<BroadcastResult, ChainError> {
        self.broadcasts
            .lock()
            .unwrap()
            .push((msgs.to_vec(), fee.clone(), sequence));
        Ok(self
            .broadcast_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Self::ok_broadcast("MOCKTX")))
    }

    async fn sign_and_broadcast_bundle(
        &self,
        msgs: &[ChainMessage],
        fee: &Fee,
        sequence: u64,
        backrun_tx: Option<&str>,
    ) -> Result<BundleResult, ChainError> {
        self.bundles.lock().unwrap().push((
            msgs.to_vec(),
            fee.clone(),
            sequence,
            backrun_tx.map(str::to_string),
        ));
        Ok(self
            .bundle_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(BundleResult {
                code: 0,
                txs: Vec::new(),
                raw_log: String::new(),
            }))
    }

    async fn reset(&self) -> Result<(), ChainError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn sender_address(&self) -> &str {
        &self.sender
    }
}
