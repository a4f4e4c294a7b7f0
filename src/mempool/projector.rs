//! src/mempool/projector.rs - Paper-trading state projection
//!
//! Applies decoded trade intents directly onto the in-memory pool reserves so
//! the solvers see the speculative post-mempool state without a chain call.
//! The update is the same floored constant-product formula the live path
//! uses; anything else would drift from reality across the many intents
//! applied inside one tick window. Idempotency is upstream: the decoder's
//! per-window dedup set guarantees an intent is never delivered here twice.

use log::debug;

use crate::markets::pools::PoolBook;
use crate::mempool::decoder::{DecodedTx, TradeIntent};

/// Applies every intent of one decoded transaction. Returns the number of
/// pool mutations performed.
pub fn project_tx(tx: &DecodedTx, pools: &mut PoolBook) -> usize {
    let mut applied = 0;
    for intent in &tx.intents {
        match intent {
            TradeIntent::PoolSwap { pool, offer } => {
                let Some(tracked) = pools.get_mut(pool) else {
                    continue;
                };
                match tracked.apply_swap(offer) {
                    Ok(_) => applied += 1,
                    Err(e) => {
                        debug!("Projection skipped on {}: {}", pool, e);
                    }
                }
            }
            TradeIntent::RouterSwap {
                router,
                offer,
                operations,
            } => {
                if !pools.is_router(router) {
                    continue;
                }
                // Unroll the router: each hop's output funds the next hop.
                let mut current = offer.clone();
                for op in operations {
                    if current.info != op.offer_asset_info {
                        debug!(
                            "Router intent on {} breaks its own hop chain, stopping unroll",
                            router
                        );
                        break;
                    }
                    let Some(address) = pools
                        .router_pool_for_pair(router, &op.offer_asset_info, &op.ask_asset_info)
                        .map(|p| p.address.clone())
                    else {
                        break;
                    };
                    let Some(tracked) = pools.get_mut(&address) else {
                        break;
                    };
                    match tracked.apply_swap(&current) {
                        Ok(out) => {
                            applied += 1;
                            current = out;
                        }
                        Err(e) => {
                            debug!("Projection skipped on {}: {}", address, e);
                            break;
                        }
                    }
                }
            }
        }
    }
    applied
}

/// Applies a whole decoded batch in arrival order.
pub fn project_all(txs: &[DecodedTx], pools: &mut PoolBook) -> usize {
    txs.iter().map(|tx| project_tx(tx, pools)).sum()
}
