pub mod arbitrage;
pub mod chain;
pub mod common;
pub mod execution;
pub mod markets;
pub mod mempool;
pub mod telemetry;
