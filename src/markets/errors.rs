// src/markets/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Pool {pool} has an empty reserve")]
    EmptyReserve { pool: String },

    #[error("Pool {pool} lists the same asset twice")]
    DuplicateAssets { pool: String },

    #[error("Asset {asset} is not part of pool {pool}")]
    AssetNotInPool { pool: String, asset: String },

    #[error("Pool {pool} cannot cover the requested output: {requested} > {available}")]
    InsufficientLiquidity {
        pool: String,
        requested: u128,
        available: u128,
    },

    #[error("Arithmetic overflow in swap math")]
    Overflow,

    #[error("Malformed pool state for {pool}: {details}")]
    MalformedState { pool: String, details: String },
}
