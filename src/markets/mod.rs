pub mod book;
pub mod errors;
pub mod math;
pub mod pools;
pub mod types;

pub use book::{BookFill, Order, OrderSide, Orderbook};
pub use errors::MarketError;
pub use pools::PoolBook;
pub use types::{Asset, AssetInfo, ClParams, DexVariant, PairType, Pool};
