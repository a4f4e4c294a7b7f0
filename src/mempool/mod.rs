pub mod decoder;
pub mod projector;

pub use decoder::{DecodedTx, MempoolDecoder, TradeIntent};
