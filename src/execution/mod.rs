pub mod executor;
pub mod scheduler;

pub use executor::{SubmitOutcome, TradeSubmitter};
pub use scheduler::ArbEngine;
