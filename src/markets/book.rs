//! src/markets/book.rs - Central-limit-orderbook snapshot model
//!
//! Books are replaced wholesale on every refresh; nothing in here diffs a
//! book in place. Prices and quantities are kept in human units (per the
//! venue's decimals); chain amounts are converted at the solver boundary.

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::markets::types::AssetInfo;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// A resting order at one price level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub price: f64,
    pub quantity: f64,
    pub side: OrderSide,
}

/// Snapshot of one spot market. `buys` are sorted descending by price,
/// `sells` ascending; refresh code is responsible for that ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Orderbook {
    pub market_id: String,
    pub base_asset: AssetInfo,
    pub quote_asset: AssetInfo,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub min_quantity_increment: f64,
    pub min_price_increment: f64,
    pub buys: Vec<Order>,
    pub sells: Vec<Order>,
    pub maker_fee_rate: f64,
    pub taker_fee_rate: f64,
}

/// Result of walking one side of the book for a requested quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookFill {
    /// Base quantity actually matched (may be short if the book ran dry).
    pub filled_quantity: f64,
    /// Quote value of the matched quantity before fees.
    pub quote_value: f64,
    /// Price of the last (worst) level touched.
    pub worst_price: f64,
    /// Volume-weighted average execution price.
    pub average_price: f64,
}

impl Orderbook {
    /// Rounds a base quantity down to the venue's lot size. Quantities that
    /// skip this step produce orders the venue rejects.
    pub fn round_to_lot(&self, quantity: f64) -> f64 {
        if self.min_quantity_increment <= 0.0 {
            return quantity;
        }
        (quantity / self.min_quantity_increment).floor() * self.min_quantity_increment
    }

    /// Walks the resting buys (best price first) selling `quantity` of base.
    pub fn fill_sell(&self, quantity: f64) -> Option<BookFill> {
        walk(&self.buys, quantity)
    }

    /// Walks the resting sells (best price first) buying `quantity` of base.
    pub fn fill_buy(&self, quantity: f64) -> Option<BookFill> {
        walk(&self.sells, quantity)
    }

    pub fn base_factor(&self) -> f64 {
        10f64.powi(i32::from(self.base_decimals))
    }

    pub fn quote_factor(&self) -> f64 {
        10f64.powi(i32::from(self.quote_decimals))
    }

    /// Total base quantity resting on the sell side; the most that can be
    /// bought in one sweep.
    pub fn sell_side_depth(&self) -> f64 {
        self.sells.iter().map(|o| o.quantity).sum()
    }
}

fn walk(levels: &[Order], quantity: f64) -> Option<BookFill> {
    if quantity <= 0.0 || levels.is_empty() {
        return None;
    }
    let mut remaining = quantity;
    let mut quote_value = 0.0;
    let mut worst_price = levels[0].price;
    for level in levels {
        let take = level.quantity.min(remaining);
        quote_value += take * level.price;
        worst_price = level.price;
        remaining -= take;
        if remaining <= 0.0 {
            break;
        }
    }
    let filled = quantity - remaining.max(0.0);
    if filled <= 0.0 {
        return None;
    }
    Some(BookFill {
        filled_quantity: filled,
        quote_value,
        worst_price,
        average_price: quote_value / filled,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Small two-level book fixture: buys at 10.0/9.5, sells at 10.5/11.0.
    pub fn sample_book(market_id: &str, base: AssetInfo, quote: AssetInfo) -> Orderbook {
        Orderbook {
            market_id: market_id.to_string(),
            base_asset: base,
            quote_asset: quote,
            base_decimals: 6,
            quote_decimals: 6,
            min_quantity_increment: 0.1,
            min_price_increment: 0.01,
            buys: vec![
                Order {
                    price: 10.0,
                    quantity: 5.0,
                    side: OrderSide::Buy,
                },
                Order {
                    price: 9.5,
                    quantity: 10.0,
                    side: OrderSide::Buy,
                },
            ],
            sells: vec![
                Order {
                    price: 10.5,
                    quantity: 5.0,
                    side: OrderSide::Sell,
                },
                Order {
                    price: 11.0,
                    quantity: 10.0,
                    side: OrderSide::Sell,
                },
            ],
            maker_fee_rate: 0.0005,
            taker_fee_rate: 0.001,
        }
    }
}
