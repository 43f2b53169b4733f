//! Holdings ledger.
//!
//! Applies accepted orders to a holdings list using weighted-average cost.
//! Holdings are unique by symbol and never carry a zero quantity.

use crate::types::{Holding, OrderSide};
use rust_decimal::Decimal;

/// Holdings after a fill, plus the profit the fill realized.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerUpdate {
    pub holdings: Vec<Holding>,
    /// `(price - avg_price) * quantity` for sells, zero for buys
    pub realized_profit: Decimal,
}

/// Apply an already validated order to `holdings`.
///
/// Callers validate first: a sell for more than is held is clamped at the held
/// quantity rather than producing a negative position.
pub fn apply_order(
    holdings: &[Holding],
    symbol: &str,
    side: OrderSide,
    quantity: i64,
    price: Decimal,
) -> LedgerUpdate {
    let mut holdings = holdings.to_vec();
    let index = holdings.iter().position(|h| h.symbol == symbol);

    let realized_profit = match (side, index) {
        (OrderSide::Buy, None) => {
            holdings.push(Holding::new(symbol, quantity, price));
            Decimal::ZERO
        }
        (OrderSide::Buy, Some(i)) => {
            let holding = &mut holdings[i];
            let old_qty = Decimal::from(holding.quantity);
            let qty = Decimal::from(quantity);
            holding.avg_price =
                ((holding.avg_price * old_qty + price * qty) / (old_qty + qty)).normalize();
            holding.quantity += quantity;
            Decimal::ZERO
        }
        (OrderSide::Sell, None) => Decimal::ZERO,
        (OrderSide::Sell, Some(i)) => {
            let holding = &mut holdings[i];
            let sold = quantity.min(holding.quantity);
            let profit = (price - holding.avg_price) * Decimal::from(sold);
            holding.quantity -= sold;
            if holding.quantity == 0 {
                holdings.remove(i);
            }
            profit
        }
    };

    LedgerUpdate {
        holdings,
        realized_profit,
    }
}
