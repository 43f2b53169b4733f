//! Order validation against a portfolio snapshot.
//!
//! Orders fill completely or not at all. A rejected order leaves the
//! portfolio untouched and reports the specific reason.

use crate::services::TradingError;
use crate::types::{OrderSide, Portfolio};
use rust_decimal::Decimal;

/// Check whether `portfolio` can take `side quantity symbol @ price`.
pub fn validate_order(
    portfolio: &Portfolio,
    symbol: &str,
    side: OrderSide,
    quantity: i64,
    price: Decimal,
) -> Result<(), TradingError> {
    if quantity <= 0 {
        return Err(TradingError::InvalidQuantity(quantity.to_string()));
    }

    if price <= Decimal::ZERO {
        return Err(TradingError::InvalidOrder(format!(
            "execution price for {} must be positive, got {}",
            symbol, price
        )));
    }

    match side {
        OrderSide::Buy => {
            let needed = price * Decimal::from(quantity);
            if portfolio.cash < needed {
                return Err(TradingError::InsufficientBalance {
                    needed,
                    available: portfolio.cash,
                });
            }
        }
        OrderSide::Sell => {
            let held = portfolio.quantity_of(symbol);
            if held < quantity {
                return Err(TradingError::InsufficientHoldings {
                    symbol: symbol.to_string(),
                    requested: quantity,
                    held,
                });
            }
        }
    }

    Ok(())
}
