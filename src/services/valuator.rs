//! Portfolio valuation.

use crate::types::{Holding, Portfolio};
use rust_decimal::Decimal;

/// Total value of `cash` plus `holdings` priced through `price_lookup`.
///
/// Holdings without a live price are valued at their average cost.
pub fn total_value<F>(cash: Decimal, holdings: &[Holding], price_lookup: F) -> Decimal
where
    F: Fn(&str) -> Option<Decimal>,
{
    holdings.iter().fold(cash, |total, holding| {
        let price = price_lookup(&holding.symbol).unwrap_or(holding.avg_price);
        total + holding.market_value(price)
    })
}

/// Re-derive a stored portfolio's total at current prices.
pub fn revalue<F>(portfolio: &mut Portfolio, price_lookup: F)
where
    F: Fn(&str) -> Option<Decimal>,
{
    portfolio.total_value = total_value(portfolio.cash, &portfolio.holdings, price_lookup);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    #[test]
    fn test_cash_only() {
        assert_eq!(total_value(dec!(98500), &[], |_| None), dec!(98500));
    }

    #[test]
    fn test_uses_live_prices() {
        let prices: HashMap<&str, Decimal> = [("AAPL", dec!(155.25)), ("MSFT", dec!(310))].into();
        let holdings = vec![
            Holding::new("AAPL", 10, dec!(150)),
            Holding::new("MSFT", 2, dec!(300)),
        ];

        let value = total_value(dec!(1000), &holdings, |s| prices.get(s).copied());
        assert_eq!(value, dec!(1000) + dec!(1552.50) + dec!(620));
    }

    #[test]
    fn test_falls_back_to_average_price() {
        let holdings = vec![
            Holding::new("AAPL", 10, dec!(150)),
            Holding::new("DELISTED", 3, dec!(42)),
        ];

        let value = total_value(dec!(0), &holdings, |s| {
            (s == "AAPL").then_some(dec!(160))
        });
        assert_eq!(value, dec!(1600) + dec!(126));
    }

    #[test]
    fn test_revalue_replaces_stale_total() {
        let mut portfolio = Portfolio::new("user-1".to_string(), dec!(500));
        portfolio.holdings = vec![Holding::new("TSLA", 2, dec!(200))];
        portfolio.total_value = dec!(1);

        revalue(&mut portfolio, |_| Some(dec!(250)));
        assert_eq!(portfolio.total_value, dec!(1000));
    }
}
