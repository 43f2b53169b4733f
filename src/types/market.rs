use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Symbols traded when no universe is configured.
pub const DEFAULT_SYMBOLS: &[&str] = &["AAPL", "GOOGL", "MSFT", "TSLA", "AMZN", "NVDA", "META"];

/// Latest known price snapshot for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketQuote {
    pub symbol: String,
    pub price: Decimal,
    /// Price delta of the most recent tick
    pub change: Decimal,
    /// Cumulative synthetic volume
    pub volume: i64,
    pub high: Decimal,
    pub low: Decimal,
    pub updated_at: i64,
}

impl MarketQuote {
    /// Quote for a freshly seeded symbol.
    pub fn seeded(symbol: String, price: Decimal) -> Self {
        Self {
            symbol,
            price,
            change: Decimal::ZERO,
            volume: 0,
            high: price,
            low: price,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Move the quote to a new price, widening the session range.
    pub fn apply_tick(&mut self, price: Decimal, volume: i64) {
        self.change = price - self.price;
        self.price = price;
        self.volume += volume;
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}
