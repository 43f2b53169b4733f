//! Trade Recorder
//!
//! Append-only trade log per user and the aggregate statistics derived from it.

use crate::services::{SqliteStore, TradingError};
use crate::types::{OrderSide, Trade, TradeStats};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

/// Number of trades included in `TradeStats::recent_trades` by default.
pub const DEFAULT_RECENT_TRADES: usize = 10;

/// Aggregate a user's trades. `trades` must be ordered newest first.
pub fn compute_stats(trades: &[Trade], recent_limit: usize) -> TradeStats {
    let total_trades = trades.len();
    let total_profit = trades.iter().map(|t| t.profit).sum::<Decimal>();
    let winning = trades.iter().filter(|t| t.profit > Decimal::ZERO).count();
    let win_rate = winning as f64 / total_trades.max(1) as f64 * 100.0;

    TradeStats {
        total_trades,
        total_profit,
        win_rate,
        recent_trades: trades.iter().take(recent_limit).cloned().collect(),
    }
}

/// Records executed trades and answers history queries.
#[derive(Clone)]
pub struct TradeRecorder {
    sqlite: Arc<SqliteStore>,
    recent_limit: usize,
}

impl TradeRecorder {
    pub fn new(sqlite: Arc<SqliteStore>) -> Self {
        Self {
            sqlite,
            recent_limit: DEFAULT_RECENT_TRADES,
        }
    }

    pub fn with_recent_limit(mut self, recent_limit: usize) -> Self {
        self.recent_limit = recent_limit;
        self
    }

    /// Append a trade for `user_id` and return its id.
    #[allow(clippy::too_many_arguments)]
    pub fn record_trade(
        &self,
        user_id: &str,
        symbol: &str,
        side: OrderSide,
        quantity: i64,
        price: Decimal,
        algorithm: &str,
        profit: Decimal,
    ) -> Result<String, TradingError> {
        require_identity(user_id)?;

        let trade = Trade::executed(
            user_id.to_string(),
            symbol.to_string(),
            side,
            quantity,
            price,
            algorithm.to_string(),
            profit,
        );
        let id = self.sqlite.record_trade(&trade)?;
        debug!("Recorded {} {} {} @ {} for {}", side, quantity, symbol, price, user_id);
        Ok(id)
    }

    /// All trades for a user, newest first.
    pub fn list_trades(&self, user_id: &str, limit: Option<usize>) -> Result<Vec<Trade>, TradingError> {
        Ok(self.sqlite.list_trades(user_id, limit)?)
    }

    /// Aggregate statistics over every trade of a user.
    pub fn get_stats(&self, user_id: &str) -> Result<TradeStats, TradingError> {
        let trades = self.sqlite.list_trades(user_id, None)?;
        Ok(compute_stats(&trades, self.recent_limit))
    }
}

/// Refuse to act without a resolved user identity.
pub(crate) fn require_identity(user_id: &str) -> Result<(), TradingError> {
    if user_id.trim().is_empty() {
        return Err(TradingError::Unauthorized(
            "an authenticated user is required".to_string(),
        ));
    }
    Ok(())
}
