//! Trading Types
//!
//! Types for the simulated trading engine: portfolios, holdings, orders and trades.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Cash a new portfolio starts with unless configured otherwise.
pub const DEFAULT_STARTING_CASH: Decimal = dec!(100000);

/// Label stored on trades when the caller does not pick one.
pub const DEFAULT_ALGORITHM: &str = "heap";

// =============================================================================
// Enums
// =============================================================================

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    #[serde(alias = "buy")]
    Buy,
    #[serde(alias = "sell")]
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for OrderSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(OrderSide::Buy),
            "SELL" => Ok(OrderSide::Sell),
            other => Err(format!("unknown order side: {}", other)),
        }
    }
}

/// Trade status. Orders fill completely or not at all, so only one state exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    #[default]
    Executed,
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeStatus::Executed => write!(f, "EXECUTED"),
        }
    }
}

impl FromStr for TradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EXECUTED" => Ok(TradeStatus::Executed),
            other => Err(format!("unknown trade status: {}", other)),
        }
    }
}

/// How the `profit` field of a trade is filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfitPolicy {
    /// Sells store `(price - avg_price) * quantity`, buys store zero.
    #[default]
    RealizedOnSell,
    /// Every trade stores zero.
    Reserved,
}

impl FromStr for ProfitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "realized" | "realized_on_sell" => Ok(ProfitPolicy::RealizedOnSell),
            "reserved" | "zero" => Ok(ProfitPolicy::Reserved),
            other => Err(format!("unknown profit policy: {}", other)),
        }
    }
}

// =============================================================================
// Portfolio
// =============================================================================

/// A position in one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub symbol: String,
    /// Always positive while the holding exists
    pub quantity: i64,
    /// Volume-weighted average acquisition cost
    pub avg_price: Decimal,
}

impl Holding {
    pub fn new(symbol: impl Into<String>, quantity: i64, avg_price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            avg_price,
        }
    }

    /// Value of the holding at the given price.
    pub fn market_value(&self, price: Decimal) -> Decimal {
        Decimal::from(self.quantity) * price
    }
}

/// A persisted portfolio owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub id: String,
    pub user_id: String,
    pub cash: Decimal,
    /// Derived: cash plus holdings at the prices of the last valuation
    pub total_value: Decimal,
    pub holdings: Vec<Holding>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Portfolio {
    /// Create a fresh portfolio with no holdings.
    pub fn new(user_id: String, cash: Decimal) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            cash,
            total_value: cash,
            holdings: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Find the holding for a symbol.
    pub fn holding(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.symbol == symbol)
    }

    /// Quantity held for a symbol, zero if none.
    pub fn quantity_of(&self, symbol: &str) -> i64 {
        self.holding(symbol).map(|h| h.quantity).unwrap_or(0)
    }
}

/// Default values a user's portfolio would start with. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPreview {
    pub user_id: String,
    pub cash: Decimal,
    pub total_value: Decimal,
    pub holdings: Vec<Holding>,
}

impl PortfolioPreview {
    pub fn new(user_id: String, cash: Decimal) -> Self {
        Self {
            user_id,
            cash,
            total_value: cash,
            holdings: Vec::new(),
        }
    }
}

/// Result of reading a user's portfolio.
///
/// A preview is what the user would get after creating a portfolio. Orders are
/// only accepted against a materialized portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "portfolio", rename_all = "snake_case")]
pub enum PortfolioView {
    Materialized(Portfolio),
    Preview(PortfolioPreview),
}

impl PortfolioView {
    pub fn is_materialized(&self) -> bool {
        matches!(self, PortfolioView::Materialized(_))
    }

    pub fn cash(&self) -> Decimal {
        match self {
            PortfolioView::Materialized(p) => p.cash,
            PortfolioView::Preview(p) => p.cash,
        }
    }

    pub fn total_value(&self) -> Decimal {
        match self {
            PortfolioView::Materialized(p) => p.total_value,
            PortfolioView::Preview(p) => p.total_value,
        }
    }

    pub fn holdings(&self) -> &[Holding] {
        match self {
            PortfolioView::Materialized(p) => &p.holdings,
            PortfolioView::Preview(p) => &p.holdings,
        }
    }

    pub fn into_portfolio(self) -> Option<Portfolio> {
        match self {
            PortfolioView::Materialized(p) => Some(p),
            PortfolioView::Preview(_) => None,
        }
    }
}

// =============================================================================
// Orders & Trades
// =============================================================================

/// Request to buy or sell at the current price.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: i64,
    /// Display label carried onto the trade; has no effect on execution
    #[serde(default)]
    pub algorithm: Option<String>,
}

/// Immutable record of one executed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub user_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: i64,
    /// Execution price at order time
    pub price: Decimal,
    pub algorithm: String,
    pub profit: Decimal,
    pub status: TradeStatus,
    pub created_at: i64,
}

impl Trade {
    /// Build an executed trade with a fresh id.
    pub fn executed(
        user_id: String,
        symbol: String,
        side: OrderSide,
        quantity: i64,
        price: Decimal,
        algorithm: String,
        profit: Decimal,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            symbol,
            side,
            quantity,
            price,
            algorithm,
            profit,
            status: TradeStatus::Executed,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Cash moved by the trade, before sign.
    pub fn notional(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Aggregates over a user's trade history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeStats {
    pub total_trades: usize,
    pub total_profit: Decimal,
    /// Percentage of trades with positive profit, 0-100
    pub win_rate: f64,
    /// Newest first
    pub recent_trades: Vec<Trade>,
}

/// Outcome of a successfully executed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub trade_id: String,
    pub trade: Trade,
    pub portfolio: Portfolio,
}
