//! Trading Service
//!
//! Portfolio & order execution engine:
//! - Portfolio lifecycle (preview, create, reset)
//! - Order execution at the live generator price
//! - Trade history and statistics
//!
//! Executions for one user are serialized; the trade row and portfolio update
//! are committed together.

use crate::services::ledger::apply_order;
use crate::services::order_validator::validate_order;
use crate::services::sqlite_store::{PersistOutcome, StoreError};
use crate::services::trade_recorder::{require_identity, TradeRecorder};
use crate::services::valuator::{revalue, total_value};
use crate::services::{PriceGenerator, SqliteStore};
use crate::types::{
    ExecutionReport, Holding, MarketQuote, OrderSide, PlaceOrderRequest, Portfolio,
    PortfolioPreview, PortfolioView, ProfitPolicy, Trade, TradeStats, DEFAULT_ALGORITHM,
    DEFAULT_STARTING_CASH,
};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Trading service errors.
#[derive(Debug, Error)]
pub enum TradingError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid quantity: {0} (must be a positive whole number)")]
    InvalidQuantity(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    #[error("Insufficient holdings: requested {requested} {symbol}, hold {held}")]
    InsufficientHoldings {
        symbol: String,
        requested: i64,
        held: i64,
    },

    #[error("Portfolio has not been created for user {0}")]
    PortfolioNotCreated(String),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StoreError> for TradingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::MissingPortfolio(user_id) => TradingError::PortfolioNotCreated(user_id),
            other => TradingError::DatabaseError(other.to_string()),
        }
    }
}

impl TradingError {
    /// Whether the order was refused by validation rather than a failure.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TradingError::InvalidQuantity(_)
                | TradingError::InvalidOrder(_)
                | TradingError::InsufficientBalance { .. }
                | TradingError::InsufficientHoldings { .. }
        )
    }
}

/// Stages of a single order execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStage {
    Idle,
    Validating,
    Rejected,
    Applying,
    Recording,
}

impl std::fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStage::Idle => write!(f, "idle"),
            ExecutionStage::Validating => write!(f, "validating"),
            ExecutionStage::Rejected => write!(f, "rejected"),
            ExecutionStage::Applying => write!(f, "applying"),
            ExecutionStage::Recording => write!(f, "recording"),
        }
    }
}

/// Settings for the trading service.
#[derive(Debug, Clone)]
pub struct TradingConfig {
    /// Cash a new portfolio starts with
    pub starting_cash: Decimal,
    /// How trade profit is recorded
    pub profit_policy: ProfitPolicy,
    /// Trades returned in `TradeStats::recent_trades`
    pub recent_trades_limit: usize,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            starting_cash: DEFAULT_STARTING_CASH,
            profit_policy: ProfitPolicy::default(),
            recent_trades_limit: crate::services::trade_recorder::DEFAULT_RECENT_TRADES,
        }
    }
}

/// Simulated trading service.
#[derive(Clone)]
pub struct TradingService {
    /// SQLite store for persistence
    sqlite: Arc<SqliteStore>,
    /// Live price source
    prices: Arc<PriceGenerator>,
    /// Trade log and statistics
    recorder: TradeRecorder,
    config: TradingConfig,
    /// Per-user execution locks (user_id -> lock)
    user_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    /// Broadcast channel for trade executions
    trade_tx: broadcast::Sender<Trade>,
}

impl TradingService {
    /// Create a new trading service.
    pub fn new(sqlite: Arc<SqliteStore>, prices: Arc<PriceGenerator>) -> Self {
        Self::with_config(sqlite, prices, TradingConfig::default())
    }

    /// Create a new trading service with custom settings.
    pub fn with_config(
        sqlite: Arc<SqliteStore>,
        prices: Arc<PriceGenerator>,
        config: TradingConfig,
    ) -> Self {
        let (trade_tx, _) = broadcast::channel(1024);
        let recorder =
            TradeRecorder::new(sqlite.clone()).with_recent_limit(config.recent_trades_limit);
        Self {
            sqlite,
            prices,
            recorder,
            config,
            user_locks: Arc::new(DashMap::new()),
            trade_tx,
        }
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    pub fn prices(&self) -> &Arc<PriceGenerator> {
        &self.prices
    }

    /// Subscribe to trade executions.
    pub fn subscribe_trades(&self) -> broadcast::Receiver<Trade> {
        self.trade_tx.subscribe()
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn live_price(&self, symbol: &str) -> Option<Decimal> {
        self.prices.price(symbol)
    }

    // ==========================================================================
    // Portfolio Management
    // ==========================================================================

    /// Read a user's portfolio, or a preview of the default one if none exists.
    ///
    /// The total is re-derived at current prices. A preview is never persisted.
    pub fn get_or_create_portfolio(&self, user_id: &str) -> Result<PortfolioView, TradingError> {
        require_identity(user_id)?;

        match self.sqlite.get_portfolio(user_id)? {
            Some(mut portfolio) => {
                revalue(&mut portfolio, |s| self.live_price(s));
                Ok(PortfolioView::Materialized(portfolio))
            }
            None => Ok(PortfolioView::Preview(PortfolioPreview::new(
                user_id.to_string(),
                self.config.starting_cash,
            ))),
        }
    }

    /// Create the user's portfolio. Returns the existing id if there is one.
    pub fn create_portfolio(&self, user_id: &str) -> Result<String, TradingError> {
        require_identity(user_id)?;
        Ok(self
            .sqlite
            .create_portfolio(user_id, self.config.starting_cash)?)
    }

    /// Write a portfolio snapshot. Skipped when the user has no portfolio.
    pub fn persist_portfolio(
        &self,
        user_id: &str,
        cash: Decimal,
        total_value: Decimal,
        holdings: &[Holding],
    ) -> Result<PersistOutcome, TradingError> {
        require_identity(user_id)?;
        let outcome = self
            .sqlite
            .persist_portfolio(user_id, cash, total_value, holdings)?;
        if outcome == PersistOutcome::Missing {
            debug!("Skipped persisting portfolio for {}: none exists", user_id);
        }
        Ok(outcome)
    }

    /// Reset the user's portfolio to starting cash. Trade history is kept.
    pub fn reset_portfolio(&self, user_id: &str) -> Result<Portfolio, TradingError> {
        require_identity(user_id)?;
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let portfolio = self
            .sqlite
            .reset_portfolio(user_id, self.config.starting_cash)?
            .ok_or_else(|| TradingError::PortfolioNotCreated(user_id.to_string()))?;

        info!("Reset portfolio {} for user {}", portfolio.id, user_id);
        Ok(portfolio)
    }

    // ==========================================================================
    // Order Execution
    // ==========================================================================

    /// Execute an order at the current price.
    ///
    /// Rejections leave the portfolio untouched. On success the trade and the
    /// updated portfolio are stored together.
    pub fn execute_order(
        &self,
        user_id: &str,
        request: PlaceOrderRequest,
    ) -> Result<ExecutionReport, TradingError> {
        require_identity(user_id)?;

        let lock = self.user_lock(user_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let symbol = request.symbol.trim().to_uppercase();
        let algorithm = request
            .algorithm
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(DEFAULT_ALGORITHM)
            .to_string();
        let (side, quantity) = (request.side, request.quantity);

        let mut stage = ExecutionStage::Idle;
        let mut advance = |next: ExecutionStage| {
            debug!("Order {} {} {} for {}: {} -> {}", side, quantity, symbol, user_id, stage, next);
            stage = next;
        };

        let mut portfolio = self
            .sqlite
            .get_portfolio(user_id)?
            .ok_or_else(|| TradingError::PortfolioNotCreated(user_id.to_string()))?;

        if symbol.is_empty() {
            return Err(TradingError::InvalidOrder("symbol is required".to_string()));
        }
        let price = self
            .live_price(&symbol)
            .ok_or_else(|| TradingError::UnknownSymbol(symbol.clone()))?;

        advance(ExecutionStage::Validating);
        if let Err(e) = validate_order(&portfolio, &symbol, side, quantity, price) {
            advance(ExecutionStage::Rejected);
            warn!("Rejected {} {} {} for {}: {}", side, quantity, symbol, user_id, e);
            return Err(e);
        }

        advance(ExecutionStage::Applying);
        let update = apply_order(&portfolio.holdings, &symbol, side, quantity, price);
        let profit = match (self.config.profit_policy, side) {
            (ProfitPolicy::RealizedOnSell, OrderSide::Sell) => update.realized_profit,
            _ => Decimal::ZERO,
        };
        let trade = Trade::executed(
            user_id.to_string(),
            symbol.clone(),
            side,
            quantity,
            price,
            algorithm,
            profit,
        );

        portfolio.cash = match side {
            OrderSide::Buy => portfolio.cash - trade.notional(),
            OrderSide::Sell => portfolio.cash + trade.notional(),
        };
        portfolio.holdings = update.holdings;
        portfolio.total_value =
            total_value(portfolio.cash, &portfolio.holdings, |s| self.live_price(s));
        portfolio.updated_at = chrono::Utc::now().timestamp_millis();

        advance(ExecutionStage::Recording);
        self.sqlite.execute_trade(&trade, &portfolio)?;
        advance(ExecutionStage::Idle);

        info!(
            "Executed {} {} {} @ {} for {} (trade {})",
            side, quantity, symbol, price, user_id, trade.id
        );
        let _ = self.trade_tx.send(trade.clone());

        Ok(ExecutionReport {
            trade_id: trade.id.clone(),
            trade,
            portfolio,
        })
    }

    // ==========================================================================
    // Trades & Market Data
    // ==========================================================================

    /// Trade history, newest first.
    pub fn list_trades(&self, user_id: &str, limit: Option<usize>) -> Result<Vec<Trade>, TradingError> {
        self.recorder.list_trades(user_id, limit)
    }

    /// Aggregate trade statistics.
    pub fn get_stats(&self, user_id: &str) -> Result<TradeStats, TradingError> {
        self.recorder.get_stats(user_id)
    }

    /// Latest quote for a symbol, live from the generator or from storage.
    pub fn get_quote(&self, symbol: &str) -> Result<Option<MarketQuote>, TradingError> {
        if let Some(quote) = self.prices.quote(symbol) {
            return Ok(Some(quote));
        }
        Ok(self.sqlite.get_quote(&symbol.to_uppercase())?)
    }

    /// All live quotes.
    pub fn list_quotes(&self) -> Vec<MarketQuote> {
        self.prices.snapshot()
    }
}
