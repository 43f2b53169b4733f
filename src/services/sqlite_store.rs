//! SQLite persistence layer for portfolios, trades and market quotes.
//!
//! Money columns are stored as normalized decimal TEXT so values round-trip
//! exactly. Holdings are stored as a JSON array on the portfolio row.
//!
//! An order execution writes its trade row and the portfolio update in a
//! single transaction, so a failure leaves neither behind.

use crate::types::{Holding, MarketQuote, OrderSide, Portfolio, Trade, TradeStatus};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("No portfolio exists for user {0}")]
    MissingPortfolio(String),

    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

/// Result of writing a portfolio snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The stored row changed
    Updated,
    /// The stored row already matched the snapshot
    Unchanged,
    /// No portfolio exists for the user; nothing was written
    Missing,
}

/// SQLite store for the trading engine.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS portfolios (
                id TEXT PRIMARY KEY,
                user_id TEXT UNIQUE NOT NULL,
                cash TEXT NOT NULL,
                total_value TEXT NOT NULL,
                holdings_json TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS trades (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT UNIQUE NOT NULL,
                user_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                price TEXT NOT NULL,
                algorithm TEXT NOT NULL,
                profit TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_trades_user_seq ON trades(user_id, seq DESC);

            CREATE TABLE IF NOT EXISTS market_quotes (
                symbol TEXT PRIMARY KEY,
                price TEXT NOT NULL,
                change TEXT NOT NULL,
                volume INTEGER NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;

        info!("SQLite schema initialized");
        Ok(())
    }

    // ========== Portfolio Methods ==========

    /// Get the portfolio owned by a user.
    pub fn get_portfolio(&self, user_id: &str) -> Result<Option<Portfolio>, StoreError> {
        let conn = self.conn()?;
        let portfolio = conn
            .query_row(
                "SELECT id, user_id, cash, total_value, holdings_json, created_at, updated_at
                 FROM portfolios WHERE user_id = ?1",
                params![user_id],
                portfolio_from_row,
            )
            .optional()?;
        Ok(portfolio)
    }

    /// Create a portfolio for a user, or return the id of the existing one.
    pub fn create_portfolio(&self, user_id: &str, cash: Decimal) -> Result<String, StoreError> {
        let conn = self.conn()?;
        let portfolio = Portfolio::new(user_id.to_string(), cash);

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO portfolios
             (id, user_id, cash, total_value, holdings_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, '[]', ?5, ?6)",
            params![
                portfolio.id,
                portfolio.user_id,
                decimal_text(portfolio.cash),
                decimal_text(portfolio.total_value),
                portfolio.created_at,
                portfolio.updated_at,
            ],
        )?;

        let id: String = conn.query_row(
            "SELECT id FROM portfolios WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;

        if inserted > 0 {
            info!("Created portfolio {} for user {}", id, user_id);
        }
        Ok(id)
    }

    /// Overwrite a user's portfolio snapshot.
    ///
    /// Skips silently when the user has no portfolio. Writing the same snapshot
    /// twice leaves the row untouched, including its `updated_at`.
    pub fn persist_portfolio(
        &self,
        user_id: &str,
        cash: Decimal,
        total_value: Decimal,
        holdings: &[Holding],
    ) -> Result<PersistOutcome, StoreError> {
        let holdings_json = serde_json::to_string(holdings)?;
        let conn = self.conn()?;
        persist_snapshot(&conn, user_id, cash, total_value, &holdings_json)
    }

    /// Put a portfolio back to `cash` with no holdings. Trades are kept.
    pub fn reset_portfolio(
        &self,
        user_id: &str,
        cash: Decimal,
    ) -> Result<Option<Portfolio>, StoreError> {
        let outcome = self.persist_portfolio(user_id, cash, cash, &[])?;
        if outcome == PersistOutcome::Missing {
            return Ok(None);
        }
        self.get_portfolio(user_id)
    }

    // ========== Trade Methods ==========

    /// Append a trade record.
    pub fn record_trade(&self, trade: &Trade) -> Result<String, StoreError> {
        let conn = self.conn()?;
        insert_trade(&conn, trade)?;
        debug!("Recorded trade {} for user {}", trade.id, trade.user_id);
        Ok(trade.id.clone())
    }

    /// Record a trade and write the resulting portfolio in one transaction.
    pub fn execute_trade(&self, trade: &Trade, portfolio: &Portfolio) -> Result<(), StoreError> {
        let holdings_json = serde_json::to_string(&portfolio.holdings)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        insert_trade(&tx, trade)?;
        let outcome = persist_snapshot(
            &tx,
            &portfolio.user_id,
            portfolio.cash,
            portfolio.total_value,
            &holdings_json,
        )?;
        if outcome == PersistOutcome::Missing {
            // Dropping the transaction rolls back the trade insert.
            return Err(StoreError::MissingPortfolio(portfolio.user_id.clone()));
        }

        tx.commit()?;
        Ok(())
    }

    /// A user's trades, newest first.
    pub fn list_trades(&self, user_id: &str, limit: Option<usize>) -> Result<Vec<Trade>, StoreError> {
        let conn = self.conn()?;
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let mut stmt = conn.prepare(
            "SELECT id, user_id, symbol, side, quantity, price, algorithm, profit, status, created_at
             FROM trades WHERE user_id = ?1
             ORDER BY seq DESC
             LIMIT ?2",
        )?;
        let trades = stmt
            .query_map(params![user_id, limit], trade_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(trades)
    }

    // ========== Market Quote Methods ==========

    /// Get the stored quote for a symbol.
    pub fn get_quote(&self, symbol: &str) -> Result<Option<MarketQuote>, StoreError> {
        let conn = self.conn()?;
        let quote = conn
            .query_row(
                "SELECT symbol, price, change, volume, high, low, updated_at
                 FROM market_quotes WHERE symbol = ?1",
                params![symbol],
                quote_from_row,
            )
            .optional()?;
        Ok(quote)
    }

    /// Insert a quote, or overwrite every field of the existing one.
    pub fn upsert_quote(&self, quote: &MarketQuote) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO market_quotes (symbol, price, change, volume, high, low, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(symbol) DO UPDATE SET
                price = excluded.price,
                change = excluded.change,
                volume = excluded.volume,
                high = excluded.high,
                low = excluded.low,
                updated_at = excluded.updated_at",
            params![
                quote.symbol,
                decimal_text(quote.price),
                decimal_text(quote.change),
                quote.volume,
                decimal_text(quote.high),
                decimal_text(quote.low),
                quote.updated_at,
            ],
        )?;
        Ok(())
    }

    /// All stored quotes, sorted by symbol.
    pub fn list_quotes(&self) -> Result<Vec<MarketQuote>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT symbol, price, change, volume, high, low, updated_at
             FROM market_quotes ORDER BY symbol",
        )?;
        let quotes = stmt
            .query_map([], quote_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(quotes)
    }
}

// ========== Row Helpers ==========

fn decimal_text(value: Decimal) -> String {
    value.normalize().to_string()
}

fn decimal_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parsed_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn portfolio_from_row(row: &Row<'_>) -> rusqlite::Result<Portfolio> {
    let holdings_json: String = row.get(4)?;
    let holdings: Vec<Holding> = serde_json::from_str(&holdings_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(Portfolio {
        id: row.get(0)?,
        user_id: row.get(1)?,
        cash: decimal_col(row, 2)?,
        total_value: decimal_col(row, 3)?,
        holdings,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn trade_from_row(row: &Row<'_>) -> rusqlite::Result<Trade> {
    Ok(Trade {
        id: row.get(0)?,
        user_id: row.get(1)?,
        symbol: row.get(2)?,
        side: parsed_col::<OrderSide>(row, 3)?,
        quantity: row.get(4)?,
        price: decimal_col(row, 5)?,
        algorithm: row.get(6)?,
        profit: decimal_col(row, 7)?,
        status: parsed_col::<TradeStatus>(row, 8)?,
        created_at: row.get(9)?,
    })
}

fn quote_from_row(row: &Row<'_>) -> rusqlite::Result<MarketQuote> {
    Ok(MarketQuote {
        symbol: row.get(0)?,
        price: decimal_col(row, 1)?,
        change: decimal_col(row, 2)?,
        volume: row.get(3)?,
        high: decimal_col(row, 4)?,
        low: decimal_col(row, 5)?,
        updated_at: row.get(6)?,
    })
}

fn insert_trade(conn: &Connection, trade: &Trade) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO trades
         (id, user_id, symbol, side, quantity, price, algorithm, profit, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            trade.id,
            trade.user_id,
            trade.symbol,
            trade.side.to_string(),
            trade.quantity,
            decimal_text(trade.price),
            trade.algorithm,
            decimal_text(trade.profit),
            trade.status.to_string(),
            trade.created_at,
        ],
    )?;
    Ok(())
}

fn persist_snapshot(
    conn: &Connection,
    user_id: &str,
    cash: Decimal,
    total_value: Decimal,
    holdings_json: &str,
) -> Result<PersistOutcome, StoreError> {
    let updated = conn.execute(
        "UPDATE portfolios
         SET cash = ?2, total_value = ?3, holdings_json = ?4, updated_at = ?5
         WHERE user_id = ?1
           AND (cash != ?2 OR total_value != ?3 OR holdings_json != ?4)",
        params![
            user_id,
            decimal_text(cash),
            decimal_text(total_value),
            holdings_json,
            chrono::Utc::now().timestamp_millis(),
        ],
    )?;
    if updated > 0 {
        return Ok(PersistOutcome::Updated);
    }

    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM portfolios WHERE user_id = ?1)",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(if exists {
        PersistOutcome::Unchanged
    } else {
        PersistOutcome::Missing
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn store() -> SqliteStore {
        SqliteStore::new_in_memory().unwrap()
    }

    fn trade(user_id: &str, symbol: &str, side: OrderSide, profit: Decimal) -> Trade {
        Trade::executed(
            user_id.to_string(),
            symbol.to_string(),
            side,
            10,
            dec!(150.25),
            "queue".to_string(),
            profit,
        )
    }

    #[test]
    fn test_missing_portfolio_is_none() {
        assert!(store().get_portfolio("nobody").unwrap().is_none());
    }

    #[test]
    fn test_create_portfolio_is_idempotent() {
        let store = store();
        let first = store.create_portfolio("user-1", dec!(100000)).unwrap();
        let second = store.create_portfolio("user-1", dec!(5)).unwrap();

        assert_eq!(first, second);
        let portfolio = store.get_portfolio("user-1").unwrap().unwrap();
        assert_eq!(portfolio.id, first);
        assert_eq!(portfolio.cash, dec!(100000));
        assert!(portfolio.holdings.is_empty());
    }

    #[test]
    fn test_persist_without_portfolio_is_skipped() {
        let store = store();
        let outcome = store
            .persist_portfolio("ghost", dec!(1), dec!(1), &[])
            .unwrap();

        assert_eq!(outcome, PersistOutcome::Missing);
        assert!(store.get_portfolio("ghost").unwrap().is_none());
    }

    #[test]
    fn test_persist_roundtrips_decimals_and_holdings() {
        let store = store();
        store.create_portfolio("user-1", dec!(100000)).unwrap();
        let holdings = vec![
            Holding::new("AAPL", 10, dec!(150.125)),
            Holding::new("MSFT", 1, dec!(0.01)),
        ];

        let outcome = store
            .persist_portfolio("user-1", dec!(98498.74), dec!(99999.99), &holdings)
            .unwrap();
        assert_eq!(outcome, PersistOutcome::Updated);

        let portfolio = store.get_portfolio("user-1").unwrap().unwrap();
        assert_eq!(portfolio.cash, dec!(98498.74));
        assert_eq!(portfolio.total_value, dec!(99999.99));
        assert_eq!(portfolio.holdings, holdings);
    }

    #[test]
    fn test_persisting_same_snapshot_twice_is_noop() {
        let store = store();
        store.create_portfolio("user-1", dec!(100000)).unwrap();
        let holdings = vec![Holding::new("AAPL", 10, dec!(150))];

        store
            .persist_portfolio("user-1", dec!(98500), dec!(100000), &holdings)
            .unwrap();
        let before = store.get_portfolio("user-1").unwrap().unwrap();

        // Same values at a different decimal scale
        let outcome = store
            .persist_portfolio("user-1", dec!(98500.00), dec!(100000.0), &holdings)
            .unwrap();
        let after = store.get_portfolio("user-1").unwrap().unwrap();

        assert_eq!(outcome, PersistOutcome::Unchanged);
        assert_eq!(before, after);
    }

    #[test]
    fn test_trades_listed_newest_first() {
        let store = store();
        let first = trade("user-1", "AAPL", OrderSide::Buy, Decimal::ZERO);
        let second = trade("user-1", "MSFT", OrderSide::Buy, Decimal::ZERO);
        let third = trade("user-1", "AAPL", OrderSide::Sell, dec!(12.5));
        for t in [&first, &second, &third] {
            store.record_trade(t).unwrap();
        }
        store
            .record_trade(&trade("user-2", "TSLA", OrderSide::Buy, Decimal::ZERO))
            .unwrap();

        let trades = store.list_trades("user-1", None).unwrap();
        let ids: Vec<_> = trades.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec![third.id.as_str(), second.id.as_str(), first.id.as_str()]);
        assert_eq!(trades[0], third);

        let limited = store.list_trades("user-1", Some(2)).unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(store.list_trades("user-1", None).unwrap().len(), 3);
        assert_eq!(store.list_trades("user-2", None).unwrap().len(), 1);
    }

    #[test]
    fn test_execute_trade_writes_both() {
        let store = store();
        store.create_portfolio("user-1", dec!(100000)).unwrap();
        let mut portfolio = store.get_portfolio("user-1").unwrap().unwrap();
        portfolio.cash = dec!(98500);
        portfolio.holdings = vec![Holding::new("AAPL", 10, dec!(150))];
        portfolio.total_value = dec!(100000);

        let t = trade("user-1", "AAPL", OrderSide::Buy, Decimal::ZERO);
        store.execute_trade(&t, &portfolio).unwrap();

        assert_eq!(store.list_trades("user-1", None).unwrap().len(), 1);
        let stored = store.get_portfolio("user-1").unwrap().unwrap();
        assert_eq!(stored.cash, dec!(98500));
        assert_eq!(stored.holdings.len(), 1);
    }

    #[test]
    fn test_execute_trade_rolls_back_without_portfolio() {
        let store = store();
        let portfolio = Portfolio::new("ghost".to_string(), dec!(100));
        let t = trade("ghost", "AAPL", OrderSide::Buy, Decimal::ZERO);

        let err = store.execute_trade(&t, &portfolio).unwrap_err();
        assert!(matches!(err, StoreError::MissingPortfolio(_)));
        assert_eq!(store.list_trades("ghost", None).unwrap().len(), 0);
    }

    #[test]
    fn test_reset_keeps_trades() {
        let store = store();
        store.create_portfolio("user-1", dec!(100000)).unwrap();
        store
            .persist_portfolio(
                "user-1",
                dec!(10),
                dec!(20),
                &[Holding::new("AAPL", 1, dec!(10))],
            )
            .unwrap();
        store
            .record_trade(&trade("user-1", "AAPL", OrderSide::Buy, Decimal::ZERO))
            .unwrap();

        let reset = store.reset_portfolio("user-1", dec!(100000)).unwrap().unwrap();
        assert_eq!(reset.cash, dec!(100000));
        assert_eq!(reset.total_value, dec!(100000));
        assert!(reset.holdings.is_empty());
        assert_eq!(store.list_trades("user-1", None).unwrap().len(), 1);

        assert!(store.reset_portfolio("ghost", dec!(1)).unwrap().is_none());
    }

    #[test]
    fn test_upsert_quote_inserts_then_overwrites() {
        let store = store();
        assert!(store.get_quote("AAPL").unwrap().is_none());

        let mut quote = MarketQuote::seeded("AAPL".to_string(), dec!(150));
        store.upsert_quote(&quote).unwrap();
        assert_eq!(store.get_quote("AAPL").unwrap().unwrap(), quote);

        quote.apply_tick(dec!(147.5), 300);
        store.upsert_quote(&quote).unwrap();
        let stored = store.get_quote("AAPL").unwrap().unwrap();
        assert_eq!(stored, quote);
        assert_eq!(stored.change, dec!(-2.5));

        store
            .upsert_quote(&MarketQuote::seeded("MSFT".to_string(), dec!(300)))
            .unwrap();
        let symbols: Vec<_> = store
            .list_quotes()
            .unwrap()
            .into_iter()
            .map(|q| q.symbol)
            .collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);
    }
}
