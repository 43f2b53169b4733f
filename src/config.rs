use crate::services::trade_recorder::DEFAULT_RECENT_TRADES;
use crate::types::{ProfitPolicy, DEFAULT_STARTING_CASH, DEFAULT_SYMBOLS};
use rust_decimal::Decimal;
use std::env;
use std::time::Duration;

/// Simulated market configuration.
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// Symbols the price generator quotes.
    pub symbols: Vec<String>,
    /// Interval between price ticks.
    pub tick_ms: u64,
    /// Deterministic seed for the random walk (random if unset).
    pub seed: Option<u64>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            tick_ms: 2000,
            seed: None,
        }
    }
}

impl MarketConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// SQLite database file.
    pub database_path: String,
    /// Cash a new portfolio starts with.
    pub starting_cash: Decimal,
    /// How trade profit is recorded.
    pub profit_policy: ProfitPolicy,
    /// Trades included in stats responses.
    pub recent_trades_limit: usize,
    pub market: MarketConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup. Unparseable values fall back
    /// to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(3001);

        // Format: "AAPL,MSFT,TSLA"
        let symbols: Vec<String> = lookup("MARKET_SYMBOLS")
            .map(|s| {
                s.split(',')
                    .map(|sym| sym.trim().to_uppercase())
                    .filter(|sym| !sym.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let defaults = MarketConfig::default();

        Self {
            host,
            port,
            database_path: lookup("DATABASE_PATH").unwrap_or_else(|| "simtrade.db".to_string()),
            starting_cash: lookup("STARTING_CASH")
                .and_then(|c| c.trim().parse::<Decimal>().ok())
                .filter(|c| *c > Decimal::ZERO)
                .unwrap_or(DEFAULT_STARTING_CASH),
            profit_policy: lookup("PROFIT_POLICY")
                .and_then(|p| p.parse().ok())
                .unwrap_or_default(),
            recent_trades_limit: lookup("RECENT_TRADES_LIMIT")
                .and_then(|l| l.parse().ok())
                .unwrap_or(DEFAULT_RECENT_TRADES),
            market: MarketConfig {
                symbols: if symbols.is_empty() { defaults.symbols } else { symbols },
                tick_ms: lookup("PRICE_TICK_MS")
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(defaults.tick_ms),
                seed: lookup("PRICE_SEED").and_then(|s| s.parse().ok()),
            },
        }
    }

    /// Socket address string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
