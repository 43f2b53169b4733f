//! SimTrade - simulated stock trading server

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod types;

use axum::Router;
use config::Config;
use services::{AuthService, PriceGenerator, SqliteStore, TradingConfig, TradingService};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

// Re-export commonly used types
pub use types::*;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sqlite: Arc<SqliteStore>,
    pub prices: Arc<PriceGenerator>,
    pub trading_service: Arc<TradingService>,
    pub auth_service: Arc<AuthService>,
}

impl AppState {
    /// Wire the services for `config` on top of an opened store.
    pub fn new(config: Config, sqlite: Arc<SqliteStore>) -> Self {
        let prices = Arc::new(match config.market.seed {
            Some(seed) => PriceGenerator::with_seed(config.market.symbols.as_slice(), seed),
            None => PriceGenerator::new(config.market.symbols.as_slice()),
        });

        let trading_service = Arc::new(TradingService::with_config(
            sqlite.clone(),
            prices.clone(),
            TradingConfig {
                starting_cash: config.starting_cash,
                profit_policy: config.profit_policy,
                recent_trades_limit: config.recent_trades_limit,
            },
        ));

        Self {
            config: Arc::new(config),
            sqlite,
            prices,
            trading_service,
            auth_service: Arc::new(AuthService::new()),
        }
    }
}

/// Build the HTTP application with CORS and request tracing.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
