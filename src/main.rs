use simtrade::config::Config;
use simtrade::services::SqliteStore;
use simtrade::{app, AppState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "simtrade=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!("Starting SimTrade server on {}", config.bind_addr());

    let sqlite = Arc::new(SqliteStore::new(&config.database_path)?);
    info!("Opened database at {}", config.database_path);

    let tick_interval = config.market.tick_interval();
    let state = AppState::new(config, sqlite.clone());

    // Start the price feed
    state.prices.start(tick_interval, Some(sqlite));

    // Log executed trades
    let mut trades = state.trading_service.subscribe_trades();
    tokio::spawn(async move {
        loop {
            match trades.recv().await {
                Ok(trade) => debug!(
                    "Trade {} {} {} {} @ {} ({})",
                    trade.id, trade.user_id, trade.side, trade.quantity, trade.price, trade.symbol
                ),
                Err(RecvError::Lagged(skipped)) => warn!("Trade log lagged by {} trades", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Purge expired challenges and sessions
    let auth_service = state.auth_service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            auth_service.purge_expired();
        }
    });

    let addr = state.config.bind_addr();
    let prices = state.prices.clone();
    let router = app(state);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("SimTrade server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    prices.stop();
    info!("SimTrade server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
