pub mod auth;
pub mod health;
pub mod market;
pub mod trading;

use crate::services::TradingError;
use crate::AppState;
use axum::Router;
use serde::Serialize;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/auth", auth::router())
        .nest("/api/trading", trading::router())
        .nest("/api/market", market::router())
}

/// API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Error body shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Run a store-backed call on the blocking pool so SQLite waits never park
/// an async worker.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, TradingError>
where
    F: FnOnce() -> Result<T, TradingError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TradingError::DatabaseError(format!("blocking task failed: {}", e)))?
}
