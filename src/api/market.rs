//! Market API
//!
//! - GET /api/market/quotes - Live quotes for every symbol
//! - GET /api/market/quotes/:symbol - Latest quote for one symbol

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::{run_blocking, ApiResponse};
use crate::error::{AppError, Result};
use crate::types::MarketQuote;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/quotes", get(list_quotes))
        .route("/quotes/:symbol", get(get_quote))
}

async fn list_quotes(State(state): State<AppState>) -> Json<ApiResponse<Vec<MarketQuote>>> {
    Json(ApiResponse::new(state.trading_service.list_quotes()))
}

async fn get_quote(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<MarketQuote>>> {
    let service = state.trading_service.clone();
    let lookup = symbol.clone();
    let quote = run_blocking(move || service.get_quote(&lookup))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No quote for {}", symbol.to_uppercase())))?;

    Ok(Json(ApiResponse::new(quote)))
}
