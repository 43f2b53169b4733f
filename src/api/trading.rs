//! Trading API
//!
//! Endpoints for simulated trading. All routes require a session.
//!
//! Portfolio:
//! - GET /api/trading/portfolio - Current portfolio, or a preview if none exists
//! - POST /api/trading/portfolio - Create the portfolio
//! - POST /api/trading/portfolio/reset - Reset to starting cash
//!
//! Orders:
//! - POST /api/trading/orders - Execute an order at the current price
//!
//! Trades:
//! - GET /api/trading/trades - Trade history, newest first
//! - GET /api/trading/stats - Trade statistics

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::auth::Authenticated;
use crate::api::{run_blocking, ApiResponse, ErrorResponse};
use crate::services::TradingError;
use crate::types::{
    ExecutionReport, OrderSide, PlaceOrderRequest, Portfolio, PortfolioView, Trade, TradeStats,
};
use crate::AppState;

/// Create trading router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/portfolio", get(get_portfolio).post(create_portfolio))
        .route("/portfolio/reset", post(reset_portfolio))
        .route("/orders", post(place_order))
        .route("/trades", get(list_trades))
        .route("/stats", get(get_stats))
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePortfolioResponse {
    pub portfolio_id: String,
    pub portfolio: PortfolioView,
}

impl TradingError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            TradingError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            TradingError::InvalidQuantity(_) => (StatusCode::BAD_REQUEST, "INVALID_QUANTITY"),
            TradingError::InvalidOrder(_) => (StatusCode::BAD_REQUEST, "INVALID_ORDER"),
            TradingError::InsufficientBalance { .. } => {
                (StatusCode::BAD_REQUEST, "INSUFFICIENT_BALANCE")
            }
            TradingError::InsufficientHoldings { .. } => {
                (StatusCode::BAD_REQUEST, "INSUFFICIENT_HOLDINGS")
            }
            TradingError::PortfolioNotCreated(_) => {
                (StatusCode::NOT_FOUND, "PORTFOLIO_NOT_CREATED")
            }
            TradingError::UnknownSymbol(_) => (StatusCode::NOT_FOUND, "UNKNOWN_SYMBOL"),
            TradingError::DatabaseError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR")
            }
        }
    }
}

/// Convert TradingError to HTTP response.
impl IntoResponse for TradingError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!("Trading request failed: {}", self);
        } else if self.is_rejection() {
            tracing::debug!("Order rejected: {}", self);
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListTradesQuery {
    pub limit: Option<usize>,
}

/// Order body as sent by clients. `quantity` stays raw so that strings and
/// fractions come back as `INVALID_QUANTITY` instead of a deserializer error.
#[derive(Debug, Deserialize)]
pub struct PlaceOrderBody {
    #[serde(default)]
    pub symbol: String,
    pub side: OrderSide,
    #[serde(default)]
    pub quantity: Value,
    #[serde(default)]
    pub algorithm: Option<String>,
}

impl PlaceOrderBody {
    pub fn into_request(self) -> Result<PlaceOrderRequest, TradingError> {
        Ok(PlaceOrderRequest {
            quantity: parse_quantity(&self.quantity)?,
            symbol: self.symbol,
            side: self.side,
            algorithm: self.algorithm,
        })
    }
}

fn parse_quantity(value: &Value) -> Result<i64, TradingError> {
    value
        .as_i64()
        .ok_or_else(|| TradingError::InvalidQuantity(value.to_string()))
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/trading/portfolio
async fn get_portfolio(
    auth: Authenticated,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PortfolioView>>, TradingError> {
    let service = state.trading_service.clone();
    let view = run_blocking(move || service.get_or_create_portfolio(&auth.user.user_id)).await?;
    Ok(Json(ApiResponse::new(view)))
}

/// POST /api/trading/portfolio
async fn create_portfolio(
    auth: Authenticated,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ApiResponse<CreatePortfolioResponse>>), TradingError> {
    let service = state.trading_service.clone();
    let user_id = auth.user.user_id;
    let (portfolio_id, portfolio) = run_blocking(move || {
        let portfolio_id = service.create_portfolio(&user_id)?;
        Ok((portfolio_id, service.get_or_create_portfolio(&user_id)?))
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(CreatePortfolioResponse {
            portfolio_id,
            portfolio,
        })),
    ))
}

/// POST /api/trading/portfolio/reset
async fn reset_portfolio(
    auth: Authenticated,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Portfolio>>, TradingError> {
    let service = state.trading_service.clone();
    let portfolio = run_blocking(move || service.reset_portfolio(&auth.user.user_id)).await?;
    Ok(Json(ApiResponse::new(portfolio)))
}

/// POST /api/trading/orders
async fn place_order(
    auth: Authenticated,
    State(state): State<AppState>,
    body: Result<Json<PlaceOrderBody>, JsonRejection>,
) -> Result<Json<ApiResponse<ExecutionReport>>, TradingError> {
    let Json(body) = body.map_err(|e| TradingError::InvalidOrder(e.body_text()))?;
    let request = body.into_request()?;
    let service = state.trading_service.clone();
    let report =
        run_blocking(move || service.execute_order(&auth.user.user_id, request)).await?;
    Ok(Json(ApiResponse::new(report)))
}

/// GET /api/trading/trades
async fn list_trades(
    auth: Authenticated,
    State(state): State<AppState>,
    Query(query): Query<ListTradesQuery>,
) -> Result<Json<ApiResponse<Vec<Trade>>>, TradingError> {
    let service = state.trading_service.clone();
    let trades =
        run_blocking(move || service.list_trades(&auth.user.user_id, query.limit)).await?;
    Ok(Json(ApiResponse::new(trades)))
}

/// GET /api/trading/stats
async fn get_stats(
    auth: Authenticated,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<TradeStats>>, TradingError> {
    let service = state.trading_service.clone();
    let stats = run_blocking(move || service.get_stats(&auth.user.user_id)).await?;
    Ok(Json(ApiResponse::new(stats)))
}
