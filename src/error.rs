use crate::services::TradingError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Keeps the trading status and code instead of flattening to 500.
    #[error(transparent)]
    Trading(#[from] TradingError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Trading(e) => e.into_response(),
            AppError::NotFound(_) => {
                let body = Json(json!({
                    "error": self.to_string(),
                    "code": "NOT_FOUND",
                }));
                (StatusCode::NOT_FOUND, body).into_response()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
