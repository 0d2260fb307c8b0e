use crate::ledger::LedgerError;
use crate::token::TokenError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Request level failures, rendered as `{ "ok": false, "msg": ... }`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Asset not found")]
    AssetNotFound,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::AssetNotFound => StatusCode::NOT_FOUND,
            ApiError::Ledger(error) => error.to_err_code(),
            ApiError::Token(error) => error.to_err_code(),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // storage details stay in the logs
        let msg = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "ok": false, "msg": msg }))).into_response()
    }
}
