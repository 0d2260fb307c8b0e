use axum::http::StatusCode;
use thiserror::Error;

/// Reasons a download token is refused
#[derive(Debug, Error, Eq, PartialEq)]
pub enum TokenError {
    #[error("Token is invalid or has expired")]
    TokenNotFound,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token has already been used")]
    TokenAlreadyUsed,

    #[error("Token does not match the requested asset")]
    AssetMismatch,

    #[error("Token lifetime is out of range")]
    TtlOutOfRange,
}

impl TokenError {
    /// Convert error to HTTP status code
    pub fn to_err_code(&self) -> StatusCode {
        match self {
            TokenError::TokenNotFound
            | TokenError::TokenExpired
            | TokenError::TokenAlreadyUsed
            | TokenError::AssetMismatch => StatusCode::UNAUTHORIZED,
            TokenError::TtlOutOfRange => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
