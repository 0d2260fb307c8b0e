use axum::http::StatusCode;
use thiserror::Error;

/// Errors produced while redeeming a code or touching the ledger file
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Redemption code is invalid")]
    CodeNotFound,

    #[error("Redemption code has already been used")]
    CodeAlreadyUsed,

    #[error("Ledger file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Ledger io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Convert error to HTTP status code
    pub fn to_err_code(&self) -> StatusCode {
        match self {
            LedgerError::CodeNotFound | LedgerError::CodeAlreadyUsed => StatusCode::UNAUTHORIZED,
            LedgerError::Corrupt(_) | LedgerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the caller presented a bad code, as opposed to a storage failure
    pub fn is_rejection(&self) -> bool {
        matches!(self, LedgerError::CodeNotFound | LedgerError::CodeAlreadyUsed)
    }
}
