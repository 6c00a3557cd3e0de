//! Ledger Error Types

use crate::money::MoneyError;
use thiserror::Error;

/// Errors surfaced by the ledger executor and compensator.
///
/// Error codes are stable strings for API responses.
#[derive(Error, Debug, Clone)]
pub enum WalletError {
    // === Validation Errors ===
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds")]
    InsufficientFunds,

    // === Idempotency / Concurrency Errors ===
    #[error("Conflict: {0}")]
    Conflict(String),

    // === System Errors ===
    #[error("Store error: {0}")]
    Store(String),
}

impl WalletError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::InvalidRequest(_) => "INVALID_REQUEST",
            WalletError::InvalidAmount(_) => "INVALID_AMOUNT",
            WalletError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            WalletError::Conflict(_) => "CONFLICT",
            WalletError::Store(_) => "STORE_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            WalletError::InvalidRequest(_) | WalletError::InvalidAmount(_) => 400,
            WalletError::Conflict(_) => 409,
            WalletError::InsufficientFunds => 422,
            WalletError::Store(_) => 500,
        }
    }
}

impl From<sqlx::Error> for WalletError {
    fn from(e: sqlx::Error) -> Self {
        WalletError::Store(e.to_string())
    }
}

impl From<MoneyError> for WalletError {
    fn from(e: MoneyError) -> Self {
        WalletError::InvalidAmount(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            WalletError::InsufficientFunds.code(),
            "INSUFFICIENT_FUNDS"
        );
        assert_eq!(WalletError::Conflict("dup".into()).code(), "CONFLICT");
        assert_eq!(
            WalletError::InvalidRequest("self transfer".into()).code(),
            "INVALID_REQUEST"
        );
    }

    #[test]
    fn test_http_status() {
        assert_eq!(WalletError::InvalidAmount("zero".into()).http_status(), 400);
        assert_eq!(WalletError::Conflict("dup".into()).http_status(), 409);
        assert_eq!(WalletError::InsufficientFunds.http_status(), 422);
        assert_eq!(WalletError::Store("down".into()).http_status(), 500);
    }

    #[test]
    fn test_money_error_maps_to_invalid_amount() {
        let err: WalletError = MoneyError::NotPositive.into();
        assert_eq!(err.code(), "INVALID_AMOUNT");
    }
}
