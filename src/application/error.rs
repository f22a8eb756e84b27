use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{StatusTransitionError, TransactionId, TransactionStatus};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found or no completed transactions: {0}")]
    AccountNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("Transaction not found or not in failed status: {0}")]
    NotFoundOrNotFailed(TransactionId),

    #[error("Insufficient funds in account {account_number}: balance {balance}, required {required}")]
    InsufficientFunds {
        account_number: String,
        balance: Decimal,
        required: Decimal,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Cannot move transaction from {from} to {to}")]
    InvalidStatusTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl From<StatusTransitionError> for AppError {
    fn from(err: StatusTransitionError) -> Self {
        AppError::InvalidStatusTransition {
            from: err.from,
            to: err.to,
        }
    }
}
