use thiserror::Error;

use crate::domain::{ClientId, CoinTransactionId, DebtTransactionId, ExpenseId, SaleId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Client not found: {0}")]
    ClientNotFound(ClientId),

    #[error("Client not found for phone: {0}")]
    ClientPhoneNotFound(String),

    #[error("Phone already registered to client {client_id}: {phone}")]
    PhoneAlreadyRegistered { phone: String, client_id: ClientId },

    #[error("Coin transaction not found: {0}")]
    CoinTransactionNotFound(CoinTransactionId),

    #[error("Debt transaction not found: {0}")]
    DebtTransactionNotFound(DebtTransactionId),

    #[error("Sale not found: {0}")]
    SaleNotFound(SaleId),

    #[error("Expense not found: {0}")]
    ExpenseNotFound(ExpenseId),

    #[error("Sale {id} mirrors debt payment {payment_id}; reverse the payment instead")]
    MirroredSale { id: SaleId, payment_id: DebtTransactionId },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid transaction_type '{0}'. Must be \"charge\" or \"payment\"")]
    InvalidTransactionType(String),

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("Invalid date '{0}'. Use YYYY-MM-DD or RFC 3339")]
    InvalidDate(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// Rejected before any write was attempted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::MissingField(_)
                | AppError::InvalidAmount(_)
                | AppError::InvalidTransactionType(_)
                | AppError::InvalidPhone(_)
                | AppError::InvalidDate(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::ClientNotFound(_)
                | AppError::ClientPhoneNotFound(_)
                | AppError::CoinTransactionNotFound(_)
                | AppError::DebtTransactionNotFound(_)
                | AppError::SaleNotFound(_)
                | AppError::ExpenseNotFound(_)
        )
    }
}
