//! The module contains the errors the engine can return.
//!
//! The funding flow surfaces:
//!
//! - [`KeyNotFound`] when the owner has no wallet.
//! - [`Inactive`] when the wallet was deactivated.
//! - [`InvalidAmount`] for non-positive or overflowing amounts.
//! - [`DuplicateReference`] when an idempotency key is reused for a different
//!   operation.
//! - [`Contention`] when the optimistic balance check kept failing.
//!
//! [`Conflict`] is the store-level optimistic failure that the engine retries
//! internally. [`Reconciliation`] is only produced by the ledger audit.
//!
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`Inactive`]: EngineError::Inactive
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`DuplicateReference`]: EngineError::DuplicateReference
//!  [`Contention`]: EngineError::Contention
//!  [`Conflict`]: EngineError::Conflict
//!  [`Reconciliation`]: EngineError::Reconciliation
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Wallet inactive: {0}")]
    Inactive(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Currency mismatch: {0}")]
    CurrencyMismatch(String),
    #[error("Duplicate reference: {0}")]
    DuplicateReference(String),
    #[error("Balance changed concurrently: {0}")]
    Conflict(String),
    #[error("Too much contention: {0}")]
    Contention(String),
    #[error("Ledger out of balance: {0}")]
    Reconciliation(String),
    #[error("Store cannot provide atomic writes: {0}")]
    AtomicityUnavailable(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// `true` for errors the caller may retry as-is.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Contention(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Inactive(a), Self::Inactive(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::CurrencyMismatch(a), Self::CurrencyMismatch(b)) => a == b,
            (Self::DuplicateReference(a), Self::DuplicateReference(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Contention(a), Self::Contention(b)) => a == b,
            (Self::Reconciliation(a), Self::Reconciliation(b)) => a == b,
            (Self::AtomicityUnavailable(a), Self::AtomicityUnavailable(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
