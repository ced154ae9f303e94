//! Wallet funding and ledger-consistency engine.
//!
//! The engine owns two tables: `wallets` (one per owner, with a denormalized
//! balance) and `transactions` (the append-only ledger). Every balance change
//! goes through [`Engine::fund`], which writes the new balance and the ledger
//! entry inside one database transaction, guarded by an optimistic check on
//! the balance it read.

pub use commands::FundCmd;
pub use currency::Currency;
pub use error::EngineError;
pub use money::Money;
pub use ops::{Engine, EngineBuilder, LedgerAudit, TransactionLedger, WalletStore};
pub use transactions::{Transaction, TransactionKind, TransactionStatus};
pub use wallets::Wallet;

mod commands;
mod currency;
mod error;
mod money;
mod ops;
mod transactions;
mod users;
mod util;
mod wallets;

type ResultEngine<T> = Result<T, EngineError>;
