use sea_orm::{DatabaseConnection, TransactionTrait};

use crate::{EngineError, ResultEngine};

mod audit;
mod funding;
mod ledger;
mod wallets;

pub use audit::LedgerAudit;
pub use ledger::TransactionLedger;
pub use wallets::WalletStore;

/// Default number of optimistic attempts before `fund` gives up.
pub const DEFAULT_MAX_FUND_ATTEMPTS: u32 = 5;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
///
/// On error the `DatabaseTransaction` is dropped uncommitted, which rolls it back.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// The funding engine.
///
/// Holds the injected database handle; every public operation opens its own
/// database transaction, so an `Engine` can be shared across tasks behind an
/// `Arc`.
#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    max_fund_attempts: u32,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn max_fund_attempts(&self) -> u32 {
        self.max_fund_attempts
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    max_fund_attempts: Option<u32>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Bound the optimistic retries of a funding call (minimum 1).
    pub fn max_fund_attempts(mut self, attempts: u32) -> EngineBuilder {
        self.max_fund_attempts = Some(attempts);
        self
    }

    /// Construct `Engine`.
    ///
    /// Fails with [`EngineError::AtomicityUnavailable`] when the store cannot
    /// open a transaction: wallet and ledger writes must never be split.
    pub async fn build(self) -> ResultEngine<Engine> {
        let check = self
            .database
            .begin()
            .await
            .map_err(|err| EngineError::AtomicityUnavailable(err.to_string()))?;
        check
            .rollback()
            .await
            .map_err(|err| EngineError::AtomicityUnavailable(err.to_string()))?;

        Ok(Engine {
            database: self.database,
            max_fund_attempts: self
                .max_fund_attempts
                .unwrap_or(DEFAULT_MAX_FUND_ATTEMPTS)
                .max(1),
        })
    }
}
