//! Ledger audit.
//!
//! Replays the completed entries of a wallet and checks that every snapshot
//! matches its amount, that each entry starts where the previous one ended,
//! and that the stored balance equals the end of the chain. Wallets open at
//! balance 0, so the chain starts there.

use uuid::Uuid;

use sea_orm::TransactionTrait;

use crate::{EngineError, ResultEngine, Transaction, TransactionStatus, Wallet};

use super::{Engine, TransactionLedger, WalletStore, with_tx};

/// Summary of a wallet whose ledger is consistent with its balance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerAudit {
    pub wallet_id: Uuid,
    pub entries: usize,
    pub completed: usize,
    pub balance: i64,
}

impl LedgerAudit {
    /// Check `entries` (oldest first) against `wallet`.
    pub fn check(wallet: &Wallet, entries: &[Transaction]) -> ResultEngine<Self> {
        let mut running = 0i64;
        let mut completed = 0usize;

        for tx in entries
            .iter()
            .filter(|tx| tx.status == TransactionStatus::Completed)
        {
            if tx.wallet_id != wallet.id {
                return Err(EngineError::Reconciliation(format!(
                    "transaction {} belongs to wallet {}",
                    tx.id, tx.wallet_id
                )));
            }
            if !tx.is_consistent() {
                return Err(EngineError::Reconciliation(format!(
                    "transaction {}: {} {} {} does not reach {}",
                    tx.id,
                    tx.balance_before,
                    tx.kind.as_str(),
                    tx.amount,
                    tx.balance_after
                )));
            }
            if tx.balance_before != running {
                return Err(EngineError::Reconciliation(format!(
                    "transaction {} starts at {}, previous entry ended at {running}",
                    tx.id, tx.balance_before
                )));
            }
            running = tx.balance_after;
            completed += 1;
        }

        if wallet.balance != running {
            return Err(EngineError::Reconciliation(format!(
                "wallet {} holds {} but its ledger ends at {running}",
                wallet.id, wallet.balance
            )));
        }

        Ok(Self {
            wallet_id: wallet.id,
            entries: entries.len(),
            completed,
            balance: running,
        })
    }
}

impl Engine {
    /// Verify that a wallet's balance agrees with its ledger.
    ///
    /// Wallet and ledger are read in one database transaction so the check
    /// sees a single committed state.
    pub async fn audit_wallet(&self, wallet_id: Uuid) -> ResultEngine<LedgerAudit> {
        let (wallet, entries) = with_tx!(self, |db_tx| {
            let wallet = WalletStore::by_id(&db_tx, wallet_id).await?;
            let entries = TransactionLedger::list_by_wallet(&db_tx, wallet_id).await?;
            Ok::<_, EngineError>((wallet, entries))
        })?;

        match LedgerAudit::check(&wallet, &entries) {
            Ok(audit) => {
                tracing::debug!(%wallet_id, completed = audit.completed, "ledger audit passed");
                Ok(audit)
            }
            Err(err) => {
                tracing::error!(%wallet_id, "ledger audit failed: {err}");
                Err(err)
            }
        }
    }
}
