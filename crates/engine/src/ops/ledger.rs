use uuid::Uuid;

use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseTransaction, QueryFilter, QueryOrder, SqlErr, prelude::*,
};

use crate::{
    EngineError, ResultEngine, Transaction, TransactionStatus, transactions,
    util::normalize_optional_text,
};

use super::{Engine, WalletStore};

/// The append-only transaction log.
///
/// Entries are inserted inside the same database transaction as the balance
/// write they describe and are never updated afterwards.
pub struct TransactionLedger;

impl TransactionLedger {
    /// Append `tx` to the ledger.
    ///
    /// Rejects non-positive amounts, completed entries whose snapshot does not
    /// match their amount, and a reference that is already taken. A blank
    /// reference is stored as no reference.
    ///
    /// Takes the database transaction that also carries the matching balance
    /// write.
    pub async fn insert(conn: &DatabaseTransaction, tx: &Transaction) -> ResultEngine<Uuid> {
        if tx.amount <= 0 {
            return Err(EngineError::InvalidAmount("amount must be > 0".to_string()));
        }
        if tx.status == TransactionStatus::Completed && !tx.is_consistent() {
            return Err(EngineError::InvalidAmount(format!(
                "balance snapshot {} -> {} does not match {} {}",
                tx.balance_before,
                tx.balance_after,
                tx.kind.as_str(),
                tx.amount
            )));
        }

        let reference = normalize_optional_text(tx.reference.as_deref());
        if let Some(key) = reference.as_deref()
            && Self::by_reference(conn, key).await?.is_some()
        {
            return Err(EngineError::DuplicateReference(key.to_string()));
        }

        let mut model = transactions::ActiveModel::from(tx);
        model.reference = ActiveValue::Set(reference.clone());
        match model.insert(conn).await {
            Ok(_) => Ok(tx.id),
            Err(err) => match (err.sql_err(), reference) {
                (Some(SqlErr::UniqueConstraintViolation(_)), Some(key)) => {
                    Err(EngineError::DuplicateReference(key))
                }
                _ => Err(err.into()),
            },
        }
    }

    pub async fn by_reference<C: ConnectionTrait>(
        conn: &C,
        reference: &str,
    ) -> ResultEngine<Option<Transaction>> {
        transactions::Entity::find()
            .filter(transactions::Column::Reference.eq(reference.to_string()))
            .one(conn)
            .await?
            .map(Transaction::try_from)
            .transpose()
    }

    /// All entries of a wallet, oldest first.
    pub async fn list_by_wallet<C: ConnectionTrait>(
        conn: &C,
        wallet_id: Uuid,
    ) -> ResultEngine<Vec<Transaction>> {
        transactions::Entity::find()
            .filter(transactions::Column::WalletId.eq(wallet_id.to_string()))
            .order_by_asc(transactions::Column::CreatedAt)
            .order_by_asc(transactions::Column::BalanceBefore)
            .all(conn)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }
}

impl Engine {
    /// List the ledger of a wallet, ordered by creation time.
    pub async fn list_transactions(&self, wallet_id: Uuid) -> ResultEngine<Vec<Transaction>> {
        WalletStore::by_id(&self.database, wallet_id).await?;
        TransactionLedger::list_by_wallet(&self.database, wallet_id).await
    }

    pub async fn transaction_by_reference(
        &self,
        reference: &str,
    ) -> ResultEngine<Option<Transaction>> {
        TransactionLedger::by_reference(&self.database, reference).await
    }
}
