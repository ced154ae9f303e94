use std::future::Future;

use sea_orm::TransactionTrait;

use crate::{
    EngineError, FundCmd, ResultEngine, Transaction, TransactionKind, TransactionStatus, Wallet,
    util::normalize_optional_text,
};

use super::{Engine, TransactionLedger, WalletStore, with_tx};

const DEFAULT_DESCRIPTION: &str = "Wallet funding";

enum FundOutcome {
    Applied { wallet: Wallet, transaction: Transaction },
    Replayed { wallet: Wallet, transaction: Transaction },
}

/// Run `attempt` (1-based attempt number) until it returns anything but a
/// retryable error, at most `max_attempts` times.
///
/// Exhausting the attempts yields [`EngineError::Contention`].
async fn retry_on_conflict<T, F, Fut>(max_attempts: u32, mut attempt: F) -> ResultEngine<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ResultEngine<T>>,
{
    let mut last_conflict = String::new();
    for n in 1..=max_attempts {
        match attempt(n).await {
            Err(err) if err.is_retryable() => {
                tracing::debug!(attempt = n, "optimistic attempt failed: {err}");
                last_conflict = err.to_string();
            }
            outcome => return outcome,
        }
    }
    Err(EngineError::Contention(format!(
        "gave up after {max_attempts} attempts: {last_conflict}"
    )))
}

impl Engine {
    /// Credit the wallet owned by `cmd.owner_id`.
    ///
    /// The balance write and the ledger entry are committed in one database
    /// transaction. The balance write only succeeds if the balance is still
    /// the one read at the start of the attempt; otherwise the attempt is
    /// rolled back and retried from a fresh read, up to
    /// [`Engine::max_fund_attempts`] times.
    ///
    /// With a reference, a repeated call with the same amount returns the
    /// wallet unchanged; a different amount fails with
    /// [`EngineError::DuplicateReference`].
    pub async fn fund(&self, cmd: FundCmd) -> ResultEngine<Wallet> {
        if cmd.amount_minor <= 0 {
            return Err(EngineError::InvalidAmount("amount must be > 0".to_string()));
        }
        let reference = normalize_optional_text(cmd.reference.as_deref());
        let description = normalize_optional_text(cmd.description.as_deref())
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

        let owner_id = cmd.owner_id.as_str();
        let amount_minor = cmd.amount_minor;
        let reference = reference.as_deref();
        let description = description.as_str();

        let outcome = retry_on_conflict(self.max_fund_attempts, move |attempt| async move {
            self.try_fund(owner_id, amount_minor, reference, description)
                .await
                .map(|outcome| (outcome, attempt))
        })
        .await;

        match outcome {
            Ok((
                FundOutcome::Applied {
                    wallet,
                    transaction,
                },
                attempt,
            )) => {
                tracing::info!(
                    wallet_id = %wallet.id,
                    transaction_id = %transaction.id,
                    amount = transaction.amount,
                    balance_after = transaction.balance_after,
                    attempt,
                    "wallet funded"
                );
                Ok(wallet)
            }
            Ok((
                FundOutcome::Replayed {
                    wallet,
                    transaction,
                },
                _,
            )) => {
                tracing::info!(
                    wallet_id = %wallet.id,
                    transaction_id = %transaction.id,
                    reference = transaction.reference.as_deref().unwrap_or_default(),
                    "idempotent replay, wallet unchanged"
                );
                Ok(wallet)
            }
            Err(EngineError::Contention(reason)) => {
                tracing::warn!(owner_id, "funding gave up on contended wallet: {reason}");
                Err(EngineError::Contention(reason))
            }
            Err(err) => Err(err),
        }
    }

    /// One optimistic attempt. `Conflict` means the attempt was rolled back
    /// and may be retried.
    async fn try_fund(
        &self,
        owner_id: &str,
        amount_minor: i64,
        reference: Option<&str>,
        description: &str,
    ) -> ResultEngine<FundOutcome> {
        with_tx!(self, |db_tx| {
            let mut wallet = WalletStore::by_owner(&db_tx, owner_id).await?;
            wallet.ensure_active()?;

            let existing = match reference {
                Some(key) => TransactionLedger::by_reference(&db_tx, key).await?,
                None => None,
            };

            if let Some(existing) = existing {
                if existing.status == TransactionStatus::Completed
                    && existing.replays(wallet.id, TransactionKind::Deposit, amount_minor)
                {
                    Ok(FundOutcome::Replayed {
                        wallet,
                        transaction: existing,
                    })
                } else {
                    Err(EngineError::DuplicateReference(
                        existing.reference.unwrap_or_default(),
                    ))
                }
            } else {
                let transaction = Transaction::completed(
                    wallet.id,
                    TransactionKind::Deposit,
                    amount_minor,
                    wallet.balance,
                    reference.map(ToString::to_string),
                    Some(description.to_string()),
                )?;

                let new_balance =
                    WalletStore::apply_delta(&db_tx, wallet.id, amount_minor, wallet.balance)
                        .await?;

                match TransactionLedger::insert(&db_tx, &transaction).await {
                    Ok(_) => {}
                    // Another request committed the same reference after our
                    // lookup. Retry so the next attempt sees it.
                    Err(EngineError::DuplicateReference(key)) => {
                        return Err(EngineError::Conflict(format!(
                            "reference {key} committed concurrently"
                        )));
                    }
                    Err(err) => return Err(err),
                }

                wallet.balance = new_balance;
                Ok(FundOutcome::Applied {
                    wallet,
                    transaction,
                })
            }
        })
    }
}
