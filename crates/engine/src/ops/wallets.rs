use uuid::Uuid;

use sea_orm::{
    ConnectionTrait, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*, sea_query::Expr,
};

use crate::{
    Currency, EngineError, ResultEngine, Wallet, users, util::normalize_required_name, wallets,
};

use super::{Engine, with_tx};

/// Wallet records and their balance.
///
/// Reads run on any connection. Writes only accept an open
/// `DatabaseTransaction`, so they commit together with whatever else the
/// caller does in it. `apply_delta` is the only code path that writes
/// `wallets.balance`.
pub struct WalletStore;

impl WalletStore {
    /// Lookup the single wallet owned by `owner_id`.
    pub async fn by_owner<C: ConnectionTrait>(conn: &C, owner_id: &str) -> ResultEngine<Wallet> {
        let model = wallets::Entity::find()
            .filter(wallets::Column::OwnerId.eq(owner_id.to_string()))
            .one(conn)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("wallet not exists".to_string()))?;
        Wallet::try_from(model)
    }

    pub async fn by_id<C: ConnectionTrait>(conn: &C, wallet_id: Uuid) -> ResultEngine<Wallet> {
        let model = wallets::Entity::find_by_id(wallet_id.to_string())
            .one(conn)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("wallet not exists".to_string()))?;
        Wallet::try_from(model)
    }

    /// Insert a new, empty and active wallet for an existing user.
    pub async fn create(
        conn: &DatabaseTransaction,
        owner_id: &str,
        name: &str,
        currency: Currency,
    ) -> ResultEngine<Wallet> {
        let name = normalize_required_name(name, "wallet")?;

        let owner = users::Entity::find_by_id(owner_id.to_string())
            .one(conn)
            .await?;
        if owner.is_none() {
            return Err(EngineError::KeyNotFound("user not exists".to_string()));
        }

        let exists = wallets::Entity::find()
            .filter(wallets::Column::OwnerId.eq(owner_id.to_string()))
            .one(conn)
            .await?
            .is_some();
        if exists {
            return Err(EngineError::ExistingKey(owner_id.to_string()));
        }

        let wallet = Wallet::new(owner_id.to_string(), name, currency);
        wallets::ActiveModel::from(&wallet).insert(conn).await?;
        Ok(wallet)
    }

    pub async fn set_active(
        conn: &DatabaseTransaction,
        wallet_id: Uuid,
        active: bool,
    ) -> ResultEngine<()> {
        let result = wallets::Entity::update_many()
            .col_expr(wallets::Column::Active, Expr::value(active))
            .filter(wallets::Column::Id.eq(wallet_id.to_string()))
            .exec(conn)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::KeyNotFound("wallet not exists".to_string()));
        }
        Ok(())
    }

    /// Add `delta` to the balance only if it still equals
    /// `expected_prior_balance` and the wallet is active.
    ///
    /// Returns the new balance. When the conditional update matches no row the
    /// wallet is re-read to tell apart a missing wallet, a deactivated one and
    /// a concurrent writer ([`EngineError::Conflict`]).
    pub async fn apply_delta(
        conn: &DatabaseTransaction,
        wallet_id: Uuid,
        delta: i64,
        expected_prior_balance: i64,
    ) -> ResultEngine<i64> {
        let new_balance = expected_prior_balance
            .checked_add(delta)
            .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))?;
        if new_balance < 0 {
            return Err(EngineError::InvalidAmount(
                "balance must not go negative".to_string(),
            ));
        }

        let result = wallets::Entity::update_many()
            .col_expr(wallets::Column::Balance, Expr::value(new_balance))
            .filter(wallets::Column::Id.eq(wallet_id.to_string()))
            .filter(wallets::Column::Balance.eq(expected_prior_balance))
            .filter(wallets::Column::Active.eq(true))
            .exec(conn)
            .await?;
        if result.rows_affected == 1 {
            return Ok(new_balance);
        }

        let current = Self::by_id(conn, wallet_id).await?;
        current.ensure_active()?;
        Err(EngineError::Conflict(format!(
            "wallet {wallet_id}: expected balance {expected_prior_balance}, found {}",
            current.balance
        )))
    }
}

impl Engine {
    /// Return the caller's wallet.
    pub async fn wallet_by_owner(&self, owner_id: &str) -> ResultEngine<Wallet> {
        WalletStore::by_owner(&self.database, owner_id).await
    }

    /// Return a wallet snapshot by id.
    pub async fn wallet(&self, wallet_id: Uuid) -> ResultEngine<Wallet> {
        WalletStore::by_id(&self.database, wallet_id).await
    }

    /// Open the wallet of a new account: zero balance, active.
    ///
    /// An owner has at most one wallet; a second call fails with
    /// [`EngineError::ExistingKey`].
    pub async fn open_wallet(
        &self,
        owner_id: &str,
        name: &str,
        currency: Currency,
    ) -> ResultEngine<Wallet> {
        let wallet = with_tx!(self, |db_tx| {
            WalletStore::create(&db_tx, owner_id, name, currency).await
        })?;
        tracing::info!(wallet_id = %wallet.id, owner_id, currency = %currency, "opened wallet");
        Ok(wallet)
    }

    /// Activate or deactivate the owner's wallet.
    ///
    /// Deactivation is the removal path: the wallet and its ledger stay, but
    /// funding is rejected with [`EngineError::Inactive`].
    pub async fn set_wallet_active(&self, owner_id: &str, active: bool) -> ResultEngine<Wallet> {
        let wallet = with_tx!(self, |db_tx| {
            let mut wallet = WalletStore::by_owner(&db_tx, owner_id).await?;
            WalletStore::set_active(&db_tx, wallet.id, active).await?;
            wallet.active = active;
            Ok::<_, EngineError>(wallet)
        })?;
        tracing::info!(wallet_id = %wallet.id, owner_id, active, "wallet activation changed");
        Ok(wallet)
    }
}
