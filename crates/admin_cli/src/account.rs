use engine::{Currency, Wallet, WalletStore};
use sea_orm::{DatabaseConnection, EntityTrait, Set, TransactionTrait};

pub mod users {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub username: String,
        pub password: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub type AccountError = Box<dyn std::error::Error + Send + Sync>;

/// A user row and its wallet, written in one database transaction.
///
/// If the wallet cannot be opened the user is not created either.
pub async fn create_account(
    db: &DatabaseConnection,
    username: &str,
    password: String,
    wallet_name: &str,
    currency: Currency,
) -> Result<Wallet, AccountError> {
    let db_tx = db.begin().await?;

    let user = users::ActiveModel {
        username: Set(username.to_string()),
        password: Set(password),
    };
    users::Entity::insert(user).exec(&db_tx).await?;
    let wallet = WalletStore::create(&db_tx, username, wallet_name, currency).await?;

    db_tx.commit().await?;
    Ok(wallet)
}

#[cfg(test)]
mod tests {
    use engine::EngineError;
    use migration::MigratorTrait;
    use sea_orm::Database;

    use super::*;

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    #[tokio::test]
    async fn creates_user_with_wallet() {
        let db = setup_db().await;

        let wallet = create_account(&db, "alice", "secret".to_string(), " Main ", Currency::Eur)
            .await
            .unwrap();
        assert_eq!(wallet.owner_id, "alice");
        assert_eq!(wallet.name, "Main");
        assert_eq!(wallet.balance, 0);

        let user = users::Entity::find_by_id("alice".to_string())
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.password, "secret");
        assert_eq!(
            WalletStore::by_owner(&db, "alice").await.unwrap().id,
            wallet.id
        );
    }

    #[tokio::test]
    async fn blank_wallet_name_leaves_no_user_behind() {
        let db = setup_db().await;

        let err = create_account(&db, "alice", "secret".to_string(), "   ", Currency::Usd)
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<EngineError>().is_some(), "{err}");

        assert!(
            users::Entity::find_by_id("alice".to_string())
                .one(&db)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(
            WalletStore::by_owner(&db, "alice").await.unwrap_err(),
            EngineError::KeyNotFound("wallet not exists".to_string())
        );

        // The name is free again once the input is fixed.
        create_account(&db, "alice", "secret".to_string(), "Main", Currency::Usd)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn existing_user_is_rejected() {
        let db = setup_db().await;
        create_account(&db, "alice", "secret".to_string(), "Main", Currency::Usd)
            .await
            .unwrap();

        assert!(
            create_account(&db, "alice", "other".to_string(), "Main", Currency::Usd)
                .await
                .is_err()
        );
        let user = users::Entity::find_by_id("alice".to_string())
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.password, "secret");
    }
}
