use std::sync::Arc;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement, TransactionTrait};

use engine::{
    Currency, Engine, EngineError, FundCmd, Transaction, TransactionKind, TransactionLedger,
    TransactionStatus, WalletStore,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn insert_user(db: &DatabaseConnection, username: &str) {
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO users (username, password) VALUES (?, ?)",
        vec![username.into(), "password".into()],
    ))
    .await
    .unwrap();
}

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    insert_user(&db, "alice").await;
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    engine
        .open_wallet("alice", "My Wallet", Currency::Usd)
        .await
        .unwrap();
    (engine, db)
}

async fn engine_with_file_db() -> (Engine, DatabaseConnection, String, std::path::PathBuf) {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("engine_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    insert_user(&db, "alice").await;
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    engine
        .open_wallet("alice", "My Wallet", Currency::Usd)
        .await
        .unwrap();

    (engine, db, url, path)
}

#[tokio::test]
async fn open_wallet_starts_empty_and_active() {
    let (engine, db) = engine_with_db().await;

    let wallet = engine.wallet_by_owner("alice").await.unwrap();
    assert_eq!(wallet.balance, 0);
    assert!(wallet.active);
    assert_eq!(wallet.currency, Currency::Usd);
    assert_eq!(wallet.name, "My Wallet");

    let err = engine
        .open_wallet("alice", "Second", Currency::Usd)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::ExistingKey("alice".to_string()));

    let err = engine
        .open_wallet("bob", "Bob's", Currency::Eur)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::KeyNotFound("user not exists".to_string()));

    insert_user(&db, "bob").await;
    let bob = engine
        .open_wallet("bob", "  Bob's  ", Currency::Eur)
        .await
        .unwrap();
    assert_eq!(bob.name, "Bob's");
    assert_eq!(bob.currency, Currency::Eur);
}

#[tokio::test]
async fn fund_credits_wallet_and_records_snapshot() {
    let (engine, _db) = engine_with_db().await;

    let wallet = engine.fund(FundCmd::new("alice", 10050)).await.unwrap();
    assert_eq!(wallet.balance, 10050);

    let txs = engine.list_transactions(wallet.id).await.unwrap();
    assert_eq!(txs.len(), 1);
    let tx = &txs[0];
    assert_eq!(tx.kind, TransactionKind::Deposit);
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert_eq!(tx.amount, 10050);
    assert_eq!(tx.balance_before, 0);
    assert_eq!(tx.balance_after, 10050);
    assert_eq!(tx.reference, None);
    assert_eq!(tx.description.as_deref(), Some("Wallet funding"));
}

#[tokio::test]
async fn balance_is_sum_of_fundings() {
    let (engine, _db) = engine_with_db().await;

    let amounts = [100, 250, 1, 9_999];
    for amount in amounts {
        engine
            .fund(FundCmd::new("alice", amount).description("top up"))
            .await
            .unwrap();
    }

    let wallet = engine.wallet_by_owner("alice").await.unwrap();
    assert_eq!(wallet.balance, amounts.iter().sum::<i64>());

    let txs = engine.list_transactions(wallet.id).await.unwrap();
    assert_eq!(txs.len(), amounts.len());
    let mut previous_after = 0;
    for tx in &txs {
        assert_eq!(tx.balance_after - tx.balance_before, tx.amount);
        assert_eq!(tx.balance_before, previous_after);
        previous_after = tx.balance_after;
    }
    assert_eq!(previous_after, wallet.balance);

    let audit = engine.audit_wallet(wallet.id).await.unwrap();
    assert_eq!(audit.completed, amounts.len());
    assert_eq!(audit.balance, wallet.balance);
}

#[tokio::test]
async fn same_reference_is_applied_once() {
    let (engine, _db) = engine_with_db().await;

    let first = engine
        .fund(FundCmd::new("alice", 50).reference("ref-1"))
        .await
        .unwrap();
    let second = engine
        .fund(FundCmd::new("alice", 50).reference("ref-1"))
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(second.balance, 50);

    let txs = engine.list_transactions(first.id).await.unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].reference.as_deref(), Some("ref-1"));

    let found = engine.transaction_by_reference("ref-1").await.unwrap();
    assert_eq!(found.map(|tx| tx.id), Some(txs[0].id));
}

#[tokio::test]
async fn replay_returns_current_state() {
    let (engine, _db) = engine_with_db().await;

    engine
        .fund(FundCmd::new("alice", 50).reference("ref-1"))
        .await
        .unwrap();
    engine.fund(FundCmd::new("alice", 30)).await.unwrap();

    let replay = engine
        .fund(FundCmd::new("alice", 50).reference(" ref-1 "))
        .await
        .unwrap();
    assert_eq!(replay.balance, 80);
    assert_eq!(engine.list_transactions(replay.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn reused_reference_with_other_amount_is_rejected() {
    let (engine, _db) = engine_with_db().await;

    engine
        .fund(FundCmd::new("alice", 50).reference("ref-1"))
        .await
        .unwrap();
    let err = engine
        .fund(FundCmd::new("alice", 75).reference("ref-1"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::DuplicateReference("ref-1".to_string()));

    let wallet = engine.wallet_by_owner("alice").await.unwrap();
    assert_eq!(wallet.balance, 50);
    assert_eq!(engine.list_transactions(wallet.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn reference_is_unique_across_wallets() {
    let (engine, db) = engine_with_db().await;
    insert_user(&db, "bob").await;
    engine
        .open_wallet("bob", "Bob's", Currency::Usd)
        .await
        .unwrap();

    engine
        .fund(FundCmd::new("alice", 50).reference("shared"))
        .await
        .unwrap();
    let err = engine
        .fund(FundCmd::new("bob", 50).reference("shared"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::DuplicateReference("shared".to_string()));

    let bob = engine.wallet_by_owner("bob").await.unwrap();
    assert_eq!(bob.balance, 0);
}

#[tokio::test]
async fn blank_reference_does_not_deduplicate() {
    let (engine, _db) = engine_with_db().await;

    engine
        .fund(FundCmd::new("alice", 10).reference("   "))
        .await
        .unwrap();
    let wallet = engine
        .fund(FundCmd::new("alice", 10).reference(""))
        .await
        .unwrap();
    assert_eq!(wallet.balance, 20);

    let txs = engine.list_transactions(wallet.id).await.unwrap();
    assert_eq!(txs.len(), 2);
    assert!(txs.iter().all(|tx| tx.reference.is_none()));
}

#[tokio::test]
async fn non_positive_amounts_are_rejected_without_side_effects() {
    let (engine, _db) = engine_with_db().await;

    for amount in [-5, 0] {
        let err = engine
            .fund(FundCmd::new("alice", amount).reference(format!("bad-{amount}")))
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::InvalidAmount("amount must be > 0".to_string()));
    }

    let wallet = engine.wallet_by_owner("alice").await.unwrap();
    assert_eq!(wallet.balance, 0);
    assert!(engine.list_transactions(wallet.id).await.unwrap().is_empty());
    assert_eq!(engine.transaction_by_reference("bad-0").await.unwrap(), None);
}

#[tokio::test]
async fn inactive_wallet_rejects_funding() {
    let (engine, _db) = engine_with_db().await;

    engine.fund(FundCmd::new("alice", 100)).await.unwrap();
    let wallet = engine.set_wallet_active("alice", false).await.unwrap();
    assert!(!wallet.active);

    let err = engine
        .fund(FundCmd::new("alice", 100).reference("after-deactivate"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Inactive(wallet.id.to_string()));

    let stored = engine.wallet_by_owner("alice").await.unwrap();
    assert_eq!(stored.balance, 100);
    assert_eq!(engine.list_transactions(stored.id).await.unwrap().len(), 1);

    engine.set_wallet_active("alice", true).await.unwrap();
    let wallet = engine.fund(FundCmd::new("alice", 100)).await.unwrap();
    assert_eq!(wallet.balance, 200);
}

#[tokio::test]
async fn missing_wallet_is_not_found() {
    let (engine, db) = engine_with_db().await;
    insert_user(&db, "carol").await;

    let err = engine.fund(FundCmd::new("carol", 10)).await.unwrap_err();
    assert_eq!(err, EngineError::KeyNotFound("wallet not exists".to_string()));

    let err = engine.list_transactions(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err, EngineError::KeyNotFound("wallet not exists".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_fundings_all_apply() {
    let (engine, _db) = engine_with_db().await;
    let engine = Arc::new(engine);
    let n = 20;

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..n {
        let engine = Arc::clone(&engine);
        tasks.spawn(async move { engine.fund(FundCmd::new("alice", 10)).await });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
    }

    let wallet = engine.wallet_by_owner("alice").await.unwrap();
    assert_eq!(wallet.balance, 10 * n);

    let txs = engine.list_transactions(wallet.id).await.unwrap();
    assert_eq!(txs.len() as i64, n);
    assert!(txs.iter().all(|tx| tx.status == TransactionStatus::Completed));

    let audit = engine.audit_wallet(wallet.id).await.unwrap();
    assert_eq!(audit.completed as i64, n);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_replays_apply_once() {
    let (engine, _db) = engine_with_db().await;
    let engine = Arc::new(engine);

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        tasks.spawn(async move {
            engine
                .fund(FundCmd::new("alice", 50).reference("ref-once"))
                .await
        });
    }
    while let Some(joined) = tasks.join_next().await {
        assert_eq!(joined.unwrap().unwrap().balance, 50);
    }

    let wallet = engine.wallet_by_owner("alice").await.unwrap();
    assert_eq!(wallet.balance, 50);
    assert_eq!(engine.list_transactions(wallet.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn apply_delta_rejects_stale_balance() {
    let (engine, db) = engine_with_db().await;
    let wallet = engine.fund(FundCmd::new("alice", 100)).await.unwrap();

    let db_tx = db.begin().await.unwrap();
    let err = WalletStore::apply_delta(&db_tx, wallet.id, 10, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    assert!(err.is_retryable());

    let new_balance = WalletStore::apply_delta(&db_tx, wallet.id, 10, 100)
        .await
        .unwrap();
    assert_eq!(new_balance, 110);

    let err = WalletStore::apply_delta(&db_tx, Uuid::new_v4(), 10, 0)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::KeyNotFound("wallet not exists".to_string()));
    db_tx.rollback().await.unwrap();

    assert_eq!(engine.wallet(wallet.id).await.unwrap().balance, 100);

    engine.set_wallet_active("alice", false).await.unwrap();
    let db_tx = db.begin().await.unwrap();
    let err = WalletStore::apply_delta(&db_tx, wallet.id, 10, 100)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Inactive(wallet.id.to_string()));
}

#[tokio::test]
async fn ledger_insert_validates_entries() {
    let (engine, db) = engine_with_db().await;
    let wallet = engine.wallet_by_owner("alice").await.unwrap();
    let db_tx = db.begin().await.unwrap();

    let mut zero =
        Transaction::completed(wallet.id, TransactionKind::Deposit, 1, 0, None, None).unwrap();
    zero.amount = 0;
    let err = TransactionLedger::insert(&db_tx, &zero).await.unwrap_err();
    assert_eq!(err, EngineError::InvalidAmount("amount must be > 0".to_string()));

    let mut broken =
        Transaction::completed(wallet.id, TransactionKind::Deposit, 10, 0, None, None).unwrap();
    broken.balance_after = 11;
    assert!(matches!(
        TransactionLedger::insert(&db_tx, &broken).await,
        Err(EngineError::InvalidAmount(_))
    ));

    let first = Transaction::completed(
        wallet.id,
        TransactionKind::Deposit,
        10,
        0,
        Some("ref-ledger".to_string()),
        None,
    )
    .unwrap();
    TransactionLedger::insert(&db_tx, &first).await.unwrap();

    let again = Transaction::completed(
        wallet.id,
        TransactionKind::Deposit,
        10,
        10,
        Some("ref-ledger".to_string()),
        None,
    )
    .unwrap();
    let err = TransactionLedger::insert(&db_tx, &again).await.unwrap_err();
    assert_eq!(err, EngineError::DuplicateReference("ref-ledger".to_string()));

    let listed = TransactionLedger::list_by_wallet(&db_tx, wallet.id)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, first.id);

    // Without a balance write to go with it, the entry is discarded.
    db_tx.rollback().await.unwrap();
    assert!(engine.list_transactions(wallet.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn contended_wallet_gives_up_without_side_effects() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    insert_user(&db, "alice").await;
    let engine = Engine::builder()
        .database(db.clone())
        .max_fund_attempts(2)
        .build()
        .await
        .unwrap();
    engine
        .open_wallet("alice", "My Wallet", Currency::Usd)
        .await
        .unwrap();

    // Every balance write matches no row, as if another writer always won.
    db.execute_unprepared(
        "CREATE TRIGGER hold_balance BEFORE UPDATE OF balance ON wallets \
         BEGIN SELECT RAISE(IGNORE); END",
    )
    .await
    .unwrap();

    let err = engine
        .fund(FundCmd::new("alice", 10).reference("contended"))
        .await
        .unwrap_err();
    assert!(
        matches!(&err, EngineError::Contention(reason) if reason.contains("after 2 attempts")),
        "{err:?}"
    );
    assert!(err.is_retryable());

    let wallet = engine.wallet_by_owner("alice").await.unwrap();
    assert_eq!(wallet.balance, 0);
    assert!(engine.list_transactions(wallet.id).await.unwrap().is_empty());
    assert_eq!(
        engine.transaction_by_reference("contended").await.unwrap(),
        None
    );

    db.execute_unprepared("DROP TRIGGER hold_balance")
        .await
        .unwrap();
    let wallet = engine
        .fund(FundCmd::new("alice", 10).reference("contended"))
        .await
        .unwrap();
    assert_eq!(wallet.balance, 10);
}

#[tokio::test]
async fn reference_collision_at_insert_is_retried() {
    let (engine, db) = engine_with_db().await;

    // Takes the reference between each attempt's lookup and its own insert.
    db.execute_unprepared(
        "CREATE TRIGGER take_reference AFTER UPDATE OF balance ON wallets \
         BEGIN \
           INSERT INTO transactions (id, wallet_id, kind, amount, status, reference, \
             description, balance_before, balance_after, created_at) \
           VALUES (lower(hex(randomblob(16))), NEW.id, 'deposit', NEW.balance - OLD.balance, \
             'completed', 'raced', NULL, OLD.balance, NEW.balance, '2026-01-01T00:00:00+00:00'); \
         END",
    )
    .await
    .unwrap();

    let err = engine
        .fund(FundCmd::new("alice", 10).reference("raced"))
        .await
        .unwrap_err();
    assert!(
        matches!(&err, EngineError::Contention(reason) if reason.contains("raced")),
        "{err:?}"
    );

    let wallet = engine.wallet_by_owner("alice").await.unwrap();
    assert_eq!(wallet.balance, 0);
    assert!(engine.list_transactions(wallet.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn audit_detects_balance_written_outside_engine() {
    let (engine, db) = engine_with_db().await;
    let wallet = engine.fund(FundCmd::new("alice", 100)).await.unwrap();

    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE wallets SET balance = ? WHERE id = ?",
        vec![999i64.into(), wallet.id.to_string().into()],
    ))
    .await
    .unwrap();

    let err = engine.audit_wallet(wallet.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Reconciliation(_)));
}

#[tokio::test]
async fn build_requires_a_transactional_store() {
    let err = Engine::builder().build().await.unwrap_err();
    assert!(matches!(err, EngineError::AtomicityUnavailable(_)));
}

#[tokio::test]
async fn restart_engine_reads_same_state() {
    let (engine, db, url, path) = engine_with_file_db().await;

    engine
        .fund(FundCmd::new("alice", 1000).reference("ref-restart"))
        .await
        .unwrap();

    drop(engine);
    drop(db);

    let db2 = Database::connect(&url).await.unwrap();
    let engine2 = Engine::builder()
        .database(db2.clone())
        .max_fund_attempts(3)
        .build()
        .await
        .unwrap();
    assert_eq!(engine2.max_fund_attempts(), 3);

    let wallet = engine2.wallet_by_owner("alice").await.unwrap();
    assert_eq!(wallet.balance, 1000);

    let replay = engine2
        .fund(FundCmd::new("alice", 1000).reference("ref-restart"))
        .await
        .unwrap();
    assert_eq!(replay.balance, 1000);

    drop(engine2);
    drop(db2);
    let _ = std::fs::remove_file(path);
}
