//! Wallet API endpoints.

use api_types::{
    transaction::{TransactionListResponse, TransactionView},
    wallet::{FundWallet, WalletView},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::HeaderMap,
};
use engine::{EngineError, FundCmd, Money};
use uuid::Uuid;

use crate::{ServerError, server::ServerState, user};

const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

fn currency_view(currency: engine::Currency) -> api_types::Currency {
    match currency {
        engine::Currency::Usd => api_types::Currency::Usd,
        engine::Currency::Eur => api_types::Currency::Eur,
    }
}

fn kind_view(kind: engine::TransactionKind) -> api_types::transaction::TransactionKind {
    use api_types::transaction::TransactionKind;
    match kind {
        engine::TransactionKind::Deposit => TransactionKind::Deposit,
        engine::TransactionKind::Withdrawal => TransactionKind::Withdrawal,
        engine::TransactionKind::Transfer => TransactionKind::Transfer,
    }
}

fn status_view(status: engine::TransactionStatus) -> api_types::transaction::TransactionStatus {
    use api_types::transaction::TransactionStatus;
    match status {
        engine::TransactionStatus::Pending => TransactionStatus::Pending,
        engine::TransactionStatus::Completed => TransactionStatus::Completed,
        engine::TransactionStatus::Failed => TransactionStatus::Failed,
    }
}

fn wallet_view(wallet: engine::Wallet) -> WalletView {
    WalletView {
        id: wallet.id,
        owner_id: wallet.owner_id,
        name: wallet.name,
        balance_minor: wallet.balance,
        balance: Money::new(wallet.balance).to_string(),
        currency: currency_view(wallet.currency),
        active: wallet.active,
    }
}

fn transaction_view(tx: engine::Transaction) -> TransactionView {
    TransactionView {
        id: tx.id,
        wallet_id: tx.wallet_id,
        kind: kind_view(tx.kind),
        amount_minor: tx.amount,
        status: status_view(tx.status),
        reference: tx.reference,
        description: tx.description,
        balance_before_minor: tx.balance_before,
        balance_after_minor: tx.balance_after,
        created_at: tx.created_at,
    }
}

/// Return the caller's wallet.
pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<WalletView>, ServerError> {
    let wallet = state.engine.wallet_by_owner(&user.username).await?;
    Ok(Json(wallet_view(wallet)))
}

/// Fund the caller's wallet.
///
/// The body `reference` wins over the `Idempotency-Key` header.
pub async fn fund(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(payload): Json<FundWallet>,
) -> Result<Json<WalletView>, ServerError> {
    let amount: Money = payload.amount.parse()?;

    let header_key = match headers.get(IDEMPOTENCY_KEY_HEADER) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| ServerError::Generic("invalid Idempotency-Key header".to_string()))?
                .to_string(),
        ),
        None => None,
    };

    let mut cmd = FundCmd::new(user.username, amount.minor());
    if let Some(reference) = payload.reference.or(header_key) {
        cmd = cmd.reference(reference);
    }
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }

    let wallet = state.engine.fund(cmd).await?;
    Ok(Json(wallet_view(wallet)))
}

/// List the ledger of one of the caller's wallets.
///
/// A wallet owned by somebody else is reported as not found.
pub async fn list_transactions(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<Json<TransactionListResponse>, ServerError> {
    let wallet = state.engine.wallet(wallet_id).await?;
    if wallet.owner_id != user.username {
        return Err(EngineError::KeyNotFound("wallet not exists".to_string()).into());
    }

    let transactions = state
        .engine
        .list_transactions(wallet_id)
        .await?
        .into_iter()
        .map(transaction_view)
        .collect();

    Ok(Json(TransactionListResponse {
        wallet_id,
        transactions,
    }))
}
