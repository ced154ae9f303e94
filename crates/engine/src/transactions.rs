//! Ledger primitives.
//!
//! A `Transaction` is an immutable ledger entry recording one balance change
//! of one wallet, together with the balance snapshot around it.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    /// Outgoing transfer from the wallet.
    Transfer,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Transfer => "transfer",
        }
    }

    /// Balance effect of an entry of this kind carrying `amount_minor`.
    pub fn signed_amount(self, amount_minor: i64) -> i64 {
        match self {
            Self::Deposit => amount_minor,
            Self::Withdrawal | Self::Transfer => -amount_minor,
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            "transfer" => Ok(Self::Transfer),
            other => Err(EngineError::InvalidAmount(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl TryFrom<&str> for TransactionStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(EngineError::InvalidAmount(format!(
                "invalid transaction status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub kind: TransactionKind,
    /// Magnitude in minor units; the sign comes from `kind`.
    pub amount: i64,
    pub status: TransactionStatus,
    /// Caller-supplied idempotency key.
    pub reference: Option<String>,
    pub description: Option<String>,
    pub balance_before: i64,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a completed entry moving the wallet from `balance_before` by
    /// `amount` according to `kind`.
    pub fn completed(
        wallet_id: Uuid,
        kind: TransactionKind,
        amount: i64,
        balance_before: i64,
        reference: Option<String>,
        description: Option<String>,
    ) -> ResultEngine<Self> {
        if amount <= 0 {
            return Err(EngineError::InvalidAmount("amount must be > 0".to_string()));
        }
        let balance_after = balance_before
            .checked_add(kind.signed_amount(amount))
            .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))?;
        Ok(Self {
            id: Uuid::new_v4(),
            wallet_id,
            kind,
            amount,
            status: TransactionStatus::Completed,
            reference,
            description,
            balance_before,
            balance_after,
            created_at: Utc::now(),
        })
    }

    pub fn signed_amount(&self) -> i64 {
        self.kind.signed_amount(self.amount)
    }

    /// `true` when the before/after snapshot agrees with the amount.
    pub fn is_consistent(&self) -> bool {
        self.balance_before.checked_add(self.signed_amount()) == Some(self.balance_after)
    }

    /// Whether a repeated request with this reference describes the same
    /// operation as this entry.
    pub fn replays(&self, wallet_id: Uuid, kind: TransactionKind, amount: i64) -> bool {
        self.wallet_id == wallet_id && self.kind == kind && self.amount == amount
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub wallet_id: String,
    pub kind: String,
    pub amount: i64,
    pub status: String,
    #[sea_orm(unique)]
    pub reference: Option<String>,
    pub description: Option<String>,
    pub balance_before: i64,
    pub balance_after: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::wallets::Entity",
        from = "Column::WalletId",
        to = "super::wallets::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Wallets,
}

impl Related<super::wallets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            wallet_id: ActiveValue::Set(tx.wallet_id.to_string()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            amount: ActiveValue::Set(tx.amount),
            status: ActiveValue::Set(tx.status.as_str().to_string()),
            reference: ActiveValue::Set(tx.reference.clone()),
            description: ActiveValue::Set(tx.description.clone()),
            balance_before: ActiveValue::Set(tx.balance_before),
            balance_after: ActiveValue::Set(tx.balance_after),
            created_at: ActiveValue::Set(tx.created_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            wallet_id: parse_uuid(&model.wallet_id, "wallet")?,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            amount: model.amount,
            status: TransactionStatus::try_from(model.status.as_str())?,
            reference: model.reference,
            description: model.description,
            balance_before: model.balance_before,
            balance_after: model.balance_after,
            created_at: model.created_at,
        })
    }
}
