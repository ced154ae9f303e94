//! The module contains `Wallet` struct and its implementation.

use chrono::{DateTime, Utc};

use sea_orm::entity::{ActiveValue, prelude::*};
use uuid::Uuid;

use crate::{
    Currency, EngineError, ResultEngine,
    util::{model_currency, parse_uuid},
};

/// A wallet.
///
/// Each user owns exactly one wallet. The balance is a denormalized copy of
/// the last completed ledger entry's `balance_after`; it is only ever changed
/// by the funding engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Wallet {
    /// Stable identifier, generated once and persisted.
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    /// Balance in minor units.
    pub balance: i64,
    pub currency: Currency,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// A freshly opened wallet: zero balance, active.
    pub fn new(owner_id: String, name: String, currency: Currency) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name,
            balance: 0,
            currency,
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn ensure_active(&self) -> ResultEngine<()> {
        if !self.active {
            return Err(EngineError::Inactive(self.id.to_string()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub owner_id: String,
    pub name: String,
    pub balance: i64,
    pub currency: String,
    pub active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::OwnerId",
        to = "super::users::Column::Username",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Users,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Wallet> for ActiveModel {
    fn from(value: &Wallet) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            owner_id: ActiveValue::Set(value.owner_id.clone()),
            name: ActiveValue::Set(value.name.clone()),
            balance: ActiveValue::Set(value.balance),
            currency: ActiveValue::Set(value.currency.code().to_string()),
            active: ActiveValue::Set(value.active),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for Wallet {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "wallet")?,
            owner_id: model.owner_id,
            name: model.name,
            balance: model.balance,
            currency: model_currency(&model.currency)?,
            active: model.active,
            created_at: model.created_at,
        })
    }
}
