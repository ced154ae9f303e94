//! JSON request and response bodies of the wallet HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
}

pub mod wallet {
    use super::*;

    /// Request body of `POST /wallet/fund`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct FundWallet {
        /// Decimal amount in major units, e.g. `"100.50"`.
        pub amount: String,
        /// Idempotency key. Takes precedence over the `Idempotency-Key` header.
        #[serde(default)]
        pub reference: Option<String>,
        #[serde(default)]
        pub description: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct WalletView {
        pub id: Uuid,
        pub owner_id: String,
        pub name: String,
        pub balance_minor: i64,
        /// `balance_minor` formatted as a decimal string.
        pub balance: String,
        pub currency: Currency,
        pub active: bool,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionKind {
        Deposit,
        Withdrawal,
        Transfer,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionStatus {
        Pending,
        Completed,
        Failed,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub id: Uuid,
        pub wallet_id: Uuid,
        pub kind: TransactionKind,
        pub amount_minor: i64,
        pub status: TransactionStatus,
        pub reference: Option<String>,
        pub description: Option<String>,
        pub balance_before_minor: i64,
        pub balance_after_minor: i64,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionListResponse {
        pub wallet_id: Uuid,
        pub transactions: Vec<TransactionView>,
    }
}
