use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{ServerState, app, run, run_with_listener, spawn_with_listener};

mod server;
mod user;
mod wallets;

pub mod types {
    pub mod wallet {
        pub use api_types::wallet::{FundWallet, WalletView};
    }

    pub mod transaction {
        pub use api_types::transaction::{TransactionListResponse, TransactionView};
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExistingKey(_)
        | EngineError::DuplicateReference(_)
        | EngineError::Conflict(_) => StatusCode::CONFLICT,
        EngineError::Inactive(_)
        | EngineError::InvalidAmount(_)
        | EngineError::CurrencyMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::InvalidId(_) => StatusCode::BAD_REQUEST,
        EngineError::Contention(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Database(_)
        | EngineError::Reconciliation(_)
        | EngineError::AtomicityUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        err @ (EngineError::Reconciliation(_) | EngineError::AtomicityUnavailable(_)) => {
            tracing::error!("{err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
