use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RewardEngineError>;

#[derive(Error, Debug)]
pub enum RewardEngineError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Insufficient token balance: admin holds less than {required} of {token}")]
    InsufficientBalance { token: String, required: String },

    #[error("Token {0} does not implement the expected ERC20 interface")]
    NonCompliantToken(String),

    #[error("No contract deployed at {0}")]
    NoContractDeployed(String),

    #[error("Concurrent modification of user {0}")]
    ConcurrentModification(String),

    #[error("Ledger store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    #[error("Token transfer failed: {0}")]
    TransferFailed(String),

    #[error("Chain RPC error: {0}")]
    Rpc(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for RewardEngineError {
    fn from(err: serde_json::Error) -> Self {
        RewardEngineError::Internal(format!("JSON serialization error: {}", err))
    }
}

impl RewardEngineError {
    /// Client-facing message. Server-side failures collapse to a generic
    /// phrase; the underlying diagnostic travels in the `details` field
    /// instead, so infrastructure identifiers never leak into `message`.
    fn public_message(&self) -> String {
        match self {
            RewardEngineError::StoreUnavailable(_) => "Ledger store unavailable".to_string(),
            RewardEngineError::TransferFailed(_) => "Token transfer failed".to_string(),
            RewardEngineError::Rpc(_) => "Chain RPC error".to_string(),
            RewardEngineError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for RewardEngineError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        let mut body = json!({
            "status": "error",
            "message": self.public_message(),
        });
        if status_code.is_server_error() {
            body["details"] = json!(self.to_string());
        }

        HttpResponse::build(status_code).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            RewardEngineError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            RewardEngineError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            RewardEngineError::UserNotFound(_) => StatusCode::NOT_FOUND,
            RewardEngineError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
            RewardEngineError::NonCompliantToken(_) => StatusCode::BAD_REQUEST,
            RewardEngineError::NoContractDeployed(_) => StatusCode::BAD_REQUEST,
            RewardEngineError::ConcurrentModification(_) => StatusCode::CONFLICT,
            RewardEngineError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RewardEngineError::TransferFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RewardEngineError::Rpc(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RewardEngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
