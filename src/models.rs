use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::errors::{Result, RewardEngineError};

/// Durable per-user ledger record.
///
/// `currency_balances` is `None` on records written before the off-chain
/// currency feature existed. That is a legitimate persisted state, not
/// corruption; the store heals it to an empty map on first balance update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency_balances: Option<BTreeMap<String, Decimal>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Linked wallet address, treating the empty string like absence.
    pub fn linked_wallet(&self) -> Option<&str> {
        self.wallet_address.as_deref().filter(|a| !a.is_empty())
    }
}

/// Confirmed on-chain reward. Returned to the caller, never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardReceipt {
    pub recipient: String,
    /// Human-unit amount as supplied by the caller, preserved as text.
    pub amount: String,
    pub token_address: String,
    pub token_name: String,
    pub token_symbol: String,
    pub tx_hash: String,
    pub block_number: Option<u64>,
}

/// Body of `POST /link-wallet`.
#[derive(Debug, Deserialize, validator::Validate)]
#[serde(rename_all = "camelCase")]
pub struct LinkWalletRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "userId is required"))]
    pub user_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "walletAddress is required"))]
    pub wallet_address: String,
}

/// Body of `POST /reward-currency`.
///
/// `amount` is kept as raw JSON so that a missing, non-numeric, or
/// wrongly-typed value produces a field-level message instead of a
/// deserializer error; see [`parse_decimal_amount`].
#[derive(Debug, Deserialize, validator::Validate)]
#[serde(rename_all = "camelCase")]
pub struct RewardCurrencyRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "userId is required"))]
    pub user_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "currency is required"))]
    pub currency: String,
    #[serde(default)]
    pub amount: serde_json::Value,
}

/// Query string of `GET /reward`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardQuery {
    pub token: Option<String>,
    pub amount: Option<String>,
    pub user_id: Option<String>,
}

/// Query string of `GET /load`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadQuery {
    pub user_id: Option<String>,
}

/// Uniform response envelope: `{status, message?, data?}`.
/// Error responses additionally carry `details` for 500-class failures;
/// those are built by the `ResponseError` impl on [`RewardEngineError`].
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            status: "success",
            message: None,
            data: Some(data),
        }
    }

    pub fn success_with_message(message: impl Into<String>, data: T) -> Self {
        ApiResponse {
            status: "success",
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

/// Parses a JSON `amount` value (number or decimal string) into a [`Decimal`].
///
/// Missing and malformed values are both caller faults; positivity is checked
/// by the orchestrator so the message stays consistent across entry points.
pub fn parse_decimal_amount(value: &serde_json::Value) -> Result<Decimal> {
    match value {
        serde_json::Value::Null => Err(RewardEngineError::InvalidArgument(
            "amount is required".to_string(),
        )),
        serde_json::Value::Number(n) => {
            Decimal::from_str(&n.to_string()).map_err(|_| non_numeric_amount())
        }
        serde_json::Value::String(s) if !s.trim().is_empty() => {
            Decimal::from_str(s.trim()).map_err(|_| non_numeric_amount())
        }
        _ => Err(non_numeric_amount()),
    }
}

fn non_numeric_amount() -> RewardEngineError {
    RewardEngineError::InvalidArgument("amount must be a positive number".to_string())
}
