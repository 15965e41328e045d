use actix_web::{web, HttpResponse};
use serde_json::json;
use validator::Validate;

use crate::errors::RewardEngineError;
use crate::metrics;
use crate::models::{
    parse_decimal_amount, ApiResponse, LinkWalletRequest, LoadQuery, RewardCurrencyRequest,
    RewardQuery,
};
use crate::services::AppState;

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "reward-engine",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Associate a wallet address with a user
pub async fn link_wallet(
    state: web::Data<AppState>,
    request: web::Json<LinkWalletRequest>,
) -> Result<HttpResponse, RewardEngineError> {
    let request = request.into_inner();
    request
        .validate()
        .map_err(|e| RewardEngineError::InvalidArgument(validation_message(&e)))?;

    let record = state
        .wallets
        .link_wallet(&request.user_id, &request.wallet_address)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(record)))
}

/// Fetch a user record
pub async fn get_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, RewardEngineError> {
    let user_id = path.into_inner();
    let record = state.wallets.get_user(&user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(record)))
}

/// Fetch-or-generate a wallet for a user
pub async fn load_wallet(
    state: web::Data<AppState>,
    query: web::Query<LoadQuery>,
) -> Result<HttpResponse, RewardEngineError> {
    let user_id = query
        .into_inner()
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| RewardEngineError::InvalidArgument("userId is required".to_string()))?;

    let (record, generated) = state.wallets.load_wallet(&user_id).await?;
    let message = if generated {
        "Wallet generated and linked"
    } else {
        "Wallet already present; nothing generated"
    };
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(message, record)))
}

/// Transfer an ERC20 reward to a user's linked wallet
pub async fn reward_token(
    state: web::Data<AppState>,
    query: web::Query<RewardQuery>,
) -> Result<HttpResponse, RewardEngineError> {
    let query = query.into_inner();
    let token = require_param(query.token, "token")?;
    let amount = require_param(query.amount, "amount")?;
    let user_id = require_param(query.user_id, "userId")?;

    let receipt = state
        .token_rewards
        .reward(&token, &amount, &user_id)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        "Reward transferred",
        receipt,
    )))
}

/// Credit off-chain virtual currency to a user
pub async fn reward_currency(
    state: web::Data<AppState>,
    request: web::Json<RewardCurrencyRequest>,
) -> Result<HttpResponse, RewardEngineError> {
    let request = request.into_inner();
    request
        .validate()
        .map_err(|e| RewardEngineError::InvalidArgument(validation_message(&e)))?;
    let amount = parse_decimal_amount(&request.amount)?;

    let record = state
        .currency_rewards
        .reward(&request.user_id, &request.currency, amount)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message("Balance updated", record)))
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint() -> HttpResponse {
    match metrics::metrics_handler() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "status": "error",
            "message": "Failed to gather metrics",
            "details": e.to_string(),
        })),
    }
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/link-wallet", web::post().to(link_wallet))
        .route("/user/{userId}", web::get().to(get_user))
        .route("/load", web::get().to(load_wallet))
        .route("/reward", web::get().to(reward_token))
        .route("/reward-currency", web::post().to(reward_currency))
        .route("/health", web::get().to(health_check))
        .route("/metrics", web::get().to(metrics_endpoint));
}

fn require_param(value: Option<String>, name: &str) -> Result<String, RewardEngineError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| RewardEngineError::InvalidArgument(format!("{} is required", name)))
}

/// First field-level message out of a validator error set.
fn validation_message(errors: &validator::ValidationErrors) -> String {
    for errs in errors.field_errors().values() {
        if let Some(err) = errs.first() {
            if let Some(message) = &err.message {
                return message.to_string();
            }
        }
    }
    errors.to_string()
}
