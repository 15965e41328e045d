//! Orchestration over the ledger store and the token gateway.
//!
//! Each service validates its inputs locally before any I/O, then leans on
//! the typed error taxonomy to drive the client/server status split - no
//! message inspection anywhere.

use alloy::primitives::Address;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::address::is_valid_address;
use crate::chain::TokenGateway;
use crate::errors::{Result, RewardEngineError};
use crate::metrics;
use crate::models::{RewardReceipt, UserRecord};
use crate::store::LedgerStore;
use crate::wallet;

/// Wallet linking and lookup.
pub struct WalletService {
    store: Arc<LedgerStore>,
}

impl WalletService {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        WalletService { store }
    }

    pub async fn link_wallet(&self, user_id: &str, address: &str) -> Result<UserRecord> {
        self.store.link_wallet(user_id, address).await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<UserRecord> {
        self.store
            .get_by_user_id(user_id)
            .await?
            .ok_or_else(|| RewardEngineError::UserNotFound(user_id.to_string()))
    }

    /// Fetch-or-generate: returns the record plus whether a fresh wallet was
    /// generated on this call. Generation goes through the regular link path,
    /// so existing balances survive it.
    pub async fn load_wallet(&self, user_id: &str) -> Result<(UserRecord, bool)> {
        let existing = self.get_user(user_id).await?;

        if existing.linked_wallet().is_some() {
            return Ok((existing, false));
        }

        let address = wallet::generate_address();
        let record = self.store.link_wallet(user_id, &address).await?;
        metrics::WALLETS_GENERATED_TOTAL.inc();
        info!(user_id, address, "Generated and linked wallet");
        Ok((record, true))
    }
}

/// On-chain reward path: admin-funded ERC20 transfers.
pub struct TokenRewardService {
    store: Arc<LedgerStore>,
    gateway: Arc<dyn TokenGateway>,
}

impl TokenRewardService {
    pub fn new(store: Arc<LedgerStore>, gateway: Arc<dyn TokenGateway>) -> Self {
        TokenRewardService { store, gateway }
    }

    pub async fn reward(
        &self,
        token: &str,
        human_amount: &str,
        user_id: &str,
    ) -> Result<RewardReceipt> {
        // Local validation first: no store or chain round trip is spent on a
        // request that can be rejected from the arguments alone.
        if !is_valid_address(token) {
            return Err(RewardEngineError::InvalidAddress(token.to_string()));
        }
        let token_address = Address::from_str(token)
            .map_err(|_| RewardEngineError::InvalidAddress(token.to_string()))?;

        let human_amount = human_amount.trim();
        let amount = Decimal::from_str(human_amount).map_err(|_| {
            RewardEngineError::InvalidArgument("amount must be a positive number".to_string())
        })?;
        if amount <= Decimal::ZERO {
            return Err(RewardEngineError::InvalidArgument(
                "amount must be a positive number".to_string(),
            ));
        }

        if user_id.trim().is_empty() {
            return Err(RewardEngineError::InvalidArgument(
                "userId is required".to_string(),
            ));
        }

        let user = self
            .store
            .get_by_user_id(user_id)
            .await?
            .ok_or_else(|| RewardEngineError::UserNotFound(user_id.to_string()))?;
        let recipient_str = user.linked_wallet().ok_or_else(|| {
            RewardEngineError::InvalidArgument(format!(
                "user {} has no linked wallet address",
                user_id
            ))
        })?;
        let recipient = Address::from_str(recipient_str).map_err(|_| {
            RewardEngineError::Internal(format!("stored wallet address for {} is corrupt", user_id))
        })?;

        if !self
            .gateway
            .has_sufficient_balance(token_address, human_amount)
            .await?
        {
            return Err(RewardEngineError::InsufficientBalance {
                token: token.to_string(),
                required: human_amount.to_string(),
            });
        }

        let outcome = self
            .gateway
            .transfer(token_address, recipient, human_amount)
            .await?;

        // Best-effort metadata for the receipt; a partially-compliant token
        // degrades to sentinels instead of failing a confirmed transfer.
        let token_name = self.gateway.name_of(token_address).await;
        let token_symbol = self.gateway.symbol_of(token_address).await;

        metrics::TOKEN_REWARDS_TOTAL.inc();
        info!(
            user_id,
            token,
            amount = human_amount,
            tx_hash = %outcome.tx_hash,
            "Token reward delivered"
        );

        Ok(RewardReceipt {
            recipient: recipient_str.to_string(),
            amount: human_amount.to_string(),
            token_address: token.to_string(),
            token_name,
            token_symbol,
            tx_hash: outcome.tx_hash,
            block_number: outcome.block_number,
        })
    }
}

/// Off-chain reward path: additive virtual currency credits.
pub struct CurrencyRewardService {
    store: Arc<LedgerStore>,
}

impl CurrencyRewardService {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        CurrencyRewardService { store }
    }

    pub async fn reward(
        &self,
        user_id: &str,
        currency: &str,
        amount: Decimal,
    ) -> Result<UserRecord> {
        if user_id.trim().is_empty() {
            return Err(RewardEngineError::InvalidArgument(
                "userId is required".to_string(),
            ));
        }
        if amount <= Decimal::ZERO {
            return Err(RewardEngineError::InvalidArgument(
                "amount must be a positive number".to_string(),
            ));
        }
        // One normalized key per symbol: "points" and "POINTS" credit the
        // same balance.
        let symbol = currency.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(RewardEngineError::InvalidArgument(
                "currency must not be blank".to_string(),
            ));
        }

        let record = self.store.update_balance(user_id, &symbol, amount).await?;

        metrics::CURRENCY_REWARDS_TOTAL.inc();
        info!(user_id, currency = %symbol, %amount, "Credited off-chain balance");
        Ok(record)
    }
}

/// Shared handler state; one instance of each service per process.
pub struct AppState {
    pub wallets: WalletService,
    pub token_rewards: TokenRewardService,
    pub currency_rewards: CurrencyRewardService,
}

impl AppState {
    pub fn new(store: Arc<LedgerStore>, gateway: Arc<dyn TokenGateway>) -> Self {
        AppState {
            wallets: WalletService::new(store.clone()),
            token_rewards: TokenRewardService::new(store.clone(), gateway),
            currency_rewards: CurrencyRewardService::new(store),
        }
    }
}
