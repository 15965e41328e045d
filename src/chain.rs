//! Gateway to one ERC20-style contract endpoint.
//!
//! ERC20 is a convention, not an enforced interface: live contracts omit
//! `name`/`symbol`/`decimals` or implement them incompatibly. Optional reads
//! degrade to defaults; mandatory reads (`balanceOf`, `transfer`) surface
//! typed failures so the orchestrator can map them to the right client or
//! server status without inspecting message strings.

use alloy::{
    contract::Error as ContractError,
    network::EthereumWallet,
    primitives::{
        utils::{format_units, parse_units},
        Address, U256,
    },
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    sol,
};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{Result, RewardEngineError};
use crate::metrics;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function transfer(address to, uint256 value) external returns (bool);
        function decimals() external view returns (uint8);
        function name() external view returns (string);
        function symbol() external view returns (string);
    }
}

/// Assumed when a token's optional `decimals()` call fails.
pub const DEFAULT_DECIMALS: u8 = 18;

/// Sentinel for tokens whose optional metadata calls fail.
const UNKNOWN_METADATA: &str = "unknown";

/// Confirmed transfer: hash plus the block that included it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub tx_hash: String,
    pub block_number: Option<u64>,
}

/// One ERC20 contract endpoint bound to one admin signing credential.
#[async_trait]
pub trait TokenGateway: Send + Sync {
    /// Address derived from the bound credential. No network call.
    fn admin_address(&self) -> Address;

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256>;

    /// Optional read; failures are swallowed in favor of [`DEFAULT_DECIMALS`].
    async fn decimals_of(&self, token: Address) -> u8;

    /// Optional read; failures degrade to `"unknown"` independently of
    /// whether the sibling metadata calls succeed.
    async fn name_of(&self, token: Address) -> String;

    async fn symbol_of(&self, token: Address) -> String;

    /// Whether the admin holds at least `human_amount` of `token`. Verifies
    /// deployed code before touching contract methods, so an empty address
    /// fails with `NoContractDeployed` rather than reading as balance zero.
    async fn has_sufficient_balance(&self, token: Address, human_amount: &str) -> Result<bool>;

    /// Submit a transfer and block this task until the chain confirms it.
    ///
    /// Re-runs the code-presence and balance checks even when the caller
    /// already performed them: the admin balance can change between an
    /// earlier check and submission.
    async fn transfer(
        &self,
        token: Address,
        recipient: Address,
        human_amount: &str,
    ) -> Result<TransferOutcome>;
}

/// Converts a human-unit decimal string into base units at `decimals`.
pub(crate) fn to_base_units(human_amount: &str, decimals: u8) -> Result<U256> {
    let parsed = parse_units(human_amount.trim(), decimals).map_err(|e| {
        RewardEngineError::InvalidArgument(format!(
            "amount {} is not representable with {} decimals: {}",
            human_amount.trim(),
            decimals,
            e
        ))
    })?;
    Ok(parsed.get_absolute())
}

fn classify_read_error(token: Address, err: ContractError) -> RewardEngineError {
    match err {
        // Empty or undecodable return data: the method signature is not
        // implemented the way ERC20 prescribes.
        ContractError::ZeroData(_, _) | ContractError::AbiError(_) => {
            RewardEngineError::NonCompliantToken(token.to_string())
        }
        ContractError::TransportError(e) => {
            if e.as_error_resp().is_some() {
                // The node executed the call and the contract rejected it.
                RewardEngineError::NonCompliantToken(token.to_string())
            } else {
                RewardEngineError::Rpc(e.to_string())
            }
        }
        other => RewardEngineError::Rpc(other.to_string()),
    }
}

fn classify_transfer_error(token: Address, err: ContractError) -> RewardEngineError {
    match err {
        ContractError::ZeroData(_, _) | ContractError::AbiError(_) => {
            RewardEngineError::NonCompliantToken(token.to_string())
        }
        ContractError::TransportError(e) => match e.as_error_resp() {
            Some(resp) => RewardEngineError::TransferFailed(resp.message.to_string()),
            None => RewardEngineError::Rpc(e.to_string()),
        },
        other => RewardEngineError::TransferFailed(other.to_string()),
    }
}

pub struct EvmTokenGateway {
    provider: DynProvider,
    admin: Address,
}

impl EvmTokenGateway {
    /// Connects to `rpc_url` with `admin_key` as the sole signing credential.
    /// The credential is read-only after construction and shared across all
    /// concurrent reward requests.
    pub async fn connect(rpc_url: &str, admin_key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = admin_key
            .parse()
            .map_err(|_| RewardEngineError::Internal("invalid admin signing key".to_string()))?;
        let admin = signer.address();

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect(rpc_url)
            .await
            .map_err(|e| RewardEngineError::Rpc(e.to_string()))?
            .erased();

        Ok(EvmTokenGateway { provider, admin })
    }

    async fn require_deployed(&self, token: Address) -> Result<()> {
        let code = self
            .provider
            .get_code_at(token)
            .await
            .map_err(|e| RewardEngineError::Rpc(e.to_string()))?;

        if code.is_empty() {
            return Err(RewardEngineError::NoContractDeployed(token.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TokenGateway for EvmTokenGateway {
    fn admin_address(&self) -> Address {
        self.admin
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        let erc20 = IERC20::new(token, self.provider.clone());
        erc20
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| classify_read_error(token, e))
    }

    async fn decimals_of(&self, token: Address) -> u8 {
        let erc20 = IERC20::new(token, self.provider.clone());
        match erc20.decimals().call().await {
            Ok(decimals) => decimals,
            Err(err) => {
                debug!(%token, %err, "decimals() unavailable, assuming {}", DEFAULT_DECIMALS);
                DEFAULT_DECIMALS
            }
        }
    }

    async fn name_of(&self, token: Address) -> String {
        let erc20 = IERC20::new(token, self.provider.clone());
        match erc20.name().call().await {
            Ok(name) => name,
            Err(err) => {
                debug!(%token, %err, "name() unavailable");
                UNKNOWN_METADATA.to_string()
            }
        }
    }

    async fn symbol_of(&self, token: Address) -> String {
        let erc20 = IERC20::new(token, self.provider.clone());
        match erc20.symbol().call().await {
            Ok(symbol) => symbol,
            Err(err) => {
                debug!(%token, %err, "symbol() unavailable");
                UNKNOWN_METADATA.to_string()
            }
        }
    }

    async fn has_sufficient_balance(&self, token: Address, human_amount: &str) -> Result<bool> {
        self.require_deployed(token).await?;

        let decimals = self.decimals_of(token).await;
        let required = to_base_units(human_amount, decimals)?;
        let available = self.balance_of(token, self.admin).await?;

        Ok(available >= required)
    }

    async fn transfer(
        &self,
        token: Address,
        recipient: Address,
        human_amount: &str,
    ) -> Result<TransferOutcome> {
        self.require_deployed(token).await?;

        let decimals = self.decimals_of(token).await;
        let required = to_base_units(human_amount, decimals)?;
        let available = self.balance_of(token, self.admin).await?;
        if available < required {
            let available_human = format_units(available, decimals)
                .unwrap_or_else(|_| available.to_string());
            debug!(%token, %available_human, "Admin balance below requested transfer");
            return Err(RewardEngineError::InsufficientBalance {
                token: token.to_string(),
                required: human_amount.trim().to_string(),
            });
        }

        let erc20 = IERC20::new(token, self.provider.clone());
        let pending = erc20
            .transfer(recipient, required)
            .send()
            .await
            .map_err(|e| classify_transfer_error(token, e))?;

        // Awaiting inclusion parks only this task; other requests keep
        // flowing on the shared runtime.
        let timer = metrics::TRANSFER_CONFIRMATION_SECONDS.start_timer();
        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| RewardEngineError::TransferFailed(e.to_string()))?;
        timer.observe_duration();

        if !receipt.status() {
            return Err(RewardEngineError::TransferFailed(format!(
                "transaction {} reverted",
                receipt.transaction_hash
            )));
        }

        info!(
            %token,
            %recipient,
            amount = human_amount,
            tx_hash = %receipt.transaction_hash,
            block = receipt.block_number,
            "Token transfer confirmed"
        );

        Ok(TransferOutcome {
            tx_hash: receipt.transaction_hash.to_string(),
            block_number: receipt.block_number,
        })
    }
}
