//! User ledger: wallet links and off-chain currency balances.
//!
//! Mutation safety is pushed entirely to the backing table's conditional
//! single-statement writes - there are no in-process locks, because several
//! service instances may run against the same table concurrently. The one
//! delicate operation is [`LedgerStore::update_balance`]: records written
//! before the currency feature existed have no balances container at all,
//! and the update must heal that lazily without losing a concurrent credit
//! or initializing the container twice.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::{Result, RewardEngineError};
use crate::{address::is_valid_address, models::UserRecord};

/// Native batch size for bulk scan/delete.
const SCAN_BATCH: i64 = 100;

/// Conditional-write primitives of the backing user table.
///
/// Every mutation is a single atomic statement with a server-checked
/// precondition; a failed precondition is reported as `Ok(None)` (or
/// `Ok(false)`), never as an error, so the caller can diagnose why.
#[async_trait]
pub trait UserTable: Send + Sync {
    /// Point lookup by user id.
    async fn fetch(&self, user_id: &str) -> Result<Option<UserRecord>>;

    /// Insert a record carrying only a wallet link, or overwrite the wallet
    /// address of an existing record. `currency_balances` and `created_at`
    /// survive a relink; only `updated_at` is refreshed alongside the
    /// address.
    async fn upsert_wallet(&self, user_id: &str, address: &str) -> Result<UserRecord>;

    /// Atomic add-and-fetch on `currency_balances[currency]`, stamping
    /// `updated_at`. Preconditions checked by the store itself: the record
    /// exists, and - when `require_container` - the balances container
    /// exists. Returns the updated record, or `None` when a precondition
    /// failed.
    async fn add_balance(
        &self,
        user_id: &str,
        currency: &str,
        delta: Decimal,
        require_container: bool,
    ) -> Result<Option<UserRecord>>;

    /// Initialize `currency_balances` to an empty container iff it is still
    /// absent (existence-guarded default - a container written by a
    /// concurrent healer is left untouched). Conditioned only on record
    /// existence: returns `false` iff the record is missing.
    async fn ensure_container(&self, user_id: &str) -> Result<bool>;

    /// One page of records ordered by user id, strictly after `after`.
    async fn scan_page(&self, after: Option<&str>, limit: i64) -> Result<Vec<UserRecord>>;

    /// Delete up to `limit` records; returns how many went away.
    async fn delete_page(&self, limit: i64) -> Result<u64>;
}

/// Durable mapping from user identity to wallet address and per-currency
/// balances, generic over the backing [`UserTable`].
pub struct LedgerStore {
    table: Arc<dyn UserTable>,
}

impl LedgerStore {
    pub fn new(table: Arc<dyn UserTable>) -> Self {
        LedgerStore { table }
    }

    pub async fn get_by_user_id(&self, user_id: &str) -> Result<Option<UserRecord>> {
        self.table.fetch(user_id).await
    }

    /// Associate `address` with `user_id`, creating the record on first link.
    ///
    /// Relinking preserves existing balances (and `created_at`); callers that
    /// want the old full-overwrite behavior must read-modify-write.
    pub async fn link_wallet(&self, user_id: &str, address: &str) -> Result<UserRecord> {
        if user_id.trim().is_empty() {
            return Err(RewardEngineError::InvalidArgument(
                "userId is required".to_string(),
            ));
        }
        if !is_valid_address(address) {
            return Err(RewardEngineError::InvalidAddress(address.to_string()));
        }

        let record = self.table.upsert_wallet(user_id, address).await?;
        info!(user_id, address, "Linked wallet address");
        Ok(record)
    }

    /// Atomically credit `delta` to `currency_balances[currency]`.
    ///
    /// Fast path: one guarded add-and-fetch round trip, conditioned on the
    /// record and its balances container both existing - the steady state,
    /// since almost every record already carries the container.
    ///
    /// On a condition miss the record is re-read to find out why. A missing
    /// record is `UserNotFound`. A present record means only the container
    /// was missing (legacy record), so it is healed with an idempotent
    /// guarded default and the add is retried, now conditioned only on the
    /// record existing. A second miss means the record vanished between
    /// steps and is surfaced as `ConcurrentModification`. A failed heal
    /// write fails the whole operation; no partial credit is ever applied.
    pub async fn update_balance(
        &self,
        user_id: &str,
        currency: &str,
        delta: Decimal,
    ) -> Result<UserRecord> {
        let currency = currency.trim();
        if currency.is_empty() {
            return Err(RewardEngineError::InvalidArgument(
                "currency must not be blank".to_string(),
            ));
        }
        if delta <= Decimal::ZERO {
            return Err(RewardEngineError::InvalidArgument(
                "amount must be a positive number".to_string(),
            ));
        }

        // Step 1: optimistic direct path.
        if let Some(record) = self.table.add_balance(user_id, currency, delta, true).await? {
            return Ok(record);
        }

        // Step 2: the guard failed - find out which half of it.
        if self.table.fetch(user_id).await?.is_none() {
            return Err(RewardEngineError::UserNotFound(user_id.to_string()));
        }
        debug!(user_id, "Balances container missing, healing");
        if !self.table.ensure_container(user_id).await? {
            return Err(RewardEngineError::UserNotFound(user_id.to_string()));
        }

        // Step 3: the container now exists; retry guarded only on the record.
        match self.table.add_balance(user_id, currency, delta, false).await? {
            Some(record) => Ok(record),
            None => Err(RewardEngineError::ConcurrentModification(
                user_id.to_string(),
            )),
        }
    }

    /// Full scan, page by page. Test/reset tooling only: no atomicity across
    /// pages, best-effort snapshot.
    pub async fn get_all_users(&self) -> Result<Vec<UserRecord>> {
        let mut users = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let page = self.table.scan_page(after.as_deref(), SCAN_BATCH).await?;
            let Some(last) = page.last() else {
                break;
            };
            after = Some(last.user_id.clone());
            users.extend(page);
        }

        Ok(users)
    }

    /// Bulk delete in store-native batches. Test/reset tooling only;
    /// best-effort, concurrent writers may survive it.
    pub async fn clear_all(&self) -> Result<u64> {
        let mut removed = 0;
        loop {
            let n = self.table.delete_page(SCAN_BATCH).await?;
            if n == 0 {
                break;
            }
            removed += n;
        }
        if removed > 0 {
            info!(removed, "Cleared user records");
        }
        Ok(removed)
    }
}
