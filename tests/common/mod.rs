#![allow(dead_code)]

//! In-memory doubles for the user table and the token gateway. The table
//! mirrors the conditional-write semantics of the real store (each primitive
//! is atomic; preconditions are checked under the same lock as the mutation)
//! and counts calls so tests can assert that invalid input never reaches it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use alloy::primitives::{Address, U256};
use reward_engine::chain::{TokenGateway, TransferOutcome};
use reward_engine::errors::{Result, RewardEngineError};
use reward_engine::models::UserRecord;
use reward_engine::store::UserTable;

#[derive(Default)]
pub struct CallCounts {
    pub fetch: AtomicUsize,
    pub upsert_wallet: AtomicUsize,
    pub add_balance: AtomicUsize,
    pub ensure_container: AtomicUsize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.fetch.load(Ordering::SeqCst)
            + self.upsert_wallet.load(Ordering::SeqCst)
            + self.add_balance.load(Ordering::SeqCst)
            + self.ensure_container.load(Ordering::SeqCst)
    }
}

struct StoredUser {
    wallet_address: Option<String>,
    balances: Option<BTreeMap<String, Decimal>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoredUser {
    fn to_record(&self, user_id: &str) -> UserRecord {
        UserRecord {
            user_id: user_id.to_string(),
            wallet_address: self.wallet_address.clone(),
            currency_balances: self.balances.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Default)]
pub struct MemoryUserTable {
    rows: Mutex<HashMap<String, StoredUser>>,
    pub calls: CallCounts,
    /// Every operation fails with a transport error while set.
    pub unavailable: AtomicBool,
    /// Deletes the row at the end of `ensure_container`, reproducing the
    /// record-vanished-between-steps race deterministically.
    pub vanish_after_ensure: AtomicBool,
    /// How many times the balances container was actually initialized.
    pub container_inits: AtomicUsize,
}

impl MemoryUserTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_user(
        &self,
        user_id: &str,
        wallet_address: Option<&str>,
        balances: Option<BTreeMap<String, Decimal>>,
    ) {
        let now = Utc::now();
        self.rows.lock().unwrap().insert(
            user_id.to_string(),
            StoredUser {
                wallet_address: wallet_address.map(str::to_string),
                balances,
                created_at: now,
                updated_at: now,
            },
        );
    }

    pub fn stored(&self, user_id: &str) -> Option<UserRecord> {
        self.rows
            .lock()
            .unwrap()
            .get(user_id)
            .map(|row| row.to_record(user_id))
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RewardEngineError::StoreUnavailable(
                sqlx::Error::PoolTimedOut,
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl UserTable for MemoryUserTable {
    async fn fetch(&self, user_id: &str) -> Result<Option<UserRecord>> {
        self.calls.fetch.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.stored(user_id))
    }

    async fn upsert_wallet(&self, user_id: &str, address: &str) -> Result<UserRecord> {
        self.calls.upsert_wallet.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let now = Utc::now();
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .entry(user_id.to_string())
            .and_modify(|row| {
                row.wallet_address = Some(address.to_string());
                row.updated_at = now;
            })
            .or_insert_with(|| StoredUser {
                wallet_address: Some(address.to_string()),
                balances: None,
                created_at: now,
                updated_at: now,
            });
        Ok(row.to_record(user_id))
    }

    async fn add_balance(
        &self,
        user_id: &str,
        currency: &str,
        delta: Decimal,
        require_container: bool,
    ) -> Result<Option<UserRecord>> {
        self.calls.add_balance.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(user_id) else {
            return Ok(None);
        };
        if require_container && row.balances.is_none() {
            return Ok(None);
        }

        let balances = row.balances.get_or_insert_with(BTreeMap::new);
        *balances.entry(currency.to_string()).or_insert(Decimal::ZERO) += delta;
        row.updated_at = Utc::now();
        Ok(Some(row.to_record(user_id)))
    }

    async fn ensure_container(&self, user_id: &str) -> Result<bool> {
        self.calls.ensure_container.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(user_id) else {
            return Ok(false);
        };
        if row.balances.is_none() {
            row.balances = Some(BTreeMap::new());
            self.container_inits.fetch_add(1, Ordering::SeqCst);
        }
        row.updated_at = Utc::now();

        if self.vanish_after_ensure.load(Ordering::SeqCst) {
            rows.remove(user_id);
        }
        Ok(true)
    }

    async fn scan_page(&self, after: Option<&str>, limit: i64) -> Result<Vec<UserRecord>> {
        self.check_available()?;

        let rows = self.rows.lock().unwrap();
        let mut ids: Vec<&String> = rows
            .keys()
            .filter(|id| after.map_or(true, |a| id.as_str() > a))
            .collect();
        ids.sort();
        Ok(ids
            .into_iter()
            .take(limit as usize)
            .map(|id| rows[id].to_record(id))
            .collect())
    }

    async fn delete_page(&self, limit: i64) -> Result<u64> {
        self.check_available()?;

        let mut rows = self.rows.lock().unwrap();
        let mut ids: Vec<String> = rows.keys().cloned().collect();
        ids.sort();
        let victims: Vec<String> = ids.into_iter().take(limit as usize).collect();
        for id in &victims {
            rows.remove(id);
        }
        Ok(victims.len() as u64)
    }
}

/// Gateway stub for HTTP-level tests: fixed metadata, programmable liquidity
/// answer, call counter on `transfer`.
pub struct StubGateway {
    pub sufficient: AtomicBool,
    pub transfer_calls: AtomicUsize,
}

impl StubGateway {
    pub fn new(sufficient: bool) -> Self {
        StubGateway {
            sufficient: AtomicBool::new(sufficient),
            transfer_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TokenGateway for StubGateway {
    fn admin_address(&self) -> Address {
        Address::repeat_byte(0xAA)
    }

    async fn balance_of(&self, _token: Address, _owner: Address) -> Result<U256> {
        Ok(U256::MAX)
    }

    async fn decimals_of(&self, _token: Address) -> u8 {
        18
    }

    async fn name_of(&self, _token: Address) -> String {
        "Test Token".to_string()
    }

    async fn symbol_of(&self, _token: Address) -> String {
        "TEST".to_string()
    }

    async fn has_sufficient_balance(&self, _token: Address, _human_amount: &str) -> Result<bool> {
        Ok(self.sufficient.load(Ordering::SeqCst))
    }

    async fn transfer(
        &self,
        _token: Address,
        _recipient: Address,
        _human_amount: &str,
    ) -> Result<TransferOutcome> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TransferOutcome {
            tx_hash: "0xfeedfacefeedfacefeedfacefeedfacefeedfacefeedfacefeedfacefeedface"
                .to_string(),
            block_number: Some(42),
        })
    }
}
