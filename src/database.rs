//! PostgreSQL implementation of the user table.
//!
//! The balances document lives in a nullable JSONB column on the same row as
//! the wallet link. Every mutation is a single conditional statement; the
//! `WHERE` clause is the server-checked precondition, and `RETURNING` makes
//! each write an add-and-fetch. Balance values are stored as decimal strings
//! inside the JSONB document and cast to `numeric` for arithmetic, so no
//! float ever touches an amount.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::errors::Result;
use crate::models::UserRecord;
use crate::store::UserTable;

const COLUMNS: &str = "user_id, wallet_address, currency_balances, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: String,
    wallet_address: Option<String>,
    currency_balances: Option<Json<BTreeMap<String, Decimal>>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        UserRecord {
            user_id: row.user_id,
            wallet_address: row.wallet_address,
            currency_balances: row.currency_balances.map(|json| json.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct PgUserTable {
    pool: PgPool,
}

impl PgUserTable {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(PgUserTable { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| sqlx::Error::Migrate(Box::new(e)))?;
        Ok(())
    }
}

#[async_trait]
impl UserTable for PgUserTable {
    async fn fetch(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserRecord::from))
    }

    async fn upsert_wallet(&self, user_id: &str, address: &str) -> Result<UserRecord> {
        let now = Utc::now();

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (user_id, wallet_address, currency_balances, created_at, updated_at)
            VALUES ($1, $2, NULL, $3, $3)
            ON CONFLICT (user_id)
            DO UPDATE SET wallet_address = EXCLUDED.wallet_address,
                          updated_at = EXCLUDED.updated_at
            RETURNING {COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(address)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn add_balance(
        &self,
        user_id: &str,
        currency: &str,
        delta: Decimal,
        require_container: bool,
    ) -> Result<Option<UserRecord>> {
        let now = Utc::now();

        // Both forms are one atomic add-and-fetch; the strict form's WHERE
        // clause doubles as the "container exists" precondition.
        let sql = if require_container {
            format!(
                r#"
                UPDATE users
                SET currency_balances = jsonb_set(
                        currency_balances,
                        ARRAY[$2],
                        to_jsonb(((COALESCE(currency_balances ->> $2, '0'))::numeric + $3)::text)
                    ),
                    updated_at = $4
                WHERE user_id = $1 AND currency_balances IS NOT NULL
                RETURNING {COLUMNS}
                "#
            )
        } else {
            format!(
                r#"
                UPDATE users
                SET currency_balances = jsonb_set(
                        COALESCE(currency_balances, '{{}}'::jsonb),
                        ARRAY[$2],
                        to_jsonb(((COALESCE(currency_balances ->> $2, '0'))::numeric + $3)::text)
                    ),
                    updated_at = $4
                WHERE user_id = $1
                RETURNING {COLUMNS}
                "#
            )
        };

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .bind(currency)
            .bind(delta)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(UserRecord::from))
    }

    async fn ensure_container(&self, user_id: &str) -> Result<bool> {
        // COALESCE keeps a container written by a concurrent healer intact;
        // zero rows affected means the record itself is gone.
        let result = sqlx::query(
            r#"
            UPDATE users
            SET currency_balances = COALESCE(currency_balances, '{}'::jsonb),
                updated_at = $2
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn scan_page(&self, after: Option<&str>, limit: i64) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {COLUMNS} FROM users
            WHERE $1::text IS NULL OR user_id > $1
            ORDER BY user_id
            LIMIT $2
            "#
        ))
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(UserRecord::from).collect())
    }

    async fn delete_page(&self, limit: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM users
            WHERE user_id IN (SELECT user_id FROM users ORDER BY user_id LIMIT $1)
            "#,
        )
        .bind(limit)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
