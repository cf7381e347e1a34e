//! SQLite-backed credential store.
//!
//! One row per wallet address. Every mutation is a single statement, so a
//! crash can never leave a record with half-applied fields, and workers
//! touching distinct addresses do not interfere.

use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::domain::{WalletRecord, CLAIM_TIME_FORMAT};
use crate::error::{BotError, Result};

/// SQLite storage adapter
#[derive(Clone)]
pub struct AccountStore {
    pool: SqlitePool,
}

impl AccountStore {
    /// Open (and create if missing) the account database
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        info!("Connected to account store");
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create the schema idempotently
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                address TEXT PRIMARY KEY,
                private_key TEXT NOT NULL,
                session_token TEXT,
                app_token TEXT,
                last_claim_time TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_accounts_last_claim ON accounts(last_claim_time)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ==================== Accounts ====================

    /// Register a wallet. Re-adding an existing address is a no-op; returns
    /// whether a new row was created.
    #[instrument(skip(self, private_key))]
    pub async fn add_account(&self, address: &str, private_key: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (address, private_key)
            VALUES (?1, ?2)
            ON CONFLICT(address) DO NOTHING
            "#,
        )
        .bind(address)
        .bind(private_key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get a wallet record by address
    pub async fn get_account(&self, address: &str) -> Result<Option<WalletRecord>> {
        let row = sqlx::query(
            r#"
            SELECT address, private_key, session_token, app_token,
                   last_claim_time, created_at, updated_at
            FROM accounts WHERE address = ?1
            "#,
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| WalletRecord {
            address: r.get("address"),
            private_key: r.get("private_key"),
            session_token: r.get("session_token"),
            app_token: r.get("app_token"),
            last_claim_time: WalletRecord::parse_claim_time(
                r.get::<Option<String>, _>("last_claim_time").as_deref(),
            ),
            created_at: WalletRecord::parse_claim_time(
                r.get::<Option<String>, _>("created_at").as_deref(),
            ),
            updated_at: WalletRecord::parse_claim_time(
                r.get::<Option<String>, _>("updated_at").as_deref(),
            ),
        }))
    }

    /// All wallet records, oldest first
    pub async fn list_accounts(&self) -> Result<Vec<WalletRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT address, private_key, session_token, app_token,
                   last_claim_time, created_at, updated_at
            FROM accounts ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| WalletRecord {
                address: r.get("address"),
                private_key: r.get("private_key"),
                session_token: r.get("session_token"),
                app_token: r.get("app_token"),
                last_claim_time: WalletRecord::parse_claim_time(
                    r.get::<Option<String>, _>("last_claim_time").as_deref(),
                ),
                created_at: WalletRecord::parse_claim_time(
                    r.get::<Option<String>, _>("created_at").as_deref(),
                ),
                updated_at: WalletRecord::parse_claim_time(
                    r.get::<Option<String>, _>("updated_at").as_deref(),
                ),
            })
            .collect())
    }

    // ==================== Session state ====================

    /// Persist both bearer tokens as a unit. A login that produced an
    /// application token always also produced a session token, and a single
    /// UPDATE keeps the pair from ever being observed half-written.
    #[instrument(skip(self, session_token, app_token))]
    pub async fn update_tokens(
        &self,
        address: &str,
        session_token: &str,
        app_token: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET session_token = ?1,
                app_token = ?2,
                updated_at = CURRENT_TIMESTAMP
            WHERE address = ?3
            "#,
        )
        .bind(session_token)
        .bind(app_token)
        .bind(address)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BotError::Internal(format!(
                "no account row for {} while persisting tokens",
                address
            )));
        }
        Ok(())
    }

    /// Record a successful claim at the given reference-zone local time.
    ///
    /// The guard keeps `last_claim_time` monotonically non-decreasing even if
    /// a slow worker finishes after a newer claim already landed.
    #[instrument(skip(self))]
    pub async fn update_claim_time(&self, address: &str, at: NaiveDateTime) -> Result<()> {
        let formatted = at.format(CLAIM_TIME_FORMAT).to_string();

        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET last_claim_time = ?1,
                updated_at = CURRENT_TIMESTAMP
            WHERE address = ?2
              AND (last_claim_time IS NULL OR last_claim_time <= ?1)
            "#,
        )
        .bind(&formatted)
        .bind(address)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            if self.get_account(address).await?.is_none() {
                return Err(BotError::Internal(format!(
                    "no account row for {} while recording claim",
                    address
                )));
            }
            debug!(%address, %formatted, "claim time older than stored value, ignored");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    async fn memory_store() -> AccountStore {
        AccountStore::new("sqlite::memory:", 1).await.unwrap()
    }

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn add_account_is_idempotent() {
        let store = memory_store().await;

        assert!(store.add_account("0xabc", "key1").await.unwrap());
        assert!(!store.add_account("0xabc", "key1").await.unwrap());

        let record = store.get_account("0xabc").await.unwrap().unwrap();
        assert_eq!(record.private_key, "key1");
        assert!(record.session_token.is_none());
        assert!(record.last_claim_time.is_none());
    }

    #[tokio::test]
    async fn tokens_are_written_as_a_pair() {
        let store = memory_store().await;
        store.add_account("0xabc", "key1").await.unwrap();

        store
            .update_tokens("0xabc", "session-jwt", "app-jwt")
            .await
            .unwrap();

        let record = store.get_account("0xabc").await.unwrap().unwrap();
        assert_eq!(record.session_token.as_deref(), Some("session-jwt"));
        assert_eq!(record.app_token.as_deref(), Some("app-jwt"));
    }

    #[tokio::test]
    async fn token_update_for_unknown_address_is_an_error() {
        let store = memory_store().await;
        let err = store.update_tokens("0xmissing", "s", "a").await.unwrap_err();
        assert!(matches!(err, BotError::Internal(_)));
    }

    #[tokio::test]
    async fn claim_time_is_monotonic() {
        let store = memory_store().await;
        store.add_account("0xabc", "key1").await.unwrap();

        let later = local(2025, 6, 2, 9, 30);
        let earlier = local(2025, 6, 1, 9, 30);

        store.update_claim_time("0xabc", later).await.unwrap();
        // A stale worker reporting an older claim must not move time backwards
        store.update_claim_time("0xabc", earlier).await.unwrap();

        let record = store.get_account("0xabc").await.unwrap().unwrap();
        assert_eq!(record.last_claim_time, Some(later));
    }

    #[tokio::test]
    async fn claim_time_for_unknown_address_is_an_error() {
        let store = memory_store().await;
        let err = store
            .update_claim_time("0xmissing", local(2025, 6, 1, 9, 30))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Internal(_)));
    }

    #[tokio::test]
    async fn list_accounts_returns_all_rows() {
        let store = memory_store().await;
        store.add_account("0xaaa", "k1").await.unwrap();
        store.add_account("0xbbb", "k2").await.unwrap();

        let all = store.list_accounts().await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
