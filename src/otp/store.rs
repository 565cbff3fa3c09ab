//! Pending passcode storage, keyed strictly by email.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::Instrument;

/// The sole persisted entity of the OTP lifecycle.
///
/// At most one live record exists per email; a record is consumable while
/// the current time is at or before `expires_at_ms` and it has not been
/// deleted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OtpRecord {
    pub email: String,
    pub code: String,
    /// Absolute expiry, milliseconds since epoch.
    pub expires_at_ms: i64,
}

/// Keyed document store for pending codes.
///
/// `put` replaces unconditionally, so concurrent requests for the same
/// address are last-write-wins and only the most recently issued code is
/// ever valid. Expiry is not enforced here; staleness is checked lazily by
/// the service on read.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Upsert the pending record for `email`.
    async fn put(&self, email: &str, code: &str, expires_at_ms: i64) -> Result<()>;

    /// Fetch the pending record, if any.
    async fn get(&self, email: &str) -> Result<Option<OtpRecord>>;

    /// Remove the pending record. Deleting an absent record is not an error.
    async fn delete(&self, email: &str) -> Result<()>;

    /// Remove the record only if the stored code still matches, returning
    /// whether this call consumed it. Under concurrent verification only
    /// one caller observes `true`.
    async fn delete_if_matches(&self, email: &str, code: &str) -> Result<bool>;
}

/// Postgres-backed store over the `otp_codes` table.
pub struct PgOtpStore {
    pool: PgPool,
}

impl PgOtpStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OtpStore for PgOtpStore {
    async fn put(&self, email: &str, code: &str, expires_at_ms: i64) -> Result<()> {
        let query = r"
            INSERT INTO otp_codes (email, code, expires_at_ms)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET code = EXCLUDED.code,
                expires_at_ms = EXCLUDED.expires_at_ms,
                created_at = NOW()
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(email)
            .bind(code)
            .bind(expires_at_ms)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to store otp record")?;
        Ok(())
    }

    async fn get(&self, email: &str) -> Result<Option<OtpRecord>> {
        let query = "SELECT email, code, expires_at_ms FROM otp_codes WHERE email = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to fetch otp record")?;

        Ok(row.map(|row| OtpRecord {
            email: row.get("email"),
            code: row.get("code"),
            expires_at_ms: row.get("expires_at_ms"),
        }))
    }

    async fn delete(&self, email: &str) -> Result<()> {
        let query = "DELETE FROM otp_codes WHERE email = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(email)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete otp record")?;
        Ok(())
    }

    async fn delete_if_matches(&self, email: &str, code: &str) -> Result<bool> {
        // Per-key atomic consume: the row disappears for exactly one caller.
        let query = "DELETE FROM otp_codes WHERE email = $1 AND code = $2";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(email)
            .bind(code)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to consume otp record")?;
        Ok(result.rows_affected() > 0)
    }
}

/// In-process store for tests.
#[derive(Default)]
pub struct MemoryOtpStore {
    records: Mutex<HashMap<String, OtpRecord>>,
}

impl MemoryOtpStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn put(&self, email: &str, code: &str, expires_at_ms: i64) -> Result<()> {
        let mut records = self.records.lock().await;
        records.insert(
            email.to_string(),
            OtpRecord {
                email: email.to_string(),
                code: code.to_string(),
                expires_at_ms,
            },
        );
        Ok(())
    }

    async fn get(&self, email: &str) -> Result<Option<OtpRecord>> {
        let records = self.records.lock().await;
        Ok(records.get(email).cloned())
    }

    async fn delete(&self, email: &str) -> Result<()> {
        let mut records = self.records.lock().await;
        records.remove(email);
        Ok(())
    }

    async fn delete_if_matches(&self, email: &str, code: &str) -> Result<bool> {
        let mut records = self.records.lock().await;
        match records.get(email) {
            Some(record) if record.code == code => {
                records.remove(email);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[tokio::test]
    async fn put_overwrites_previous_record() -> Result<()> {
        let store = MemoryOtpStore::new();
        store.put("a@example.com", "1111", 10).await?;
        store.put("a@example.com", "2222", 20).await?;

        let record = store.get("a@example.com").await?;
        assert_eq!(
            record,
            Some(OtpRecord {
                email: "a@example.com".to_string(),
                code: "2222".to_string(),
                expires_at_ms: 20,
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn get_absent_is_none() -> Result<()> {
        let store = MemoryOtpStore::new();
        assert_eq!(store.get("nobody@example.com").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn delete_is_idempotent() -> Result<()> {
        let store = MemoryOtpStore::new();
        store.put("a@example.com", "1111", 10).await?;
        store.delete("a@example.com").await?;
        // Deleting again is not an error
        store.delete("a@example.com").await?;
        assert_eq!(store.get("a@example.com").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn delete_if_matches_consumes_only_on_match() -> Result<()> {
        let store = MemoryOtpStore::new();
        store.put("a@example.com", "1111", 10).await?;

        assert!(!store.delete_if_matches("a@example.com", "9999").await?);
        assert!(store.get("a@example.com").await?.is_some());

        assert!(store.delete_if_matches("a@example.com", "1111").await?);
        assert!(store.get("a@example.com").await?.is_none());

        // Already consumed
        assert!(!store.delete_if_matches("a@example.com", "1111").await?);
        Ok(())
    }
}
