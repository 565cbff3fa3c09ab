//! Identity lookup, provisioning, and credential minting.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

/// Lifetime of a minted bearer credential.
const CREDENTIAL_TTL_SECONDS: i64 = 12 * 60 * 60;

/// A durable user record keyed by email, independent of any single OTP cycle.
#[derive(Clone, Debug)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub email_verified: bool,
}

/// Capability to look up an identity, provision one, and mint credentials.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>>;

    /// Invoked only when `find_by_email` finds nothing. A freshly verified
    /// email is enough to provision a trusted identity.
    async fn create(&self, email: &str, email_verified: bool) -> Result<Identity>;

    /// Mint an opaque bearer token for the identity.
    async fn mint_credential(&self, identity_id: Uuid) -> Result<String>;
}

/// Generate the raw bearer token returned to the caller.
fn generate_bearer_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate bearer token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a bearer token so the raw value never touches the database.
fn hash_bearer_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Postgres-backed provider over the `identities` and `identity_tokens` tables.
pub struct PgIdentityProvider {
    pool: PgPool,
}

impl PgIdentityProvider {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let query = "SELECT id, email, email_verified FROM identities WHERE email = $1";
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
            .context("failed to lookup identity")?;

        Ok(row.map(|row| Identity {
            id: row.get("id"),
            email: row.get("email"),
            email_verified: row.get("email_verified"),
        }))
    }

    async fn create(&self, email: &str, email_verified: bool) -> Result<Identity> {
        let query = r"
            INSERT INTO identities (email, email_verified)
            VALUES ($1, $2)
            RETURNING id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .bind(email_verified)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(Identity {
                id: row.get("id"),
                email: email.to_string(),
                email_verified,
            }),
            Err(err) if is_unique_violation(&err) => {
                // Concurrent create for the same address; whoever inserted
                // first owns the row, so read it back.
                self.find_by_email(email)
                    .await?
                    .ok_or_else(|| anyhow!("identity vanished after unique violation"))
            }
            Err(err) => Err(err).context("failed to create identity"),
        }
    }

    async fn mint_credential(&self, identity_id: Uuid) -> Result<String> {
        // Generate a random token, store only its hash, and return the raw
        // value once to the caller.
        let query = r"
            INSERT INTO identity_tokens (identity_id, token_hash, expires_at)
            VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );

        for _ in 0..3 {
            let token = generate_bearer_token()?;
            let token_hash = hash_bearer_token(&token);
            let result = sqlx::query(query)
                .bind(identity_id)
                .bind(token_hash)
                .bind(CREDENTIAL_TTL_SECONDS)
                .execute(&self.pool)
                .instrument(span.clone())
                .await;

            match result {
                Ok(_) => return Ok(token),
                Err(err) if is_unique_violation(&err) => {}
                Err(err) => return Err(err).context("failed to insert bearer token"),
            }
        }

        Err(anyhow!("failed to generate unique bearer token"))
    }
}

/// In-process provider for tests. Minted tokens are not persisted
/// anywhere.
#[derive(Default)]
pub struct MemoryIdentityProvider {
    identities: Mutex<HashMap<String, Identity>>,
}

impl MemoryIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let identities = self.identities.lock().await;
        Ok(identities.get(email).cloned())
    }

    async fn create(&self, email: &str, email_verified: bool) -> Result<Identity> {
        let mut identities = self.identities.lock().await;
        let identity = identities
            .entry(email.to_string())
            .or_insert_with(|| Identity {
                id: Uuid::new_v4(),
                email: email.to_string(),
                email_verified,
            });
        Ok(identity.clone())
    }

    async fn mint_credential(&self, _identity_id: Uuid) -> Result<String> {
        generate_bearer_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn bearer_token_decodes_to_32_bytes() -> Result<()> {
        let token = generate_bearer_token()?;
        let decoded = Base64UrlUnpadded::decode_vec(&token)?;
        assert_eq!(decoded.len(), 32);
        Ok(())
    }

    #[test]
    fn hash_bearer_token_stable() {
        let first = hash_bearer_token("token");
        let second = hash_bearer_token("token");
        let different = hash_bearer_token("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
    }

    #[tokio::test]
    async fn memory_provider_creates_once_and_reuses() -> Result<()> {
        let provider = MemoryIdentityProvider::new();
        assert!(provider.find_by_email("a@example.com").await?.is_none());

        let created = provider.create("a@example.com", true).await?;
        assert!(created.email_verified);

        let found = provider
            .find_by_email("a@example.com")
            .await?
            .expect("identity should exist");
        assert_eq!(found.id, created.id);

        // A second create keeps the original id
        let again = provider.create("a@example.com", true).await?;
        assert_eq!(again.id, created.id);
        Ok(())
    }

    #[tokio::test]
    async fn memory_provider_mints_nonempty_tokens() -> Result<()> {
        let provider = MemoryIdentityProvider::new();
        let identity = provider.create("a@example.com", true).await?;
        let token = provider.mint_credential(identity.id).await?;
        assert!(!token.is_empty());
        Ok(())
    }
}
