//! Persistence of username → password-hash records.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rocket_db_pools::sqlx::{self, PgPool, Row};

use crate::auth::{AuthError, AuthResult};

#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

// The hash is not secret in the way a password is, but it has no business in
// log lines either.
impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Credential persistence. Implementations must make `create_credential`
/// atomic per username: of any number of concurrent calls for the same name,
/// exactly one returns `Ok`.
#[rocket::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn create_credential(&self, username: &str, password_hash: &str) -> AuthResult<()>;

    async fn find_credential(&self, username: &str) -> AuthResult<Option<CredentialRecord>>;
}

#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create_credential(&self, username: &str, password_hash: &str) -> AuthResult<()> {
        // The unique constraint decides the race; losers get no row back.
        let inserted: Option<i32> = sqlx::query_scalar(
            "INSERT INTO users (username, password_hash) VALUES ($1, $2) ON CONFLICT (username) DO NOTHING RETURNING id",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(_) => Ok(()),
            None => Err(AuthError::DuplicateUsername),
        }
    }

    async fn find_credential(&self, username: &str) -> AuthResult<Option<CredentialRecord>> {
        let row = sqlx::query(
            "SELECT username, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(CredentialRecord {
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            created_at: row.try_get("created_at")?,
        }))
    }
}

/// In-process store for tests and single-instance development setups.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    records: Arc<DashMap<String, CredentialRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[rocket::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create_credential(&self, username: &str, password_hash: &str) -> AuthResult<()> {
        // The entry guard holds the shard lock across check and insert.
        match self.records.entry(username.to_string()) {
            Entry::Occupied(_) => Err(AuthError::DuplicateUsername),
            Entry::Vacant(slot) => {
                slot.insert(CredentialRecord {
                    username: username.to_string(),
                    password_hash: password_hash.to_string(),
                    created_at: Utc::now(),
                });
                Ok(())
            }
        }
    }

    async fn find_credential(&self, username: &str) -> AuthResult<Option<CredentialRecord>> {
        Ok(self.records.get(username).map(|record| record.clone()))
    }
}
