//! Server-side session records.
//!
//! A session token has the form `<uuid>.<secret>`. Only a salted SHA-512 of
//! the secret is stored, so a leaked table cannot be replayed as cookies.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::RngCore;
use rocket_db_pools::sqlx::{self, PgPool, Row};
use sha2::{Digest, Sha512};
use uuid::Uuid;

use crate::auth::{AuthError, AuthResult};

const SECRET_LEN: usize = 32;
const SALT_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct SessionIssued {
    pub token_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[rocket::async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(
        &self,
        username: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> AuthResult<SessionIssued>;

    /// Username bound to a live session, or `None` when the token is
    /// malformed, unknown, expired or does not match the stored hash.
    async fn lookup(&self, token: &str, now: DateTime<Utc>) -> AuthResult<Option<String>>;

    /// Returns whether a session was removed. Unknown tokens are not an error.
    async fn revoke(&self, token: &str) -> AuthResult<bool>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl SessionStore for PgSessionStore {
    async fn create(
        &self,
        username: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> AuthResult<SessionIssued> {
        let minted = MintedToken::generate();
        let expires_at = expiry(now, ttl)?;

        sqlx::query(
            "INSERT INTO user_sessions (token_id, username, hashed_token, created_at, expires_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(minted.token_id)
        .bind(username)
        .bind(&minted.stored_hash)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(minted.issue(expires_at))
    }

    async fn lookup(&self, token: &str, now: DateTime<Utc>) -> AuthResult<Option<String>> {
        let Some(parsed) = ParsedSessionToken::parse(token) else {
            return Ok(None);
        };

        let row = sqlx::query(
            "SELECT username, hashed_token, expires_at FROM user_sessions WHERE token_id = $1",
        )
        .bind(parsed.token_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let username: String = row.try_get("username")?;
        let hashed: String = row.try_get("hashed_token")?;
        let expires_at: DateTime<Utc> = row.try_get("expires_at")?;

        if expires_at <= now || !verify_secret(&parsed.secret, &hashed) {
            return Ok(None);
        }

        Ok(Some(username))
    }

    async fn revoke(&self, token: &str) -> AuthResult<bool> {
        let Some(parsed) = ParsedSessionToken::parse(token) else {
            return Ok(false);
        };

        let result = sqlx::query("DELETE FROM user_sessions WHERE token_id = $1")
            .bind(parsed.token_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
struct MemorySession {
    username: String,
    hashed_token: String,
    expires_at: DateTime<Utc>,
}

/// Process-local session store. Entries are keyed by token id, so
/// concurrent sessions never contend on the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<DashMap<Uuid, MemorySession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[rocket::async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(
        &self,
        username: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> AuthResult<SessionIssued> {
        let minted = MintedToken::generate();
        let expires_at = expiry(now, ttl)?;
        self.sessions.insert(
            minted.token_id,
            MemorySession {
                username: username.to_string(),
                hashed_token: minted.stored_hash.clone(),
                expires_at,
            },
        );
        Ok(minted.issue(expires_at))
    }

    async fn lookup(&self, token: &str, now: DateTime<Utc>) -> AuthResult<Option<String>> {
        let Some(parsed) = ParsedSessionToken::parse(token) else {
            return Ok(None);
        };
        let Some(session) = self.sessions.get(&parsed.token_id) else {
            return Ok(None);
        };
        if session.expires_at <= now || !verify_secret(&parsed.secret, &session.hashed_token) {
            return Ok(None);
        }
        Ok(Some(session.username.clone()))
    }

    async fn revoke(&self, token: &str) -> AuthResult<bool> {
        let Some(parsed) = ParsedSessionToken::parse(token) else {
            return Ok(false);
        };
        Ok(self.sessions.remove(&parsed.token_id).is_some())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.expires_at > now);
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }
}

struct MintedToken {
    token_id: Uuid,
    secret: String,
    stored_hash: String,
}

impl MintedToken {
    fn generate() -> Self {
        let token_id = Uuid::new_v4();
        let secret = generate_secret();
        let salt = generate_salt();
        let stored_hash = encode_hash(&salt, &hash_secret(&secret, &salt));
        Self {
            token_id,
            secret,
            stored_hash,
        }
    }

    fn issue(self, expires_at: DateTime<Utc>) -> SessionIssued {
        SessionIssued {
            token_id: self.token_id,
            token: format!("{}.{}", self.token_id, self.secret),
            expires_at,
        }
    }
}

#[derive(Debug)]
struct ParsedSessionToken {
    token_id: Uuid,
    secret: String,
}

impl ParsedSessionToken {
    fn parse(token: &str) -> Option<Self> {
        let (token_id, secret) = token.split_once('.')?;
        let token_id = token_id.parse::<Uuid>().ok()?;
        if secret.is_empty() {
            return None;
        }
        Some(Self {
            token_id,
            secret: secret.to_string(),
        })
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> AuthResult<DateTime<Utc>> {
    now.checked_add_signed(ttl).ok_or_else(|| {
        AuthError::Config(format!("session lifetime of {ttl} overflows the clock"))
    })
}

fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD_NO_PAD.encode(bytes)
}

fn generate_salt() -> [u8; SALT_LEN] {
    let mut bytes = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

fn hash_secret(secret: &str, salt: &[u8]) -> Vec<u8> {
    let mut hasher = Sha512::new();
    hasher.update(salt);
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn encode_hash(salt: &[u8], hash: &[u8]) -> String {
    let salt_b64 = STANDARD_NO_PAD.encode(salt);
    let hash_b64 = STANDARD_NO_PAD.encode(hash);
    format!("{}${}", salt_b64, hash_b64)
}

fn verify_secret(secret: &str, stored: &str) -> bool {
    let Some((salt_b64, hash_b64)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (
        STANDARD_NO_PAD.decode(salt_b64),
        STANDARD_NO_PAD.decode(hash_b64),
    ) else {
        return false;
    };
    let candidate = hash_secret(secret, &salt);
    constant_time_eq::constant_time_eq(&candidate, &expected)
}

mod constant_time_eq {
    /// Constant-time comparison to avoid timing side-channels.
    pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
        if a.len() != b.len() {
            return false;
        }

        let mut result: u8 = 0;
        for (&x, &y) in a.iter().zip(b.iter()) {
            result |= x ^ y;
        }

        result == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issued_token_resolves_to_username() {
        let store = MemorySessionStore::new();
        let now = Utc::now();
        let issued = store
            .create("alice", now, Duration::minutes(5))
            .await
            .expect("create");
        assert!(issued.token.starts_with(&issued.token_id.to_string()));
        assert_eq!(
            store.lookup(&issued.token, now).await.expect("lookup"),
            Some("alice".to_string())
        );
    }

    #[tokio::test]
    async fn tampered_or_malformed_tokens_resolve_to_nothing() {
        let store = MemorySessionStore::new();
        let now = Utc::now();
        let issued = store
            .create("alice", now, Duration::minutes(5))
            .await
            .expect("create");

        let forged = format!("{}.{}", issued.token_id, "A".repeat(43));
        let missing_secret = format!("{}.", issued.token_id);
        for token in [
            forged.as_str(),
            missing_secret.as_str(),
            "",
            "garbage",
            "not-a-uuid.secret",
        ] {
            assert_eq!(store.lookup(token, now).await.expect("lookup"), None, "{token}");
        }
    }

    #[tokio::test]
    async fn expired_sessions_are_invisible_and_purged() {
        let store = MemorySessionStore::new();
        let now = Utc::now();
        let issued = store
            .create("alice", now, Duration::seconds(30))
            .await
            .expect("create");
        let later = now + Duration::seconds(31);
        assert_eq!(store.lookup(&issued.token, later).await.expect("lookup"), None);
        assert_eq!(store.purge_expired(later).await.expect("purge"), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let store = MemorySessionStore::new();
        let now = Utc::now();
        let issued = store
            .create("alice", now, Duration::minutes(5))
            .await
            .expect("create");
        assert!(store.revoke(&issued.token).await.expect("revoke"));
        assert!(!store.revoke(&issued.token).await.expect("revoke again"));
        assert!(!store.revoke("garbage").await.expect("revoke garbage"));
        assert_eq!(store.lookup(&issued.token, now).await.expect("lookup"), None);
    }

    #[tokio::test]
    async fn sessions_are_isolated_from_each_other() {
        let store = MemorySessionStore::new();
        let now = Utc::now();
        let alice = store
            .create("alice", now, Duration::minutes(5))
            .await
            .expect("create");
        let bob = store
            .create("bob", now, Duration::minutes(5))
            .await
            .expect("create");

        store.revoke(&bob.token).await.expect("revoke");
        assert_eq!(
            store.lookup(&alice.token, now).await.expect("lookup"),
            Some("alice".to_string())
        );
        assert_ne!(alice.token_id, bob.token_id);
    }

    #[tokio::test]
    async fn overflowing_lifetime_is_an_error_not_a_panic() {
        let store = MemorySessionStore::new();
        let err = store
            .create("alice", Utc::now(), Duration::days(365 * 1_000_000))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn stored_hash_does_not_contain_secret() {
        let minted = MintedToken::generate();
        assert!(!minted.stored_hash.contains(&minted.secret));
        assert!(verify_secret(&minted.secret, &minted.stored_hash));
        assert!(!verify_secret("other", &minted.stored_hash));
    }
}
