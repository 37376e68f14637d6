//! Registration and credential verification.
//!
//! Hashing and verification are CPU-bound and run on the blocking pool so
//! they never stall the async workers serving unrelated connections.

use std::sync::Arc;

use crate::auth::credential_store::CredentialStore;
use crate::auth::passwords::PasswordService;
use crate::auth::{AuthError, AuthResult};

pub const MAX_USERNAME_CHARS: usize = 64;
pub const MAX_PASSWORD_BYTES: usize = 1024;

/// Proof that a username/password pair was verified. Only the
/// authenticator can mint one, and a session can only be issued from one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    username: String,
}

impl Authenticated {
    pub(crate) fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

#[derive(Clone)]
pub struct Authenticator {
    passwords: Arc<PasswordService>,
    credentials: Arc<dyn CredentialStore>,
}

impl Authenticator {
    pub fn new(passwords: Arc<PasswordService>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            passwords,
            credentials,
        }
    }

    pub async fn register_identity(&self, username: &str, password: &str) -> AuthResult<()> {
        validate_registration(username, password)?;

        let passwords = Arc::clone(&self.passwords);
        let plaintext = password.to_string();
        let hash =
            tokio::task::spawn_blocking(move || passwords.hash_password(&plaintext)).await??;

        self.credentials.create_credential(username, &hash).await?;
        log::info!("registered user '{}'", username);
        Ok(())
    }

    pub async fn verify_identity(&self, username: &str, password: &str) -> AuthResult<Authenticated> {
        if username.is_empty() || password.is_empty() || password.len() > MAX_PASSWORD_BYTES {
            return Err(AuthError::InvalidCredentials);
        }

        let record = self.credentials.find_credential(username).await?;

        let passwords = Arc::clone(&self.passwords);
        let plaintext = password.to_string();
        let stored_hash = record.as_ref().map(|record| record.password_hash.clone());
        let verified = tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => passwords.verify_password(&plaintext, &hash),
            None => passwords.verify_against_dummy(&plaintext),
        })
        .await??;

        match record {
            Some(record) if verified => Ok(Authenticated::new(record.username)),
            _ => {
                log::debug!("rejected login for '{}'", username);
                Err(AuthError::InvalidCredentials)
            }
        }
    }
}

fn validate_registration(username: &str, password: &str) -> AuthResult<()> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(AuthError::InvalidInput(
            "username and password are required".into(),
        ));
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(AuthError::InvalidInput(format!(
            "username must be at most {MAX_USERNAME_CHARS} characters"
        )));
    }
    if username.chars().any(char::is_control) {
        return Err(AuthError::InvalidInput(
            "username must not contain control characters".into(),
        ));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::InvalidInput(format!(
            "password must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::config::PasswordParams;
    use crate::auth::credential_store::MemoryCredentialStore;

    fn authenticator() -> (Authenticator, MemoryCredentialStore) {
        let passwords = PasswordService::with_params(PasswordParams {
            m_cost: 1024,
            t_cost: 1,
            p_cost: 1,
        })
        .expect("password service");
        let store = MemoryCredentialStore::new();
        let auth = Authenticator::new(Arc::new(passwords), Arc::new(store.clone()));
        (auth, store)
    }

    #[tokio::test]
    async fn register_then_verify_round_trip() {
        let (auth, _) = authenticator();
        auth.register_identity("alice", "secret123")
            .await
            .expect("registration");
        let identity = auth
            .verify_identity("alice", "secret123")
            .await
            .expect("verification");
        assert_eq!(identity.username(), "alice");
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_look_the_same() {
        let (auth, _) = authenticator();
        auth.register_identity("alice", "secret123")
            .await
            .expect("registration");

        let wrong_password = auth.verify_identity("alice", "wrong").await.unwrap_err();
        let unknown_user = auth.verify_identity("mallory", "secret123").await.unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_user, AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert_eq!(wrong_password.status(), unknown_user.status());
    }

    #[tokio::test]
    async fn rejects_blank_fields() {
        let (auth, store) = authenticator();
        for (username, password) in [("", "secret123"), ("   ", "secret123"), ("alice", "")] {
            let err = auth.register_identity(username, password).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidInput(_)), "{username:?}/{password:?}");
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn rejects_oversized_fields() {
        let (auth, _) = authenticator();
        let long_name = "a".repeat(MAX_USERNAME_CHARS + 1);
        let long_password = "p".repeat(MAX_PASSWORD_BYTES + 1);
        assert!(matches!(
            auth.register_identity(&long_name, "secret123").await,
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            auth.register_identity("alice", &long_password).await,
            Err(AuthError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn second_registration_is_duplicate() {
        let (auth, store) = authenticator();
        auth.register_identity("alice", "secret123")
            .await
            .expect("registration");
        let err = auth.register_identity("alice", "other").await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUsername));

        // The original password still works.
        auth.verify_identity("alice", "secret123")
            .await
            .expect("original credential intact");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn stored_record_never_contains_plaintext() {
        let (auth, store) = authenticator();
        auth.register_identity("alice", "secret123")
            .await
            .expect("registration");
        let record = store
            .find_credential("alice")
            .await
            .expect("lookup")
            .expect("present");
        assert!(!record.password_hash.contains("secret123"));
        assert!(!record.username.contains("secret123"));
    }

    #[tokio::test]
    async fn concurrent_registration_has_one_winner() {
        let (auth, _) = authenticator();
        let mut handles = Vec::new();
        for n in 0..8 {
            let auth = auth.clone();
            handles.push(tokio::spawn(async move {
                auth.register_identity("carol", &format!("password-{n}")).await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            match handle.await.expect("join") {
                Ok(()) => wins += 1,
                Err(AuthError::DuplicateUsername) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(wins, 1);
    }
}
