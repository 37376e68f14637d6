//! Authentication module: configuration, credential storage and hashing,
//! session lifecycle, the Rocket request guard, and HTTP route handlers.

use std::sync::Arc;

pub mod authenticator;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod guards;
pub mod passwords;
pub mod responses;
pub mod routes;
pub mod session;
pub mod session_store;

pub use authenticator::{Authenticated, Authenticator};
pub use config::{AuthConfig, PasswordParams, SessionBackend};
pub use credential_store::{
    CredentialRecord, CredentialStore, MemoryCredentialStore, PgCredentialStore,
};
pub use error::{AuthError, AuthResult};
pub use guards::AuthUser;
pub use passwords::PasswordService;
pub use session::{GuardDecision, Identity, SessionGate};
pub use session_store::{MemorySessionStore, PgSessionStore, SessionStore};

#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub authenticator: Authenticator,
    pub sessions: SessionGate,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        password_service: PasswordService,
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let authenticator = Authenticator::new(Arc::new(password_service), credentials);
        let sessions = SessionGate::new(sessions, &config);
        Self {
            config,
            authenticator,
            sessions,
        }
    }
}
