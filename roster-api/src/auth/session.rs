//! Per-connection session lifecycle and the authorization decision used by
//! protected routes.
//!
//! A connection is identified by its cookie jar. The session token lives in a
//! private cookie (encrypted and authenticated with the Rocket secret key);
//! the server-side record lives in a [`SessionStore`]. Every operation comes
//! in two flavours: one over the raw token, one over the cookie jar.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rocket::http::{Cookie, CookieJar, SameSite};
use time::Duration as TimeDuration;

use crate::auth::authenticator::Authenticated;
use crate::auth::config::{AuthConfig, MAX_SESSION_TTL_SECS};
use crate::auth::session_store::{SessionIssued, SessionStore};
use crate::auth::AuthResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Authenticated(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow(String),
    Deny,
}

#[derive(Clone)]
pub struct SessionGate {
    store: Arc<dyn SessionStore>,
    cookie_name: String,
    cookie_secure: bool,
    ttl: Duration,
}

impl SessionGate {
    pub fn new(store: Arc<dyn SessionStore>, config: &AuthConfig) -> Self {
        Self {
            store,
            cookie_name: config.session_cookie_name.clone(),
            cookie_secure: config.cookie_secure,
            ttl: Duration::seconds(config.session_ttl_secs.clamp(1, MAX_SESSION_TTL_SECS)),
        }
    }

    /// Binds a fresh session to `identity`, revoking `previous` first so a
    /// re-login replaces rather than stacks.
    pub async fn issue(
        &self,
        previous: Option<&str>,
        identity: &Authenticated,
    ) -> AuthResult<SessionIssued> {
        if let Some(previous) = previous {
            self.store.revoke(previous).await?;
        }
        self.store
            .create(identity.username(), Utc::now(), self.ttl)
            .await
    }

    pub async fn identity_for(&self, token: Option<&str>) -> AuthResult<Identity> {
        let Some(token) = token else {
            return Ok(Identity::Anonymous);
        };
        Ok(match self.store.lookup(token, Utc::now()).await? {
            Some(username) => Identity::Authenticated(username),
            None => Identity::Anonymous,
        })
    }

    pub async fn destroy(&self, token: Option<&str>) -> AuthResult<()> {
        if let Some(token) = token {
            self.store.revoke(token).await?;
        }
        Ok(())
    }

    pub async fn decide(&self, token: Option<&str>) -> AuthResult<GuardDecision> {
        Ok(match self.identity_for(token).await? {
            Identity::Authenticated(username) => GuardDecision::Allow(username),
            Identity::Anonymous => GuardDecision::Deny,
        })
    }

    /// The cookie is only set once the server-side record exists, so a
    /// failed store write leaves the connection anonymous.
    pub async fn issue_session(
        &self,
        cookies: &CookieJar<'_>,
        identity: &Authenticated,
    ) -> AuthResult<SessionIssued> {
        let previous = self.token_from(cookies);
        let issued = self.issue(previous.as_deref(), identity).await?;
        cookies.add_private(self.session_cookie(issued.token.clone()));
        log::info!("issued session for '{}'", identity.username());
        Ok(issued)
    }

    pub async fn current_identity(&self, cookies: &CookieJar<'_>) -> AuthResult<Identity> {
        let token = self.token_from(cookies);
        self.identity_for(token.as_deref()).await
    }

    /// The cookie is dropped before the store is touched: if revocation
    /// fails the client still ends up anonymous.
    pub async fn destroy_session(&self, cookies: &CookieJar<'_>) -> AuthResult<()> {
        let token = self.token_from(cookies);
        if token.is_some() {
            cookies.remove_private(
                Cookie::build((self.cookie_name.clone(), String::new())).path("/"),
            );
        }
        self.destroy(token.as_deref()).await
    }

    pub async fn guard(&self, cookies: &CookieJar<'_>) -> AuthResult<GuardDecision> {
        let token = self.token_from(cookies);
        self.decide(token.as_deref()).await
    }

    pub async fn purge_expired(&self) -> AuthResult<u64> {
        self.store.purge_expired(Utc::now()).await
    }

    fn token_from(&self, cookies: &CookieJar<'_>) -> Option<String> {
        cookies
            .get_private(&self.cookie_name)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    }

    fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.cookie_secure)
            .max_age(TimeDuration::seconds(self.ttl.num_seconds()))
            .build()
    }
}
