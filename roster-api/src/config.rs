//! Process configuration read once from the environment at start-up.
//!
//! Database credentials and the session-signing secret are mandatory; a
//! missing value aborts start-up instead of surfacing on the first request.

use std::net::IpAddr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rocket::figment::Figment;
use sha2::{Digest, Sha512};
use thiserror::Error;

use crate::auth::{AuthConfig, AuthError};

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: usize,
}

impl DatabaseConfig {
    /// Connection URL with user and password percent-encoded.
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            urlencoding::encode(&self.user),
            urlencoding::encode(&self.password),
            self.host,
            self.port,
            urlencoding::encode(&self.name)
        )
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub address: IpAddr,
    pub port: u16,
    pub auth: AuthConfig,
    session_secret: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database", &self.database)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("auth", &self.auth)
            .field("session_secret", &"<redacted>")
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let session_secret = required("SESSION_SECRET")?;
        if session_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "SESSION_SECRET",
                reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
            });
        }

        let database = DatabaseConfig {
            host: required("DB_HOST")?,
            user: required("DB_USER")?,
            password: required("DB_PASSWORD")?,
            name: required("DB_NAME")?,
            port: parse_or(&lookup, "DB_PORT", 5432)?,
            max_connections: parse_or(&lookup, "ROSTER_DB_MAX_CONNECTIONS", 10)?,
        };

        let address = parse_or(&lookup, "ROSTER_ADDRESS", IpAddr::from([127, 0, 0, 1]))?;
        let port = parse_or(&lookup, "PORT", 5000)?;
        let auth = AuthConfig::from_lookup(&lookup)?;

        Ok(Self {
            database,
            address,
            port,
            auth,
            session_secret,
        })
    }

    /// Rocket's private-cookie key, stretched from the configured secret.
    pub fn secret_key(&self) -> String {
        derive_secret_key(&self.session_secret)
    }

    pub fn figment(&self) -> Figment {
        rocket::Config::figment()
            .merge(("address", self.address))
            .merge(("port", self.port))
            .merge(("secret_key", self.secret_key()))
            .merge(("databases.roster_db.url", self.database.url()))
            .merge((
                "databases.roster_db.max_connections",
                self.database.max_connections,
            ))
    }
}

/// 64-byte key material in the 88-character base64 form Rocket accepts for
/// `secret_key`.
pub fn derive_secret_key(secret: &str) -> String {
    let digest = Sha512::digest(secret.as_bytes());
    STANDARD.encode(digest)
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse::<T>().map_err(|err| ConfigError::Invalid {
            name,
            reason: err.to_string(),
        }),
        None => Ok(default),
    }
}
