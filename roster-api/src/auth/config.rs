use crate::auth::{AuthError, AuthResult};

/// Longest accepted session lifetime: one year.
pub const MAX_SESSION_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// Backend used to persist issued sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    /// Process-local map; sessions are lost on restart and not shared
    /// between instances.
    Memory,
    /// `user_sessions` table, shared by every instance using the database.
    Postgres,
}

impl SessionBackend {
    fn parse(value: &str) -> AuthResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(SessionBackend::Memory),
            "postgres" | "pg" => Ok(SessionBackend::Postgres),
            other => Err(AuthError::Config(format!(
                "unsupported ROSTER_SESSION_BACKEND '{other}', expected 'memory' or 'postgres'"
            ))),
        }
    }
}

/// Argon2id work factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for PasswordParams {
    fn default() -> Self {
        Self {
            m_cost: 19 * 1024, // 19 MiB
            t_cost: 2,
            p_cost: 1,
        }
    }
}

/// Authentication configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub session_cookie_name: String,
    pub session_ttl_secs: i64,
    pub session_purge_interval_secs: u64,
    pub session_backend: SessionBackend,
    pub cookie_secure: bool,
    pub password: PasswordParams,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_cookie_name: "roster_session".into(),
            session_ttl_secs: 8 * 60 * 60,
            session_purge_interval_secs: 5 * 60,
            session_backend: SessionBackend::Postgres,
            cookie_secure: true,
            password: PasswordParams::default(),
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> AuthResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let session_cookie_name = lookup("ROSTER_SESSION_COOKIE_NAME")
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(defaults.session_cookie_name);
        let session_ttl_secs = parse_number(&lookup, "ROSTER_SESSION_TTL_SECS")?
            .unwrap_or(defaults.session_ttl_secs);
        if !(1..=MAX_SESSION_TTL_SECS).contains(&session_ttl_secs) {
            return Err(AuthError::Config(format!(
                "ROSTER_SESSION_TTL_SECS must be between 1 and {MAX_SESSION_TTL_SECS}"
            )));
        }
        let session_purge_interval_secs =
            parse_number(&lookup, "ROSTER_SESSION_PURGE_INTERVAL_SECS")?
                .unwrap_or(defaults.session_purge_interval_secs);
        let session_backend = match lookup("ROSTER_SESSION_BACKEND") {
            Some(value) => SessionBackend::parse(&value)?,
            None => defaults.session_backend,
        };
        let cookie_secure = match lookup("ROSTER_COOKIE_SECURE") {
            Some(value) => parse_flag("ROSTER_COOKIE_SECURE", &value)?,
            None => defaults.cookie_secure,
        };
        let password = PasswordParams {
            m_cost: parse_number(&lookup, "ROSTER_ARGON2_M_COST")?
                .unwrap_or(defaults.password.m_cost),
            t_cost: parse_number(&lookup, "ROSTER_ARGON2_T_COST")?
                .unwrap_or(defaults.password.t_cost),
            p_cost: parse_number(&lookup, "ROSTER_ARGON2_P_COST")?
                .unwrap_or(defaults.password.p_cost),
        };

        Ok(Self {
            session_cookie_name,
            session_ttl_secs,
            session_purge_interval_secs,
            session_backend,
            cookie_secure,
            password,
        })
    }
}

fn parse_flag(name: &str, value: &str) -> AuthResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AuthError::Config(format!(
            "{name} must be true or false, got '{value}'"
        ))),
    }
}

fn parse_number<F, T>(lookup: &F, name: &str) -> AuthResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AuthError::Config(format!("{name} must be a number, got '{raw}'"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = AuthConfig::from_lookup(lookup_from(&[])).expect("config");
        assert_eq!(config.session_cookie_name, "roster_session");
        assert_eq!(config.session_backend, SessionBackend::Postgres);
        assert!(config.cookie_secure);
        assert_eq!(config.password, PasswordParams::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AuthConfig::from_lookup(lookup_from(&[
            ("ROSTER_SESSION_BACKEND", "memory"),
            ("ROSTER_SESSION_TTL_SECS", "60"),
            ("ROSTER_COOKIE_SECURE", "false"),
            ("ROSTER_ARGON2_T_COST", "4"),
        ]))
        .expect("config");
        assert_eq!(config.session_backend, SessionBackend::Memory);
        assert_eq!(config.session_ttl_secs, 60);
        assert!(!config.cookie_secure);
        assert_eq!(config.password.t_cost, 4);
    }

    #[test]
    fn rejects_garbage_values() {
        assert!(AuthConfig::from_lookup(lookup_from(&[("ROSTER_SESSION_TTL_SECS", "soon")])).is_err());
        assert!(AuthConfig::from_lookup(lookup_from(&[("ROSTER_SESSION_TTL_SECS", "0")])).is_err());
        assert!(AuthConfig::from_lookup(lookup_from(&[("ROSTER_SESSION_BACKEND", "redis")])).is_err());
    }

    #[test]
    fn session_ttl_is_bounded() {
        let at_limit = MAX_SESSION_TTL_SECS.to_string();
        let config = AuthConfig::from_lookup(lookup_from(&[("ROSTER_SESSION_TTL_SECS", &at_limit)]))
            .expect("one year is accepted");
        assert_eq!(config.session_ttl_secs, MAX_SESSION_TTL_SECS);

        let over = (MAX_SESSION_TTL_SECS + 1).to_string();
        for value in [over.as_str(), "10000000000000", "9223372036854775807"] {
            let err = AuthConfig::from_lookup(lookup_from(&[("ROSTER_SESSION_TTL_SECS", value)]))
                .unwrap_err();
            assert!(matches!(err, AuthError::Config(_)), "{value}");
        }
    }

    #[test]
    fn cookie_secure_accepts_common_spellings() {
        for value in ["True", "TRUE ", "Yes", "on", "1"] {
            let config = AuthConfig::from_lookup(lookup_from(&[("ROSTER_COOKIE_SECURE", value)]))
                .expect("config");
            assert!(config.cookie_secure, "{value:?}");
        }
        for value in ["False", " no", "OFF", "0"] {
            let config = AuthConfig::from_lookup(lookup_from(&[("ROSTER_COOKIE_SECURE", value)]))
                .expect("config");
            assert!(!config.cookie_secure, "{value:?}");
        }
    }

    #[test]
    fn cookie_secure_rejects_unknown_values() {
        for value in ["enabled", "", "maybe"] {
            assert!(
                AuthConfig::from_lookup(lookup_from(&[("ROSTER_COOKIE_SECURE", value)])).is_err(),
                "{value:?}"
            );
        }
    }
}
