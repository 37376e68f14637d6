use argon2::{
    Algorithm, Argon2, ParamsBuilder, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::RngCore;

use crate::auth::config::PasswordParams;
use crate::auth::{AuthError, AuthResult};

const SALT_LEN: usize = 16;

#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
    // Verified against when the username is unknown so both failure paths
    // cost one full Argon2 evaluation.
    dummy_hash: String,
}

impl PasswordService {
    pub fn new() -> AuthResult<Self> {
        Self::with_params(PasswordParams::default())
    }

    pub fn with_params(params: PasswordParams) -> AuthResult<Self> {
        let mut builder = ParamsBuilder::new();
        builder.m_cost(params.m_cost);
        builder.t_cost(params.t_cost);
        builder.p_cost(params.p_cost);
        let params = builder.build().map_err(AuthError::from)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut service = Self {
            argon2,
            dummy_hash: String::new(),
        };
        let mut filler = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut filler);
        service.dummy_hash = service.hash_password(&String::from_utf8_lossy(&filler))?;
        Ok(service)
    }

    pub fn hash_password(&self, password: &str) -> AuthResult<String> {
        let mut salt_bytes = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes).map_err(AuthError::from)?;
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(AuthError::from)?
            .to_string();
        Ok(hash)
    }

    /// Parameters are taken from the encoded hash, so hashes produced under
    /// older work factors keep verifying after the configuration changes.
    pub fn verify_password(&self, password: &str, encoded: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(encoded)?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(AuthError::from(err)),
        }
    }

    /// Burns the same amount of work as a real verification and always
    /// reports a mismatch.
    pub fn verify_against_dummy(&self, password: &str) -> AuthResult<bool> {
        self.verify_password(password, &self.dummy_hash)?;
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_service() -> PasswordService {
        PasswordService::with_params(PasswordParams {
            m_cost: 1024,
            t_cost: 1,
            p_cost: 1,
        })
        .expect("password service")
    }

    #[test]
    fn hashes_and_verifies_passwords() {
        let service = PasswordService::new().expect("password service");
        let hash = service
            .hash_password("super-secret")
            .expect("hash generation");
        assert!(
            service
                .verify_password("super-secret", &hash)
                .expect("verify succeeds")
        );
        assert!(
            !service
                .verify_password("wrong-password", &hash)
                .expect("verify runs")
        );
    }

    #[test]
    fn salts_differ_between_calls() {
        let service = cheap_service();
        let first = service.hash_password("secret123").expect("hash");
        let second = service.hash_password("secret123").expect("hash");
        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
        assert!(!first.contains("secret123"));
    }

    #[test]
    fn honours_configured_work_factor() {
        let service = cheap_service();
        let hash = service.hash_password("secret123").expect("hash");
        assert!(hash.contains("m=1024,t=1,p=1"), "unexpected params in {hash}");
    }

    #[test]
    fn dummy_verification_never_matches() {
        let service = cheap_service();
        assert!(!service.verify_against_dummy("").expect("verify runs"));
        assert!(!service.verify_against_dummy("secret123").expect("verify runs"));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        let service = cheap_service();
        assert!(matches!(
            service.verify_password("secret123", "not-a-phc-string"),
            Err(AuthError::PasswordHash(_))
        ));
    }
}
