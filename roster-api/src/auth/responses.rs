//! Form payloads accepted by the auth routes.

use rocket::FromForm;

#[derive(Clone, FromForm)]
pub struct CredentialsForm {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for CredentialsForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsForm")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_password() {
        let form = CredentialsForm {
            username: "alice".into(),
            password: "secret123".into(),
        };
        let rendered = format!("{form:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("secret123"));
    }
}
