use rocket::http::Status;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("username is already taken")]
    DuplicateUsername,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("unauthorized")]
    Unauthorized,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Sqlx(#[from] rocket_db_pools::sqlx::Error),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("argon2 parameter error: {0}")]
    Argon2(String),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
}

impl AuthError {
    pub fn status(&self) -> Status {
        match self {
            AuthError::InvalidInput(_) => Status::BadRequest,
            AuthError::DuplicateUsername => Status::Conflict,
            AuthError::InvalidCredentials | AuthError::Unauthorized => Status::Unauthorized,
            AuthError::Config(_)
            | AuthError::Sqlx(_)
            | AuthError::Task(_)
            | AuthError::Argon2(_)
            | AuthError::PasswordHash(_) => Status::InternalServerError,
        }
    }

    /// Failures of the credential store, the session store or the hashing
    /// machinery. These are never shown to the client verbatim.
    pub fn is_backend(&self) -> bool {
        self.status() == Status::InternalServerError
    }

    /// Text that is safe to put in a response body.
    pub fn public_message(&self) -> String {
        if self.is_backend() {
            "The service is temporarily unavailable. Please try again later.".to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::Argon2(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}
