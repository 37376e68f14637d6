use rocket::Request;
use rocket::State;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};

use crate::auth::session::GuardDecision;
use crate::auth::{AuthError, AuthState};
use crate::request_logger::SessionTag;

/// Request guard for protected routes. A request without a live session
/// fails with `401`, which the catcher in [`crate::auth::routes`] turns into
/// a redirect to the login page.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let state = match request.guard::<&State<AuthState>>().await {
            Outcome::Success(state) => state,
            _ => {
                let err = AuthError::Config("AuthState missing from state".into());
                log::error!("{}", err);
                return Outcome::Error((err.status(), err));
            }
        };

        match state.sessions.guard(request.cookies()).await {
            Ok(GuardDecision::Allow(username)) => {
                request.local_cache(|| SessionTag::User(username.clone()));
                Outcome::Success(AuthUser { username })
            }
            Ok(GuardDecision::Deny) => {
                request.local_cache(|| SessionTag::Denied);
                Outcome::Error((Status::Unauthorized, AuthError::Unauthorized))
            }
            Err(err) => {
                log::error!("session lookup failed: {}", err);
                Outcome::Error((err.status(), err))
            }
        }
    }
}

impl<'r> OpenApiFromRequest<'r> for AuthUser {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}
