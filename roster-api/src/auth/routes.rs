use rocket::form::Form;
use rocket::http::CookieJar;
use rocket::response::content::RawHtml;
use rocket::response::{Redirect, status};
use rocket::{Catcher, Responder, Route, State, catch, catchers, get, post, routes};

use crate::auth::responses::CredentialsForm;
use crate::auth::{AuthError, AuthState, Identity};
use crate::error::ApiError;
use crate::views::{IndexTemplate, LoginTemplate, MessageTemplate, RegisterTemplate, render};

/// Error side of the form handlers: a rendered message page, or a
/// template failure that falls back to the JSON error body.
#[derive(Debug, Responder)]
pub enum PageError {
    Message(status::Custom<RawHtml<String>>),
    Render(ApiError),
}

impl From<askama::Error> for PageError {
    fn from(err: askama::Error) -> Self {
        PageError::Render(err.into())
    }
}

type PageResult = Result<Redirect, PageError>;

pub fn routes() -> Vec<Route> {
    routes![index, register_form, register, login_form, login, logout]
}

pub fn catchers() -> Vec<Catcher> {
    catchers![unauthorized]
}

#[get("/")]
pub async fn index(
    state: &State<AuthState>,
    cookies: &CookieJar<'_>,
) -> Result<RawHtml<String>, ApiError> {
    let username = match state.sessions.current_identity(cookies).await {
        Ok(Identity::Authenticated(username)) => Some(username),
        Ok(Identity::Anonymous) => None,
        Err(err) => {
            log::error!("session lookup failed: {}", err);
            None
        }
    };
    Ok(render(&IndexTemplate {
        username: username.as_deref(),
    })?)
}

#[get("/register")]
pub fn register_form() -> Result<RawHtml<String>, ApiError> {
    Ok(render(&RegisterTemplate)?)
}

#[post("/register", data = "<form>")]
pub async fn register(state: &State<AuthState>, form: Option<Form<CredentialsForm>>) -> PageResult {
    let Some(form) = form else {
        return Err(respond_error(
            AuthError::InvalidInput("username and password are required".into()),
            "/register",
        ));
    };

    state
        .authenticator
        .register_identity(&form.username, &form.password)
        .await
        .map_err(|err| respond_error(err, "/register"))?;

    Ok(Redirect::to("/login"))
}

#[get("/login")]
pub fn login_form() -> Result<RawHtml<String>, ApiError> {
    Ok(render(&LoginTemplate)?)
}

#[post("/login", data = "<form>")]
pub async fn login(
    state: &State<AuthState>,
    cookies: &CookieJar<'_>,
    form: Option<Form<CredentialsForm>>,
) -> PageResult {
    let Some(form) = form else {
        return Err(respond_error(AuthError::InvalidCredentials, "/login"));
    };

    let identity = state
        .authenticator
        .verify_identity(&form.username, &form.password)
        .await
        .map_err(|err| respond_error(err, "/login"))?;

    state
        .sessions
        .issue_session(cookies, &identity)
        .await
        .map_err(|err| respond_error(err, "/login"))?;

    Ok(Redirect::to("/employees"))
}

#[get("/logout")]
pub async fn logout(state: &State<AuthState>, cookies: &CookieJar<'_>) -> PageResult {
    state
        .sessions
        .destroy_session(cookies)
        .await
        .map_err(|err| respond_error(err, "/login"))?;

    Ok(Redirect::to("/login"))
}

/// Every guard `Deny` lands here.
#[catch(401)]
pub fn unauthorized() -> Redirect {
    Redirect::to("/login")
}

fn respond_error(err: AuthError, retry_path: &'static str) -> PageError {
    if err.is_backend() {
        log::error!("auth request failed: {}", err);
    }
    let message = match err {
        AuthError::InvalidCredentials => "Invalid credentials".to_string(),
        ref other => other.public_message(),
    };
    match render(&MessageTemplate {
        message: &message,
        retry_path,
    }) {
        Ok(page) => PageError::Message(status::Custom(err.status(), page)),
        Err(render_err) => render_err.into(),
    }
}
