//! Access log fairing. Only the path is written: query strings and form
//! bodies can carry credentials.

use std::time::Instant;

use log::Level;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Status;
use rocket::{Data, Request, Response};

/// What the session guard concluded for this request, recorded by
/// [`crate::auth::AuthUser`] so the access line can name the actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTag {
    Unchecked,
    User(String),
    Denied,
}

impl SessionTag {
    fn label(&self) -> &str {
        match self {
            SessionTag::Unchecked => "-",
            SessionTag::User(username) => username,
            SessionTag::Denied => "denied",
        }
    }
}

struct StartedAt(Instant);

pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Access Log",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        request.local_cache(|| StartedAt(Instant::now()));
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let elapsed = request.local_cache(|| StartedAt(Instant::now())).0.elapsed();
        let session = request.local_cache(|| SessionTag::Unchecked);
        let path = request.uri().path();
        let status = response.status();

        log::log!(
            level_for(path.as_str(), status),
            "{} {} -> {} [{}] ({:.2}ms)",
            request.method(),
            path,
            status.code,
            session.label(),
            elapsed.as_secs_f64() * 1000.0
        );
    }
}

/// Health checks and API docs log at `debug`. Server errors log at `warn`.
fn level_for(path: &str, status: Status) -> Level {
    if status.code >= 500 {
        Level::Warn
    } else if path == "/health" || path == "/openapi.json" || path.starts_with("/docs/") {
        Level::Debug
    } else {
        Level::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_and_docs_traffic_is_debug() {
        assert_eq!(level_for("/health", Status::Ok), Level::Debug);
        assert_eq!(level_for("/docs/swagger/index.html", Status::Ok), Level::Debug);
        assert_eq!(level_for("/openapi.json", Status::Ok), Level::Debug);
    }

    #[test]
    fn server_errors_are_warnings_everywhere() {
        assert_eq!(level_for("/health", Status::InternalServerError), Level::Warn);
        assert_eq!(level_for("/login", Status::ServiceUnavailable), Level::Warn);
    }

    #[test]
    fn app_traffic_is_info() {
        assert_eq!(level_for("/employees", Status::Ok), Level::Info);
        assert_eq!(level_for("/employees", Status::SeeOther), Level::Info);
        assert_eq!(level_for("/login", Status::Unauthorized), Level::Info);
    }

    #[test]
    fn session_labels() {
        assert_eq!(SessionTag::Unchecked.label(), "-");
        assert_eq!(SessionTag::User("alice".into()).label(), "alice");
        assert_eq!(SessionTag::Denied.label(), "denied");
    }
}
