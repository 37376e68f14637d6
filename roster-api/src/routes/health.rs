//! Liveness endpoint for load balancers and tests. It needs no session and
//! never touches a store.

use rocket::State;
use rocket::serde::json::Json;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

use crate::auth::{AuthState, SessionBackend};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct HealthResponse {
    /// Always `ok` while the process is serving requests.
    pub status: String,
    pub version: String,
    /// `memory` or `postgres`.
    pub session_backend: String,
}

#[openapi(tag = "Health")]
#[get("/health")]
pub fn health_check(auth: &State<AuthState>) -> Json<HealthResponse> {
    let session_backend = match auth.config.session_backend {
        SessionBackend::Memory => "memory",
        SessionBackend::Postgres => "postgres",
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        session_backend: session_backend.to_string(),
    })
}
