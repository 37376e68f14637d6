//! HTTP route handlers for the employee records and service health.
//!
//! The JSON endpoints carry `#[openapi]` annotations so `rocket_okapi` can
//! derive an OpenAPI document; the form endpoints answer with redirects and
//! are mounted as plain Rocket routes.

pub mod employees;
pub mod health;
