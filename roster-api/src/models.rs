use chrono::{DateTime, Utc};
use rocket::FromForm;
use rocket_db_pools::sqlx::FromRow;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DataResponse<T> {
    pub data: T,
}

// ===== Employee Models =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct Employee {
    pub id: i32,
    pub name: String,
    pub position: String,
    pub salary: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw add/edit form submission. Salary arrives as text so a malformed
/// number becomes a 400 instead of a form-parsing failure.
#[derive(Debug, Clone, FromForm)]
pub struct EmployeeForm {
    pub name: String,
    pub position: String,
    pub salary: String,
}

/// Validated employee fields ready for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeInput {
    pub name: String,
    pub position: String,
    pub salary: f64,
}

impl EmployeeForm {
    pub fn validate(&self) -> Result<EmployeeInput, ApiError> {
        let name = self.name.trim();
        let position = self.position.trim();
        if name.is_empty() || position.is_empty() {
            return Err(ApiError::BadRequest(
                "name and position are required".to_string(),
            ));
        }

        let salary: f64 = self.salary.trim().parse().map_err(|_| {
            ApiError::BadRequest(format!("salary '{}' is not a number", self.salary))
        })?;
        if !salary.is_finite() || salary < 0.0 {
            return Err(ApiError::BadRequest(
                "salary must be a non-negative amount".to_string(),
            ));
        }

        Ok(EmployeeInput {
            name: name.to_string(),
            position: position.to_string(),
            salary,
        })
    }
}
