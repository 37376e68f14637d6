//! Employee record persistence.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rocket_db_pools::sqlx::{self, PgPool};
use tokio::sync::RwLock;

use crate::error::ApiError;
use crate::models::{Employee, EmployeeInput};

#[rocket::async_trait]
pub trait EmployeeStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Employee>, ApiError>;

    async fn get(&self, id: i32) -> Result<Option<Employee>, ApiError>;

    async fn create(&self, input: &EmployeeInput) -> Result<Employee, ApiError>;

    /// `None` when no employee has this id.
    async fn update(&self, id: i32, input: &EmployeeInput) -> Result<Option<Employee>, ApiError>;

    /// Returns whether a row was deleted.
    async fn delete(&self, id: i32) -> Result<bool, ApiError>;
}

pub type SharedEmployeeStore = Arc<dyn EmployeeStore>;

#[derive(Debug, Clone)]
pub struct PgEmployeeStore {
    pool: PgPool,
}

impl PgEmployeeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl EmployeeStore for PgEmployeeStore {
    async fn list(&self) -> Result<Vec<Employee>, ApiError> {
        let employees: Vec<Employee> = sqlx::query_as(
            r#"SELECT id, name, position, salary, created_at, updated_at
               FROM employees
               ORDER BY name ASC, id ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(employees)
    }

    async fn get(&self, id: i32) -> Result<Option<Employee>, ApiError> {
        let employee: Option<Employee> = sqlx::query_as(
            r#"SELECT id, name, position, salary, created_at, updated_at
               FROM employees
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(employee)
    }

    async fn create(&self, input: &EmployeeInput) -> Result<Employee, ApiError> {
        let employee: Employee = sqlx::query_as(
            r#"INSERT INTO employees (name, position, salary)
               VALUES ($1, $2, $3)
               RETURNING id, name, position, salary, created_at, updated_at"#,
        )
        .bind(&input.name)
        .bind(&input.position)
        .bind(input.salary)
        .fetch_one(&self.pool)
        .await?;
        Ok(employee)
    }

    async fn update(&self, id: i32, input: &EmployeeInput) -> Result<Option<Employee>, ApiError> {
        let employee: Option<Employee> = sqlx::query_as(
            r#"UPDATE employees
               SET name = $1, position = $2, salary = $3, updated_at = now()
               WHERE id = $4
               RETURNING id, name, position, salary, created_at, updated_at"#,
        )
        .bind(&input.name)
        .bind(&input.position)
        .bind(input.salary)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(employee)
    }

    async fn delete(&self, id: i32) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM employees WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Default)]
struct MemoryEmployees {
    next_id: i32,
    rows: BTreeMap<i32, Employee>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryEmployeeStore {
    inner: Arc<RwLock<MemoryEmployees>>,
}

impl MemoryEmployeeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl EmployeeStore for MemoryEmployeeStore {
    async fn list(&self) -> Result<Vec<Employee>, ApiError> {
        let guard = self.inner.read().await;
        let mut employees: Vec<Employee> = guard.rows.values().cloned().collect();
        employees.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(employees)
    }

    async fn get(&self, id: i32) -> Result<Option<Employee>, ApiError> {
        Ok(self.inner.read().await.rows.get(&id).cloned())
    }

    async fn create(&self, input: &EmployeeInput) -> Result<Employee, ApiError> {
        let mut guard = self.inner.write().await;
        guard.next_id += 1;
        let now = Utc::now();
        let employee = Employee {
            id: guard.next_id,
            name: input.name.clone(),
            position: input.position.clone(),
            salary: input.salary,
            created_at: now,
            updated_at: now,
        };
        guard.rows.insert(employee.id, employee.clone());
        Ok(employee)
    }

    async fn update(&self, id: i32, input: &EmployeeInput) -> Result<Option<Employee>, ApiError> {
        let mut guard = self.inner.write().await;
        let Some(employee) = guard.rows.get_mut(&id) else {
            return Ok(None);
        };
        employee.name = input.name.clone();
        employee.position = input.position.clone();
        employee.salary = input.salary;
        employee.updated_at = Utc::now();
        Ok(Some(employee.clone()))
    }

    async fn delete(&self, id: i32) -> Result<bool, ApiError> {
        Ok(self.inner.write().await.rows.remove(&id).is_some())
    }
}
