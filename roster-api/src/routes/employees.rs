//! Employee CRUD handlers. Every handler takes [`AuthUser`] first, so an
//! anonymous request is turned away before any body is read or any store
//! is touched.

use rocket::State;
use rocket::form::Form;
use rocket::response::Redirect;
use rocket::response::content::RawHtml;
use rocket::serde::json::Json;
use rocket_okapi::openapi;

use crate::auth::AuthUser;
use crate::employees::SharedEmployeeStore;
use crate::error::ApiError;
use crate::models::{DataResponse, Employee, EmployeeForm};
use crate::views::{AddEmployeeTemplate, render};

/// List every employee record.
#[openapi(tag = "Employees")]
#[get("/employees")]
pub async fn list_employees(
    _user: AuthUser,
    store: &State<SharedEmployeeStore>,
) -> Result<Json<DataResponse<Vec<Employee>>>, ApiError> {
    let employees = store.list().await?;
    Ok(Json(DataResponse { data: employees }))
}

/// Fetch one employee record for editing.
#[openapi(tag = "Employees")]
#[get("/employees/edit/<id>")]
pub async fn get_employee(
    _user: AuthUser,
    id: i32,
    store: &State<SharedEmployeeStore>,
) -> Result<Json<Employee>, ApiError> {
    store
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Employee {id} not found")))
}

#[get("/employees/add")]
pub fn add_employee_form(_user: AuthUser) -> Result<RawHtml<String>, ApiError> {
    Ok(render(&AddEmployeeTemplate)?)
}

#[post("/employees/add", data = "<form>")]
pub async fn add_employee(
    user: AuthUser,
    store: &State<SharedEmployeeStore>,
    form: Option<Form<EmployeeForm>>,
) -> Result<Redirect, ApiError> {
    let input = parse_form(form)?;
    let employee = store.create(&input).await?;
    log::info!("'{}' added employee {}", user.username, employee.id);
    Ok(Redirect::to("/employees"))
}

#[post("/employees/edit/<id>", data = "<form>")]
pub async fn update_employee(
    user: AuthUser,
    id: i32,
    store: &State<SharedEmployeeStore>,
    form: Option<Form<EmployeeForm>>,
) -> Result<Redirect, ApiError> {
    let input = parse_form(form)?;
    store
        .update(id, &input)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Employee {id} not found")))?;
    log::info!("'{}' updated employee {}", user.username, id);
    Ok(Redirect::to("/employees"))
}

#[post("/employees/delete/<id>")]
pub async fn delete_employee(
    user: AuthUser,
    id: i32,
    store: &State<SharedEmployeeStore>,
) -> Result<Redirect, ApiError> {
    if !store.delete(id).await? {
        return Err(ApiError::NotFound(format!("Employee {id} not found")));
    }
    log::info!("'{}' deleted employee {}", user.username, id);
    Ok(Redirect::to("/employees"))
}

fn parse_form(
    form: Option<Form<EmployeeForm>>,
) -> Result<crate::models::EmployeeInput, ApiError> {
    match form {
        Some(form) => form.validate(),
        None => Err(ApiError::BadRequest(
            "name, position and salary are required".to_string(),
        )),
    }
}
