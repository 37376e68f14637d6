use std::sync::Arc;

use roster_api::employees::{EmployeeStore, MemoryEmployeeStore};
use roster_api::models::{DataResponse, Employee};
use roster_api::test_support::TestRocketBuilder;
use rocket::http::{ContentType, Status};
use rocket::local::blocking::Client;

fn logged_in_client() -> Client {
    let client = TestRocketBuilder::new().blocking_client();
    for path in ["/register", "/login"] {
        let response = client
            .post(path)
            .header(ContentType::Form)
            .body("username=alice&password=secret123")
            .dispatch();
        assert_eq!(response.status(), Status::SeeOther, "{path}");
    }
    client
}

fn list(client: &Client) -> Vec<Employee> {
    let response = client.get("/employees").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let payload: DataResponse<Vec<Employee>> = response.into_json().expect("employee list");
    payload.data
}

#[test]
fn employee_crud_behind_session() {
    let client = logged_in_client();

    let form = client.get("/employees/add").dispatch();
    assert_eq!(form.status(), Status::Ok);

    let response = client
        .post("/employees/add")
        .header(ContentType::Form)
        .body("name=Ada&position=Engineer&salary=1000.50")
        .dispatch();
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(response.headers().get_one("Location"), Some("/employees"));

    let employees = list(&client);
    assert_eq!(employees.len(), 1);
    let ada = &employees[0];
    assert_eq!(ada.name, "Ada");
    assert_eq!(ada.salary, 1000.5);

    let fetched: Employee = client
        .get(format!("/employees/edit/{}", ada.id))
        .dispatch()
        .into_json()
        .expect("employee");
    assert_eq!(&fetched, ada);

    let response = client
        .post(format!("/employees/edit/{}", ada.id))
        .header(ContentType::Form)
        .body("name=Ada+Lovelace&position=Lead&salary=2000")
        .dispatch();
    assert_eq!(response.status(), Status::SeeOther);

    let employees = list(&client);
    assert_eq!(employees[0].name, "Ada Lovelace");
    assert_eq!(employees[0].position, "Lead");

    let response = client
        .post(format!("/employees/delete/{}", ada.id))
        .dispatch();
    assert_eq!(response.status(), Status::SeeOther);
    assert!(list(&client).is_empty());

    let response = client
        .post(format!("/employees/delete/{}", ada.id))
        .dispatch();
    assert_eq!(response.status(), Status::NotFound);
}

#[test]
fn invalid_employee_forms_are_rejected() {
    let client = logged_in_client();

    for body in [
        "name=Ada&position=Engineer&salary=lots",
        "name=Ada&position=Engineer&salary=-5",
        "name=&position=Engineer&salary=10",
        "name=Ada&position=Engineer",
    ] {
        let response = client
            .post("/employees/add")
            .header(ContentType::Form)
            .body(body)
            .dispatch();
        assert_eq!(response.status(), Status::BadRequest, "{body}");
    }
    assert!(list(&client).is_empty());
}

#[test]
fn missing_employee_is_not_found() {
    let client = logged_in_client();

    assert_eq!(
        client.get("/employees/edit/999").dispatch().status(),
        Status::NotFound
    );
    let response = client
        .post("/employees/edit/999")
        .header(ContentType::Form)
        .body("name=Ghost&position=None&salary=0")
        .dispatch();
    assert_eq!(response.status(), Status::NotFound);
}

#[test]
fn anonymous_requests_never_reach_the_store() {
    let store = MemoryEmployeeStore::new();
    let client = TestRocketBuilder::new()
        .employee_store(Arc::new(store.clone()))
        .blocking_client();

    let gets = ["/employees", "/employees/add", "/employees/edit/1"];
    for path in gets {
        let response = client.get(path).dispatch();
        assert_eq!(response.status(), Status::SeeOther, "{path}");
        assert_eq!(response.headers().get_one("Location"), Some("/login"), "{path}");
    }

    let posts = ["/employees/add", "/employees/edit/1", "/employees/delete/1"];
    for path in posts {
        let response = client
            .post(path)
            .header(ContentType::Form)
            .body("name=Eve&position=Intruder&salary=1")
            .dispatch();
        assert_eq!(response.status(), Status::SeeOther, "{path}");
        assert_eq!(response.headers().get_one("Location"), Some("/login"), "{path}");
    }

    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let rows = rt.block_on(store.list()).expect("list");
    assert!(rows.is_empty());
}
