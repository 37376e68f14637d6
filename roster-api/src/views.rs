//! Server-rendered pages for the form-driven routes. Askama escapes every
//! interpolated value, so usernames and messages can be passed in as-is.

use askama::Template;
use rocket::response::content::RawHtml;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate<'a> {
    pub username: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate;

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate;

/// Plain message with a link back to the page the user came from.
#[derive(Template)]
#[template(path = "message.html")]
pub struct MessageTemplate<'a> {
    pub message: &'a str,
    /// Emitted unescaped; only ever a route path chosen by the handler.
    pub retry_path: &'static str,
}

#[derive(Template)]
#[template(path = "add_employee.html")]
pub struct AddEmployeeTemplate;

pub fn render<T: Template>(template: &T) -> askama::Result<RawHtml<String>> {
    Ok(RawHtml(template.render()?))
}
