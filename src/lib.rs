//! # formgate
//!
//! Typed form requests for HTTP services: declare rules and an authorization
//! check once, take the form as a handler argument, and never see invalid or
//! unauthorized input in the handler body.
//!
//! ## The contract
//!
//! Before a handler taking [`Form<T>`] runs, the request goes through the
//! [`Gate`]:
//!
//! 1. The form is filled from the matched request (query, body, route
//!    parameters, cookies, non-empty uploads, server metadata).
//! 2. The input is validated against [`FormRequest::rules`].
//! 3. Only valid input is checked with [`FormRequest::authorize`].
//!
//! Failures never reach the handler:
//!
//! - **Invalid input, script client** (`X-Requested-With: XMLHttpRequest`):
//!   `422` with the error map as JSON.
//! - **Invalid input, browser**: `302` to the configured target or the
//!   previous page, with input (minus passwords) and errors flashed.
//! - **Denied**: [`Error::PermissionDenied`] goes to the router's recovery
//!   handler, which renders `403 Forbidden` unless replaced.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use formgate::validation::RuleSet;
//! use formgate::{Form, FormRequest, Request, Response, Router, Server};
//!
//! struct Signup;
//!
//! impl FormRequest for Signup {
//!     const REDIRECT_ROUTE: Option<&'static str> = Some("signup");
//!
//!     fn rules(_: &Form<Self>) -> RuleSet {
//!         RuleSet::new()
//!             .field("email", "required|email")
//!             .field("password", "required|min:8|confirmed")
//!     }
//!
//!     fn authorize(_: &Form<Self>) -> bool {
//!         true
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .get("/signup", show).name("signup")
//!         .post("/signup", store);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn show(_: Request) -> Response {
//!     Response::text("signup form")
//! }
//!
//! async fn store(form: Form<Signup>) -> Response {
//!     let email = form.get("email").as_str().unwrap_or_default();
//!     Response::builder()
//!         .status(http::StatusCode::CREATED)
//!         .text(format!("welcome {email}"))
//! }
//! ```

mod container;
mod error;
mod form;
mod gate;
mod handler;
mod input;
mod request;
mod response;
mod route;
mod router;
mod server;
mod upload;

pub mod redirect;
pub mod validation;

pub use container::Container;
pub use error::Error;
pub use form::{Form, FormRequest};
pub use gate::{Abort, FromRequest, Gate, translate};
pub use handler::Handler;
pub use input::Input;
pub use request::{Metadata, Request, RequestBuilder, RequestData};
pub use response::{Flash, IntoResponse, Response, ResponseBuilder};
pub use route::Route;
pub use router::Router;
pub use server::Server;
pub use upload::{Files, UploadedFile};
