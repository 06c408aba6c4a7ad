//! Form request example: a signup form and an admin-only invite form.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example forms
//!
//! Try:
//!   # 422 with the error map
//!   curl -i -X POST http://localhost:3000/signup \
//!        -H 'x-requested-with: XMLHttpRequest' \
//!        -d 'email=nope&password=short'
//!
//!   # 302 back to the form, input and errors flashed
//!   curl -i -X POST http://localhost:3000/signup \
//!        -H 'referer: http://localhost:3000/signup' \
//!        -d 'email=nope'
//!
//!   # 201
//!   curl -i -X POST http://localhost:3000/signup \
//!        -H 'content-type: application/json' \
//!        -d '{"email":"ada@example.com","password":"correct horse","password_confirmation":"correct horse"}'
//!
//!   # 403 unless the role cookie says admin
//!   curl -i -X POST http://localhost:3000/invites -d 'email=grace@example.com'
//!   curl -i -X POST http://localhost:3000/invites -b 'role=admin' -d 'email=grace@example.com'

use std::collections::HashSet;

use formgate::validation::{Engine, Messages, RuleSet};
use formgate::{Form, FormRequest, Request, Response, Router, Server};
use http::StatusCode;
use serde::Deserialize;

// Emails that already have an account.
struct Accounts(HashSet<&'static str>);

struct Signup;

impl FormRequest for Signup {
    fn rules(_: &Form<Self>) -> RuleSet {
        RuleSet::new()
            .field("email", "required|email|unregistered")
            .field("password", "required|min:8|confirmed")
    }

    fn messages(_: &Form<Self>) -> Messages {
        Messages::new().add("password.min", "Pick a password of :min characters or more.")
    }

    fn authorize(_: &Form<Self>) -> bool {
        true
    }
}

struct Invite;

impl FormRequest for Invite {
    const REDIRECT_ROUTE: Option<&'static str> = Some("invites.create");

    fn rules(_: &Form<Self>) -> RuleSet {
        RuleSet::new().field("email", "required|email")
    }

    fn authorize(form: &Form<Self>) -> bool {
        form.cookie("role") == Some("admin")
    }
}

#[derive(Deserialize)]
struct NewAccount {
    email: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let taken = ["taken@example.com"];
    let validator = Engine::new().extend(
        "unregistered",
        "The :attribute is already registered.",
        move |value, _, _| value.as_str().is_none_or(|email| !taken.contains(&email)),
    );

    let app = Router::new()
        .get("/signup", form_page).name("signup")
        .post("/signup", signup).action("SignupController@store")
        .get("/invites/new", form_page).name("invites.create")
        .post("/invites", invite)
        .provide(Accounts(taken.into_iter().collect()))
        .validator(validator);

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// GET /signup, GET /invites/new
async fn form_page(req: Request) -> Response {
    Response::text(format!("<form> for {}", req.path()))
}

// POST /signup
async fn signup(form: Form<Signup>) -> Response {
    let known = form.container()
        .and_then(|c| c.resolve::<Accounts>())
        .map_or(0, |accounts| accounts.0.len());

    match form.bind::<NewAccount>() {
        Ok(account) => Response::builder()
            .status(StatusCode::CREATED)
            .text(format!("welcome {}, account #{}", account.email, known + 1)),
        Err(_) => Response::status(StatusCode::BAD_REQUEST),
    }
}

// POST /invites
async fn invite(form: Form<Invite>) -> Response {
    let email = form.get("email").as_str().unwrap_or_default();
    Response::text(format!("invited {email}"))
}
