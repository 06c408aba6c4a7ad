//! Typed form requests.
//!
//! A form request is a request type that knows its own validation rules and
//! authorization check. Declare one by implementing [`FormRequest`] on a unit
//! struct, then take [`Form<T>`] as a handler argument:
//!
//! ```rust
//! use formgate::validation::RuleSet;
//! use formgate::{Form, FormRequest, Response};
//!
//! struct Signup;
//!
//! impl FormRequest for Signup {
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
//! async fn signup(form: Form<Signup>) -> Response {
//!     let email = form.get("email").as_str().unwrap_or_default();
//!     Response::text(format!("welcome {email}"))
//! }
//! ```
//!
//! By the time `signup` runs, the input has passed validation and the
//! authorization check. Failed validation never reaches the handler: script
//! clients get `422` with the error map, browsers are redirected back with
//! their input and errors flashed.

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use http::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::container::Container;
use crate::error::Error;
use crate::gate::Abort;
use crate::input::Input;
use crate::redirect::{RedirectTarget, Redirector, Urls};
use crate::request::{Request, RequestData};
use crate::response::{IntoResponse, Response};
use crate::route::Route;
use crate::validation::{Factory, MessageBag, Messages, RuleSet, ValidationFactory, Validator};

/// Rules, messages and authorization for one kind of form.
///
/// Only [`rules`](FormRequest::rules) is required. Every other hook has a
/// default, and [`authorize`](FormRequest::authorize) defaults to `false`:
/// a form that forgets to authorize is always denied.
pub trait FormRequest: Sized + 'static {
    /// Explicit redirect URL for failed browser submissions.
    const REDIRECT: Option<&'static str> = None;

    /// Named route to redirect to. Ignored when `REDIRECT` is set.
    const REDIRECT_ROUTE: Option<&'static str> = None;

    /// Action label to redirect to. Ignored when either of the above is set.
    const REDIRECT_ACTION: Option<&'static str> = None;

    /// Input keys never flashed back to the browser.
    const DONT_FLASH: &'static [&'static str] = &["password", "password_confirmation"];

    fn rules(form: &Form<Self>) -> RuleSet;

    /// Custom error messages, keyed `field.rule` or `rule`.
    fn messages(_form: &Form<Self>) -> Messages {
        Messages::new()
    }

    fn authorize(_form: &Form<Self>) -> bool {
        false
    }

    /// The input handed to the validator.
    fn format_input(form: &Form<Self>) -> Input {
        form.all()
    }

    /// Builds the validator directly instead of `factory.make(format_input, rules, messages)`.
    fn validator(_form: &Form<Self>, _factory: &dyn Factory) -> Option<Box<dyn Validator>> {
        None
    }
}

/// A request that has been validated and authorized as `T`.
///
/// Dereferences to [`Request`], so every input accessor (`get`, `input`,
/// `all`, `files`, `cookie`, ...) is available directly.
pub struct Form<T> {
    request: Request,
    container: Option<Container>,
    redirector: Option<Redirector>,
    route: Option<Route>,
    _kind: PhantomData<fn() -> T>,
}

impl<T: FormRequest> Form<T> {
    /// An empty form, not yet bound to any request.
    pub fn new() -> Self {
        Self {
            request: Request::default(),
            container: None,
            redirector: None,
            route: None,
            _kind: PhantomData,
        }
    }

    /// Replaces the form's request data wholesale.
    pub fn initialize(&mut self, data: RequestData) -> &mut Self {
        self.request.initialize(data);
        self
    }

    pub fn set_container(&mut self, container: Container) -> &mut Self {
        self.container = Some(container);
        self
    }

    pub fn set_redirector(&mut self, redirector: Redirector) -> &mut Self {
        self.redirector = Some(redirector);
        self
    }

    pub fn set_route(&mut self, route: Route) -> &mut Self {
        self.route = Some(route);
        self
    }

    pub fn container(&self) -> Option<&Container> {
        self.container.as_ref()
    }

    pub fn redirector(&self) -> Option<&Redirector> {
        self.redirector.as_ref()
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn into_request(self) -> Request {
        self.request
    }

    /// Validates, then authorizes.
    ///
    /// Authorization only runs once the input is valid, so invalid input is
    /// always reported as a validation failure even when the form would also
    /// be denied.
    pub fn validate(&self) -> Result<(), Abort> {
        let validator = self.validator_instance();

        if validator.fails() {
            debug!(
                form = type_name::<T>(),
                fields = ?validator.errors().fields().collect::<Vec<_>>(),
                "validation failed"
            );
            return Err(self.failed_validation(validator.as_ref()));
        }

        if !self.passes_authorization() {
            debug!(form = type_name::<T>(), "authorization denied");
            return Err(self.failed_authorization());
        }

        Ok(())
    }

    /// A fresh validator for the current input.
    ///
    /// The factory comes from the container; [`Engine`](crate::validation::Engine)
    /// is used when none is registered.
    pub fn validator_instance(&self) -> Box<dyn Validator> {
        let factory = self.container
            .as_ref()
            .and_then(Container::resolve::<ValidationFactory>)
            .unwrap_or_else(|| Arc::new(ValidationFactory::default()));
        let factory = factory.factory();

        T::validator(self, factory).unwrap_or_else(|| {
            factory.make(T::format_input(self), T::rules(self), T::messages(self))
        })
    }

    pub fn format_errors(&self, validator: &dyn Validator) -> MessageBag {
        validator.errors().clone()
    }

    pub fn failed_validation(&self, validator: &dyn Validator) -> Abort {
        match self.response(self.format_errors(validator)) {
            Ok(response) => Abort::Respond(response),
            Err(e) => Abort::Fail(e),
        }
    }

    pub fn passes_authorization(&self) -> bool {
        T::authorize(self)
    }

    pub fn failed_authorization(&self) -> Abort {
        Abort::Fail(Error::PermissionDenied)
    }

    /// The validation failure response.
    ///
    /// Script requests get `422` with the error map as JSON. Browser requests
    /// are redirected to [`redirect_url`](Form::redirect_url) with the errors
    /// and the input, minus `DONT_FLASH` keys, flashed.
    pub fn response(&self, errors: MessageBag) -> Result<Response, Error> {
        if self.ajax() {
            return Ok(Response::builder()
                .status(StatusCode::UNPROCESSABLE_ENTITY)
                .json_value(&errors.to_json()));
        }

        let url = self.redirect_url()?;
        Ok(self.redirector_or_default()
            .to(&url)
            .with_input(self.except(T::DONT_FLASH))
            .with_errors(errors)
            .into_response())
    }

    /// A plain `403 Forbidden`.
    pub fn forbidden_response(&self) -> Response {
        Response::builder().status(StatusCode::FORBIDDEN).text("Forbidden")
    }

    /// Where a failed browser submission is sent. Resolved on demand, so an
    /// unknown route name only errors when a redirect is actually built.
    pub fn redirect_url(&self) -> Result<String, Error> {
        let target = RedirectTarget {
            url: T::REDIRECT.map(str::to_owned),
            route: T::REDIRECT_ROUTE.map(str::to_owned),
            action: T::REDIRECT_ACTION.map(str::to_owned),
        };
        target.resolve(self.redirector_or_default().url_generator())
    }

    /// Deserializes the merged query and body input.
    ///
    /// Urlencoded values arrive as strings; declare such fields as `String`
    /// or parse them afterwards.
    pub fn bind<D: DeserializeOwned>(&self) -> Result<D, Error> {
        Ok(serde_json::from_value(self.input().to_value())?)
    }

    fn redirector_or_default(&self) -> Redirector {
        self.redirector.clone().unwrap_or_else(|| {
            Redirector::new(Urls::new(Arc::default(), self.referer().map(str::to_owned)))
        })
    }
}

impl<T: FormRequest> Default for Form<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for Form<T> {
    type Target = Request;

    fn deref(&self) -> &Request {
        &self.request
    }
}

impl<T> DerefMut for Form<T> {
    fn deref_mut(&mut self) -> &mut Request {
        &mut self.request
    }
}

impl<T> fmt::Debug for Form<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("kind", &type_name::<T>())
            .field("request", &self.request)
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}
