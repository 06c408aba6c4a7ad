//! The pipeline that turns a matched request into a validated form.
//!
//! ```text
//! Router::dispatch        route matched, Route + services attached
//!        ↓
//! Gate::matched(req)      capture request, container, redirector, route
//!        ↓
//! Gate::resolving(form)   1. copy request data into the form
//!                         2. inject container, redirector, route
//!                         3. form.validate()
//!        ↓
//! Ok(form)  → handler     Err(Abort) → translate → response / recovery
//! ```

use std::any::type_name;
use std::sync::Arc;

use tracing::debug;

use crate::container::Container;
use crate::error::Error;
use crate::form::{Form, FormRequest};
use crate::redirect::{Redirector, Urls};
use crate::request::Request;
use crate::response::Response;
use crate::route::Route;

/// Why a form request stopped the pipeline.
#[derive(Debug)]
pub enum Abort {
    /// Validation failed. The response is complete and is sent as-is.
    Respond(Response),

    /// Authorization was denied, or a collaborator failed while building the
    /// failure response. Handled by the router's recovery handler.
    Fail(Error),
}

impl From<Error> for Abort {
    fn from(e: Error) -> Self {
        Self::Fail(e)
    }
}

/// Splits an abort into the response to send and the errors left for the
/// recovery handler.
///
/// Permission denial is deliberately not turned into a response here.
pub fn translate(abort: Abort) -> Result<Response, Error> {
    match abort {
        Abort::Respond(response) => Ok(response),
        Abort::Fail(e) => Err(e),
    }
}

// ── Gate ──────────────────────────────────────────────────────────────────────

/// The state captured when a route matched.
#[derive(Debug)]
pub struct Gate {
    request: Request,
    container: Container,
    redirector: Redirector,
    route: Option<Route>,
}

impl Gate {
    /// Captures the matched request and the collaborators every form request
    /// on it will receive.
    pub fn matched(request: Request) -> Self {
        let services = &request.services;
        let urls = Urls::new(Arc::clone(&services.routes), request.referer().map(str::to_owned));

        Self {
            container: services.container.clone(),
            redirector: Redirector::new(urls),
            route: request.route.clone(),
            request,
        }
    }

    /// Rehydrates `form` from the matched request, then validates it.
    ///
    /// Uploads with neither a filename nor content are dropped before the
    /// form sees them. Running this twice leaves the form in the same state.
    pub fn resolving<T: FormRequest>(&self, form: &mut Form<T>) -> Result<(), Abort> {
        let mut data = self.request.to_data();
        data.files.retain(|_, file| !file.is_empty());

        form.initialize(data)
            .set_container(self.container.clone())
            .set_redirector(self.redirector.clone());
        if let Some(route) = &self.route {
            form.set_route(route.clone());
        }

        form.validate()?;
        debug!(form = type_name::<T>(), "form request accepted");
        Ok(())
    }
}

// ── FromRequest ───────────────────────────────────────────────────────────────

/// Types a handler can take as its argument.
///
/// `Request` passes through untouched. `Form<T>` is built empty and run
/// through the [`Gate`] before the handler is called.
pub trait FromRequest: Sized + Send + 'static {
    fn from_request(req: Request) -> Result<Self, Abort>;
}

impl FromRequest for Request {
    fn from_request(req: Request) -> Result<Self, Abort> {
        Ok(req)
    }
}

impl<T: FormRequest> FromRequest for Form<T> {
    fn from_request(req: Request) -> Result<Self, Abort> {
        let gate = Gate::matched(req);
        let mut form = Form::new();
        gate.resolving(&mut form)?;
        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};

    use super::*;
    use crate::redirect::RouteTable;
    use crate::router::Services;
    use crate::upload::UploadedFile;
    use crate::validation::RuleSet;

    struct Profile;

    impl FormRequest for Profile {
        const REDIRECT_ACTION: Option<&'static str> = Some("ProfileController@edit");

        fn rules(_: &Form<Self>) -> RuleSet {
            RuleSet::new().field("name", "required|alpha")
        }

        fn authorize(form: &Form<Self>) -> bool {
            form.route().and_then(|r| r.param("id")) == Some("7")
        }
    }

    fn matched(req: Request) -> Request {
        let mut table = RouteTable::new();
        table.insert_action("ProfileController@edit", "/profile/edit");
        let services = Services { routes: Arc::new(table), ..Services::default() };

        let mut req = req;
        req.attach(Route::new(Method::POST, "/profiles/{id}").with_param("id", "7"), services);
        req
    }

    #[test]
    fn resolving_injects_route_and_filters_empty_uploads() {
        let req = matched(
            Request::builder()
                .form([("name", "Ada")])
                .file("avatar", UploadedFile::new("a.png", None, vec![1u8, 2]))
                .file("resume", UploadedFile::new("", None, Vec::<u8>::new()))
                .build(),
        );

        let gate = Gate::matched(req);
        let mut form = Form::<Profile>::new();
        gate.resolving(&mut form).unwrap();

        assert_eq!(form.route().unwrap().param("id"), Some("7"));
        assert_eq!(form.param("id"), Some("7"));
        assert!(form.file("avatar").is_some());
        assert!(form.file("resume").is_none());
        assert!(form.container().is_some());
    }

    #[test]
    fn rehydration_is_idempotent() {
        let req = matched(Request::builder().uri("/profiles/7?tab=bio").form([("name", "Ada")]).build());
        let gate = Gate::matched(req);

        let mut form = Form::<Profile>::new();
        gate.resolving(&mut form).unwrap();
        let first = (form.all(), form.cookies().clone(), form.route().cloned());
        gate.resolving(&mut form).unwrap();

        assert_eq!(first, (form.all(), form.cookies().clone(), form.route().cloned()));
    }

    #[test]
    fn redirect_goes_through_the_action_table() {
        let req = matched(Request::builder().form([("name", "Ada 2")]).build());
        let Err(abort) = Form::<Profile>::from_request(req) else {
            panic!("expected validation to fail");
        };

        let res = translate(abort).unwrap();
        assert_eq!(res.status_code(), StatusCode::FOUND);
        assert_eq!(res.header("location"), Some("/profile/edit"));
    }

    #[test]
    fn denial_translates_to_an_error() {
        let mut req = Request::builder().form([("name", "Ada")]).build();
        req.attach(Route::new(Method::POST, "/profiles/{id}").with_param("id", "8"), Services::default());

        let abort = Form::<Profile>::from_request(req).unwrap_err();
        assert!(matches!(translate(abort), Err(Error::PermissionDenied)));
    }

    #[test]
    fn plain_requests_pass_through() {
        let req = Request::builder().form([("name", "Ada")]).build();
        assert_eq!(Request::from_request(req).unwrap().get("name"), "Ada");
    }
}
