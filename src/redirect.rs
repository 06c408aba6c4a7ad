//! Redirect responses and URL generation.
//!
//! A failed browser form redirects somewhere. Where is decided by
//! [`RedirectTarget`]; how a name becomes a URL is the [`UrlGenerator`]'s job.
//! The default generator, [`Urls`], knows the router's named routes and
//! action labels, and takes "previous page" from the `Referer` header.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;

use crate::error::Error;
use crate::input::Input;
use crate::response::{Flash, IntoResponse, Response};
use crate::validation::MessageBag;

/// Turns redirect targets into URLs.
pub trait UrlGenerator: Send + Sync {
    /// An explicit path or absolute URL.
    fn to(&self, path: &str) -> String;

    /// The path of a named route.
    fn route(&self, name: &str) -> Result<String, Error>;

    /// The path of a route registered under an action label.
    fn action(&self, action: &str) -> Result<String, Error>;

    /// The page the client came from.
    fn previous(&self) -> String;
}

// ── RouteTable / Urls ─────────────────────────────────────────────────────────

/// Route names and action labels → registered path patterns.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    names: HashMap<String, String>,
    actions: HashMap<String, String>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_name(&mut self, name: impl Into<String>, path: impl Into<String>) {
        self.names.insert(name.into(), path.into());
    }

    pub fn insert_action(&mut self, action: impl Into<String>, path: impl Into<String>) {
        self.actions.insert(action.into(), path.into());
    }

    pub fn name(&self, name: &str) -> Option<&str> {
        self.names.get(name).map(String::as_str)
    }

    pub fn action(&self, action: &str) -> Option<&str> {
        self.actions.get(action).map(String::as_str)
    }
}

/// The default [`UrlGenerator`]: one per request.
#[derive(Clone, Debug)]
pub struct Urls {
    table: Arc<RouteTable>,
    previous: Option<String>,
}

impl Urls {
    /// `previous` is usually the request's `Referer` header.
    pub fn new(table: Arc<RouteTable>, previous: Option<String>) -> Self {
        Self { table, previous }
    }
}

/// Only parameterless patterns can be generated without arguments.
fn static_path(pattern: &str, label: &str) -> Result<String, Error> {
    if pattern.contains('{') {
        return Err(Error::MissingParameters(label.to_owned()));
    }
    Ok(pattern.to_owned())
}

impl UrlGenerator for Urls {
    fn to(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") || path.starts_with('/') {
            path.to_owned()
        } else {
            format!("/{path}")
        }
    }

    fn route(&self, name: &str) -> Result<String, Error> {
        let pattern = self.table.name(name).ok_or_else(|| Error::UnknownRoute(name.to_owned()))?;
        static_path(pattern, name)
    }

    fn action(&self, action: &str) -> Result<String, Error> {
        let pattern = self.table.action(action).ok_or_else(|| Error::UnknownAction(action.to_owned()))?;
        static_path(pattern, action)
    }

    fn previous(&self) -> String {
        self.previous.clone().unwrap_or_else(|| "/".to_owned())
    }
}

// ── Redirector ────────────────────────────────────────────────────────────────

/// Builds [`Redirect`] responses through a [`UrlGenerator`].
#[derive(Clone)]
pub struct Redirector {
    urls: Arc<dyn UrlGenerator>,
}

impl Redirector {
    pub fn new(urls: impl UrlGenerator + 'static) -> Self {
        Self { urls: Arc::new(urls) }
    }

    pub fn url_generator(&self) -> &dyn UrlGenerator {
        self.urls.as_ref()
    }

    pub fn to(&self, path: &str) -> Redirect {
        Redirect::new(self.urls.to(path))
    }

    pub fn route(&self, name: &str) -> Result<Redirect, Error> {
        self.urls.route(name).map(Redirect::new)
    }

    pub fn back(&self) -> Redirect {
        Redirect::new(self.urls.previous())
    }
}

impl Default for Redirector {
    fn default() -> Self {
        Self::new(Urls::new(Arc::default(), None))
    }
}

impl fmt::Debug for Redirector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Redirector(..)")
    }
}

// ── Redirect ──────────────────────────────────────────────────────────────────

/// A `302 Found` with optional flash data.
///
/// ```rust
/// use formgate::redirect::Redirector;
/// use formgate::{Input, IntoResponse};
///
/// let res = Redirector::default()
///     .to("/signup")
///     .with_input(Input::from_pairs([("email", "bad")]))
///     .into_response();
///
/// assert_eq!(res.header("location"), Some("/signup"));
/// assert_eq!(res.flash().unwrap().input.get("email").as_str(), Some("bad"));
/// ```
#[derive(Clone, Debug)]
pub struct Redirect {
    location: String,
    status: StatusCode,
    flash: Flash,
}

impl Redirect {
    pub fn new(location: impl Into<String>) -> Self {
        Self { location: location.into(), status: StatusCode::FOUND, flash: Flash::default() }
    }

    /// Overrides the `302` default (e.g. `303 See Other`).
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Flashes input for the next request.
    pub fn with_input(mut self, input: Input) -> Self {
        self.flash.input.merge(&input);
        self
    }

    /// Flashes validation errors for the next request.
    pub fn with_errors(mut self, errors: MessageBag) -> Self {
        self.flash.errors = errors;
        self
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        let res = Response::builder()
            .status(self.status)
            .header("location", &self.location)
            .no_body();
        if self.flash.is_empty() { res } else { res.with_flash(self.flash) }
    }
}

// ── RedirectTarget ────────────────────────────────────────────────────────────

/// Where a failed form sends the browser.
///
/// Precedence is fixed: explicit URL, then named route, then action, then the
/// previous page. Lower-precedence entries are ignored when a higher one is
/// set; empty strings count as unset.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RedirectTarget {
    pub url: Option<String>,
    pub route: Option<String>,
    pub action: Option<String>,
}

impl RedirectTarget {
    pub fn resolve(&self, urls: &dyn UrlGenerator) -> Result<String, Error> {
        let set = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());

        if let Some(url) = set(&self.url) {
            Ok(urls.to(&url))
        } else if let Some(route) = set(&self.route) {
            urls.route(&route)
        } else if let Some(action) = set(&self.action) {
            urls.action(&action)
        } else {
            Ok(urls.previous())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tagged;

    impl UrlGenerator for Tagged {
        fn to(&self, path: &str) -> String { format!("to:{path}") }
        fn route(&self, name: &str) -> Result<String, Error> { Ok(format!("route:{name}")) }
        fn action(&self, action: &str) -> Result<String, Error> { Ok(format!("action:{action}")) }
        fn previous(&self) -> String { "previous".to_owned() }
    }

    fn target(url: bool, route: bool, action: bool) -> RedirectTarget {
        RedirectTarget {
            url: url.then(|| "/u".to_owned()),
            route: route.then(|| "r".to_owned()),
            action: action.then(|| "a".to_owned()),
        }
    }

    #[test]
    fn precedence_over_every_combination() {
        for bits in 0..8u8 {
            let (url, route, action) = (bits & 4 != 0, bits & 2 != 0, bits & 1 != 0);
            let expected = if url {
                "to:/u"
            } else if route {
                "route:r"
            } else if action {
                "action:a"
            } else {
                "previous"
            };
            let resolved = target(url, route, action).resolve(&Tagged).unwrap();
            assert_eq!(resolved, expected, "url={url} route={route} action={action}");
        }
    }

    #[test]
    fn empty_strings_are_unset() {
        let target = RedirectTarget { url: Some(String::new()), route: None, action: Some("a".into()) };
        assert_eq!(target.resolve(&Tagged).unwrap(), "action:a");
    }

    #[test]
    fn urls_resolve_names_and_previous() {
        let mut table = RouteTable::new();
        table.insert_name("signup", "/signup");
        table.insert_name("users.show", "/users/{id}");
        table.insert_action("UserController@create", "/users/create");
        let urls = Urls::new(Arc::new(table), None);

        assert_eq!(urls.route("signup").unwrap(), "/signup");
        assert_eq!(urls.action("UserController@create").unwrap(), "/users/create");
        assert_eq!(urls.previous(), "/");
        assert_eq!(urls.to("home"), "/home");
        assert_eq!(urls.to("https://example.com/x"), "https://example.com/x");
        assert!(matches!(urls.route("nope"), Err(Error::UnknownRoute(_))));
        assert!(matches!(urls.action("nope"), Err(Error::UnknownAction(_))));
        assert!(matches!(urls.route("users.show"), Err(Error::MissingParameters(_))));
    }

    #[test]
    fn previous_comes_from_referer() {
        let urls = Urls::new(Arc::default(), Some("/signup?step=2".into()));
        assert_eq!(Redirector::new(urls).back().location(), "/signup?step=2");
    }

    #[test]
    fn redirect_without_flash_carries_none() {
        let res = Redirector::default().to("/").into_response();
        assert_eq!(res.status_code(), StatusCode::FOUND);
        assert!(res.flash().is_none());
    }
}
