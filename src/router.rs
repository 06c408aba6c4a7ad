//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup. Besides handlers, the
//! router owns everything form requests need at run time: route names and
//! action labels for redirects, the service container, and the recovery
//! handler for errors that escape a handler.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;
use tracing::{debug, warn};

use crate::container::Container;
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::redirect::RouteTable;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::route::Route;
use crate::validation::{Factory, ValidationFactory};

/// The application's single handler for errors that escape a request.
type Recover = Arc<dyn Fn(Error) -> Response + Send + Sync>;

/// Shared state every dispatched request carries.
///
/// Cloned into each request on dispatch: three `Arc` increments, no copies
/// of the route table or the container.
#[derive(Clone)]
pub(crate) struct Services {
    pub(crate) container: Container,
    pub(crate) routes: Arc<RouteTable>,
    pub(crate) recover: Recover,
}

impl Services {
    pub(crate) fn recover(&self, err: Error) -> Response {
        match &err {
            Error::PermissionDenied => debug!("permission denied"),
            e if e.is_bad_request() => debug!(error = %e, "bad request"),
            e => warn!(error = %e, "request failed"),
        }
        (self.recover)(err)
    }
}

impl Default for Services {
    fn default() -> Self {
        Self {
            container: Container::new(),
            routes: Arc::default(),
            recover: Arc::new(|e: Error| e.into_response()),
        }
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("container", &self.container)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

/// One registered route. The trees store an index into `Router::endpoints`,
/// so labels added after registration are visible at dispatch time.
struct Endpoint {
    method: Method,
    pattern: String,
    name: Option<String>,
    action: Option<String>,
    handler: BoxedHandler,
}

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Every builder method returns `self` so registrations chain naturally.
///
/// ```rust,no_run
/// # use formgate::{Form, FormRequest, Request, Response, Router};
/// # use formgate::validation::RuleSet;
/// # struct Signup;
/// # impl FormRequest for Signup { fn rules(_: &Form<Self>) -> RuleSet { RuleSet::new() } }
/// # async fn show(_: Request) -> Response { Response::text("") }
/// # async fn store(_: Form<Signup>) -> Response { Response::text("") }
/// Router::new()
///     .get("/signup", show).name("signup")
///     .post("/signup", store).action("SignupController@store");
/// ```
pub struct Router {
    trees: HashMap<Method, MatchitRouter<usize>>,
    endpoints: Vec<Endpoint>,
    services: Services,
}

impl Router {
    pub fn new() -> Self {
        Self { trees: HashMap::new(), endpoints: Vec::new(), services: Services::default() }
    }

    /// Registers a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid pattern or conflicts with an existing one.
    pub fn on<E>(mut self, method: Method, path: &str, handler: impl Handler<E>) -> Self {
        let index = self.endpoints.len();
        self.trees
            .entry(method.clone())
            .or_default()
            .insert(path, index)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));

        self.endpoints.push(Endpoint {
            method,
            pattern: path.to_owned(),
            name: None,
            action: None,
            handler: handler.into_boxed_handler(),
        });
        self
    }

    /// Shortcut for [`on`](Router::on) with `GET`.
    pub fn get<E>(self, path: &str, handler: impl Handler<E>) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post<E>(self, path: &str, handler: impl Handler<E>) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put<E>(self, path: &str, handler: impl Handler<E>) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn patch<E>(self, path: &str, handler: impl Handler<E>) -> Self {
        self.on(Method::PATCH, path, handler)
    }

    pub fn delete<E>(self, path: &str, handler: impl Handler<E>) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Names the most recently registered route.
    ///
    /// # Panics
    ///
    /// Panics if no route has been registered yet.
    pub fn name(mut self, name: &str) -> Self {
        let endpoint = self.last_endpoint("name");
        endpoint.name = Some(name.to_owned());
        let pattern = endpoint.pattern.clone();
        Arc::make_mut(&mut self.services.routes).insert_name(name, pattern);
        self
    }

    /// Labels the most recently registered route with a controller action,
    /// e.g. `"UserController@store"`.
    ///
    /// # Panics
    ///
    /// Panics if no route has been registered yet.
    pub fn action(mut self, action: &str) -> Self {
        let endpoint = self.last_endpoint("action");
        endpoint.action = Some(action.to_owned());
        let pattern = endpoint.pattern.clone();
        Arc::make_mut(&mut self.services.routes).insert_action(action, pattern);
        self
    }

    /// Registers an application service, resolvable from form requests
    /// through [`Form::container`](crate::Form::container).
    pub fn provide<T: Send + Sync + 'static>(self, service: T) -> Self {
        self.services.container.register(service);
        self
    }

    /// Replaces the validator factory used by every form request.
    pub fn validator(self, factory: impl Factory + 'static) -> Self {
        self.provide(ValidationFactory::new(factory))
    }

    /// Replaces the handler for errors that escape request handling:
    /// denied authorization, undecodable bodies, unknown redirect targets.
    ///
    /// The default renders `403 Forbidden`, `400` and `500` respectively.
    pub fn recover<F>(mut self, recover: F) -> Self
    where
        F: Fn(Error) -> Response + Send + Sync + 'static,
    {
        self.services.recover = Arc::new(recover);
        self
    }

    pub fn container(&self) -> &Container {
        &self.services.container
    }

    /// Routes one request to its handler. Unmatched requests get `404`.
    ///
    /// This is the route-matched moment: the request leaves here carrying
    /// its [`Route`], the route parameters as its attribute bag, and the
    /// shared services form requests resolve their collaborators from.
    pub async fn dispatch(&self, mut req: Request) -> Response {
        let Some((endpoint, params)) = self.lookup(req.method(), req.path()) else {
            debug!(method = %req.method(), path = req.path(), "no route matched");
            return Response::status(StatusCode::NOT_FOUND);
        };

        debug!(
            method = %endpoint.method,
            path = req.path(),
            route = %endpoint.pattern,
            name = endpoint.name.as_deref(),
            "route matched"
        );

        let route = Route {
            method: endpoint.method.clone(),
            path: endpoint.pattern.clone(),
            name: endpoint.name.clone(),
            action: endpoint.action.clone(),
            params,
        };
        req.attach(route, self.services.clone());
        endpoint.handler.call(req).await
    }

    pub(crate) fn services(&self) -> &Services {
        &self.services
    }

    /// O(path-length) tree walk; only the matched parameters are allocated.
    fn lookup(&self, method: &Method, path: &str) -> Option<(&Endpoint, HashMap<String, String>)> {
        let matched = self.trees.get(method)?.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((&self.endpoints[*matched.value], params))
    }

    fn last_endpoint(&mut self, label: &str) -> &mut Endpoint {
        self.endpoints
            .last_mut()
            .unwrap_or_else(|| panic!("`{label}` called before any route was registered"))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn echo(req: Request) -> String {
        format!("{}:{}", req.route().and_then(Route::name).unwrap_or("-"), req.param("id").unwrap_or("-"))
    }

    #[tokio::test]
    async fn dispatch_attaches_route_and_params() {
        let router = Router::new().get("/users/{id}", echo).name("users.show");
        let req = Request::builder().uri("/users/42").build();

        let res = router.dispatch(req).await;
        assert_eq!(res.body(), b"users.show:42");
    }

    #[tokio::test]
    async fn unmatched_method_or_path_is_404() {
        let router = Router::new().get("/users/{id}", echo);

        let wrong_method = Request::builder().method(Method::POST).uri("/users/1").build();
        let wrong_path = Request::builder().uri("/teams").build();
        assert_eq!(router.dispatch(wrong_method).await.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(router.dispatch(wrong_path).await.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn labels_feed_the_route_table() {
        let router = Router::new()
            .get("/signup", echo).name("signup")
            .post("/signup", echo).action("SignupController@store");

        let routes = &router.services().routes;
        assert_eq!(routes.name("signup"), Some("/signup"));
        assert_eq!(routes.action("SignupController@store"), Some("/signup"));
    }

    #[test]
    #[should_panic(expected = "before any route")]
    fn naming_without_a_route_panics() {
        let _ = Router::new().name("orphan");
    }

    #[test]
    fn provided_services_resolve() {
        struct Greeting(&'static str);
        let router = Router::new().provide(Greeting("hi"));
        assert_eq!(router.container().resolve::<Greeting>().unwrap().0, "hi");
    }
}
