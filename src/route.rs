//! The matched-route descriptor.

use std::collections::HashMap;

use http::Method;

/// The route a request was dispatched to.
///
/// Built by [`Router::dispatch`](crate::Router::dispatch) once matching
/// succeeds and handed to form requests alongside the request itself.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) name: Option<String>,
    pub(crate) action: Option<String>,
    pub(crate) params: HashMap<String, String>,
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            name: None,
            action: None,
            params: HashMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn method(&self) -> &Method { &self.method }

    /// The registered pattern, e.g. `/users/{id}`.
    pub fn path(&self) -> &str { &self.path }
    pub fn name(&self) -> Option<&str> { self.name.as_deref() }
    pub fn action(&self) -> Option<&str> { self.action.as_deref() }
    pub fn params(&self) -> &HashMap<String, String> { &self.params }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}
