//! The validator adapter.
//!
//! Form requests never validate input themselves. They hand their input,
//! rules and custom messages to a [`Factory`], get back a [`Validator`], and
//! read its verdict. The contract is small on purpose:
//!
//! ```text
//! Factory::make(input, rules, messages) -> Validator
//! Validator::passes()                   -> bool
//! Validator::errors()                   -> field → [message, …]
//! ```
//!
//! [`Engine`] is the factory used when the application registers none. Plug
//! your own rule engine in with [`Router::validator`](crate::Router::validator).

mod engine;
mod rules;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::input::Input;

pub use engine::Engine;
pub use rules::{Rule, RuleSet};

/// Produces one [`Validator`] per validation run.
pub trait Factory: Send + Sync {
    fn make(&self, input: Input, rules: RuleSet, messages: Messages) -> Box<dyn Validator>;
}

/// The outcome of validating one input against one rule set.
pub trait Validator: Send {
    fn passes(&self) -> bool;

    fn fails(&self) -> bool {
        !self.passes()
    }

    /// Field → messages, in rule order. Empty when the input passed.
    fn errors(&self) -> &MessageBag;
}

/// The container entry form requests resolve their [`Factory`] from.
#[derive(Clone)]
pub struct ValidationFactory(Arc<dyn Factory>);

impl ValidationFactory {
    pub fn new(factory: impl Factory + 'static) -> Self {
        Self(Arc::new(factory))
    }

    pub fn factory(&self) -> &dyn Factory {
        self.0.as_ref()
    }
}

impl Default for ValidationFactory {
    fn default() -> Self {
        Self::new(Engine::new())
    }
}

impl fmt::Debug for ValidationFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValidationFactory(..)")
    }
}

// ── MessageBag ────────────────────────────────────────────────────────────────

/// Field name → ordered list of human-readable error messages.
///
/// Serialises as a plain JSON object:
/// `{"email": ["The email must be a valid email address."]}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MessageBag(BTreeMap<String, Vec<String>>);

impl MessageBag {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn first(&self, field: &str) -> Option<&str> {
        self.get(field).first().map(String::as_str)
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of fields with at least one message.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn messages(&self) -> &BTreeMap<String, Vec<String>> {
        &self.0
    }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self.0.iter()
            .map(|(field, messages)| {
                let list = messages.iter().cloned().map(Value::String).collect();
                (field.clone(), Value::Array(list))
            })
            .collect();
        Value::Object(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MessageBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = Self::new();
        for (field, message) in iter {
            bag.add(field, message);
        }
        bag
    }
}

// ── Messages ──────────────────────────────────────────────────────────────────

/// Custom error messages.
///
/// Keys are either `field.rule` (one field) or `rule` (every field). Templates
/// may use `:attribute` and the rule's own placeholders (`:min`, `:max`,
/// `:size`, `:other`, `:values`).
///
/// ```rust
/// use formgate::validation::Messages;
///
/// let messages = Messages::new()
///     .add("email.required", "We need your email address.")
///     .add("required", "Please fill in :attribute.");
/// assert_eq!(messages.lookup("email", "required"), Some("We need your email address."));
/// assert_eq!(messages.lookup("name", "required"), Some("Please fill in :attribute."));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Messages(HashMap<String, String>);

impl Messages {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn add(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.0.insert(key.into(), template.into());
        self
    }

    /// The most specific custom template for `field` failing `rule`.
    pub fn lookup(&self, field: &str, rule: &str) -> Option<&str> {
        self.0.get(&format!("{field}.{rule}"))
            .or_else(|| self.0.get(rule))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn message_bag_serialises_as_field_map() {
        let bag: MessageBag = [
            ("email", "The email must be a valid email address."),
            ("name", "The name field is required."),
            ("email", "The email may not be greater than 5 characters."),
        ].into_iter().collect();

        assert_eq!(serde_json::to_value(&bag).unwrap(), bag.to_json());
        assert_eq!(bag.to_json(), json!({
            "email": [
                "The email must be a valid email address.",
                "The email may not be greater than 5 characters.",
            ],
            "name": ["The name field is required."],
        }));
        assert_eq!(bag.first("email"), Some("The email must be a valid email address."));
        assert!(bag.get("missing").is_empty());
    }
}
