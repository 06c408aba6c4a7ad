//! The built-in rule engine.
//!
//! A deliberately small rule vocabulary covering what form requests reach for
//! most often. Anything else plugs in through [`Engine::extend`] or a custom
//! [`Factory`].
//!
//! | Rule | Passes when |
//! |---|---|
//! | `required` | present: not null, not blank, not an empty array |
//! | `required_with:a,b` | present, or none of `a`, `b` present |
//! | `accepted` | `yes`, `on`, `1`, `true` |
//! | `string` / `array` / `boolean` | value has that type |
//! | `numeric` / `integer` | number, or a string that parses as one |
//! | `email` / `url` | string in that format |
//! | `alpha` / `alpha_num` / `alpha_dash` | letters / + digits / + `-` `_` |
//! | `min:n` / `max:n` / `between:a,b` / `size:n` | size bound (see below) |
//! | `confirmed` | equals `{field}_confirmation` |
//! | `same:f` / `different:f` | equals / differs from field `f` |
//! | `in:a,b` / `not_in:a,b` | listed / not listed |
//!
//! Size is the number itself for fields that also carry `numeric` or
//! `integer`, the element count for arrays, kilobytes for uploaded files and
//! the character count for everything else.
//!
//! Rules other than `required`, `required_with` and `accepted` are skipped
//! for absent or blank fields. Unknown rule names fail closed.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use super::{Factory, MessageBag, Messages, Rule, RuleSet, Validator};
use crate::input::Input;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$").unwrap()
});

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").unwrap());

const IMPLICIT: &[&str] = &["required", "required_with", "accepted"];

type Check = Arc<dyn Fn(&Value, &[String], &Input) -> bool + Send + Sync>;

/// The default [`Factory`].
///
/// ```rust
/// use formgate::validation::{Engine, Factory, Messages, RuleSet};
/// use formgate::Input;
///
/// let input = Input::from_pairs([("email", "bad")]);
/// let rules = RuleSet::new().field("email", "required|email");
/// let validator = Engine::new().make(input, rules, Messages::new());
///
/// assert!(validator.fails());
/// assert_eq!(
///     validator.errors().get("email"),
///     ["The email must be a valid email address."],
/// );
/// ```
#[derive(Clone, Default)]
pub struct Engine {
    extensions: HashMap<String, (Check, String)>,
}

impl Engine {
    pub fn new() -> Self {
        Self { extensions: HashMap::new() }
    }

    /// Registers a custom rule. `message` is the default template; custom
    /// [`Messages`] still take precedence.
    ///
    /// ```rust
    /// use formgate::validation::Engine;
    ///
    /// let engine = Engine::new().extend(
    ///     "uppercase",
    ///     "The :attribute must be uppercase.",
    ///     |value, _params, _input| value.as_str().is_some_and(|s| s == s.to_uppercase()),
    /// );
    /// ```
    pub fn extend<F>(mut self, name: &str, message: &str, check: F) -> Self
    where
        F: Fn(&Value, &[String], &Input) -> bool + Send + Sync + 'static,
    {
        self.extensions.insert(name.to_ascii_lowercase(), (Arc::new(check), message.to_owned()));
        self
    }

    fn run(&self, input: &Input, rules: &RuleSet, messages: &Messages) -> MessageBag {
        let mut errors = MessageBag::new();

        for (field, field_rules) in rules.iter() {
            let value = input.get(field);
            let kind = Kind::of(value, field_rules);

            for rule in field_rules {
                if !is_present(value) && !IMPLICIT.contains(&rule.name()) {
                    continue;
                }
                if !self.check(rule, field, value, kind, input) {
                    errors.add(field, self.message(rule, field, kind, messages));
                }
            }
        }

        errors
    }

    fn check(&self, rule: &Rule, field: &str, value: &Value, kind: Kind, input: &Input) -> bool {
        let params = rule.params();
        match rule.name() {
            "required" => is_present(value),
            "required_with" => is_present(value) || !params.iter().any(|other| input.has(other)),
            "accepted" => matches!(scalar(value).as_deref(), Some("yes" | "on" | "1" | "true")),
            "array" => value.is_array(),
            "boolean" => {
                value.is_boolean() || matches!(scalar(value).as_deref(), Some("0" | "1"))
            }
            "string" => value.is_string(),
            "numeric" => number(value).is_some(),
            "integer" => match value {
                Value::Number(n) => n.is_i64() || n.is_u64(),
                Value::String(s) => s.trim().parse::<i64>().is_ok(),
                _ => false,
            },
            "email" => value.as_str().is_some_and(|s| EMAIL_REGEX.is_match(s)),
            "url" => value.as_str().is_some_and(|s| URL_REGEX.is_match(s)),
            "alpha" => all_chars(value, char::is_alphabetic),
            "alpha_num" => all_chars(value, char::is_alphanumeric),
            "alpha_dash" => all_chars(value, |c| c.is_alphanumeric() || c == '-' || c == '_'),
            "min" => bound(params, 0).is_some_and(|min| size(value, kind) >= min),
            "max" => bound(params, 0).is_some_and(|max| size(value, kind) <= max),
            "size" => bound(params, 0).is_some_and(|n| size(value, kind) == n),
            "between" => match (bound(params, 0), bound(params, 1)) {
                (Some(min), Some(max)) => (min..=max).contains(&size(value, kind)),
                _ => false,
            },
            "confirmed" => input.get(&format!("{field}_confirmation")) == value,
            "same" => rule.param(0).is_some_and(|other| input.get(other) == value),
            "different" => rule.param(0).is_some_and(|other| input.get(other) != value),
            "in" => scalar(value).is_some_and(|s| params.contains(&s)),
            "not_in" => scalar(value).is_some_and(|s| !params.contains(&s)),
            name => match self.extensions.get(name) {
                Some((check, _)) => check(value, params, input),
                None => {
                    warn!(rule = name, field, "unknown validation rule");
                    false
                }
            },
        }
    }

    fn message(&self, rule: &Rule, field: &str, kind: Kind, messages: &Messages) -> String {
        let template = match messages.lookup(field, rule.name()) {
            Some(custom) => custom.to_owned(),
            None => match self.extensions.get(rule.name()) {
                Some((_, message)) => message.clone(),
                None => default_template(rule.name(), kind)
                    .map(str::to_owned)
                    .unwrap_or_else(|| format!("validation.{}", rule.name())),
            },
        };

        let mut message = template.replace(":attribute", &attribute(field));
        let first = rule.param(0).unwrap_or_default();
        match rule.name() {
            "between" => {
                message = message
                    .replace(":min", first)
                    .replace(":max", rule.param(1).unwrap_or_default());
            }
            "min" => message = message.replace(":min", first),
            "max" => message = message.replace(":max", first),
            "size" => message = message.replace(":size", first),
            "same" | "different" => message = message.replace(":other", &attribute(first)),
            "required_with" => {
                let values: Vec<_> = rule.params().iter().map(|p| attribute(p)).collect();
                message = message.replace(":values", &values.join(" / "));
            }
            _ => {}
        }
        message
    }
}

impl Factory for Engine {
    fn make(&self, input: Input, rules: RuleSet, messages: Messages) -> Box<dyn Validator> {
        let errors = self.run(&input, &rules, &messages);
        Box::new(Verdict { errors })
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .finish()
    }
}

struct Verdict {
    errors: MessageBag,
}

impl Validator for Verdict {
    fn passes(&self) -> bool {
        self.errors.is_empty()
    }

    fn errors(&self) -> &MessageBag {
        &self.errors
    }
}

// ── Value helpers ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
enum Kind {
    Numeric,
    Array,
    File,
    Text,
}

impl Kind {
    fn of(value: &Value, rules: &[Rule]) -> Self {
        let numeric = rules.iter().any(|r| matches!(r.name(), "numeric" | "integer"));
        match value {
            _ if numeric && number(value).is_some() => Self::Numeric,
            Value::Array(_) => Self::Array,
            Value::Object(map) if map.contains_key("filename") && map.contains_key("size") => Self::File,
            _ => Self::Text,
        }
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn size(value: &Value, kind: Kind) -> f64 {
    match (kind, value) {
        (Kind::Numeric, _) => number(value).unwrap_or_default(),
        (Kind::Array, Value::Array(items)) => items.len() as f64,
        (Kind::File, Value::Object(map)) => {
            map.get("size").and_then(Value::as_f64).unwrap_or_default() / 1024.0
        }
        (_, Value::String(s)) => s.chars().count() as f64,
        _ => scalar(value).map(|s| s.chars().count() as f64).unwrap_or_default(),
    }
}

/// String form of a scalar for `in`, `accepted` and friends.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("1".to_owned()),
        Value::Bool(false) => Some("0".to_owned()),
        _ => None,
    }
}

fn all_chars(value: &Value, pred: impl Fn(char) -> bool) -> bool {
    value.as_str().is_some_and(|s| !s.is_empty() && s.chars().all(pred))
}

fn bound(params: &[String], index: usize) -> Option<f64> {
    params.get(index)?.parse().ok()
}

/// `password_confirmation` reads as "password confirmation" in messages.
fn attribute(field: &str) -> String {
    field.replace('_', " ")
}

fn default_template(rule: &str, kind: Kind) -> Option<&'static str> {
    let template = match (rule, kind) {
        ("accepted", _) => "The :attribute must be accepted.",
        ("alpha", _) => "The :attribute may only contain letters.",
        ("alpha_dash", _) => "The :attribute may only contain letters, numbers, and dashes.",
        ("alpha_num", _) => "The :attribute may only contain letters and numbers.",
        ("array", _) => "The :attribute must be an array.",
        ("between", Kind::Numeric) => "The :attribute must be between :min and :max.",
        ("between", Kind::File) => "The :attribute must be between :min and :max kilobytes.",
        ("between", Kind::Array) => "The :attribute must have between :min and :max items.",
        ("between", Kind::Text) => "The :attribute must be between :min and :max characters.",
        ("boolean", _) => "The :attribute field must be true or false.",
        ("confirmed", _) => "The :attribute confirmation does not match.",
        ("different", _) => "The :attribute and :other must be different.",
        ("email", _) => "The :attribute must be a valid email address.",
        ("in" | "not_in", _) => "The selected :attribute is invalid.",
        ("integer", _) => "The :attribute must be an integer.",
        ("max", Kind::Numeric) => "The :attribute may not be greater than :max.",
        ("max", Kind::File) => "The :attribute may not be greater than :max kilobytes.",
        ("max", Kind::Array) => "The :attribute may not have more than :max items.",
        ("max", Kind::Text) => "The :attribute may not be greater than :max characters.",
        ("min", Kind::Numeric) => "The :attribute must be at least :min.",
        ("min", Kind::File) => "The :attribute must be at least :min kilobytes.",
        ("min", Kind::Array) => "The :attribute must have at least :min items.",
        ("min", Kind::Text) => "The :attribute must be at least :min characters.",
        ("numeric", _) => "The :attribute must be a number.",
        ("required", _) => "The :attribute field is required.",
        ("required_with", _) => "The :attribute field is required when :values is present.",
        ("same", _) => "The :attribute and :other must match.",
        ("size", Kind::Numeric) => "The :attribute must be :size.",
        ("size", Kind::File) => "The :attribute must be :size kilobytes.",
        ("size", Kind::Array) => "The :attribute must contain :size items.",
        ("size", Kind::Text) => "The :attribute must be :size characters.",
        ("string", _) => "The :attribute must be a string.",
        ("url", _) => "The :attribute format is invalid.",
        _ => return None,
    };
    Some(template)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn errors(input: Value, rules: RuleSet) -> MessageBag {
        Engine::new()
            .make(Input::from_json(input), rules, Messages::new())
            .errors()
            .clone()
    }

    #[test]
    fn invalid_email_uses_standard_message() {
        let bag = errors(
            json!({ "email": "bad", "password": "x" }),
            RuleSet::new().field("email", "required|email"),
        );
        assert_eq!(bag.to_json(), json!({ "email": ["The email must be a valid email address."] }));
    }

    #[test]
    fn valid_input_passes() {
        let validator = Engine::new().make(
            Input::from_json(json!({ "email": "ada@example.com", "age": "36", "tags": ["a"] })),
            RuleSet::new()
                .field("email", "required|email|max:64")
                .field("age", "integer|between:18,120")
                .field("tags", "array|min:1"),
            Messages::new(),
        );
        assert!(validator.passes());
        assert!(validator.errors().is_empty());
    }

    #[test]
    fn optional_rules_skip_blank_fields() {
        let bag = errors(json!({ "nickname": "  " }), RuleSet::new().field("nickname", "alpha|min:3"));
        assert!(bag.is_empty());

        let bag = errors(json!({}), RuleSet::new().field("name", "required|min:3"));
        assert_eq!(bag.get("name"), ["The name field is required."]);
    }

    #[test]
    fn size_depends_on_field_kind() {
        let bag = errors(
            json!({ "age": "12", "name": "Al", "tags": ["a"] }),
            RuleSet::new()
                .field("age", "numeric|min:18")
                .field("name", "min:3")
                .field("tags", "array|min:2"),
        );
        assert_eq!(bag.first("age"), Some("The age must be at least 18."));
        assert_eq!(bag.first("name"), Some("The name must be at least 3 characters."));
        assert_eq!(bag.first("tags"), Some("The tags must have at least 2 items."));
    }

    #[test]
    fn confirmed_compares_with_confirmation_field() {
        let rules = RuleSet::new().field("password", "required|confirmed");
        let bag = errors(json!({ "password": "a", "password_confirmation": "b" }), rules.clone());
        assert_eq!(bag.get("password"), ["The password confirmation does not match."]);

        assert!(errors(json!({ "password": "a", "password_confirmation": "a" }), rules).is_empty());
    }

    #[test]
    fn required_with_and_other_field_placeholders() {
        let bag = errors(
            json!({ "street": "Main", "email": "a@b.co", "backup_email": "a@b.co" }),
            RuleSet::new()
                .field("city", "required_with:street")
                .field("backup_email", "different:email"),
        );
        assert_eq!(bag.first("city"), Some("The city field is required when street is present."));
        assert_eq!(bag.first("backup_email"), Some("The backup email and email must be different."));
    }

    #[test]
    fn custom_messages_win() {
        let messages = Messages::new()
            .add("email.required", "Tell us where to write.")
            .add("in", ":attribute must be one of the listed plans.");
        let validator = Engine::new().make(
            Input::from_json(json!({ "plan": "gold" })),
            RuleSet::new().field("email", "required").field("plan", "in:free,pro"),
            messages,
        );
        assert_eq!(validator.errors().get("email"), ["Tell us where to write."]);
        assert_eq!(validator.errors().get("plan"), ["plan must be one of the listed plans."]);
    }

    #[test]
    fn unknown_rules_fail_closed() {
        let bag = errors(json!({ "code": "x" }), RuleSet::new().field("code", "luhn"));
        assert_eq!(bag.get("code"), ["validation.luhn"]);
    }

    #[test]
    fn extensions_run_with_their_message() {
        let engine = Engine::new().extend("even", "The :attribute must be even.", |value, _, _| {
            value.as_str().and_then(|s| s.parse::<i64>().ok()).is_some_and(|n| n % 2 == 0)
        });
        let validator = engine.make(
            Input::from_pairs([("count", "3")]),
            RuleSet::new().field("count", "even"),
            Messages::new(),
        );
        assert_eq!(validator.errors().get("count"), ["The count must be even."]);
    }

    #[test]
    fn file_sizes_are_kilobytes() {
        let file = json!({ "filename": "a.bin", "content_type": null, "size": 4096 });
        let bag = errors(json!({ "upload": file }), RuleSet::new().field("upload", "required|max:2"));
        assert_eq!(bag.get("upload"), ["The upload may not be greater than 2 kilobytes."]);
    }
}
