//! The merged input surface shared by requests, validators and flash data.
//!
//! Every input source (query string, form body, JSON body) decodes into the
//! same [`Input`] shape: an ordered map from field name to a JSON value.
//! Query and form values arrive as strings; `tags[]=a&tags[]=b` collects into
//! an array under `tags`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

static NULL: Value = Value::Null;

/// Ordered field → value map.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Input(Map<String, Value>);

impl Input {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builds input from decoded `key=value` pairs. Later keys overwrite
    /// earlier ones, except `key[]` which appends.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut input = Self::new();
        for (key, value) in pairs {
            let key = key.into();
            let value = Value::String(value.into());
            let Some(name) = key.strip_suffix("[]") else {
                input.0.insert(key, value);
                continue;
            };
            match input.0.get_mut(name) {
                Some(Value::Array(items)) => items.push(value),
                _ => {
                    input.0.insert(name.to_owned(), Value::Array(vec![value]));
                }
            }
        }
        input
    }

    /// Decodes an `application/x-www-form-urlencoded` string (query strings
    /// use the same encoding).
    pub fn from_urlencoded(encoded: &[u8]) -> Result<Self, Error> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(encoded)?;
        Ok(Self::from_pairs(pairs))
    }

    /// Top-level members of a JSON object. Any other JSON value carries no
    /// named fields and yields empty input.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::new(),
        }
    }

    /// Looks up a field. Dotted keys (`address.city`, `items.0`) walk into
    /// nested objects and arrays when no field has the literal dotted name.
    ///
    /// Absent fields yield [`Value::Null`].
    pub fn get(&self, key: &str) -> &Value {
        lookup(&[self], key)
    }

    /// `true` when the field is present and not an empty string.
    pub fn has(&self, key: &str) -> bool {
        is_filled(self.get(key))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Copies every field of `other` into `self`; `other` wins on conflicts.
    pub fn merge(&mut self, other: &Input) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// All fields except the named ones.
    pub fn except(&self, keys: &[&str]) -> Input {
        Self(
            self.0.iter()
                .filter(|(k, _)| !keys.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Only the named fields that are present.
    pub fn only(&self, keys: &[&str]) -> Input {
        Self(
            self.0.iter()
                .filter(|(k, _)| keys.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// Reads `key` from `layers` as if they had been merged in order, later
/// layers overwriting earlier ones field by field, without building the
/// merged map.
pub(crate) fn lookup<'a>(layers: &[&'a Input], key: &str) -> &'a Value {
    let top = |name: &str| layers.iter().rev().find_map(|layer| layer.0.get(name));

    if let Some(value) = top(key) {
        return value;
    }
    let Some((first, rest)) = key.split_once('.') else { return &NULL };
    let Some(mut current) = top(first) else { return &NULL };

    for segment in rest.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
        .unwrap_or(&NULL);
    }
    current
}

/// Present and not an empty string.
pub(crate) fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

impl From<Map<String, Value>> for Input {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Input {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn bracket_keys_collect_into_arrays() {
        let input = Input::from_urlencoded(b"tags[]=a&tags[]=b&name=x&name=y").unwrap();
        assert_eq!(input.get("tags"), &json!(["a", "b"]));
        assert_eq!(input.get("name"), &json!("y"));
    }

    #[test]
    fn dotted_lookup_walks_objects_and_arrays() {
        let input = Input::from_json(json!({
            "address": { "city": "Lyon" },
            "items": [{ "sku": "A1" }],
        }));
        assert_eq!(input.get("address.city"), &json!("Lyon"));
        assert_eq!(input.get("items.0.sku"), &json!("A1"));
        assert_eq!(input.get("items.3.sku"), &Value::Null);
        assert_eq!(input.get("address.zip"), &Value::Null);
    }

    #[test]
    fn literal_dotted_key_wins_over_nesting() {
        let mut input = Input::from_json(json!({ "a": { "b": 1 } }));
        input.insert("a.b", 2);
        assert_eq!(input.get("a.b"), &json!(2));
    }

    #[test]
    fn missing_key_is_null_not_error() {
        assert_eq!(Input::new().get("nope"), &Value::Null);
        assert!(!Input::new().has("nope"));
    }

    #[test]
    fn empty_string_is_not_present() {
        let input = Input::from_pairs([("email", "")]);
        assert!(input.contains_key("email"));
        assert!(!input.has("email"));
    }

    #[test]
    fn except_and_only_filter_top_level_keys() {
        let input = Input::from_pairs([("email", "a@b.c"), ("password", "x"), ("name", "n")]);
        let kept = input.except(&["password", "password_confirmation"]);
        assert_eq!(kept.keys().collect::<Vec<_>>(), ["email", "name"]);
        assert_eq!(input.only(&["name", "missing"]).len(), 1);
    }

    #[test]
    fn layered_lookup_matches_the_merged_map() {
        let query = Input::from_json(json!({ "user.email": "q@example.com", "page": "2", "a": { "b": "q" } }));
        let body = Input::from_json(json!({ "user": { "email": "b@example.com" }, "a": { "c": "b" } }));
        let mut merged = query.clone();
        merged.merge(&body);

        for key in ["user.email", "user", "page", "a.b", "a.c", "missing", "user.missing"] {
            assert_eq!(lookup(&[&query, &body], key), merged.get(key), "key={key}");
        }
    }

    #[test]
    fn non_object_json_has_no_fields() {
        assert!(Input::from_json(json!([1, 2, 3])).is_empty());
    }
}
