//! Rule declarations.

use std::fmt;

/// One rule applied to one field: a name plus its parameters.
///
/// Parsed from the pipe syntax: `"min:3"` is `Rule { name: "min", params: ["3"] }`,
/// `"between:1,10"` has two parameters.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rule {
    name: String,
    params: Vec<String>,
}

impl Rule {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), params: Vec::new() }
    }

    pub fn with_params<I, S>(name: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { name: name.into(), params: params.into_iter().map(Into::into).collect() }
    }

    /// Parses one `name:param,param` segment. Names are case-insensitive.
    pub fn parse(segment: &str) -> Self {
        let segment = segment.trim();
        match segment.split_once(':') {
            Some((name, params)) => Self::with_params(
                name.trim().to_ascii_lowercase(),
                params.split(',').map(str::trim),
            ),
            None => Self::new(segment.to_ascii_lowercase()),
        }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn params(&self) -> &[String] { &self.params }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.params.is_empty() {
            write!(f, ":{}", self.params.join(","))?;
        }
        Ok(())
    }
}

/// The rules a form request declares, in declaration order.
///
/// ```rust
/// use formgate::validation::RuleSet;
///
/// let rules = RuleSet::new()
///     .field("email", "required|email")
///     .field("password", "required|min:8|confirmed");
///
/// assert_eq!(rules.get("password").len(), 3);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RuleSet {
    fields: Vec<(String, Vec<Rule>)>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Adds pipe-separated rules for `field`. Repeated calls for the same
    /// field append.
    pub fn field(self, field: &str, rules: &str) -> Self {
        let parsed = rules.split('|')
            .filter(|s| !s.trim().is_empty())
            .map(Rule::parse);
        self.rules(field, parsed)
    }

    /// Adds already-built rules for `field`.
    pub fn rules(mut self, field: &str, rules: impl IntoIterator<Item = Rule>) -> Self {
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, existing)) => existing.extend(rules),
            None => self.fields.push((field.to_owned(), rules.into_iter().collect())),
        }
        self
    }

    pub fn get(&self, field: &str) -> &[Rule] {
        self.fields.iter()
            .find(|(name, _)| name == field)
            .map(|(_, rules)| rules.as_slice())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Rule])> {
        self.fields.iter().map(|(field, rules)| (field.as_str(), rules.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_params() {
        let rule = Rule::parse(" Between:1, 10 ");
        assert_eq!(rule.name(), "between");
        assert_eq!(rule.params(), ["1", "10"]);
        assert_eq!(rule.to_string(), "between:1,10");
        assert!(Rule::parse("required").params().is_empty());
    }

    #[test]
    fn repeated_fields_append_in_order() {
        let rules = RuleSet::new()
            .field("email", "required")
            .field("name", "string||max:20")
            .field("email", "email");
        let names: Vec<_> = rules.get("email").iter().map(Rule::name).collect();
        assert_eq!(names, ["required", "email"]);
        assert_eq!(rules.get("name").len(), 2);
        assert_eq!(rules.iter().map(|(f, _)| f).collect::<Vec<_>>(), ["email", "name"]);
    }
}
