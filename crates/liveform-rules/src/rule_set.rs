// File: src/rule_set.rs
// Purpose: The rule-set seam and its declarative implementation

use crate::checks;
use crate::messages::{attribute_label, default_message};
use crate::rule::{Rule, RuleParseError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Submitted field values, keyed by field name.
pub type FormInput = HashMap<String, String>;

/// Failed fields mapped to their messages, in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Messages for one field; empty when the field passed.
    pub fn for_field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }
}

/// A named collection of field rules that can judge submitted input.
///
/// This is the authority the validation endpoint defers to. Implement it to
/// plug an existing validation layer in; [`DeclaredRuleSet`] covers the
/// common case of rules written as strings.
pub trait RuleSet: Send + Sync {
    /// Names of the fields this rule set has rules for.
    fn fields(&self) -> Vec<String>;

    /// Validate `input`. When `only` names a field, just that field's rules
    /// run (the whole input is still visible to cross-field rules).
    fn validate(&self, input: &FormInput, only: Option<&str>) -> Result<(), FieldErrors>;
}

/// Serialized form of a declared rule set, as found in config files.
///
/// ```toml
/// [rules]
/// email = "required|email|max:255"
/// password = "required|min:8|confirmed"
///
/// [messages]
/// "email.required" = "We need an email address to reach you."
///
/// [attributes]
/// email = "email address"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSetSpec {
    #[serde(default)]
    pub rules: BTreeMap<String, String>,

    /// Overrides keyed by `field.rule`.
    #[serde(default)]
    pub messages: BTreeMap<String, String>,

    /// Display labels used instead of the field name in messages.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct FieldRules {
    field: String,
    rules: Vec<Rule>,
}

/// Rule set built from declared rule strings.
#[derive(Debug, Clone, Default)]
pub struct DeclaredRuleSet {
    fields: Vec<FieldRules>,
    messages: BTreeMap<String, String>,
    attributes: BTreeMap<String, String>,
}

impl DeclaredRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rules for a field, e.g. `.field("email", "required|email")?`.
    pub fn field(mut self, name: impl Into<String>, rules: &str) -> Result<Self, RuleParseError> {
        let field = name.into();
        let rules = Rule::parse_list(rules)?;
        self.fields.retain(|f| f.field != field);
        self.fields.push(FieldRules { field, rules });
        Ok(self)
    }

    pub fn message(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.messages.insert(key.into(), message.into());
        self
    }

    pub fn attribute(mut self, field: impl Into<String>, label: impl Into<String>) -> Self {
        self.attributes.insert(field.into(), label.into());
        self
    }

    pub fn from_spec(spec: &RuleSetSpec) -> Result<Self, RuleParseError> {
        let mut set = Self::new();
        for (field, rules) in &spec.rules {
            set = set.field(field.clone(), rules)?;
        }
        set.messages = spec.messages.clone();
        set.attributes = spec.attributes.clone();
        Ok(set)
    }

    fn label(&self, field: &str) -> String {
        self.attributes
            .get(field)
            .cloned()
            .unwrap_or_else(|| attribute_label(field))
    }

    fn check_field(&self, entry: &FieldRules, input: &FormInput, errors: &mut FieldErrors) {
        let value = input.get(&entry.field).map(String::as_str).unwrap_or("");
        let empty = value.trim().is_empty();

        if empty && entry.rules.contains(&Rule::Nullable) {
            return;
        }

        for rule in &entry.rules {
            if empty && !rule.is_implicit() {
                continue;
            }

            if !passes(rule, &entry.field, value, input) {
                let key = format!("{}.{}", entry.field, rule.name());
                let message = self
                    .messages
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| default_message(rule, &self.label(&entry.field)));
                errors.add(entry.field.clone(), message);

                // an empty required field has nothing else worth reporting
                if matches!(rule, Rule::Required) {
                    break;
                }
            }
        }
    }
}

impl RuleSet for DeclaredRuleSet {
    fn fields(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.field.clone()).collect()
    }

    fn validate(&self, input: &FormInput, only: Option<&str>) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        for entry in &self.fields {
            if only.is_some_and(|name| name != entry.field) {
                continue;
            }
            self.check_field(entry, input, &mut errors);
        }

        tracing::debug!(
            fields = self.fields.len(),
            failed = errors.len(),
            only = ?only,
            "rule set evaluated"
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Whether `value` satisfies one rule. Cross-field rules read `input`.
fn passes(rule: &Rule, field: &str, value: &str, input: &FormInput) -> bool {
    match rule {
        Rule::Required => !value.trim().is_empty(),
        Rule::Nullable => true,
        Rule::Accepted => checks::is_accepted(value),
        Rule::Email => checks::is_valid_email(value),
        Rule::Min(min) => checks::char_length(value) >= *min,
        Rule::Max(max) => checks::char_length(value) <= *max,
        Rule::Confirmed => {
            input
                .get(&format!("{field}_confirmation"))
                .map(String::as_str)
                .unwrap_or("")
                == value
        }
        Rule::In(allowed) => allowed.iter().any(|a| a == value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn input(pairs: &[(&str, &str)]) -> FormInput {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn register_rules() -> DeclaredRuleSet {
        DeclaredRuleSet::new()
            .field("email", "required|email|max:255")
            .unwrap()
            .field("password", "required|min:8|confirmed")
            .unwrap()
            .field("nickname", "nullable|min:3")
            .unwrap()
    }

    #[test]
    fn test_invalid_email_single_field() {
        let rules = register_rules();
        let errors = rules
            .validate(&input(&[("email", "not-an-email")]), Some("email"))
            .unwrap_err();

        assert_eq!(
            errors.for_field("email"),
            &["The email field must be a valid email address.".to_string()]
        );
        assert!(errors.for_field("password").is_empty());
    }

    #[test]
    fn test_valid_email_single_field() {
        let rules = register_rules();
        assert!(rules
            .validate(&input(&[("email", "user@example.com")]), Some("email"))
            .is_ok());
    }

    #[test]
    fn test_required_stops_further_rules() {
        let rules = register_rules();
        let errors = rules.validate(&input(&[]), Some("email")).unwrap_err();
        assert_eq!(
            errors.for_field("email"),
            &["The email field is required.".to_string()]
        );
    }

    #[test]
    fn test_whole_form_reports_every_field() {
        let rules = register_rules();
        let errors = rules
            .validate(
                &input(&[
                    ("email", "nope"),
                    ("password", "short"),
                    ("password_confirmation", "other"),
                ]),
                None,
            )
            .unwrap_err();

        let fields: Vec<_> = errors.fields().collect();
        assert_eq!(fields, vec!["email", "password"]);
        assert_eq!(
            errors.for_field("password"),
            &[
                "The password field must be at least 8 characters.".to_string(),
                "The password field confirmation does not match.".to_string(),
            ]
        );
    }

    #[test]
    fn test_cross_field_rules_see_whole_input() {
        let rules = register_rules();
        let data = input(&[
            ("password", "longenough"),
            ("password_confirmation", "longenough"),
        ]);
        assert!(rules.validate(&data, Some("password")).is_ok());
    }

    #[test]
    fn test_nullable_skips_empty_values() {
        let rules = register_rules();
        assert!(rules.validate(&input(&[("nickname", "")]), Some("nickname")).is_ok());

        let errors = rules
            .validate(&input(&[("nickname", "jo")]), Some("nickname"))
            .unwrap_err();
        assert_eq!(
            errors.for_field("nickname"),
            &["The nickname field must be at least 3 characters.".to_string()]
        );
    }

    #[test]
    fn test_unknown_field_is_valid() {
        let rules = register_rules();
        assert!(rules.validate(&input(&[]), Some("website")).is_ok());
    }

    #[test]
    fn test_custom_messages_and_attributes() {
        let rules = DeclaredRuleSet::new()
            .field("email", "required|email")
            .unwrap()
            .message("email.required", "We need an email address.")
            .attribute("email", "email address");

        let errors = rules.validate(&input(&[]), None).unwrap_err();
        assert_eq!(errors.for_field("email"), &["We need an email address.".to_string()]);

        let errors = rules.validate(&input(&[("email", "x")]), None).unwrap_err();
        assert_eq!(
            errors.for_field("email"),
            &["The email address field must be a valid email address.".to_string()]
        );
    }

    #[test]
    fn test_from_spec_toml() {
        let spec: RuleSetSpec = toml::from_str(
            r#"
            [rules]
            plan = "required|in:basic,pro"

            [messages]
            "plan.in" = "Pick one of the listed plans."
            "#,
        )
        .unwrap();

        let rules = DeclaredRuleSet::from_spec(&spec).unwrap();
        assert_eq!(rules.fields(), vec!["plan".to_string()]);
        assert!(rules.validate(&input(&[("plan", "pro")]), None).is_ok());

        let errors = rules.validate(&input(&[("plan", "gold")]), None).unwrap_err();
        assert_eq!(errors.for_field("plan"), &["Pick one of the listed plans.".to_string()]);
    }

    #[test]
    fn test_accepted_runs_on_empty_values() {
        let rules = DeclaredRuleSet::new().field("terms", "accepted").unwrap();
        let errors = rules.validate(&input(&[]), None).unwrap_err();
        assert_eq!(
            errors.for_field("terms"),
            &["The terms field must be accepted.".to_string()]
        );
        assert!(rules.validate(&input(&[("terms", "on")]), None).is_ok());
    }

    #[test]
    fn test_field_errors_serialize_as_map() {
        let mut errors = FieldErrors::new();
        errors.add("email", "bad");
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            serde_json::json!({ "email": ["bad"] })
        );
    }
}
