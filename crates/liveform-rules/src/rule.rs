// File: src/rule.rs
// Purpose: Parse pipe-separated rule strings into typed rules

use thiserror::Error;

/// A single field rule, parsed from its `name:arguments` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Required,
    /// Empty values skip every other rule.
    Nullable,
    Accepted,
    Email,
    /// Minimum length in characters.
    Min(usize),
    /// Maximum length in characters.
    Max(usize),
    /// `<field>_confirmation` must hold the same value.
    Confirmed,
    In(Vec<String>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleParseError {
    #[error("unknown rule `{0}`")]
    Unknown(String),

    #[error("rule `{rule}` expects {expected}")]
    BadArguments { rule: String, expected: &'static str },
}

impl Rule {
    /// Rules that run even when the value is empty.
    pub fn is_implicit(&self) -> bool {
        matches!(self, Rule::Required | Rule::Accepted)
    }

    /// Short name used for custom message keys (`email.required`).
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::Nullable => "nullable",
            Rule::Accepted => "accepted",
            Rule::Email => "email",
            Rule::Min(_) => "min",
            Rule::Max(_) => "max",
            Rule::Confirmed => "confirmed",
            Rule::In(_) => "in",
        }
    }

    /// Parse one rule such as `max:255` or `in:a,b,c`.
    pub fn parse(raw: &str) -> Result<Self, RuleParseError> {
        let raw = raw.trim();
        let (name, args) = match raw.split_once(':') {
            Some((name, args)) => (name.trim(), Some(args.trim())),
            None => (raw, None),
        };

        let bad = |expected: &'static str| RuleParseError::BadArguments {
            rule: name.to_string(),
            expected,
        };

        let length = || {
            args.and_then(|v| v.parse::<usize>().ok())
                .ok_or_else(|| bad("a length"))
        };

        let rule = match name {
            "required" => Rule::Required,
            "nullable" => Rule::Nullable,
            "accepted" => Rule::Accepted,
            "email" => Rule::Email,
            "min" => Rule::Min(length()?),
            "max" => Rule::Max(length()?),
            "confirmed" => Rule::Confirmed,
            "in" => {
                let values: Vec<String> = args
                    .unwrap_or("")
                    .split(',')
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect();
                if values.is_empty() {
                    return Err(bad("a comma-separated list"));
                }
                Rule::In(values)
            }
            other => return Err(RuleParseError::Unknown(other.to_string())),
        };

        Ok(rule)
    }

    /// Parse a full pipe-separated rule string.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, RuleParseError> {
        raw.split('|')
            .filter(|part| !part.trim().is_empty())
            .map(Rule::parse)
            .collect()
    }
}
