//! liveform rules
//!
//! The server-side authority behind live form validation. A [`RuleSet`] takes
//! the submitted field map and answers pass/fail with per-field messages.
//! [`DeclaredRuleSet`] is the reference implementation, built from
//! pipe-separated rule strings such as `required|email|max:255`.

pub mod checks;
pub mod messages;
pub mod rule;
pub mod rule_set;

pub use rule::{Rule, RuleParseError};
pub use rule_set::{DeclaredRuleSet, FieldErrors, FormInput, RuleSet, RuleSetSpec};
