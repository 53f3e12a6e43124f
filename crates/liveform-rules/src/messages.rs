// File: src/messages.rs
// Purpose: Default human-readable messages for failed rules

use crate::rule::Rule;

/// Turns a field name into the attribute label used in messages
/// (`first_name` becomes `first name`).
pub fn attribute_label(field: &str) -> String {
    field.replace(['_', '-'], " ").trim().to_string()
}

/// Default message for a failed rule.
pub fn default_message(rule: &Rule, attribute: &str) -> String {
    match rule {
        Rule::Required => format!("The {attribute} field is required."),
        Rule::Accepted => format!("The {attribute} field must be accepted."),
        Rule::Email => format!("The {attribute} field must be a valid email address."),
        Rule::Min(min) => format!("The {attribute} field must be at least {min} characters."),
        Rule::Max(max) => {
            format!("The {attribute} field must not be greater than {max} characters.")
        }
        Rule::Confirmed => format!("The {attribute} field confirmation does not match."),
        Rule::In(_) => format!("The selected {attribute} is invalid."),
        Rule::Nullable => format!("The {attribute} field is invalid."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_attribute_label() {
        assert_eq!(attribute_label("first_name"), "first name");
        assert_eq!(attribute_label("email"), "email");
    }

    #[test]
    fn test_email_message() {
        assert_eq!(
            default_message(&Rule::Email, "email"),
            "The email field must be a valid email address."
        );
    }

    #[test]
    fn test_length_messages() {
        assert_eq!(
            default_message(&Rule::Min(8), "password"),
            "The password field must be at least 8 characters."
        );
        assert_eq!(
            default_message(&Rule::Max(255), "email address"),
            "The email address field must not be greater than 255 characters."
        );
    }
}
