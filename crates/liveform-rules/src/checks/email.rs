//! Email address checks

/// Validates the shape of an email address.
///
/// Checks for:
/// - Exactly one '@' with a non-empty local part (at most 64 chars)
/// - A dotted domain that does not start or end with '.' or '-'
/// - No consecutive dots in the domain
/// - A top-level label of at least two characters
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if domain.contains('@') {
        return false;
    }

    if local.is_empty() || local.len() > 64 {
        return false;
    }

    if domain.is_empty() || domain.len() > 255 || !domain.contains('.') {
        return false;
    }

    if domain.starts_with(['.', '-']) || domain.ends_with(['.', '-']) || domain.contains("..") {
        return false;
    }

    let local_ok = local
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-' | '+'));
    let domain_ok = domain
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-'));

    if !local_ok || !domain_ok {
        return false;
    }

    domain
        .rsplit('.')
        .next()
        .map(|tld| tld.chars().count() >= 2)
        .unwrap_or(false)
}
