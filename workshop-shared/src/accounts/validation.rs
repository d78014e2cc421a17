//! Input checks for account fields

use crate::error::{AccountError, AccountResult};

/// Checks the basic `local@domain.tld` shape
///
/// No whitespace, exactly one `@` with text on both sides, and a `.` inside
/// the domain with text on both sides of it.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }

    let last = domain.len() - 1;
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i < last)
}

/// Trims a required text field, failing when it is blank
pub fn required(field: &str, value: &str) -> AccountResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AccountError::validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

/// Validates and normalizes an email: trimmed, lowercased
pub fn normalize_email(email: &str) -> AccountResult<String> {
    let email = required("email", email)?.to_lowercase();
    if !is_valid_email(&email) {
        return Err(AccountError::validation("invalid email address"));
    }
    Ok(email)
}
