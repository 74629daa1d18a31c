use crate::error::{AppError, AppResult};
use regex::Regex;

pub fn validate_email(email: &str) -> AppResult<()> {
    let email_regex = Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap();

    if !email_regex.is_match(email) {
        return Err(AppError::ValidationError(
            "Invalid email address".to_string(),
        ));
    }

    Ok(())
}

/// Canonical form stored in the unique column: trimmed, lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
