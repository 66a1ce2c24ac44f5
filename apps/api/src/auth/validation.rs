use std::sync::OnceLock;

use regex::Regex;

use crate::errors::AppError;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_PASSWORD_LEN: usize = 72;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
            .expect("email regex is valid")
    })
}

/// Trims and lower-cases an email address, rejecting malformed ones.
pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    if email.len() > 255 || !email_regex().is_match(&email) {
        return Err(AppError::UnprocessableEntity(
            "A valid email address is required".to_string(),
        ));
    }
    Ok(email)
}

pub fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    let len = name.chars().count();
    if !(2..=255).contains(&len) {
        return Err(AppError::UnprocessableEntity(
            "Name must be 2-255 characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Registration rule: 6–72 chars with at least one letter and one digit.
pub fn validate_new_password(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(AppError::UnprocessableEntity(format!(
            "Password must be {MIN_PASSWORD_LEN}-{MAX_PASSWORD_LEN} characters"
        )));
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err(AppError::UnprocessableEntity(
            "Password must contain at least one letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::UnprocessableEntity(
            "Password must contain at least one number".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalized() {
        assert_eq!(
            normalize_email("  Jane.Doe@Example.COM ").unwrap(),
            "jane.doe@example.com"
        );
    }

    #[test]
    fn test_email_rejected() {
        for bad in ["", "plain", "a@b", "@example.com", "a b@example.com"] {
            assert!(normalize_email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_name_bounds() {
        assert!(validate_name("A").is_err());
        assert!(validate_name("   ").is_err());
        assert_eq!(validate_name(" Al ").unwrap(), "Al");
        assert!(validate_name(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_new_password("abc12").is_err());
        assert!(validate_new_password("abcdef").is_err());
        assert!(validate_new_password("123456").is_err());
        assert!(validate_new_password(&format!("a{}", "1".repeat(72))).is_err());
        assert!(validate_new_password("abc123").is_ok());
        assert!(validate_new_password("Test123!").is_ok());
    }
}
