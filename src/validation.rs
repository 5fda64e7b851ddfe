//! Input validators for the auth orchestrator's entry points.
//!
//! `Register`'s validation order is fixed (mobile → password → code →
//! name) so tests can assert which field triggers first.

use crate::config::Config;
use crate::error::{AppError, ErrorCode};

pub fn validate_mobile(mobile: &str) -> Result<(), AppError> {
    if mobile.len() == 11 && mobile.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AppError::new(ErrorCode::InvalidArgument, "mobile must be 11 decimal digits"))
    }
}

pub fn validate_password(password: &str, config: &Config) -> Result<(), AppError> {
    if password.len() < config.password_min_length || password.len() > config.password_max_length {
        return Err(AppError::new(
            ErrorCode::InvalidArgument,
            format!(
                "password must be between {} and {} characters",
                config.password_min_length, config.password_max_length
            ),
        ));
    }
    if config.password_require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
        return Err(AppError::new(ErrorCode::InvalidArgument, "password must contain an uppercase letter"));
    }
    if config.password_require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
        return Err(AppError::new(ErrorCode::InvalidArgument, "password must contain a lowercase letter"));
    }
    if config.password_require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::new(ErrorCode::InvalidArgument, "password must contain a digit"));
    }
    if config.password_require_special_char && !password.chars().any(|c| !c.is_alphanumeric()) {
        return Err(AppError::new(ErrorCode::InvalidArgument, "password must contain a special character"));
    }
    Ok(())
}

pub fn validate_sms_code(code: &str, expected_len: usize) -> Result<(), AppError> {
    if code.len() == expected_len && code.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AppError::new(ErrorCode::InvalidArgument, "code must be a numeric string of the configured length"))
    }
}

pub fn validate_display_name(name: &str) -> Result<(), AppError> {
    let len = name.chars().count();
    if len == 0 || len > 32 {
        Err(AppError::new(ErrorCode::InvalidArgument, "display name must be 1-32 codepoints"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        std::env::set_var("JWT_SECRET", "a".repeat(32));
        let cfg = Config::load().unwrap();
        std::env::remove_var("JWT_SECRET");
        cfg
    }

    #[test]
    fn mobile_requires_exactly_11_digits() {
        assert!(validate_mobile("13900000001").is_ok());
        assert!(validate_mobile("1390000000").is_err());
        assert!(validate_mobile("139000000012").is_err());
        assert!(validate_mobile("1390000000a").is_err());
    }

    #[test]
    fn password_enforces_configured_policy() {
        let cfg = config();
        assert!(validate_password("Aa1!aaaa", &cfg).is_ok());
        assert!(validate_password("short1A", &cfg).is_err());
        assert!(validate_password("alllowercase1", &cfg).is_err());
        assert!(validate_password("ALLUPPERCASE1", &cfg).is_err());
        assert!(validate_password("NoDigitsHere", &cfg).is_err());
    }

    #[test]
    fn sms_code_must_match_configured_length_and_be_numeric() {
        assert!(validate_sms_code("123456", 6).is_ok());
        assert!(validate_sms_code("12345", 6).is_err());
        assert!(validate_sms_code("abcdef", 6).is_err());
    }

    #[test]
    fn display_name_rejects_empty_and_overlong() {
        assert!(validate_display_name("alice").is_ok());
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name(&"a".repeat(33)).is_err());
        assert!(validate_display_name(&"a".repeat(32)).is_ok());
    }
}
