//! Input checks run before any credentials leave the device.

use std::sync::LazyLock;

use regex::Regex;

use super::error::AuthError;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 72;
pub const MIN_NAME_LENGTH: usize = 2;
pub const MAX_NAME_LENGTH: usize = 50;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9+_.-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
        .expect("email validation regex must compile")
});

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(invalid("Email is required"));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(invalid("Please enter a valid email address"));
    }
    Ok(())
}

/// Length bounds, then strength: upper, lower and digit, no whitespace.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.trim().is_empty() {
        return Err(invalid("Password is required"));
    }
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(invalid(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(invalid(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    let strong = password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(char::is_lowercase)
        && password.chars().any(char::is_uppercase)
        && !password.chars().any(char::is_whitespace);
    if !strong {
        return Err(invalid(
            "Password must contain upper and lower case letters and a number, without spaces",
        ));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid("Name is required"));
    }
    let length = name.chars().count();
    if length < MIN_NAME_LENGTH {
        return Err(invalid(format!(
            "Name must be at least {MIN_NAME_LENGTH} characters"
        )));
    }
    if length > MAX_NAME_LENGTH {
        return Err(invalid(format!(
            "Name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

pub fn validate_password_confirmation(password: &str, confirmation: &str) -> Result<(), AuthError> {
    if confirmation.trim().is_empty() {
        return Err(invalid("Please confirm your password"));
    }
    if password != confirmation {
        return Err(invalid("Passwords do not match"));
    }
    Ok(())
}

pub fn validate_login_form(email: &str, password: &str) -> Result<(), AuthError> {
    validate_email(email)?;
    validate_password(password)
}

pub fn validate_registration_form(
    name: &str,
    email: &str,
    password: &str,
    confirmation: &str,
) -> Result<(), AuthError> {
    validate_name(name)?;
    validate_email(email)?;
    validate_password(password)?;
    validate_password_confirmation(password, confirmation)
}

fn invalid(message: impl Into<String>) -> AuthError {
    AuthError::Validation(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(result: Result<(), AuthError>) -> String {
        match result {
            Err(AuthError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn email_rules() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("  ada.l+tag@mail.example.org ").is_ok());
        assert_eq!(message(validate_email("")), "Email is required");
        assert!(validate_email("ada@").is_err());
        assert!(validate_email("ada example@x.com").is_err());
        assert!(validate_email("ada@localhost").is_err());
    }

    #[test]
    fn password_length_bounds() {
        assert_eq!(message(validate_password("   ")), "Password is required");
        assert!(message(validate_password("Ab1")).contains("at least 8"));
        let long = format!("Ab1{}", "x".repeat(70));
        assert!(message(validate_password(&long)).contains("at most 72"));
        let max = format!("Ab1{}", "x".repeat(69));
        assert!(validate_password(&max).is_ok());
    }

    #[test]
    fn password_strength() {
        assert!(validate_password("Secret123").is_ok());
        assert!(validate_password("secret123").is_err());
        assert!(validate_password("SECRET123").is_err());
        assert!(validate_password("SecretOnly").is_err());
        assert!(validate_password("Secret 123").is_err());
    }

    #[test]
    fn name_bounds() {
        assert!(validate_name("Al").is_ok());
        assert!(validate_name("A").is_err());
        assert!(validate_name(&"n".repeat(51)).is_err());
        assert_eq!(message(validate_name(" ")), "Name is required");
    }

    #[test]
    fn confirmation_must_match() {
        assert!(validate_password_confirmation("Secret123", "Secret123").is_ok());
        assert_eq!(
            message(validate_password_confirmation("Secret123", "Secret124")),
            "Passwords do not match"
        );
        assert!(validate_password_confirmation("Secret123", "").is_err());
    }

    #[test]
    fn forms_report_first_failure() {
        assert_eq!(
            message(validate_registration_form("A", "bad", "weak", "")),
            "Name must be at least 2 characters"
        );
        assert_eq!(
            message(validate_login_form("bad", "weak")),
            "Please enter a valid email address"
        );
        assert!(validate_registration_form("Ada", "ada@example.com", "Secret123", "Secret123").is_ok());
    }
}
