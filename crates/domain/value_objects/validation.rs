use thiserror::Error;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 100;
pub const MAX_EMAIL_LENGTH: usize = 100;
pub const MAX_NAME_LENGTH: usize = 100;
const PASSWORD_SPECIALS: &str = "@$!%*?&";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Email is required")]
    EmailRequired,
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Email must be less than 100 characters")]
    EmailTooLong,
    #[error("Password must be at least 8 characters")]
    PasswordTooShort,
    #[error("Password must be less than 100 characters")]
    PasswordTooLong,
    #[error(
        "Password must contain at least one uppercase letter, one lowercase letter, one number, and one special character"
    )]
    WeakPassword,
    #[error("Name is required")]
    NameRequired,
    #[error("Name must be less than 100 characters")]
    NameTooLong,
    #[error("Code must be 6 digits")]
    InvalidCode,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::EmailRequired);
    }
    if email.chars().count() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::EmailTooLong);
    }
    if email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail);
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::InvalidEmail);
    };
    if local.is_empty() || domain.contains('@') {
        return Err(ValidationError::InvalidEmail);
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(ValidationError::InvalidEmail);
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooLong);
    }

    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| PASSWORD_SPECIALS.contains(c));

    if has_lower && has_upper && has_digit && has_special {
        Ok(())
    } else {
        Err(ValidationError::WeakPassword)
    }
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::NameRequired);
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::NameTooLong);
    }
    Ok(())
}

pub fn validate_six_digit_code(code: &str) -> Result<(), ValidationError> {
    let code = code.trim();
    if code.len() == 6 && code.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidCode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_addresses() {
        assert!(validate_email("jane.doe@example.com").is_ok());
        assert!(validate_email("  jane@sub.example.co  ").is_ok());
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert_eq!(validate_email(""), Err(ValidationError::EmailRequired));
        for raw in ["jane", "@example.com", "jane@", "jane@example", "ja ne@example.com", "a@b@c.com", "jane@example..com"] {
            assert_eq!(validate_email(raw), Err(ValidationError::InvalidEmail), "{raw}");
        }
        let long = format!("{}@example.com", "a".repeat(100));
        assert_eq!(validate_email(&long), Err(ValidationError::EmailTooLong));
    }

    #[test]
    fn password_policy_requires_every_class() {
        assert!(validate_password("Secret1!").is_ok());
        assert_eq!(validate_password("Sh0rt!"), Err(ValidationError::PasswordTooShort));
        assert_eq!(validate_password("alllowercase1!"), Err(ValidationError::WeakPassword));
        assert_eq!(validate_password("NoDigitsHere!"), Err(ValidationError::WeakPassword));
        assert_eq!(validate_password("NoSpecial123"), Err(ValidationError::WeakPassword));
        assert_eq!(
            validate_password(&format!("Aa1!{}", "x".repeat(100))),
            Err(ValidationError::PasswordTooLong)
        );
    }

    #[test]
    fn codes_must_be_six_digits() {
        assert!(validate_six_digit_code("012345").is_ok());
        assert!(validate_six_digit_code("12345").is_err());
        assert!(validate_six_digit_code("12a456").is_err());
    }

    #[test]
    fn names_are_trimmed_before_checks() {
        assert_eq!(validate_name("   "), Err(ValidationError::NameRequired));
        assert!(validate_name(" Jane Doe ").is_ok());
    }
}
