//! Input validation rules for account fields
//!
//! All functions take already-trimmed input and return the user-facing
//! message on rejection.

/// Validate username: 3-20 characters, non-empty after trimming
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("All fields are required".to_string());
    }

    if username.len() < 3 {
        return Err("Username must be at least 3 characters".to_string());
    }

    if username.len() > 20 {
        return Err("Username cannot be longer than 20 characters".to_string());
    }

    Ok(())
}

/// Validate email: non-empty, at most 100 characters, contains '@'
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("All fields are required".to_string());
    }

    if email.len() > 100 {
        return Err("Email address is too long".to_string());
    }

    if !email.contains('@') {
        return Err("Please enter a valid email".to_string());
    }

    Ok(())
}

/// Validate a password for account creation: at least 8 characters with at
/// least one letter and one digit
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }

    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !has_letter || !has_digit {
        return Err("Password must contain at least one letter and one number".to_string());
    }

    Ok(())
}

/// Validate a new password together with its confirmation field
pub fn validate_new_password(password: &str, confirm_password: &str) -> Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }

    if password != confirm_password {
        return Err("Passwords do not match".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_bounds() {
        assert!(validate_username("abc").is_ok());
        assert!(validate_username("a".repeat(20).as_str()).is_ok());
        assert_eq!(
            validate_username("ab"),
            Err("Username must be at least 3 characters".to_string())
        );
        assert_eq!(
            validate_username("a".repeat(21).as_str()),
            Err("Username cannot be longer than 20 characters".to_string())
        );
        assert!(validate_username("").is_err());
    }

    #[test]
    fn test_email_rules() {
        assert!(validate_email("user@example.com").is_ok());
        assert_eq!(
            validate_email("not-an-email"),
            Err("Please enter a valid email".to_string())
        );
        let long = format!("{}@example.com", "a".repeat(100));
        assert_eq!(
            validate_email(&long),
            Err("Email address is too long".to_string())
        );
    }

    #[test]
    fn test_password_strength() {
        // 6 characters, too short
        assert_eq!(
            validate_password("short1"),
            Err("Password must be at least 8 characters".to_string())
        );
        // long enough, letter + digit
        assert!(validate_password("longenough1").is_ok());
        // long enough but no digit
        assert_eq!(
            validate_password("longenough"),
            Err("Password must contain at least one letter and one number".to_string())
        );
        // long enough but no letter
        assert!(validate_password("12345678").is_err());
    }

    #[test]
    fn test_password_confirmation() {
        assert!(validate_new_password("longenough1", "longenough1").is_ok());
        assert_eq!(
            validate_new_password("longenough1", "different1"),
            Err("Passwords do not match".to_string())
        );
        assert!(validate_new_password("short1", "short1").is_err());
    }
}
