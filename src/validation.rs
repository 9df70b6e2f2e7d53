use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ServiceError;

pub const MAX_NAME_LEN: usize = 100;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles")
});

/// Trims and bounds a required display name.
pub fn validate_name(field: &str, value: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation(format!("{field} cannot be blank")));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ServiceError::Validation(format!(
            "{field} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Returns the lowercased address.
pub fn validate_email(value: &str) -> Result<String, ServiceError> {
    let email = value.trim().to_lowercase();
    if email.len() > MAX_NAME_LEN || !EMAIL_REGEX.is_match(&email) {
        return Err(ServiceError::Validation("Invalid email format".into()));
    }
    Ok(email)
}

pub fn validate_capacity(value: u32, min: u32, max: u32) -> Result<u32, ServiceError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ServiceError::Validation(format!(
            "capacity must be between {min} and {max}"
        )))
    }
}
