// ⚠️ Error taxonomy - every failure a caller can receive from the core
//
// All variants are recoverable at the call site: the form that triggered
// the operation shows the message and keeps its state.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RealtyError {
    /// No credential record matched the username/password pair
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Username already exists: {0}")]
    UsernameTaken(String),

    /// A required form field was empty
    #[error("Missing required field: {field}")]
    MissingRequiredField { field: &'static str },

    #[error("Unknown property subtype: {0}")]
    UnknownPropertySubtype(String),

    #[error("Unknown property condition: {0}")]
    UnknownCondition(String),

    /// Another identity is already logged in
    #[error("A session is already active for {0}; log out first")]
    SessionActive(String),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Course not found: {0}")]
    CourseNotFound(i64),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for RealtyError {
    fn from(err: rusqlite::Error) -> Self {
        RealtyError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for RealtyError {
    fn from(err: std::io::Error) -> Self {
        RealtyError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for RealtyError {
    fn from(err: serde_json::Error) -> Self {
        RealtyError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RealtyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_match_form_feedback() {
        assert_eq!(RealtyError::InvalidCredentials.to_string(), "Invalid credentials");
        assert_eq!(RealtyError::PasswordMismatch.to_string(), "Passwords do not match");
        assert_eq!(
            RealtyError::PasswordTooShort { min: 6 }.to_string(),
            "Password must be at least 6 characters"
        );
        assert_eq!(
            RealtyError::MissingRequiredField { field: "city" }.to_string(),
            "Missing required field: city"
        );
    }

    #[test]
    fn test_storage_conversion() {
        let err: RealtyError = serde_json::from_str::<i32>("not json").unwrap_err().into();
        assert!(matches!(err, RealtyError::Storage(_)));
    }
}
