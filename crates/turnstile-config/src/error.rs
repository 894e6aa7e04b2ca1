//! Error types for configuration operations.

use argon2::password_hash::Error as PasswordHashError;
use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was absent or empty.
    #[error("missing required configuration")]
    MissingField {
        /// Environment variable that was missing.
        field: &'static str,
    },
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Environment variable that failed validation.
        field: &'static str,
        /// Offending value when it is safe to echo.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// A credential entry could not be parsed.
    #[error("invalid credential entry")]
    InvalidCredentialEntry {
        /// Position of the entry within the credential list.
        index: usize,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Failed to hash secret material.
    #[error("failed to hash secret material")]
    SecretHashFailed {
        /// Hashing error detail.
        detail: PasswordHashError,
    },
    /// Stored secret hash payload was invalid.
    #[error("invalid stored hash")]
    StoredHashInvalid {
        /// User the hash belongs to.
        username: String,
        /// Hash parsing error detail.
        detail: PasswordHashError,
    },
    /// Secret verification failed for a reason other than a mismatch.
    #[error("failed to verify secret")]
    SecretVerifyFailed {
        /// Verification error detail.
        detail: PasswordHashError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_messages_are_constant() {
        let missing = ConfigError::MissingField {
            field: "JWT_SECRET",
        };
        assert_eq!(missing.to_string(), "missing required configuration");

        let invalid = ConfigError::InvalidField {
            field: "AUTH_API_PORT",
            value: Some("70000".to_string()),
            reason: "out_of_range",
        };
        assert_eq!(invalid.to_string(), "invalid configuration field");

        let entry = ConfigError::InvalidCredentialEntry {
            index: 2,
            reason: "missing_separator",
        };
        assert_eq!(entry.to_string(), "invalid credential entry");

        let stored = ConfigError::StoredHashInvalid {
            username: "admin".to_string(),
            detail: PasswordHashError::PhcStringField,
        };
        assert_eq!(stored.to_string(), "invalid stored hash");
    }
}
