//! Error types for Helix operations
//!
//! Every failed precondition aborts the enclosing operation; the error only has to
//! say which class of failure happened and why.

use thiserror::Error;

/// Result type alias for Helix operations
pub type Result<T> = std::result::Result<T, HelixError>;

/// Failure classes surfaced to callers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authorization,
    Validation,
    NotFound,
    InsufficientBalance,
    Timing,
    Invariant,
    External,
    Serialization,
}

/// Errors that can occur in Helix operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HelixError {
    /// Caller lacks the required permission
    #[error("missing authority of {0}")]
    MissingAuthority(String),

    /// Malformed or out-of-range input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Referenced row does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// A balance, stake or quota would go negative
    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    /// Cooldown, delay or activation gate not satisfied yet
    #[error("not available yet: {0}")]
    NotYetAvailable(String),

    /// A conservation or non-negativity invariant would break
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A host service rejected the call
    #[error("host service error: {0}")]
    External(String),

    /// Encoding or decoding failed
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl HelixError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn insufficient(msg: impl Into<String>) -> Self {
        Self::InsufficientBalance(msg.into())
    }

    pub fn too_early(msg: impl Into<String>) -> Self {
        Self::NotYetAvailable(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn external(msg: impl Into<String>) -> Self {
        Self::External(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingAuthority(_) => ErrorKind::Authorization,
            Self::InvalidInput(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InsufficientBalance(_) => ErrorKind::InsufficientBalance,
            Self::NotYetAvailable(_) => ErrorKind::Timing,
            Self::InvariantViolation(_) => ErrorKind::Invariant,
            Self::External(_) => ErrorKind::External,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Stable numeric code for API responses
    pub fn code(&self) -> u32 {
        match self.kind() {
            ErrorKind::Authorization => 3001,
            ErrorKind::Validation => 3002,
            ErrorKind::NotFound => 3003,
            ErrorKind::InsufficientBalance => 3004,
            ErrorKind::Timing => 3005,
            ErrorKind::Invariant => 3006,
            ErrorKind::External => 3007,
            ErrorKind::Serialization => 3008,
        }
    }
}

impl From<serde_json::Error> for HelixError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Return early with `$err` unless `$cond` holds
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr $(,)?) => {
        if !$cond {
            return Err($err);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_positive(v: i64) -> Result<i64> {
        ensure!(v > 0, HelixError::invalid("must be positive"));
        Ok(v)
    }

    #[test]
    fn test_error_kinds_and_codes() {
        let err = HelixError::MissingAuthority("alice".into());
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(err.code(), 3001);

        let err = HelixError::too_early("refund is not available yet");
        assert_eq!(err.kind(), ErrorKind::Timing);
        assert_eq!(err.code(), 3005);
    }

    #[test]
    fn test_error_display() {
        let err = HelixError::not_found("producer not found");
        assert!(err.to_string().contains("producer not found"));
    }

    #[test]
    fn test_ensure_macro() {
        assert_eq!(check_positive(3), Ok(3));
        assert_eq!(check_positive(0).unwrap_err().kind(), ErrorKind::Validation);
    }
}
