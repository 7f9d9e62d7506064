//! Error types for the USM engine

use thiserror::Error;

/// Top-level errors
#[derive(Debug, Error)]
pub enum Error {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Pricing, solvency and state-loading errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow { operation: &'static str },

    #[error("Arithmetic underflow in {operation}")]
    ArithmeticUnderflow { operation: &'static str },

    #[error("Protocol state unavailable: {reason}")]
    StateUnavailable { reason: String },

    #[error("Action not allowed: {reason}")]
    ActionNotAllowed { reason: String },
}

/// Result type alias for USM operations
pub type Result<T> = std::result::Result<T, Error>;

impl ProtocolError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::ArithmeticOverflow { .. } => "arithmetic_overflow",
            Self::ArithmeticUnderflow { .. } => "arithmetic_underflow",
            Self::StateUnavailable { .. } => "state_unavailable",
            Self::ActionNotAllowed { .. } => "action_not_allowed",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput { .. } => 400,
            Self::ArithmeticOverflow { .. } | Self::ArithmeticUnderflow { .. } => 422,
            Self::ActionNotAllowed { .. } => 422,
            Self::StateUnavailable { .. } => 503,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_codes() {
        let err = ProtocolError::invalid_input("price must be positive");
        assert_eq!(err.error_code(), "invalid_input");
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "Invalid input: price must be positive");

        let err = ProtocolError::ArithmeticOverflow {
            operation: "wad_mul",
        };
        assert_eq!(err.error_code(), "arithmetic_overflow");
        assert_eq!(err.status_code(), 422);

        let err = ProtocolError::StateUnavailable {
            reason: "oracle offline".into(),
        };
        assert_eq!(err.status_code(), 503);
    }

    #[test]
    fn test_error_from_protocol() {
        let err: Error = ProtocolError::ArithmeticUnderflow { operation: "sub" }.into();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
