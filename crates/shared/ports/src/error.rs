use std::any::Any;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine-level errors shared by kernels, estimators, registry and boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate registration: alpha={alpha_id}, instrument={instrument_id}")]
    DuplicateRegistration {
        alpha_id: String,
        instrument_id: String,
    },

    #[error("Insufficient data: {collected}/{required} samples")]
    InsufficientData { collected: usize, required: usize },

    #[error("Internal invariant violated: {0}")]
    InternalInvariantViolation(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Engine is shut down")]
    ShutDown,
}

impl EngineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        EngineError::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        EngineError::NotFound(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        EngineError::InternalInvariantViolation(msg.into())
    }

    /// Stable discriminant for hosts
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::InvalidInput(_) => ErrorCode::InvalidInput,
            EngineError::NotFound(_) => ErrorCode::NotFound,
            EngineError::DuplicateRegistration { .. } => ErrorCode::DuplicateRegistration,
            EngineError::InsufficientData { .. } => ErrorCode::InsufficientData,
            EngineError::InternalInvariantViolation(_) => ErrorCode::InternalInvariantViolation,
            EngineError::Cancelled => ErrorCode::Cancelled,
            EngineError::ShutDown => ErrorCode::ShutDown,
        }
    }
}

/// Error discriminant exposed across the host boundary.
///
/// Numeric values are part of the host contract and must not be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum ErrorCode {
    InvalidInput = 1,
    NotFound = 2,
    DuplicateRegistration = 3,
    InsufficientData = 4,
    InternalInvariantViolation = 5,
    Cancelled = 6,
    ShutDown = 7,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Text of a caught panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(EngineError::invalid_input("nan").code().as_u16(), 1);
        assert_eq!(EngineError::not_found("h").code().as_u16(), 2);
        assert_eq!(
            EngineError::InsufficientData {
                collected: 1,
                required: 5
            }
            .code()
            .as_u16(),
            4
        );
        assert_eq!(EngineError::ShutDown.code().as_u16(), 7);
    }

    #[test]
    fn test_panic_message_variants() {
        let borrowed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(borrowed.as_ref()), "static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let other: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_display() {
        let err = EngineError::DuplicateRegistration {
            alpha_id: "garch".into(),
            instrument_id: "BTCUSDT".into(),
        };
        assert_eq!(
            err.to_string(),
            "Duplicate registration: alpha=garch, instrument=BTCUSDT"
        );
    }
}
