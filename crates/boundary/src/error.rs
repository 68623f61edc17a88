//! Structured errors for the host boundary
//!
//! Every fallible boundary call returns `BoundaryResult<T>`. Hosts that speak
//! JSON get the `{"ok":...}` envelope from `BoundaryResponse`.

use std::panic::{AssertUnwindSafe, catch_unwind};

use helios_ports::{EngineError, ErrorCode, panic_message};
use log::error;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;

/// Error handed to the host: stable code plus human-readable message
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code:?}: {message}")]
pub struct BoundaryError {
    pub code: ErrorCode,
    pub message: String,
}

pub type BoundaryResult<T> = Result<T, BoundaryError>;

impl BoundaryError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalInvariantViolation, message)
    }

    pub fn cancelled() -> Self {
        Self::from(EngineError::Cancelled)
    }

    pub fn shut_down() -> Self {
        Self::from(EngineError::ShutDown)
    }
}

impl From<EngineError> for BoundaryError {
    fn from(err: EngineError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<ConfigError> for BoundaryError {
    fn from(err: ConfigError) -> Self {
        Self::invalid_input(err.to_string())
    }
}

/// JSON envelope: `{"ok":true,"data":...}` or `{"ok":false,"error":{...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryResponse<T> {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BoundaryError>,
}

impl<T: Serialize> BoundaryResponse<T> {
    pub fn from_result(result: BoundaryResult<T>) -> Self {
        match result {
            Ok(data) => Self {
                ok: true,
                data: Some(data),
                error: None,
            },
            Err(err) => Self {
                ok: false,
                data: None,
                error: Some(err),
            },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"ok":false,"error":{"code":"internal_invariant_violation","message":"serialization_failed"}}"#
                .to_string()
        })
    }
}

/// Run one boundary operation, converting a panic into a structured error
pub(crate) fn guard<T>(op: &str, f: impl FnOnce() -> BoundaryResult<T>) -> BoundaryResult<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            error!("[BOUNDARY] panic in {op}: {msg}");
            Err(BoundaryError::internal(format!("panic in {op}: {msg}")))
        }
    }
}
