//! Helios Ports
//!
//! Port definitions (traits) for the Helios signal engine.
//! These define the boundaries between the numeric kernels, the registry
//! and the host-facing adapter.

mod error;
mod estimator;

pub use error::{EngineError, EngineResult, ErrorCode, panic_message};
pub use estimator::{Estimator, EventField};
