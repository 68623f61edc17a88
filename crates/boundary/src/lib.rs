//! Helios Boundary Adapter
//!
//! The surface a host process (or another language runtime) calls into:
//! - `SignalEngine`: register, update, dispatch, batch, reset, shutdown
//! - `BatchView`: zero-copy columnar input validated before any kernel runs
//! - Offloaded batch and reference jobs with single-shot completion
//! - `BoundaryError`: stable error codes, JSON envelope

mod buffer;
mod config;
mod engine;
mod error;
mod offload;
mod report;

pub use buffer::{BatchView, OwnedBatch};
pub use config::{BatchConfig, ConfigError, EngineConfig, HealthConfig, RegistrationConfig};
pub use engine::SignalEngine;
pub use error::{BoundaryError, BoundaryResponse, BoundaryResult};
pub use offload::{BatchTask, CancelHandle, ReferenceTask};
pub use report::{BatchReport, RowFailure};

// Types hosts need alongside the engine
pub use helios_alphas::AlphaConfig;
pub use helios_core::{AlphaId, InstrumentId, MarketEvent, SignalOutput};
pub use helios_ports::{ErrorCode, Estimator, EventField};
pub use helios_registry::{DispatchReport, EstimatorHandle};
