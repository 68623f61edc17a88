//! Helios Signal Registry
//!
//! Owns estimator instances keyed by `(alpha_id, instrument_id)`, hands out
//! generation-checked handles and routes market events to them.

mod dispatch;
mod handle;
mod registry;
mod slot;

pub use dispatch::{DispatchFailure, DispatchReport};
pub use handle::EstimatorHandle;
pub use registry::{SignalRegistry, SlotInfo};
