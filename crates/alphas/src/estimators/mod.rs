//! Estimator state machines
//!
//! Each estimator owns exactly its recurrence state and implements the
//! `Estimator` port. A failed update leaves the state as it was.

mod garch;
mod kl_regime;
mod ofi;
mod returns;

pub use garch::GarchEstimator;
pub use kl_regime::{KlRegimeEstimator, RegimeReading, RegimeStats};
pub use ofi::OfiEstimator;
pub use returns::{PriceSource, ReturnInput, ReturnKind};
