//! Numeric Kernels
//!
//! Pure recurrences and statistics. No I/O, no allocation on the update path
//! beyond the fixed-size state owned by the caller.

mod chi2;
mod garch;
mod histogram;
mod ofi;

pub use chi2::chi2_survival;
pub use garch::GarchParams;
pub use histogram::{Histogram, smoothed_kl, two_sample_statistic};
pub use ofi::{BookTop, CompensatedSum, ofi_step};
