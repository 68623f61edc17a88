//! Helios Core Domain
//!
//! Pure domain types for the Helios signal engine.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    AlphaKind, MarketEvent, SignalDetail, SignalOutput, SignalReading, SignalStatus, TradePrint,
};
pub use values::{AlphaId, Binning, InstrumentId, Timestamp};
