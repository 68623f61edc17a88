pub mod config;
pub mod estimators;
pub mod kernels;

pub use config::{
    AlphaConfig, GarchConfig, KlRegimeConfig, MAX_BINS, MAX_REFERENCE_SIZE, MAX_WINDOW, OfiConfig,
    OfiResetPolicy,
};
pub use estimators::{
    GarchEstimator, KlRegimeEstimator, OfiEstimator, PriceSource, RegimeReading, RegimeStats,
    ReturnInput, ReturnKind,
};
