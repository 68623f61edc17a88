//! Per-alpha configuration surface
//!
//! Every parameter invariant is checked by `validate()` before an estimator
//! is built, so out-of-range parameterizations are rejected at registration
//! and never discovered on the tick path.
//!
//! JSON shape (internally tagged by `kind`):
//!
//! ```text
//! {"kind":"garch","omega":1e-6,"alpha":0.09,"beta":0.9,"sigma2_init":1e-6}
//! {"kind":"kl_regime","n_bins":20,"domain_min":-0.01,"domain_max":0.01,
//!  "window_m":3000,"threshold_p":0.01,"smoothing_epsilon":1e-10}
//! {"kind":"ofi","market_cap":1e9,"reset_policy":{"policy":"manual"}}
//! ```
//!
//! KL histograms and the recent window are allocated at registration, so
//! `n_bins`, `window_m` and `reference_size` are capped by [`MAX_BINS`],
//! [`MAX_WINDOW`] and [`MAX_REFERENCE_SIZE`].

use crate::estimators::{GarchEstimator, KlRegimeEstimator, OfiEstimator, ReturnInput};
use crate::kernels::GarchParams;
use helios_core::{AlphaKind, Binning};
use helios_ports::{EngineError, EngineResult, Estimator};
use serde::{Deserialize, Serialize};

/// Configuration of one alpha instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlphaConfig {
    Garch(GarchConfig),
    KlRegime(KlRegimeConfig),
    Ofi(OfiConfig),
}

impl AlphaConfig {
    pub fn kind(&self) -> AlphaKind {
        match self {
            AlphaConfig::Garch(_) => AlphaKind::Garch,
            AlphaConfig::KlRegime(_) => AlphaKind::KlRegime,
            AlphaConfig::Ofi(_) => AlphaKind::Ofi,
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        match self {
            AlphaConfig::Garch(c) => c.validate(),
            AlphaConfig::KlRegime(c) => c.validate(),
            AlphaConfig::Ofi(c) => c.validate(),
        }
    }

    /// Validate and build a fresh estimator
    pub fn build(&self) -> EngineResult<Box<dyn Estimator>> {
        Ok(match self {
            AlphaConfig::Garch(c) => Box::new(GarchEstimator::new(c)?),
            AlphaConfig::KlRegime(c) => Box::new(KlRegimeEstimator::new(c)?),
            AlphaConfig::Ofi(c) => Box::new(OfiEstimator::new(c)?),
        })
    }
}

/// GARCH(1,1) volatility configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GarchConfig {
    pub omega: f64,
    pub alpha: f64,
    pub beta: f64,
    /// Variance used by the first update. Required: a zero start collapses the
    /// early forecasts to `omega`.
    pub sigma2_init: f64,
    #[serde(default)]
    pub input: ReturnInput,
}

impl Default for GarchConfig {
    fn default() -> Self {
        Self {
            omega: 1e-6,
            alpha: 0.09,
            beta: 0.90,
            sigma2_init: 1e-6, // 0.001 initial vol
            input: ReturnInput::default(),
        }
    }
}

impl GarchConfig {
    pub fn validate(&self) -> EngineResult<()> {
        GarchParams::new(self.omega, self.alpha, self.beta)?;
        if !self.sigma2_init.is_finite() || self.sigma2_init < 0.0 {
            return Err(EngineError::invalid_input(format!(
                "GARCH sigma2_init must be finite and >= 0, got {}",
                self.sigma2_init
            )));
        }
        Ok(())
    }
}

/// Upper bound on KL histogram bins
pub const MAX_BINS: usize = 65_536;

/// Upper bound on the KL recent window length
pub const MAX_WINDOW: usize = 10_000_000;

/// Upper bound on the KL reference sample count
pub const MAX_REFERENCE_SIZE: usize = 1_000_000_000;

/// KL-divergence regime shift configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KlRegimeConfig {
    pub n_bins: usize,
    pub domain_min: f64,
    pub domain_max: f64,
    /// Recent window length `m`
    pub window_m: usize,
    /// Shift when p-value falls below this
    pub threshold_p: f64,
    /// Additive smoothing of reference bin probabilities
    pub smoothing_epsilon: f64,
    /// Samples frozen into the reference after a reset (`n`); defaults to `window_m`
    #[serde(default)]
    pub reference_size: Option<usize>,
    #[serde(default)]
    pub input: ReturnInput,
}

impl Default for KlRegimeConfig {
    fn default() -> Self {
        Self {
            n_bins: 20,
            domain_min: -0.01,
            domain_max: 0.01,
            window_m: 3000,
            threshold_p: 0.01,
            smoothing_epsilon: 1e-10,
            reference_size: Some(18000),
            input: ReturnInput::default(),
        }
    }
}

impl KlRegimeConfig {
    pub fn binning(&self) -> EngineResult<Binning> {
        Binning::new(self.domain_min, self.domain_max, self.n_bins).ok_or_else(|| {
            EngineError::invalid_input(format!(
                "KL binning needs finite domain_min < domain_max and n_bins >= 2, got [{}, {}] with {} bins",
                self.domain_min, self.domain_max, self.n_bins
            ))
        })
    }

    pub fn reference_size(&self) -> usize {
        self.reference_size.unwrap_or(self.window_m)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.n_bins > MAX_BINS {
            return Err(EngineError::invalid_input(format!(
                "KL n_bins must be <= {MAX_BINS}, got {}",
                self.n_bins
            )));
        }
        self.binning()?;
        if !(1..=MAX_WINDOW).contains(&self.window_m) {
            return Err(EngineError::invalid_input(format!(
                "KL window_m must be in [1, {MAX_WINDOW}], got {}",
                self.window_m
            )));
        }
        if !(1..=MAX_REFERENCE_SIZE).contains(&self.reference_size()) {
            return Err(EngineError::invalid_input(format!(
                "KL reference_size must be in [1, {MAX_REFERENCE_SIZE}], got {}",
                self.reference_size()
            )));
        }
        if !(self.threshold_p > 0.0 && self.threshold_p < 1.0) {
            return Err(EngineError::invalid_input(format!(
                "KL threshold_p must be in (0, 1), got {}",
                self.threshold_p
            )));
        }
        if !(self.smoothing_epsilon.is_finite() && self.smoothing_epsilon > 0.0) {
            return Err(EngineError::invalid_input(format!(
                "KL smoothing_epsilon must be finite and > 0, got {}",
                self.smoothing_epsilon
            )));
        }
        Ok(())
    }
}

/// How the cumulative OFI is kept bounded over long sessions
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum OfiResetPolicy {
    /// Only an explicit reset clears the sum
    #[default]
    Manual,
    /// Multiply the accumulated sum by `factor` before each new step
    Decay { factor: f64 },
    /// Restart the sum from zero every `every_events` steps
    Periodic { every_events: u64 },
}

impl OfiResetPolicy {
    pub fn validate(&self) -> EngineResult<()> {
        match *self {
            OfiResetPolicy::Manual => Ok(()),
            OfiResetPolicy::Decay { factor } if factor > 0.0 && factor <= 1.0 => Ok(()),
            OfiResetPolicy::Decay { factor } => Err(EngineError::invalid_input(format!(
                "OFI decay factor must be in (0, 1], got {factor}"
            ))),
            OfiResetPolicy::Periodic { every_events } if every_events > 0 => Ok(()),
            OfiResetPolicy::Periodic { .. } => Err(EngineError::invalid_input(
                "OFI periodic reset needs every_events >= 1",
            )),
        }
    }
}

/// Market-cap normalized OFI configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OfiConfig {
    pub market_cap: f64,
    #[serde(default)]
    pub reset_policy: OfiResetPolicy,
}

impl Default for OfiConfig {
    fn default() -> Self {
        Self {
            market_cap: 1e9,
            reset_policy: OfiResetPolicy::Manual,
        }
    }
}

impl OfiConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.market_cap.is_finite() && self.market_cap > 0.0) {
            return Err(EngineError::invalid_input(format!(
                "OFI market_cap must be finite and > 0, got {}",
                self.market_cap
            )));
        }
        self.reset_policy.validate()
    }
}
