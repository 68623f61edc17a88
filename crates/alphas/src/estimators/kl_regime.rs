//! KL-divergence regime shift detector
//!
//! Compares the distribution of the last `m` samples (recent window) against
//! a frozen reference histogram with a two-sample likelihood-ratio test.
//!
//! Lifecycle after construction or `reset()`:
//! 1. Reference phase: the first `reference_size` samples fill the reference.
//! 2. Warm-up: the recent window fills to `m` samples.
//! 3. Ready: every sample evicts the oldest one and a test result is produced.
//!
//! The reference only moves again through `rebase()` or `install_reference()`.

use std::collections::VecDeque;

use super::returns::ReturnTracker;
use crate::config::KlRegimeConfig;
use crate::kernels::{Histogram, chi2_survival, smoothed_kl, two_sample_statistic};
use helios_core::{AlphaKind, Binning, MarketEvent, SignalDetail, SignalReading};
use helios_ports::{EngineError, EngineResult, Estimator, EventField};
use log::{debug, error, info};

/// Result of one regime test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeStats {
    pub is_shift: bool,
    pub statistic: f64,
    pub p_value: f64,
    pub kl_divergence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegimeReading {
    Insufficient { collected: usize, required: usize },
    Ready(RegimeStats),
}

impl RegimeReading {
    pub fn is_shift(&self) -> bool {
        matches!(self, RegimeReading::Ready(stats) if stats.is_shift)
    }

    fn into_signal(self) -> SignalReading {
        match self {
            RegimeReading::Insufficient {
                collected,
                required,
            } => SignalReading::insufficient(
                0.0,
                collected,
                required,
                SignalDetail::KlRegime {
                    is_shift: false,
                    statistic: 0.0,
                    p_value: 1.0,
                    kl_divergence: 0.0,
                },
            ),
            RegimeReading::Ready(stats) => SignalReading::ready(
                if stats.is_shift { 1.0 } else { 0.0 },
                SignalDetail::KlRegime {
                    is_shift: stats.is_shift,
                    statistic: stats.statistic,
                    p_value: stats.p_value,
                    kl_divergence: stats.kl_divergence,
                },
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KlRegimeEstimator {
    binning: Binning,
    window_m: usize,
    reference_size: usize,
    threshold_p: f64,
    epsilon: f64,

    reference: Histogram,
    /// Reference samples still expected from the stream (0 once installed or rebased)
    reference_target: usize,
    reference_filling: bool,

    recent: Histogram,
    window: VecDeque<f64>,

    /// Set on a bookkeeping violation; cleared only by `reset()`
    poisoned: bool,
    returns: ReturnTracker,
    required: &'static [EventField],
}

impl KlRegimeEstimator {
    pub fn new(config: &KlRegimeConfig) -> EngineResult<Self> {
        config.validate()?;
        let binning = config.binning()?;
        let n_bins = binning.n_bins();
        Ok(Self {
            binning,
            window_m: config.window_m,
            reference_size: config.reference_size(),
            threshold_p: config.threshold_p,
            epsilon: config.smoothing_epsilon,
            reference: Histogram::new(n_bins),
            reference_target: config.reference_size(),
            reference_filling: true,
            recent: Histogram::new(n_bins),
            window: VecDeque::with_capacity(config.window_m),
            poisoned: false,
            returns: ReturnTracker::new(config.input),
            required: config.input.required_fields(),
        })
    }

    /// Feed one sample and run the test once enough data is available.
    pub fn push_sample(&mut self, sample: f64) -> EngineResult<RegimeReading> {
        self.ensure_usable()?;
        if !sample.is_finite() {
            return Err(EngineError::invalid_input(format!(
                "KL sample must be finite, got {sample}"
            )));
        }

        let bin = self.binning.index_of(sample);

        if self.reference_filling {
            self.reference.add(bin);
            if self.reference.total() as usize >= self.reference_target {
                self.reference_filling = false;
                debug!("[KL] reference frozen with {} samples", self.reference.total());
            }
            self.check_invariants()?;
            return Ok(self.progress());
        }

        if self.window.len() == self.window_m {
            if let Some(oldest) = self.window.pop_front() {
                let evicted = self.binning.index_of(oldest);
                if let Err(e) = self.recent.remove(evicted) {
                    return Err(self.poison(e));
                }
            }
        }
        self.window.push_back(sample);
        self.recent.add(bin);
        self.check_invariants()?;

        if self.window.len() < self.window_m {
            return Ok(self.progress());
        }

        match self.evaluate() {
            Ok(stats) => Ok(RegimeReading::Ready(stats)),
            Err(e) => Err(self.poison(e)),
        }
    }

    /// Replace the reference with the current recent window
    pub fn rebase(&mut self) -> EngineResult<()> {
        self.ensure_usable()?;
        if self.reference_filling || self.window.len() < self.window_m {
            return Err(EngineError::InsufficientData {
                collected: self.window.len(),
                required: self.window_m,
            });
        }
        self.reference = self.recent.clone();
        self.reference_target = 0;
        info!("[KL] reference rebased onto {} recent samples", self.window_m);
        Ok(())
    }

    /// Replace the reference with externally built bin counts
    pub fn install_reference(&mut self, counts: Vec<u64>) -> EngineResult<()> {
        self.ensure_usable()?;
        if counts.len() != self.binning.n_bins() {
            return Err(EngineError::invalid_input(format!(
                "reference has {} bins, estimator uses {}",
                counts.len(),
                self.binning.n_bins()
            )));
        }
        let reference = Histogram::from_counts(counts);
        if reference.is_empty() {
            return Err(EngineError::invalid_input("reference histogram is empty"));
        }

        info!("[KL] installed reference with {} samples", reference.total());
        self.reference = reference;
        self.reference_target = 0;
        self.reference_filling = false;
        Ok(())
    }

    pub fn binning(&self) -> Binning {
        self.binning
    }

    pub fn reference(&self) -> &Histogram {
        &self.reference
    }

    pub fn recent(&self) -> &Histogram {
        &self.recent
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn is_reference_frozen(&self) -> bool {
        !self.reference_filling
    }

    /// Samples collected and required before the first test result
    fn progress(&self) -> RegimeReading {
        let reference_part = (self.reference.total() as usize).min(self.reference_target);
        RegimeReading::Insufficient {
            collected: reference_part + self.window.len(),
            required: self.reference_target + self.window_m,
        }
    }

    fn evaluate(&self) -> EngineResult<RegimeStats> {
        let n = self.reference.total() as f64;
        let m = self.recent.total() as f64;
        let kl_divergence = smoothed_kl(&self.recent, &self.reference, self.epsilon);
        let statistic = two_sample_statistic(n, m, kl_divergence);
        let p_value = chi2_survival(statistic, self.binning.n_bins() - 1)?;
        Ok(RegimeStats {
            is_shift: p_value < self.threshold_p,
            statistic,
            p_value,
            kl_divergence,
        })
    }

    fn check_invariants(&mut self) -> EngineResult<()> {
        let ok = self.recent.total() as usize == self.window.len()
            && self.recent.is_consistent()
            && self.reference.is_consistent();
        if ok {
            Ok(())
        } else {
            Err(self.poison(EngineError::invariant(format!(
                "histogram counts diverged: recent total {} vs window {}",
                self.recent.total(),
                self.window.len()
            ))))
        }
    }

    fn poison(&mut self, err: EngineError) -> EngineError {
        error!("[KL] estimator disabled until reset: {err}");
        self.poisoned = true;
        err
    }

    fn ensure_usable(&self) -> EngineResult<()> {
        if self.poisoned {
            Err(EngineError::invariant("KL estimator is disabled until reset"))
        } else {
            Ok(())
        }
    }
}

impl Estimator for KlRegimeEstimator {
    fn kind(&self) -> AlphaKind {
        AlphaKind::KlRegime
    }

    fn required_fields(&self) -> &'static [EventField] {
        self.required
    }

    fn update(&mut self, event: &MarketEvent) -> EngineResult<SignalReading> {
        self.ensure_usable()?;
        let pending = self.returns.peek(event)?;
        let Some(ret) = pending.ret else {
            self.returns.commit(pending);
            return Ok(self.progress().into_signal());
        };

        let reading = self.push_sample(ret)?;
        self.returns.commit(pending);
        Ok(reading.into_signal())
    }

    fn reset(&mut self) {
        self.reference.clear();
        self.reference_target = self.reference_size;
        self.reference_filling = true;
        self.recent.clear();
        self.window.clear();
        self.poisoned = false;
        self.returns.clear();
    }

    fn rebase(&mut self) -> EngineResult<()> {
        KlRegimeEstimator::rebase(self)
    }

    fn reference_binning(&self) -> Option<Binning> {
        Some(self.binning)
    }

    fn install_reference(&mut self, counts: Vec<u64>) -> EngineResult<()> {
        KlRegimeEstimator::install_reference(self, counts)
    }
}
