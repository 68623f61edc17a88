use serde::{Deserialize, Serialize};

/// Equal-width binning of a closed value domain.
///
/// Samples outside `[min, max]` are clamped into the edge bins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Binning {
    min: f64,
    max: f64,
    n_bins: usize,
}

impl Binning {
    /// Returns `None` unless `min < max` are finite and `n_bins >= 2`.
    pub fn new(min: f64, max: f64, n_bins: usize) -> Option<Self> {
        if min.is_finite() && max.is_finite() && min < max && n_bins >= 2 {
            Some(Self { min, max, n_bins })
        } else {
            None
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Bin index for a finite sample
    #[inline]
    pub fn index_of(&self, sample: f64) -> usize {
        let width = (self.max - self.min) / self.n_bins as f64;
        let raw = ((sample - self.min) / width).floor();
        if raw <= 0.0 {
            0
        } else {
            (raw as usize).min(self.n_bins - 1)
        }
    }
}
