//! Histograms and the two-sample KL statistic
//!
//! D_KL(P_recent || P_ref) = Σ p_i · ln(p_i / q_i) over bins with p_i > 0
//! T = 2 · (n·m / (n+m)) · D_KL, approximately χ²(n_bins - 1) under H0
//!
//! Reference probabilities are epsilon-smoothed so that a bin empty in the
//! reference but populated in the recent window yields a large but finite
//! divergence:
//!
//! q_i = (ref_i / n + ε) / (1 + n_bins · ε)

use helios_ports::{EngineError, EngineResult};

/// Bin counts over a fixed binning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    counts: Vec<u64>,
    total: u64,
}

impl Histogram {
    pub fn new(n_bins: usize) -> Self {
        Self {
            counts: vec![0; n_bins],
            total: 0,
        }
    }

    pub fn from_counts(counts: Vec<u64>) -> Self {
        let total = counts.iter().sum();
        Self { counts, total }
    }

    pub fn n_bins(&self) -> usize {
        self.counts.len()
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    #[inline]
    pub fn add(&mut self, bin: usize) {
        self.counts[bin] += 1;
        self.total += 1;
    }

    /// Remove one sample from `bin`; an empty bin means the window bookkeeping is broken.
    #[inline]
    pub fn remove(&mut self, bin: usize) -> EngineResult<()> {
        match self.counts.get_mut(bin) {
            Some(count) if *count > 0 => {
                *count -= 1;
                self.total -= 1;
                Ok(())
            }
            _ => Err(EngineError::invariant(format!(
                "evicting from empty histogram bin {bin}"
            ))),
        }
    }

    pub fn clear(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
        self.total = 0;
    }

    /// Counts still sum to the cached total
    pub fn is_consistent(&self) -> bool {
        self.counts.iter().sum::<u64>() == self.total
    }
}

/// KL divergence of `recent` from epsilon-smoothed `reference`.
///
/// Both histograms must share a binning and be non-empty.
pub fn smoothed_kl(recent: &Histogram, reference: &Histogram, epsilon: f64) -> f64 {
    let m = recent.total() as f64;
    let n = reference.total() as f64;
    let norm = 1.0 + reference.n_bins() as f64 * epsilon;

    let kl: f64 = recent
        .counts()
        .iter()
        .zip(reference.counts())
        .filter(|(r, _)| **r > 0)
        .map(|(&r, &q)| {
            let p = r as f64 / m;
            let q = (q as f64 / n + epsilon) / norm;
            p * (p / q).ln()
        })
        .sum();

    // Gibbs' inequality; negative values are rounding noise.
    kl.max(0.0)
}

/// Two-sample likelihood-ratio statistic for reference size `n`, window size `m`
#[inline]
pub fn two_sample_statistic(n: f64, m: f64, kl: f64) -> f64 {
    2.0 * (n * m / (n + m)) * kl
}
