//! Signal - what estimators output
//!
//! An estimator produces a `SignalReading` (value plus alpha-specific detail).
//! The registry stamps it with the alpha, instrument and triggering event
//! time to form the `SignalOutput` handed back to the host.

use crate::values::{AlphaId, InstrumentId, Timestamp};
use serde::{Deserialize, Serialize};

/// Whether a reading is backed by enough data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SignalStatus {
    #[default]
    Ready,
    /// Warm-up not finished; `value` is a placeholder, not a statistic
    InsufficientData { collected: usize, required: usize },
}

impl SignalStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, SignalStatus::Ready)
    }
}

/// Alpha-specific diagnostics attached to a reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalDetail {
    Garch {
        variance: f64,
        /// Return consumed by this update (None while seeding the price)
        last_return: Option<f64>,
    },
    KlRegime {
        is_shift: bool,
        statistic: f64,
        p_value: f64,
        kl_divergence: f64,
    },
    Ofi {
        ofi_step: f64,
        cum_ofi: f64,
        volume_normalized: f64,
    },
}

/// Estimator result before it is attributed to an alpha/instrument
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalReading {
    pub value: f64,
    pub status: SignalStatus,
    pub detail: SignalDetail,
}

impl SignalReading {
    pub fn ready(value: f64, detail: SignalDetail) -> Self {
        Self {
            value,
            status: SignalStatus::Ready,
            detail,
        }
    }

    pub fn insufficient(value: f64, collected: usize, required: usize, detail: SignalDetail) -> Self {
        Self {
            value,
            status: SignalStatus::InsufficientData {
                collected,
                required,
            },
            detail,
        }
    }
}

/// Signal produced for one (alpha, instrument) on one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalOutput {
    pub alpha_id: AlphaId,
    pub instrument_id: InstrumentId,
    /// Timestamp of the triggering event
    pub timestamp: Timestamp,
    pub value: f64,
    pub status: SignalStatus,
    pub detail: SignalDetail,
}

impl SignalOutput {
    pub fn new(
        alpha_id: AlphaId,
        instrument_id: InstrumentId,
        timestamp: Timestamp,
        reading: SignalReading,
    ) -> Self {
        Self {
            alpha_id,
            instrument_id,
            timestamp,
            value: reading.value,
            status: reading.status,
            detail: reading.detail,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status.is_ready()
    }

    /// KL-regime shift flag; false for every other alpha and during warm-up
    pub fn is_shift(&self) -> bool {
        self.status.is_ready()
            && matches!(self.detail, SignalDetail::KlRegime { is_shift: true, .. })
    }
}
