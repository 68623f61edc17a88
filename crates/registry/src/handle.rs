use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to a registered estimator.
///
/// Arena index plus the generation the slot had when the estimator was
/// registered. Once the estimator is deregistered the slot's generation
/// moves on, so an old handle never resolves to a newer occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EstimatorHandle {
    index: u32,
    generation: u32,
}

impl EstimatorHandle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub(crate) fn index(&self) -> usize {
        self.index as usize
    }

    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }

    /// Packed form for hosts that can only carry an integer
    pub fn to_raw(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    pub fn from_raw(raw: u64) -> Self {
        Self {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }
}

impl fmt::Display for EstimatorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index, self.generation)
    }
}
