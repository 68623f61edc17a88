mod binning;

pub use binning::Binning;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Event time in nanoseconds since the Unix epoch.
///
/// Monotonic within one instrument's stream; the engine never reads the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Convert from a UTC datetime. Times before the epoch saturate to zero.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let nanos = dt.timestamp_nanos_opt().unwrap_or(i64::MAX);
        Self(nanos.max(0) as u64)
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        // u64 nanos past i64::MAX are clamped; that is the year 2262.
        DateTime::from_timestamp_nanos(self.0.min(i64::MAX as u64) as i64)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

impl From<u64> for Timestamp {
    fn from(nanos: u64) -> Self {
        Self(nanos)
    }
}

/// Identifier for a tradeable instrument (e.g. "BTCUSDT").
///
/// Backed by a shared string so that per-event clones are a refcount bump.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct InstrumentId(Arc<str>);

impl InstrumentId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstrumentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for InstrumentId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<InstrumentId> for String {
    fn from(id: InstrumentId) -> Self {
        id.0.to_string()
    }
}

/// Name of a signal-producing estimator (e.g. "garch_vol", "kl_regime").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AlphaId(Arc<str>);

impl AlphaId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlphaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AlphaId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AlphaId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<AlphaId> for String {
    fn from(id: AlphaId) -> Self {
        id.0.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_datetime_roundtrip() {
        let ts = Timestamp::from_nanos(1_700_000_000_123_456_789);
        assert_eq!(Timestamp::from_datetime(ts.to_datetime()), ts);
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = InstrumentId::new("BTCUSDT");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"BTCUSDT\"");

        let alpha: AlphaId = serde_json::from_str("\"ofi_mc\"").unwrap();
        assert_eq!(alpha.as_str(), "ofi_mc");
    }

    #[test]
    fn test_instrument_clone_shares_storage() {
        let a = InstrumentId::new("ETHUSDT");
        let b = a.clone();
        assert!(std::ptr::eq(a.as_str(), b.as_str()));
    }
}
