use serde::{Deserialize, Serialize};
use std::fmt;

/// Family of estimator behind an alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaKind {
    /// GARCH(1,1) conditional volatility
    Garch,
    /// KL-divergence regime shift detector
    KlRegime,
    /// Market-cap normalized order-flow imbalance
    Ofi,
}

impl AlphaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlphaKind::Garch => "garch",
            AlphaKind::KlRegime => "kl_regime",
            AlphaKind::Ofi => "ofi",
        }
    }
}

impl fmt::Display for AlphaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
