use helios_ports::{EngineError, EngineResult};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Upper tail P(X > statistic) for X ~ χ²(df)
pub fn chi2_survival(statistic: f64, df: usize) -> EngineResult<f64> {
    if df == 0 {
        return Err(EngineError::invariant("chi-squared test with zero degrees of freedom"));
    }
    if statistic.is_nan() {
        return Err(EngineError::invariant("chi-squared statistic is NaN"));
    }
    if statistic <= 0.0 {
        return Ok(1.0);
    }
    if statistic.is_infinite() {
        return Ok(0.0);
    }

    let dist = ChiSquared::new(df as f64)
        .map_err(|e| EngineError::invariant(format!("chi-squared df={df}: {e}")))?;
    Ok(dist.sf(statistic).clamp(0.0, 1.0))
}
