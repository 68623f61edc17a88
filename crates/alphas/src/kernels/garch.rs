//! GARCH(1,1) recurrence
//!
//! σ²_t = ω + α·r²_{t-1} + β·σ²_{t-1}
//!
//! - ω (omega): constant term, strictly positive
//! - α (alpha): weight of the last squared return (shock impact)
//! - β (beta): weight of the last variance (persistence)
//! - α + β < 1 for covariance stationarity

use helios_ports::{EngineError, EngineResult};

/// Validated GARCH(1,1) parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GarchParams {
    omega: f64,
    alpha: f64,
    beta: f64,
}

impl GarchParams {
    pub fn new(omega: f64, alpha: f64, beta: f64) -> EngineResult<Self> {
        if !(omega.is_finite() && alpha.is_finite() && beta.is_finite()) {
            return Err(EngineError::invalid_input(
                "GARCH parameters must be finite",
            ));
        }
        if omega <= 0.0 {
            return Err(EngineError::invalid_input(format!(
                "GARCH omega must be > 0, got {omega}"
            )));
        }
        if alpha < 0.0 || beta < 0.0 {
            return Err(EngineError::invalid_input(format!(
                "GARCH alpha and beta must be >= 0, got alpha={alpha}, beta={beta}"
            )));
        }
        if alpha + beta >= 1.0 {
            return Err(EngineError::invalid_input(format!(
                "GARCH alpha + beta must be < 1 for stationarity, got {}",
                alpha + beta
            )));
        }
        Ok(Self { omega, alpha, beta })
    }

    pub fn omega(&self) -> f64 {
        self.omega
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// α + β
    pub fn persistence(&self) -> f64 {
        self.alpha + self.beta
    }

    /// Long-run variance ω / (1 - α - β)
    pub fn unconditional_variance(&self) -> f64 {
        self.omega / (1.0 - self.persistence())
    }

    /// One step of the recurrence
    #[inline]
    pub fn step(&self, sigma2_prev: f64, r_prev: f64) -> f64 {
        self.omega + self.alpha * r_prev * r_prev + self.beta * sigma2_prev
    }

    /// Variance expected `horizon` steps after the one-step forecast `sigma2_next`
    /// was issued (`horizon = 1` returns `sigma2_next`).
    pub fn forecast(&self, sigma2_next: f64, horizon: u32) -> f64 {
        let long_run = self.unconditional_variance();
        let decay = self.persistence().powi(horizon.saturating_sub(1) as i32);
        long_run + decay * (sigma2_next - long_run)
    }
}
