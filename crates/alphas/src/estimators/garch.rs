//! GARCH(1,1) volatility estimator
//!
//! Holds exactly the recurrence state (`sigma2_prev`, `r_prev`). Each return
//! produces the next variance forecast; the return itself only enters the
//! recurrence on the following step.

use super::returns::ReturnTracker;
use crate::config::GarchConfig;
use crate::kernels::GarchParams;
use helios_core::{AlphaKind, MarketEvent, SignalDetail, SignalReading};
use helios_ports::{EngineError, EngineResult, Estimator, EventField};

#[derive(Debug, Clone)]
pub struct GarchEstimator {
    params: GarchParams,
    sigma2_init: f64,
    sigma2_prev: f64,
    r_prev: f64,
    last_return: Option<f64>,
    returns: ReturnTracker,
    required: &'static [EventField],
}

impl GarchEstimator {
    pub fn new(config: &GarchConfig) -> EngineResult<Self> {
        config.validate()?;
        let params = GarchParams::new(config.omega, config.alpha, config.beta)?;
        Ok(Self {
            params,
            sigma2_init: config.sigma2_init,
            sigma2_prev: config.sigma2_init,
            r_prev: 0.0,
            last_return: None,
            returns: ReturnTracker::new(config.input),
            required: config.input.required_fields(),
        })
    }

    /// Fold one return into the recurrence and return the new volatility.
    ///
    /// Rejected input leaves the state untouched. A return is rejected when it
    /// is non-finite or would overflow the variance on the following step, so
    /// a stored return can always be folded in.
    pub fn update_return(&mut self, return_t: f64) -> EngineResult<f64> {
        if !return_t.is_finite() {
            return Err(EngineError::invalid_input(format!(
                "GARCH return must be finite, got {return_t}"
            )));
        }

        let sigma2 = self.params.step(self.sigma2_prev, self.r_prev);
        if !sigma2.is_finite() {
            return Err(EngineError::invariant(format!(
                "GARCH variance overflowed (sigma2_prev={}, r_prev={})",
                self.sigma2_prev, self.r_prev
            )));
        }
        if !self.params.step(sigma2, return_t).is_finite() {
            return Err(EngineError::invalid_input(format!(
                "GARCH return {return_t} overflows the variance recurrence"
            )));
        }

        self.sigma2_prev = sigma2;
        self.r_prev = return_t;
        self.last_return = Some(return_t);
        Ok(sigma2.sqrt())
    }

    /// Current conditional variance
    pub fn variance(&self) -> f64 {
        self.sigma2_prev
    }

    pub fn volatility(&self) -> f64 {
        self.sigma2_prev.sqrt()
    }

    pub fn last_return(&self) -> Option<f64> {
        self.last_return
    }

    pub fn params(&self) -> &GarchParams {
        &self.params
    }

    pub fn persistence(&self) -> f64 {
        self.params.persistence()
    }

    pub fn unconditional_variance(&self) -> f64 {
        self.params.unconditional_variance()
    }

    /// Variance expected `horizon` steps ahead of the current state.
    /// `horizon = 0` is the current variance.
    pub fn forecast_variance(&self, horizon: u32) -> f64 {
        if horizon == 0 {
            return self.sigma2_prev;
        }
        let sigma2_next = self.params.step(self.sigma2_prev, self.r_prev);
        self.params.forecast(sigma2_next, horizon)
    }

    fn detail(&self) -> SignalDetail {
        SignalDetail::Garch {
            variance: self.sigma2_prev,
            last_return: self.last_return,
        }
    }
}

impl Estimator for GarchEstimator {
    fn kind(&self) -> AlphaKind {
        AlphaKind::Garch
    }

    fn required_fields(&self) -> &'static [EventField] {
        self.required
    }

    fn update(&mut self, event: &MarketEvent) -> EngineResult<SignalReading> {
        let pending = self.returns.peek(event)?;
        let Some(ret) = pending.ret else {
            self.returns.commit(pending);
            return Ok(SignalReading::insufficient(self.volatility(), 1, 2, self.detail()));
        };

        let vol = self.update_return(ret)?;
        self.returns.commit(pending);
        Ok(SignalReading::ready(vol, self.detail()))
    }

    fn reset(&mut self) {
        self.sigma2_prev = self.sigma2_init;
        self.r_prev = 0.0;
        self.last_return = None;
        self.returns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use helios_core::SignalStatus;

    fn config() -> GarchConfig {
        GarchConfig {
            omega: 1e-6,
            alpha: 0.1,
            beta: 0.85,
            sigma2_init: 1e-4,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_update_uses_initial_state() {
        let mut est = GarchEstimator::new(&config()).unwrap();
        // r_prev starts at 0: sigma2 = omega + beta * sigma2_init
        let vol = est.update_return(0.02).unwrap();
        assert_relative_eq!(vol * vol, 1e-6 + 0.85 * 1e-4, max_relative = 1e-12);

        // second step sees the stored return
        let expected = 1e-6 + 0.1 * 0.02 * 0.02 + 0.85 * est.variance();
        let vol = est.update_return(0.0).unwrap();
        assert_relative_eq!(vol * vol, expected, max_relative = 1e-12);
        assert_eq!(est.last_return(), Some(0.0));
    }

    #[test]
    fn test_non_finite_return_leaves_state() {
        let mut est = GarchEstimator::new(&config()).unwrap();
        est.update_return(0.01).unwrap();
        let before = (est.variance(), est.last_return());

        assert!(matches!(est.update_return(f64::NAN), Err(EngineError::InvalidInput(_))));
        assert!(est.update_return(f64::INFINITY).is_err());
        assert_eq!((est.variance(), est.last_return()), before);
    }

    #[test]
    fn test_overflowing_return_rejected_and_recovers() {
        let mut est = GarchEstimator::new(&config()).unwrap();
        est.update_return(0.01).unwrap();
        let before = (est.variance(), est.last_return());

        assert!(matches!(est.update_return(1e200), Err(EngineError::InvalidInput(_))));
        assert_eq!((est.variance(), est.last_return()), before);

        for _ in 0..1_000 {
            let vol = est.update_return(0.0).unwrap();
            assert!(vol.is_finite());
        }

        // large but representable shocks are still accepted
        est.update_return(1e150).unwrap();
        let vol = est.update_return(0.0).unwrap();
        assert!(vol.is_finite());
        assert!(est.update_return(0.0).is_ok());
    }

    #[test]
    fn test_reset_restores_init() {
        let mut est = GarchEstimator::new(&config()).unwrap();
        for r in [0.01, -0.03, 0.02] {
            est.update_return(r).unwrap();
        }
        est.reset();
        assert_eq!(est.variance(), 1e-4);
        assert_eq!(est.last_return(), None);
    }

    #[test]
    fn test_event_driven_seeding() {
        let mut est = GarchEstimator::new(&config()).unwrap();
        let first = est
            .update(&MarketEvent::quote(1u64, "ETH", 99.0, 1.0, 101.0, 1.0))
            .unwrap();
        assert_eq!(
            first.status,
            SignalStatus::InsufficientData {
                collected: 1,
                required: 2
            }
        );
        assert_relative_eq!(first.value, 1e-4f64.sqrt());

        let second = est
            .update(&MarketEvent::quote(2u64, "ETH", 100.0, 1.0, 102.0, 1.0))
            .unwrap();
        assert!(second.status.is_ready());
        assert_eq!(est.last_return(), Some((101.0f64 / 100.0).ln()));
    }

    #[test]
    fn test_bad_price_does_not_seed() {
        let mut est = GarchEstimator::new(&config()).unwrap();
        let bad = MarketEvent::quote(1u64, "ETH", 0.0, 1.0, 101.0, 1.0);
        assert!(est.update(&bad).is_err());
        // still seeding
        let reading = est
            .update(&MarketEvent::quote(2u64, "ETH", 99.0, 1.0, 101.0, 1.0))
            .unwrap();
        assert!(!reading.status.is_ready());
    }

    #[test]
    fn test_forecast_horizons() {
        let mut est = GarchEstimator::new(&config()).unwrap();
        est.update_return(0.05).unwrap();
        let next = est.params().step(est.variance(), 0.05);
        assert_relative_eq!(est.forecast_variance(1), next);
        assert_eq!(est.forecast_variance(0), est.variance());
        assert_relative_eq!(
            est.forecast_variance(100_000),
            est.unconditional_variance(),
            max_relative = 1e-9
        );
    }
}
