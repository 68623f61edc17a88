//! One registered estimator and its single-writer lock

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};

use helios_core::{AlphaId, AlphaKind, InstrumentId, MarketEvent};
use helios_ports::{EngineError, EngineResult, Estimator, EventField, panic_message};
use log::error;
use parking_lot::Mutex;

pub(crate) struct Slot {
    pub alpha_id: AlphaId,
    pub instrument_id: InstrumentId,
    pub kind: AlphaKind,
    pub required_fields: &'static [EventField],
    /// Only trade events carry every field this estimator reads
    pub needs_trade: bool,
    estimator: Mutex<Box<dyn Estimator>>,
    /// Set when the estimator panicked; its state is no longer trusted
    poisoned: AtomicBool,
}

impl Slot {
    pub fn new(alpha_id: AlphaId, instrument_id: InstrumentId, estimator: Box<dyn Estimator>) -> Self {
        let required_fields = estimator.required_fields();
        Self {
            alpha_id,
            instrument_id,
            kind: estimator.kind(),
            required_fields,
            needs_trade: required_fields.iter().any(EventField::is_trade_field),
            estimator: Mutex::new(estimator),
            poisoned: AtomicBool::new(false),
        }
    }

    pub fn accepts(&self, event: &MarketEvent) -> bool {
        !self.needs_trade || event.is_trade()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// Run `f` against the estimator under its lock, converting a panic into
    /// an invariant violation and disabling the slot.
    pub fn guarded<R>(
        &self,
        f: impl FnOnce(&mut dyn Estimator) -> EngineResult<R>,
    ) -> EngineResult<R> {
        if self.is_poisoned() {
            return Err(EngineError::invariant(format!(
                "estimator {} on {} is disabled until reset",
                self.alpha_id, self.instrument_id
            )));
        }

        let mut estimator = self.estimator.lock();
        match catch_unwind(AssertUnwindSafe(|| f(&mut **estimator))) {
            Ok(result) => result,
            Err(payload) => {
                self.poisoned.store(true, Ordering::Release);
                let msg = panic_message(payload.as_ref());
                error!(
                    "[REGISTRY] estimator {} on {} panicked, disabled until reset: {}",
                    self.alpha_id, self.instrument_id, msg
                );
                Err(EngineError::invariant(format!("estimator panicked: {msg}")))
            }
        }
    }

    /// Reset the estimator and clear the poisoned flag. `on_reset` runs
    /// before the lock is released.
    pub fn reset(&self, on_reset: impl FnOnce()) -> EngineResult<()> {
        let mut estimator = self.estimator.lock();
        match catch_unwind(AssertUnwindSafe(|| estimator.reset())) {
            Ok(()) => {
                self.poisoned.store(false, Ordering::Release);
                on_reset();
                Ok(())
            }
            Err(payload) => {
                self.poisoned.store(true, Ordering::Release);
                Err(EngineError::invariant(format!(
                    "estimator panicked during reset: {}",
                    panic_message(payload.as_ref())
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helios_core::{SignalDetail, SignalReading};

    struct Exploding {
        calls: usize,
    }

    impl Estimator for Exploding {
        fn kind(&self) -> AlphaKind {
            AlphaKind::Garch
        }

        fn required_fields(&self) -> &'static [EventField] {
            &[EventField::TradePrice]
        }

        fn update(&mut self, _event: &MarketEvent) -> EngineResult<SignalReading> {
            self.calls += 1;
            if self.calls == 2 {
                panic!("boom");
            }
            Ok(SignalReading::ready(
                self.calls as f64,
                SignalDetail::Garch {
                    variance: 0.0,
                    last_return: None,
                },
            ))
        }

        fn reset(&mut self) {
            self.calls = 0;
        }
    }

    fn slot() -> Slot {
        Slot::new("a".into(), "X".into(), Box::new(Exploding { calls: 0 }))
    }

    #[test]
    fn test_trade_fields_require_trade_events() {
        let slot = slot();
        let quote = MarketEvent::quote(1u64, "X", 1.0, 1.0, 2.0, 1.0);
        assert!(slot.needs_trade);
        assert!(!slot.accepts(&quote));
        assert!(slot.accepts(&quote.with_trade(1.5, 1.0)));
    }

    #[test]
    fn test_panic_poisons_until_reset() {
        let slot = slot();
        let event = MarketEvent::quote(1u64, "X", 1.0, 1.0, 2.0, 1.0);
        let update = |slot: &Slot| slot.guarded(|est| est.update(&event));
        assert!(update(&slot).is_ok());

        let err = update(&slot).unwrap_err();
        assert!(matches!(err, EngineError::InternalInvariantViolation(ref m) if m.contains("boom")));
        assert!(slot.is_poisoned());
        assert!(update(&slot).is_err());

        let mut hooked = false;
        slot.reset(|| hooked = true).unwrap();
        assert!(hooked);
        assert!(!slot.is_poisoned());
        assert_eq!(update(&slot).unwrap().value, 1.0);
    }
}
