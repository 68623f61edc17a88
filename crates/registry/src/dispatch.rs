//! Event dispatch
//!
//! Routes one market event to every estimator registered on its instrument,
//! in registration order. A failing estimator is recorded and skipped; the
//! rest still see the event.

use helios_core::{AlphaId, MarketEvent, SignalOutput};
use helios_ports::EngineError;
use log::warn;

use crate::handle::EstimatorHandle;
use crate::registry::SignalRegistry;

/// One estimator that rejected or failed on an event
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchFailure {
    pub handle: EstimatorHandle,
    pub alpha_id: AlphaId,
    pub error: EngineError,
}

/// Outcome of dispatching one event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// Outputs in registration order
    pub outputs: Vec<SignalOutput>,
    pub failures: Vec<DispatchFailure>,
    /// Estimators not subscribed to this event kind
    pub skipped: usize,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl SignalRegistry {
    /// Feed `event` to every estimator on its instrument that accepts it
    pub fn dispatch(&self, event: &MarketEvent) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (handle, slot) in self.slots_for(event.instrument_id()) {
            if !slot.accepts(event) {
                report.skipped += 1;
                continue;
            }
            match self.run(handle, &slot, event) {
                Ok(output) => report.outputs.push(output),
                Err(error) => {
                    warn!(
                        "[DISPATCH] {} on {} failed at {}: {}",
                        slot.alpha_id,
                        slot.instrument_id,
                        event.timestamp(),
                        error
                    );
                    report.failures.push(DispatchFailure {
                        handle,
                        alpha_id: slot.alpha_id.clone(),
                        error,
                    });
                }
            }
        }

        report
    }
}
