use helios_core::{AlphaId, SignalOutput};
use helios_registry::SignalRegistry;
use serde::{Deserialize, Serialize};

use crate::buffer::BatchView;
use crate::error::{BoundaryError, BoundaryResult};
use crate::offload::CancelHandle;

/// One estimator failure on one batch row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowFailure {
    pub row: usize,
    pub alpha_id: AlphaId,
    pub error: BoundaryError,
}

/// Outcome of a batch update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Outputs in row order, registration order within a row
    pub outputs: Vec<SignalOutput>,
    pub failures: Vec<RowFailure>,
    pub rows_processed: usize,
    /// Stopped at a chunk boundary before the last row
    pub cancelled: bool,
}

/// Validate the batch against the registered estimators, then feed every row.
///
/// Cancellation is checked before each chunk of `chunk_size` rows.
pub(crate) fn run_batch(
    registry: &SignalRegistry,
    view: &BatchView<'_>,
    chunk_size: usize,
    cancel: Option<&CancelHandle>,
) -> BoundaryResult<BatchReport> {
    let estimators = registry.describe_instrument(view.instrument_id());
    view.validate_schema(&estimators)?;

    let mut report = BatchReport::default();
    let chunk_size = chunk_size.max(1);

    for row in 0..view.len() {
        if row % chunk_size == 0 && cancel.is_some_and(CancelHandle::is_cancelled) {
            report.cancelled = true;
            break;
        }

        let dispatched = registry.dispatch(&view.event(row));
        report.outputs.extend(dispatched.outputs);
        report
            .failures
            .extend(dispatched.failures.into_iter().map(|f| RowFailure {
                row,
                alpha_id: f.alpha_id,
                error: f.error.into(),
            }));
        report.rows_processed += 1;
    }

    Ok(report)
}
