//! Offloaded jobs
//!
//! Batch updates and reference-histogram builds run on tokio's blocking pool.
//! Each job reports back exactly once through a oneshot channel and checks
//! its `CancelHandle` between chunks, never inside a kernel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use helios_core::Binning;
use helios_ports::EngineError;
use helios_registry::{EstimatorHandle, SignalRegistry};
use log::{debug, info, warn};
use tokio::sync::oneshot;

use crate::buffer::OwnedBatch;
use crate::error::{BoundaryError, BoundaryResult, guard};
use crate::report::{BatchReport, run_batch};

/// Cooperative cancellation flag shared with a running job
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Pending offloaded batch update
#[derive(Debug)]
pub struct BatchTask {
    rx: oneshot::Receiver<BoundaryResult<BatchReport>>,
    cancel: CancelHandle,
}

impl BatchTask {
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the report. A cancelled batch still returns the rows it finished.
    pub async fn wait(self) -> BoundaryResult<BatchReport> {
        self.rx
            .await
            .map_err(|_| BoundaryError::internal("batch worker exited without reporting"))?
    }
}

/// Pending offloaded reference-histogram build
#[derive(Debug)]
pub struct ReferenceTask {
    rx: oneshot::Receiver<BoundaryResult<()>>,
    cancel: CancelHandle,
}

impl ReferenceTask {
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the new reference to be installed. Cancellation keeps the old one.
    pub async fn wait(self) -> BoundaryResult<()> {
        self.rx
            .await
            .map_err(|_| BoundaryError::internal("reference worker exited without reporting"))?
    }
}

fn runtime() -> BoundaryResult<tokio::runtime::Handle> {
    tokio::runtime::Handle::try_current()
        .map_err(|e| BoundaryError::invalid_input(format!("offloading needs a tokio runtime: {e}")))
}

pub(crate) fn spawn_batch(
    registry: Arc<SignalRegistry>,
    batch: OwnedBatch,
    chunk_size: usize,
) -> BoundaryResult<BatchTask> {
    let runtime = runtime()?;
    let (tx, rx) = oneshot::channel();
    let cancel = CancelHandle::new();
    let job_cancel = cancel.clone();

    runtime.spawn_blocking(move || {
        let result = guard("offloaded update_batch", || {
            run_batch(&registry, &batch.view(), chunk_size, Some(&job_cancel))
        });
        match &result {
            Ok(report) if report.cancelled => warn!(
                "[OFFLOAD] batch on {} cancelled after {}/{} rows",
                batch.view().instrument_id(),
                report.rows_processed,
                batch.len()
            ),
            Ok(report) => debug!(
                "[OFFLOAD] batch on {} done: {} rows, {} outputs, {} failures",
                batch.view().instrument_id(),
                report.rows_processed,
                report.outputs.len(),
                report.failures.len()
            ),
            Err(e) => warn!("[OFFLOAD] batch failed: {e}"),
        }
        if tx.send(result).is_err() {
            debug!("[OFFLOAD] batch result dropped, caller went away");
        }
    });

    Ok(BatchTask { rx, cancel })
}

pub(crate) fn spawn_reference(
    registry: Arc<SignalRegistry>,
    handle: EstimatorHandle,
    samples: Arc<[f64]>,
    chunk_size: usize,
) -> BoundaryResult<ReferenceTask> {
    let runtime = runtime()?;
    let (tx, rx) = oneshot::channel();
    let cancel = CancelHandle::new();
    let job_cancel = cancel.clone();

    runtime.spawn_blocking(move || {
        let result = guard("offloaded load_reference", || {
            load_reference(&registry, handle, &samples, chunk_size, Some(&job_cancel))
        });
        if let Err(e) = &result {
            warn!("[OFFLOAD] reference load for {handle} stopped: {e}");
        }
        if tx.send(result).is_err() {
            debug!("[OFFLOAD] reference result dropped, caller went away");
        }
    });

    Ok(ReferenceTask { rx, cancel })
}

/// Bin `samples` off-lock, then swap the estimator's reference in one step
pub(crate) fn load_reference(
    registry: &SignalRegistry,
    handle: EstimatorHandle,
    samples: &[f64],
    chunk_size: usize,
    cancel: Option<&CancelHandle>,
) -> BoundaryResult<()> {
    let binning = registry.reference_binning(handle)?;
    let counts = reference_counts(binning, samples, chunk_size, cancel)?;
    registry.install_reference(handle, counts)?;
    info!(
        "[OFFLOAD] reference for {handle} built from {} samples",
        samples.len()
    );
    Ok(())
}

fn reference_counts(
    binning: Binning,
    samples: &[f64],
    chunk_size: usize,
    cancel: Option<&CancelHandle>,
) -> BoundaryResult<Vec<u64>> {
    let mut counts = vec![0u64; binning.n_bins()];

    for (chunk_no, chunk) in samples.chunks(chunk_size.max(1)).enumerate() {
        if cancel.is_some_and(CancelHandle::is_cancelled) {
            return Err(EngineError::Cancelled.into());
        }
        for (i, sample) in chunk.iter().enumerate() {
            if !sample.is_finite() {
                return Err(BoundaryError::invalid_input(format!(
                    "reference sample {} is not finite: {sample}",
                    chunk_no * chunk_size.max(1) + i
                )));
            }
            counts[binning.index_of(*sample)] += 1;
        }
    }

    Ok(counts)
}
