//! Signal Engine - the host-facing facade
//!
//! Every public call:
//! 1. Refuses to run once the engine is shut down
//! 2. Runs inside a panic guard
//! 3. Returns a `BoundaryResult` with a stable error code

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use helios_alphas::AlphaConfig;
use helios_core::{AlphaId, InstrumentId, MarketEvent, SignalOutput};
use helios_ports::Estimator;
use helios_registry::{DispatchReport, EstimatorHandle, SignalRegistry, SlotInfo};
use log::{debug, info, warn};

use crate::buffer::{BatchView, OwnedBatch};
use crate::config::{BatchConfig, EngineConfig, HealthConfig};
use crate::error::{BoundaryError, BoundaryResult, guard};
use crate::offload::{self, BatchTask, ReferenceTask};
use crate::report::{BatchReport, run_batch};

pub struct SignalEngine {
    registry: Arc<SignalRegistry>,
    batch: BatchConfig,
    health: HealthConfig,
    shut_down: AtomicBool,
}

impl Default for SignalEngine {
    fn default() -> Self {
        Self::new(BatchConfig::default(), HealthConfig::default())
    }
}

impl SignalEngine {
    pub fn new(batch: BatchConfig, health: HealthConfig) -> Self {
        Self {
            registry: Arc::new(SignalRegistry::new()),
            batch,
            health,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Build an engine and register every configured estimator, in order
    pub fn from_config(config: &EngineConfig) -> BoundaryResult<Self> {
        config.validate()?;
        let engine = Self::new(config.batch, config.health);
        for reg in &config.registrations {
            engine.register(reg.alpha_id.as_str(), reg.instrument_id.as_str(), &reg.config)?;
        }
        info!(
            "[BOUNDARY] engine started with {} estimators",
            engine.registry.len()
        );
        Ok(engine)
    }

    pub fn register(
        &self,
        alpha_id: impl Into<AlphaId>,
        instrument_id: impl Into<InstrumentId>,
        config: &AlphaConfig,
    ) -> BoundaryResult<EstimatorHandle> {
        let alpha_id = alpha_id.into();
        let instrument_id = instrument_id.into();
        self.call("register", || {
            Ok(self.registry.register(alpha_id, instrument_id, config)?)
        })
    }

    /// Register an estimator built by the host
    pub fn register_estimator(
        &self,
        alpha_id: impl Into<AlphaId>,
        instrument_id: impl Into<InstrumentId>,
        estimator: Box<dyn Estimator>,
    ) -> BoundaryResult<EstimatorHandle> {
        let alpha_id = alpha_id.into();
        let instrument_id = instrument_id.into();
        self.call("register_estimator", || {
            Ok(self
                .registry
                .register_estimator(alpha_id, instrument_id, estimator)?)
        })
    }

    /// Register from a `kind`-tagged JSON alpha configuration
    pub fn register_json(
        &self,
        alpha_id: impl Into<AlphaId>,
        instrument_id: impl Into<InstrumentId>,
        config_json: &str,
    ) -> BoundaryResult<EstimatorHandle> {
        let config: AlphaConfig = serde_json::from_str(config_json)
            .map_err(|e| BoundaryError::invalid_input(format!("alpha config: {e}")))?;
        self.register(alpha_id, instrument_id, &config)
    }

    pub fn deregister(&self, handle: EstimatorHandle) -> BoundaryResult<()> {
        self.call("deregister", || Ok(self.registry.deregister(handle)?))
    }

    pub fn reset(&self, handle: EstimatorHandle) -> BoundaryResult<()> {
        self.call("reset", || Ok(self.registry.reset(handle)?))
    }

    pub fn rebase(&self, handle: EstimatorHandle) -> BoundaryResult<()> {
        self.call("rebase", || Ok(self.registry.rebase(handle)?))
    }

    pub fn update(&self, handle: EstimatorHandle, event: &MarketEvent) -> BoundaryResult<SignalOutput> {
        self.call("update", || Ok(self.registry.update(handle, event)?))
    }

    pub fn dispatch(&self, event: &MarketEvent) -> BoundaryResult<DispatchReport> {
        self.call("dispatch", || Ok(self.registry.dispatch(event)))
    }

    /// Feed every row of the batch, in place, to the instrument's estimators
    pub fn update_batch(&self, view: &BatchView<'_>) -> BoundaryResult<BatchReport> {
        self.call("update_batch", || {
            let report = run_batch(&self.registry, view, self.batch.chunk_size, None)?;
            debug!(
                "[BOUNDARY] batch on {}: {} rows, {} outputs, {} failures",
                view.instrument_id(),
                report.rows_processed,
                report.outputs.len(),
                report.failures.len()
            );
            Ok(report)
        })
    }

    /// Run a batch update on the blocking pool
    pub fn spawn_update_batch(&self, batch: OwnedBatch) -> BoundaryResult<BatchTask> {
        self.call("spawn_update_batch", || {
            offload::spawn_batch(Arc::clone(&self.registry), batch, self.batch.chunk_size)
        })
    }

    /// Replace the estimator's reference histogram with one built from `samples`
    pub fn load_reference(&self, handle: EstimatorHandle, samples: &[f64]) -> BoundaryResult<()> {
        self.call("load_reference", || {
            offload::load_reference(&self.registry, handle, samples, self.batch.chunk_size, None)
        })
    }

    /// Build and install a reference histogram on the blocking pool
    pub fn spawn_load_reference(
        &self,
        handle: EstimatorHandle,
        samples: Arc<[f64]>,
    ) -> BoundaryResult<ReferenceTask> {
        self.call("spawn_load_reference", || {
            // Fail fast on handles that cannot take a reference
            self.registry.reference_binning(handle)?;
            offload::spawn_reference(
                Arc::clone(&self.registry),
                handle,
                samples,
                self.batch.chunk_size,
            )
        })
    }

    pub fn latest(&self, handle: EstimatorHandle) -> BoundaryResult<Option<SignalOutput>> {
        self.call("latest", || Ok(self.registry.latest(handle)?))
    }

    pub fn lookup(
        &self,
        alpha_id: &AlphaId,
        instrument_id: &InstrumentId,
    ) -> BoundaryResult<EstimatorHandle> {
        self.call("lookup", || Ok(self.registry.lookup(alpha_id, instrument_id)?))
    }

    pub fn estimators(&self, instrument_id: &InstrumentId) -> BoundaryResult<Vec<SlotInfo>> {
        self.call("estimators", || Ok(self.registry.describe_instrument(instrument_id)))
    }

    /// Not shut down and the registry answers within the probe timeout
    pub fn is_healthy(&self) -> bool {
        !self.is_shut_down() && self.registry.probe(self.health.probe_timeout())
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Drop every estimator and refuse further calls
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let count = self.registry.len();
        if guard("shutdown", || {
            self.registry.clear();
            Ok(())
        })
        .is_err()
        {
            warn!("[BOUNDARY] registry clear panicked during shutdown");
        }
        info!("[BOUNDARY] engine shut down, {count} estimators released");
    }

    fn call<T>(&self, op: &str, f: impl FnOnce() -> BoundaryResult<T>) -> BoundaryResult<T> {
        if self.is_shut_down() {
            return Err(BoundaryError::shut_down());
        }
        guard(op, f)
    }
}
