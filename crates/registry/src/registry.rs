//! Signal Registry
//!
//! Owns every estimator instance, keyed by `(alpha_id, instrument_id)`.
//!
//! - The arena (index, key map, per-instrument order) sits behind one
//!   `RwLock` that is held only long enough to clone slot `Arc`s.
//! - Each estimator has its own `Mutex`, so updates to different
//!   estimators never contend.
//! - Latest outputs live in a `DashMap` and are read without touching any
//!   estimator lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use helios_alphas::AlphaConfig;
use helios_core::{AlphaId, AlphaKind, Binning, InstrumentId, MarketEvent, SignalOutput};
use helios_ports::{EngineError, EngineResult, Estimator, EventField};
use log::{info, warn};
use parking_lot::RwLock;

use crate::handle::EstimatorHandle;
use crate::slot::Slot;

/// Registration metadata of one estimator
#[derive(Debug, Clone, PartialEq)]
pub struct SlotInfo {
    pub handle: EstimatorHandle,
    pub alpha_id: AlphaId,
    pub instrument_id: InstrumentId,
    pub kind: AlphaKind,
    pub required_fields: &'static [EventField],
}

struct Entry {
    generation: u32,
    slot: Option<Arc<Slot>>,
}

#[derive(Default)]
struct Arena {
    entries: Vec<Entry>,
    free: Vec<u32>,
    by_key: HashMap<(AlphaId, InstrumentId), EstimatorHandle>,
    /// Registration order per instrument
    by_instrument: HashMap<InstrumentId, Vec<EstimatorHandle>>,
}

impl Arena {
    fn get(&self, handle: EstimatorHandle) -> Option<&Arc<Slot>> {
        self.entries
            .get(handle.index())
            .filter(|entry| entry.generation == handle.generation())
            .and_then(|entry| entry.slot.as_ref())
    }

    fn insert(&mut self, slot: Slot) -> EngineResult<EstimatorHandle> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.entries.len())
                    .map_err(|_| EngineError::invariant("estimator arena is full"))?;
                self.entries.push(Entry {
                    generation: 0,
                    slot: None,
                });
                index
            }
        };

        let entry = &mut self.entries[index as usize];
        let handle = EstimatorHandle::new(index, entry.generation);
        let key = (slot.alpha_id.clone(), slot.instrument_id.clone());
        let instrument = slot.instrument_id.clone();
        entry.slot = Some(Arc::new(slot));

        self.by_key.insert(key, handle);
        self.by_instrument.entry(instrument).or_default().push(handle);
        Ok(handle)
    }

    fn remove(&mut self, handle: EstimatorHandle) -> Option<Arc<Slot>> {
        let entry = self
            .entries
            .get_mut(handle.index())
            .filter(|entry| entry.generation == handle.generation())?;
        let slot = entry.slot.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(handle.index() as u32);

        self.by_key
            .remove(&(slot.alpha_id.clone(), slot.instrument_id.clone()));
        if let Some(handles) = self.by_instrument.get_mut(&slot.instrument_id) {
            handles.retain(|h| *h != handle);
            if handles.is_empty() {
                self.by_instrument.remove(&slot.instrument_id);
            }
        }
        Some(slot)
    }
}

/// Registry of estimator instances
pub struct SignalRegistry {
    arena: RwLock<Arena>,
    latest: DashMap<EstimatorHandle, SignalOutput>,
}

impl Default for SignalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self {
            arena: RwLock::new(Arena::default()),
            latest: DashMap::new(),
        }
    }

    /// Build an estimator from `config` and register it for the pair
    pub fn register(
        &self,
        alpha_id: impl Into<AlphaId>,
        instrument_id: impl Into<InstrumentId>,
        config: &AlphaConfig,
    ) -> EngineResult<EstimatorHandle> {
        let estimator = config.build()?;
        self.register_estimator(alpha_id, instrument_id, estimator)
    }

    /// Register an already built estimator for the pair
    pub fn register_estimator(
        &self,
        alpha_id: impl Into<AlphaId>,
        instrument_id: impl Into<InstrumentId>,
        estimator: Box<dyn Estimator>,
    ) -> EngineResult<EstimatorHandle> {
        let alpha_id = alpha_id.into();
        let instrument_id = instrument_id.into();
        let kind = estimator.kind();

        let mut arena = self.arena.write();
        if arena
            .by_key
            .contains_key(&(alpha_id.clone(), instrument_id.clone()))
        {
            return Err(EngineError::DuplicateRegistration {
                alpha_id: alpha_id.to_string(),
                instrument_id: instrument_id.to_string(),
            });
        }

        let handle = arena.insert(Slot::new(alpha_id.clone(), instrument_id.clone(), estimator))?;
        drop(arena);

        info!(
            "[REGISTRY] registered {} ({}) on {} as {}",
            alpha_id, kind, instrument_id, handle
        );
        Ok(handle)
    }

    /// Remove the estimator; the handle becomes stale
    pub fn deregister(&self, handle: EstimatorHandle) -> EngineResult<()> {
        let slot = self
            .arena
            .write()
            .remove(handle)
            .ok_or_else(|| stale(handle))?;
        self.latest.remove(&handle);
        info!(
            "[REGISTRY] deregistered {} on {} ({})",
            slot.alpha_id, slot.instrument_id, handle
        );
        Ok(())
    }

    /// Return the estimator to its freshly registered state
    pub fn reset(&self, handle: EstimatorHandle) -> EngineResult<()> {
        let slot = self.slot(handle)?;
        slot.reset(|| {
            self.latest.remove(&handle);
        })?;
        info!(
            "[REGISTRY] reset {} on {} ({})",
            slot.alpha_id, slot.instrument_id, handle
        );
        Ok(())
    }

    /// Re-anchor the estimator's reference window on its recent data
    pub fn rebase(&self, handle: EstimatorHandle) -> EngineResult<()> {
        let slot = self.slot(handle)?;
        slot.guarded(|est| est.rebase())?;
        info!(
            "[REGISTRY] rebased {} on {} ({})",
            slot.alpha_id, slot.instrument_id, handle
        );
        Ok(())
    }

    /// Binning of the estimator's reference histogram
    pub fn reference_binning(&self, handle: EstimatorHandle) -> EngineResult<Binning> {
        let slot = self.slot(handle)?;
        slot.guarded(|est| {
            est.reference_binning().ok_or_else(|| {
                EngineError::invalid_input(format!("{} estimator has no reference histogram", est.kind()))
            })
        })
    }

    pub fn install_reference(&self, handle: EstimatorHandle, counts: Vec<u64>) -> EngineResult<()> {
        let slot = self.slot(handle)?;
        slot.guarded(|est| est.install_reference(counts))
    }

    /// Feed one event to one estimator
    pub fn update(&self, handle: EstimatorHandle, event: &MarketEvent) -> EngineResult<SignalOutput> {
        let slot = self.slot(handle)?;
        if event.instrument_id() != &slot.instrument_id {
            return Err(EngineError::invalid_input(format!(
                "event for {} sent to estimator registered on {}",
                event.instrument_id(),
                slot.instrument_id
            )));
        }
        if !slot.accepts(event) {
            return Err(EngineError::invalid_input(format!(
                "{} ({}) needs a trade print, event carries none",
                slot.alpha_id, slot.kind
            )));
        }
        self.run(handle, &slot, event)
    }

    pub(crate) fn run(
        &self,
        handle: EstimatorHandle,
        slot: &Slot,
        event: &MarketEvent,
    ) -> EngineResult<SignalOutput> {
        // Published under the slot lock: outputs land in update order
        let output = slot.guarded(|est| {
            let reading = est.update(event)?;
            let output = SignalOutput::new(
                slot.alpha_id.clone(),
                slot.instrument_id.clone(),
                event.timestamp(),
                reading,
            );
            self.latest.insert(handle, output.clone());
            Ok(output)
        })?;

        // Deregistered or cleared while updating
        if self.arena.read().get(handle).is_none() {
            self.latest.remove(&handle);
        }
        Ok(output)
    }

    pub fn lookup(
        &self,
        alpha_id: &AlphaId,
        instrument_id: &InstrumentId,
    ) -> EngineResult<EstimatorHandle> {
        self.arena
            .read()
            .by_key
            .get(&(alpha_id.clone(), instrument_id.clone()))
            .copied()
            .ok_or_else(|| {
                EngineError::not_found(format!(
                    "no estimator {alpha_id} registered on {instrument_id}"
                ))
            })
    }

    /// Last output of the estimator, `None` before its first update
    pub fn latest(&self, handle: EstimatorHandle) -> EngineResult<Option<SignalOutput>> {
        if self.arena.read().get(handle).is_none() {
            return Err(stale(handle));
        }
        Ok(self.latest.get(&handle).map(|output| output.clone()))
    }

    pub fn describe(&self, handle: EstimatorHandle) -> EngineResult<SlotInfo> {
        let slot = self.slot(handle)?;
        Ok(info_of(handle, &slot))
    }

    /// Handles registered on the instrument, in registration order
    pub fn handles_for(&self, instrument_id: &InstrumentId) -> Vec<EstimatorHandle> {
        self.arena
            .read()
            .by_instrument
            .get(instrument_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Metadata of every estimator on the instrument, in registration order
    pub fn describe_instrument(&self, instrument_id: &InstrumentId) -> Vec<SlotInfo> {
        self.slots_for(instrument_id)
            .iter()
            .map(|(handle, slot)| info_of(*handle, slot))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.arena.read().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every estimator; all outstanding handles become stale
    pub fn clear(&self) {
        let mut arena = self.arena.write();
        let handles: Vec<EstimatorHandle> = arena.by_key.values().copied().collect();
        for handle in &handles {
            arena.remove(*handle);
        }
        drop(arena);
        self.latest.clear();
        if !handles.is_empty() {
            warn!("[REGISTRY] cleared {} estimators", handles.len());
        }
    }

    /// Whether the arena lock can be taken within `timeout`
    pub fn probe(&self, timeout: Duration) -> bool {
        self.arena.try_read_for(timeout).is_some()
    }

    pub(crate) fn slot(&self, handle: EstimatorHandle) -> EngineResult<Arc<Slot>> {
        self.arena
            .read()
            .get(handle)
            .cloned()
            .ok_or_else(|| stale(handle))
    }

    pub(crate) fn slots_for(&self, instrument_id: &InstrumentId) -> Vec<(EstimatorHandle, Arc<Slot>)> {
        let arena = self.arena.read();
        arena
            .by_instrument
            .get(instrument_id)
            .map(|handles| {
                handles
                    .iter()
                    .filter_map(|h| arena.get(*h).map(|slot| (*h, Arc::clone(slot))))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn stale(handle: EstimatorHandle) -> EngineError {
    EngineError::not_found(format!("estimator handle {handle} is not registered"))
}

fn info_of(handle: EstimatorHandle, slot: &Slot) -> SlotInfo {
    SlotInfo {
        handle,
        alpha_id: slot.alpha_id.clone(),
        instrument_id: slot.instrument_id.clone(),
        kind: slot.kind,
        required_fields: slot.required_fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helios_alphas::{GarchConfig, OfiConfig};
    use helios_core::{SignalDetail, SignalReading};
    use std::sync::Weak;

    fn ofi() -> AlphaConfig {
        AlphaConfig::Ofi(OfiConfig {
            market_cap: 100.0,
            ..Default::default()
        })
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = SignalRegistry::new();
        let handle = registry.register("ofi", "BTC", &ofi()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.lookup(&"ofi".into(), &"BTC".into()).unwrap(),
            handle
        );
        assert!(matches!(
            registry.lookup(&"ofi".into(), &"ETH".into()),
            Err(EngineError::NotFound(_))
        ));
        assert_eq!(registry.latest(handle).unwrap(), None);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let registry = SignalRegistry::new();
        let bad = AlphaConfig::Garch(GarchConfig {
            alpha: 0.5,
            beta: 0.6,
            ..Default::default()
        });
        assert!(matches!(
            registry.register("g", "BTC", &bad),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_slot_reuse_bumps_generation() {
        let registry = SignalRegistry::new();
        let first = registry.register("ofi", "BTC", &ofi()).unwrap();
        registry.deregister(first).unwrap();
        let second = registry.register("ofi", "BTC", &ofi()).unwrap();

        assert_ne!(first, second);
        assert!(registry.describe(first).is_err());
        assert_eq!(registry.describe(second).unwrap().kind, AlphaKind::Ofi);
        assert!(matches!(
            registry.deregister(first),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let registry = SignalRegistry::new();
        let a = registry.register("a", "BTC", &ofi()).unwrap();
        let b = registry.register("b", "ETH", &ofi()).unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.latest(a).is_err());
        assert!(registry.latest(b).is_err());
        assert!(registry.handles_for(&"BTC".into()).is_empty());
    }

    /// Deregisters its own pair from inside `update`
    struct SelfRemoving {
        registry: Weak<SignalRegistry>,
    }

    impl Estimator for SelfRemoving {
        fn kind(&self) -> AlphaKind {
            AlphaKind::Ofi
        }

        fn required_fields(&self) -> &'static [EventField] {
            &[EventField::BidSize, EventField::AskSize]
        }

        fn update(&mut self, _event: &MarketEvent) -> EngineResult<SignalReading> {
            if let Some(registry) = self.registry.upgrade() {
                let handle = registry.lookup(&"gone".into(), &"BTC".into())?;
                registry.deregister(handle)?;
            }
            Ok(SignalReading::ready(
                0.0,
                SignalDetail::Ofi {
                    ofi_step: 0.0,
                    cum_ofi: 0.0,
                    volume_normalized: 0.0,
                },
            ))
        }

        fn reset(&mut self) {}
    }

    #[test]
    fn test_update_racing_deregister_leaves_no_output() {
        let registry = Arc::new(SignalRegistry::new());
        let keep = registry.register("keep", "BTC", &ofi()).unwrap();
        let gone = registry
            .register_estimator(
                "gone",
                "BTC",
                Box::new(SelfRemoving {
                    registry: Arc::downgrade(&registry),
                }),
            )
            .unwrap();

        let event = MarketEvent::quote(1u64, "BTC", 100.0, 5.0, 100.5, 5.0);
        registry.update(gone, &event).unwrap();
        registry.update(keep, &event).unwrap();

        assert!(registry.latest(gone).is_err());
        assert_eq!(registry.latest.len(), 1);
        assert!(registry.latest.contains_key(&keep));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_probe_answers_when_idle() {
        let registry = SignalRegistry::new();
        assert!(registry.probe(Duration::from_millis(10)));
    }
}
