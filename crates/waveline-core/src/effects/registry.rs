//! Effect instance registry
//!
//! Holds the list of registered effect instances in registration order and
//! implements the invalidation rule: any structural timeline change (file
//! added or removed) purges every instance, because their sample ranges
//! reference a buffer layout that no longer exists.
//!
//! State lives behind an `Arc<Mutex<_>>` so the buffer-changed subscription
//! can reach it; locks are held only for the list operation itself, never
//! across a render or a patch.

use std::sync::{Arc, Mutex};

use thiserror::Error;

use super::{EffectCatalog, ParamValue};
use crate::event::{BufferChanged, EventDispatcher, SubscriptionId};

/// Effect registration errors
#[derive(Error, Debug)]
pub enum EffectsError {
    /// The type name is not in the catalog; nothing was registered
    #[error("Unknown effect type: {0}")]
    UnknownEffectType(String),

    /// The parameter name is not in the effect's descriptor
    #[error("Unknown parameter {param} for effect type {effect}")]
    UnknownParam { effect: &'static str, param: String },

    /// The id does not match a registered instance
    #[error("No registered effect with id {0:?}")]
    UnknownEffect(EffectId),
}

/// Stable handle to a registered effect instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectId(u64);

/// A registered, time-scoped effect
#[derive(Debug, Clone)]
pub struct EffectInstance {
    /// Registry handle
    pub id: EffectId,
    /// Catalog type name
    pub type_name: &'static str,
    /// Current parameter values in descriptor order
    pub params: Vec<ParamValue>,
    /// First affected sample (inclusive)
    pub range_start: usize,
    /// One past the last affected sample
    pub range_end: usize,
    /// Integer seconds whose boundary sample falls inside the range;
    /// derived once at registration and never recomputed
    pub affected_seconds: Vec<usize>,
}

impl EffectInstance {
    /// Whether this instance is active in second `second`
    pub fn affects_second(&self, second: usize) -> bool {
        self.affected_seconds.binary_search(&second).is_ok()
    }
}

/// Every integer second `s` with `s * sample_rate` inside `[start, end)`
fn affected_seconds(start: usize, end: usize, sample_rate: usize) -> Vec<usize> {
    if sample_rate == 0 || start >= end {
        return Vec::new();
    }
    (start.div_ceil(sample_rate)..end.div_ceil(sample_rate)).collect()
}

#[derive(Default)]
struct RegistryState {
    effects: Vec<EffectInstance>,
    next_id: u64,
    last_file_count: usize,
}

/// The registry of active effect instances
pub struct EffectsRegistry {
    catalog: EffectCatalog,
    state: Arc<Mutex<RegistryState>>,
}

impl EffectsRegistry {
    /// Create an empty registry over the given catalog
    pub fn new(catalog: EffectCatalog) -> Self {
        Self {
            catalog,
            state: Arc::new(Mutex::new(RegistryState::default())),
        }
    }

    /// The descriptor catalog this registry validates against
    pub fn catalog(&self) -> &EffectCatalog {
        &self.catalog
    }

    /// Validate and register a new effect instance over `[start, end)`
    ///
    /// Parameters are instantiated from the descriptor's defaults. Unknown
    /// type names are rejected synchronously with the registry untouched.
    pub fn add(
        &self,
        type_name: &str,
        start: usize,
        end: usize,
        sample_rate: usize,
    ) -> Result<EffectId, EffectsError> {
        let descriptor = self
            .catalog
            .get(type_name)
            .ok_or_else(|| EffectsError::UnknownEffectType(type_name.to_string()))?;

        let mut state = self.state.lock().unwrap();
        let id = EffectId(state.next_id);
        state.next_id += 1;

        let instance = EffectInstance {
            id,
            type_name: descriptor.name,
            params: descriptor.default_params(),
            range_start: start,
            range_end: end,
            affected_seconds: affected_seconds(start, end, sample_rate),
        };
        log::debug!(
            "Registered {} over samples [{}, {}) covering {} second(s)",
            instance.type_name,
            start,
            end,
            instance.affected_seconds.len()
        );
        state.effects.push(instance);
        Ok(id)
    }

    /// Remove an instance; returns the number of remaining instances, or
    /// `None` when the id is unknown
    pub fn remove(&self, id: EffectId) -> Option<usize> {
        let mut state = self.state.lock().unwrap();
        let pos = state.effects.iter().position(|e| e.id == id)?;
        state.effects.remove(pos);
        Some(state.effects.len())
    }

    /// Update one parameter on a registered instance, clamped to the
    /// descriptor's bounds
    pub fn set_param(&self, id: EffectId, name: &str, value: f64) -> Result<(), EffectsError> {
        let mut state = self.state.lock().unwrap();
        let instance = state
            .effects
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(EffectsError::UnknownEffect(id))?;

        let spec = self
            .catalog
            .get(instance.type_name)
            .and_then(|d| d.param(name))
            .ok_or_else(|| EffectsError::UnknownParam {
                effect: instance.type_name,
                param: name.to_string(),
            })?;

        let slot = instance
            .params
            .iter_mut()
            .find(|p| p.name == spec.name)
            .expect("instance params mirror the descriptor");
        slot.value = spec.clamp(value);
        Ok(())
    }

    /// Copy of the current instance list, in registration order
    pub fn snapshot(&self) -> Vec<EffectInstance> {
        self.state.lock().unwrap().effects.clone()
    }

    /// Number of registered instances
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().effects.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every registered instance without reapplying anything
    pub fn purge(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.effects.is_empty() {
            log::info!(
                "Timeline changed; purging {} stale effect instance(s)",
                state.effects.len()
            );
        }
        state.effects.clear();
    }

    /// Subscribe the invalidation rule to a buffer-changed dispatcher
    ///
    /// When an event arrives with a file count different from the last one
    /// observed, every registered effect references stale sample indices and
    /// is purged. Patch and revert events keep the count unchanged and leave
    /// the registry alone.
    pub fn attach(&self, events: &EventDispatcher<BufferChanged>) -> SubscriptionId {
        let state = Arc::clone(&self.state);
        events.subscribe(move |ev: &BufferChanged| {
            let mut state = state.lock().unwrap();
            if state.last_file_count != ev.file_count {
                if !state.effects.is_empty() {
                    log::info!(
                        "File count changed {} -> {}; purging {} effect instance(s)",
                        state.last_file_count,
                        ev.file_count,
                        state.effects.len()
                    );
                }
                state.effects.clear();
            }
            state.last_file_count = ev.file_count;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn registry() -> EffectsRegistry {
        EffectsRegistry::new(EffectCatalog::builtin())
    }

    fn buffer_changed(file_count: usize) -> BufferChanged {
        BufferChanged {
            active_channel: Arc::new(Vec::new()),
            sample_rate: 44100,
            duration: 0.0,
            file_count,
            positions: Vec::new(),
            files: Vec::new(),
        }
    }

    #[test]
    fn test_affected_seconds_whole_second_range() {
        // Samples [44100, 88200) at 44.1kHz cover exactly second 1
        assert_eq!(affected_seconds(44100, 88200, 44100), vec![1]);
    }

    #[test]
    fn test_affected_seconds_partial_range() {
        // The range starts mid-second 0; only second 1's boundary falls inside
        assert_eq!(affected_seconds(22050, 88200, 44100), vec![1]);
        assert_eq!(affected_seconds(0, 100, 44100), vec![0]);
    }

    #[test]
    fn test_empty_range_has_no_seconds() {
        assert_eq!(affected_seconds(44100, 44100, 44100), Vec::<usize>::new());
    }

    #[test]
    fn test_add_unknown_type_rejected() {
        let registry = registry();
        let err = registry.add("UnknownType", 0, 100, 44100).unwrap_err();
        assert!(matches!(err, EffectsError::UnknownEffectType(_)));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_add_instantiates_defaults() {
        let registry = registry();
        let id = registry.add("Gain", 0, 44100, 44100).unwrap();
        let effects = registry.snapshot();
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].id, id);
        assert_eq!(effects[0].type_name, "Gain");
        assert_eq!(effects[0].params[0].name, "gain");
        assert_eq!(effects[0].params[0].value, 0.7);
        assert_eq!(effects[0].affected_seconds, vec![0]);
    }

    #[test]
    fn test_remove_returns_remaining() {
        let registry = registry();
        let a = registry.add("Gain", 0, 44100, 44100).unwrap();
        let b = registry.add("Delay", 0, 44100, 44100).unwrap();

        assert_eq!(registry.remove(a), Some(1));
        assert_eq!(registry.remove(a), None);
        assert_eq!(registry.remove(b), Some(0));
    }

    #[test]
    fn test_set_param_clamps_to_bounds() {
        let registry = registry();
        let id = registry.add("Gain", 0, 44100, 44100).unwrap();

        registry.set_param(id, "gain", 99.0).unwrap();
        assert_eq!(registry.snapshot()[0].params[0].value, 30.0);

        let err = registry.set_param(id, "nope", 1.0).unwrap_err();
        assert!(matches!(err, EffectsError::UnknownParam { .. }));
    }

    #[test]
    fn test_file_count_change_purges() {
        let registry = registry();
        let events = EventDispatcher::new();
        registry.attach(&events);

        // First load observed: 2 files
        events.emit(&buffer_changed(2));
        registry.add("Gain", 0, 44100, 44100).unwrap();

        // Patch-style event with the same count: registry untouched
        events.emit(&buffer_changed(2));
        assert_eq!(registry.len(), 1);

        // Structural change: everything purged
        events.emit(&buffer_changed(3));
        assert_eq!(registry.len(), 0);
    }
}
