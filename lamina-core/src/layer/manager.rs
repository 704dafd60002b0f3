use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use lamina_types::LayerId;
use parking_lot::RwLock;

use super::LayerHandle;
use crate::state::{StateEngine, StateHandle, StateHandler, StateSet};

/// Owns every layer and tracks which one is active.
///
/// Lookups are safe from any thread. Insertion, removal and activation are
/// state mutations and belong in action `run`s on the dispatcher thread.
pub struct LayerManager {
    states: StateSet,
    /// Id of the active layer, `None` when there are no layers.
    pub active_layer: StateHandle<Option<LayerId>>,
    /// Ids of all layers, bottom first.
    pub layer_ids: StateHandle<Vec<LayerId>>,
    layers: RwLock<Vec<LayerHandle>>,
    next_id: AtomicU32,
    default_dims: [usize; 3],
    engine: Arc<StateEngine>,
}

impl LayerManager {
    pub const HANDLER_ID: &'static str = "layer_manager";

    pub fn new(engine: Arc<StateEngine>, default_dims: [usize; 3]) -> Self {
        let mut states = StateSet::new(Self::HANDLER_ID);
        let active_layer = states.add_read_only_state("active_layer", None);
        let layer_ids = states.add_read_only_state("layers", Vec::new());
        Self {
            states,
            active_layer,
            layer_ids,
            layers: RwLock::new(Vec::new()),
            next_id: AtomicU32::new(1),
            default_dims,
            engine,
        }
    }

    pub fn default_dims(&self) -> [usize; 3] {
        self.default_dims
    }

    /// Reserve an id for a layer about to be created. Ids are never reused.
    pub fn allocate_id(&self) -> LayerId {
        LayerId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get_layer_by_id(&self, id: LayerId) -> Option<LayerHandle> {
        self.layers.read().iter().find(|l| l.id() == id).cloned()
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.layers.read().iter().any(|l| l.id() == id)
    }

    pub fn layers(&self) -> Vec<LayerHandle> {
        self.layers.read().clone()
    }

    pub fn len(&self) -> usize {
        self.layers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.read().is_empty()
    }

    pub fn active(&self) -> Option<LayerHandle> {
        self.active_layer.get().and_then(|id| self.get_layer_by_id(id))
    }

    /// Add `layer` on top and register its states. Does not activate it.
    pub fn insert_layer(&self, layer: LayerHandle) {
        let _guard = self.states.lock();
        // Ids handed out by allocate_id() are unique; a clash means a caller
        // built its own id.
        if self.contains(layer.id()) {
            log::warn!(target: "state", "{} already present; not inserted", layer.id());
            return;
        }
        self.engine.register_handler(layer.as_ref());
        self.layers.write().push(Arc::clone(&layer));
        self.layer_ids.update(|ids| ids.push(layer.id()));
        log::info!(target: "state", "inserted {} '{}'", layer.id(), layer.name.get());
    }

    /// Remove a layer. If it was active, the topmost remaining layer becomes
    /// active.
    pub fn remove_layer(&self, id: LayerId) -> Option<LayerHandle> {
        let _guard = self.states.lock();
        let removed = {
            let mut layers = self.layers.write();
            let index = layers.iter().position(|l| l.id() == id)?;
            layers.remove(index)
        };
        self.engine.unregister_handler(removed.handler_id());
        self.layer_ids.update(|ids| ids.retain(|l| *l != id));
        if self.active_layer.get() == Some(id) {
            let next = self.layers.read().last().map(|l| l.id());
            self.active_layer.set(next);
        }
        log::info!(target: "state", "removed {}", id);
        Some(removed)
    }

    /// Returns false when `layer` was already active.
    pub fn set_active_layer(&self, layer: &LayerHandle) -> bool {
        let _guard = self.states.lock();
        self.active_layer.set(Some(layer.id()))
    }
}

impl StateHandler for LayerManager {
    fn state_set(&self) -> &StateSet {
        &self.states
    }
}

impl std::fmt::Debug for LayerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerManager")
            .field("layers", &self.layer_ids.get())
            .field("active", &self.active_layer.get())
            .finish()
    }
}
