//! Layers: named data volumes, each with its own states and resource lock.

pub mod io;
mod manager;

pub use manager::LayerManager;

use std::sync::Arc;

use lamina_types::{LayerData, LayerId, LayerKind};
use parking_lot::RwLock;

use crate::resource::{ResourceLock, ResourceLockHandle};
use crate::state::{StateHandle, StateHandler, StateSet};

pub type LayerHandle = Arc<Layer>;

pub struct Layer {
    id: LayerId,
    kind: LayerKind,
    states: StateSet,
    pub name: StateHandle<String>,
    pub visible: StateHandle<bool>,
    pub opacity: StateHandle<f64>,
    /// Bumped each time the volume is replaced. Read-only on the text path.
    pub generation: StateHandle<u64>,
    lock: ResourceLockHandle,
    data: RwLock<Option<Arc<LayerData>>>,
}

impl Layer {
    /// The state handler id and the lock are both named after `id`.
    pub fn new(id: LayerId, name: &str, kind: LayerKind, data: Option<LayerData>) -> LayerHandle {
        let mut states = StateSet::new(id.to_string());
        let name = states.add_state("name", name.to_string());
        let visible = states.add_state("visible", true);
        let opacity = states.add_state("opacity", 1.0);
        let generation = states.add_read_only_state("generation", 0);
        Arc::new(Self {
            id,
            kind,
            states,
            name,
            visible,
            opacity,
            generation,
            lock: ResourceLock::new(id.to_string()),
            data: RwLock::new(data.map(Arc::new)),
        })
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn resource_lock(&self) -> &ResourceLockHandle {
        &self.lock
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Snapshot of the current volume. Readers keep their snapshot even if
    /// the layer's data is replaced afterwards.
    pub fn data(&self) -> Option<Arc<LayerData>> {
        self.data.read().clone()
    }

    pub fn dims(&self) -> Option<[usize; 3]> {
        self.data.read().as_ref().map(|d| d.dims)
    }

    /// Replace the volume and bump `generation`, which is how observers
    /// learn of it. Called from action `run`s only.
    pub(crate) fn set_data(&self, data: LayerData) {
        let _transition = self.states.lock();
        *self.data.write() = Some(Arc::new(data));
        self.generation.update(|g| *g += 1);
        log::debug!(target: "state", "{}: data replaced (generation {})", self.id, self.generation.get());
    }
}

impl StateHandler for Layer {
    fn state_set(&self) -> &StateSet {
        &self.states
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name.get())
            .field("locked", &self.is_locked())
            .finish()
    }
}
