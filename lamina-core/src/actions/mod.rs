//! The concrete actions. Each one can be built from live handles with
//! `create` and posted with `dispatch`; the scriptable ones also register a
//! text factory.

mod interface;
mod layer;
mod layer_io;
mod state;
mod tool;

pub use interface::{CloseWindow, ShowWindow};
pub use layer::{ActivateLayer, DeleteLayer, Dims, NewLayer};
pub use layer_io::{ExportLayer, ImportLayer};
pub use state::Set;
pub use tool::{CommitFilterResult, OpenTool, RunArithmeticFilter};

use lamina_types::LayerId;

use crate::action::{ActionRegistry, Validation};
use crate::layer::{LayerHandle, LayerManager};

/// Register every built-in action.
pub fn register_builtin(registry: &mut ActionRegistry) {
    registry.register::<ActivateLayer>();
    registry.register::<NewLayer>();
    registry.register::<DeleteLayer>();
    registry.register::<Set>();
    registry.register::<ShowWindow>();
    registry.register::<CloseWindow>();
    registry.register::<OpenTool>();
    registry.register::<RunArithmeticFilter>();

    registry.register_programmatic(ImportLayer::TYPE_NAME);
    registry.register_programmatic(ExportLayer::TYPE_NAME);
    registry.register_programmatic(CommitFilterResult::TYPE_NAME);
}

/// Resolve `id`, reusing `cache` while the cached layer is still present.
fn resolve_layer(manager: &LayerManager, id: LayerId, cache: &mut Option<LayerHandle>) -> Option<LayerHandle> {
    if let Some(layer) = cache.as_ref().filter(|l| l.id() == id && manager.contains(id)) {
        return Some(layer.clone());
    }
    *cache = manager.get_layer_by_id(id);
    cache.clone()
}

fn invalid_layer(id: LayerId) -> Validation {
    Validation::Invalid(format!("LayerID: '{}' is invalid", id))
}

/// `Blocked` on the first locked layer, else `Ready`.
fn check_unlocked<'a>(layers: impl IntoIterator<Item = &'a LayerHandle>) -> Validation {
    match layers.into_iter().find(|l| l.is_locked()) {
        Some(layer) => Validation::Blocked(layer.resource_lock().clone()),
        None => Validation::Ready,
    }
}
