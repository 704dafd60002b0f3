use std::sync::Arc;

use crate::config::Config;
use crate::dispatch::DispatcherHandle;
use crate::interface::InterfaceManager;
use crate::layer::LayerManager;
use crate::state::StateEngine;
use crate::tool::ToolManager;

/// Everything actions operate on. Built once at startup and cloned into
/// whatever needs it; clones share the same managers.
#[derive(Clone)]
pub struct AppState {
    pub states: Arc<StateEngine>,
    pub layers: Arc<LayerManager>,
    pub interface: Arc<InterfaceManager>,
    pub tools: Arc<ToolManager>,
    pub dispatcher: DispatcherHandle,
}

impl AppState {
    pub fn new(config: &Config, dispatcher: DispatcherHandle) -> Self {
        let states = Arc::new(StateEngine::new());
        let layers = Arc::new(LayerManager::new(Arc::clone(&states), config.default_layer_dims()));
        let interface = Arc::new(InterfaceManager::new(&config.windows()));
        let tools = Arc::new(ToolManager::new(Arc::clone(&states)));

        states.register_handler(layers.as_ref());
        states.register_handler(interface.as_ref());
        states.register_handler(tools.as_ref());
        log::info!(
            target: "state",
            "application state ready ({} states, {} windows)",
            states.state_ids().len(),
            interface.windowids().len()
        );

        Self {
            states,
            layers,
            interface,
            tools,
            dispatcher,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("layers", &self.layers.len())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
