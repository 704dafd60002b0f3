//! Tools: parameter state plus the work they start.

mod arithmetic;

pub use arithmetic::{compute, ArithmeticFilter, FilterOutput, Operation};

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::state::{StateEngine, StateHandle, StateHandler, StateSet};

pub type ToolHandle = Arc<dyn Tool>;

pub trait Tool: StateHandler + Any {
    /// Registered type name, e.g. `ArithmeticFilter`.
    fn tool_type(&self) -> &'static str;

    fn tool_id(&self) -> &str {
        self.handler_id()
    }

    fn activate(&self) {}

    fn deactivate(&self) {}

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

type ToolFactory = fn(&str) -> ToolHandle;

const TOOL_TYPES: &[(&str, ToolFactory)] = &[(ArithmeticFilter::TOOL_TYPE, open_arithmetic_filter)];

fn open_arithmetic_filter(tool_id: &str) -> ToolHandle {
    Arc::new(ArithmeticFilter::new(tool_id))
}

/// Open tools, the active one, and the factory table for tool types.
pub struct ToolManager {
    states: StateSet,
    pub active_tool: StateHandle<Option<String>>,
    pub tool_ids: StateHandle<Vec<String>>,
    tools: RwLock<BTreeMap<String, ToolHandle>>,
    counter: AtomicU32,
    engine: Arc<StateEngine>,
}

impl ToolManager {
    pub const HANDLER_ID: &'static str = "tool_manager";

    pub fn new(engine: Arc<StateEngine>) -> Self {
        let mut states = StateSet::new(Self::HANDLER_ID);
        let active_tool = states.add_read_only_state("active_tool", None);
        let tool_ids = states.add_read_only_state("tools", Vec::new());
        Self {
            states,
            active_tool,
            tool_ids,
            tools: RwLock::new(BTreeMap::new()),
            counter: AtomicU32::new(0),
            engine,
        }
    }

    pub fn tool_types() -> impl Iterator<Item = &'static str> {
        TOOL_TYPES.iter().map(|(name, _)| *name)
    }

    /// Case-insensitive lookup of a registered tool type name.
    pub fn resolve_tool_type(tool_type: &str) -> Option<&'static str> {
        Self::tool_types().find(|t| t.eq_ignore_ascii_case(tool_type.trim()))
    }

    /// Create a tool of `tool_type`, register its states and make it
    /// active. The id is the lowercased type name plus a counter.
    pub fn open_tool(&self, tool_type: &str) -> Result<ToolHandle, String> {
        let (name, factory) = TOOL_TYPES
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(tool_type.trim()))
            .ok_or_else(|| format!("unknown tool type '{}'", tool_type))?;

        let _guard = self.states.lock();
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let tool = factory(&format!("{}_{}", name.to_lowercase(), n));
        self.engine.register_handler(tool.as_ref());
        self.tools.write().insert(tool.tool_id().to_string(), Arc::clone(&tool));
        self.tool_ids.update(|ids| ids.push(tool.tool_id().to_string()));
        log::info!(target: "state", "opened tool {}", tool.tool_id());
        self.activate_tool(tool.tool_id());
        Ok(tool)
    }

    pub fn close_tool(&self, tool_id: &str) -> Option<ToolHandle> {
        let _guard = self.states.lock();
        let tool = self.tools.write().remove(tool_id)?;
        if self.active_tool.get().as_deref() == Some(tool_id) {
            tool.deactivate();
            self.active_tool.set(None);
        }
        self.engine.unregister_handler(tool_id);
        self.tool_ids.update(|ids| ids.retain(|id| id != tool_id));
        Some(tool)
    }

    /// Returns false if `tool_id` is unknown or already active.
    pub fn activate_tool(&self, tool_id: &str) -> bool {
        let _guard = self.states.lock();
        let Some(tool) = self.get_tool(tool_id) else {
            return false;
        };
        let previous = self.active_tool.get();
        if previous.as_deref() == Some(tool_id) {
            return false;
        }
        if let Some(old) = previous.and_then(|id| self.get_tool(&id)) {
            old.deactivate();
        }
        tool.activate();
        self.active_tool.set(Some(tool_id.to_string()))
    }

    pub fn get_tool(&self, tool_id: &str) -> Option<ToolHandle> {
        self.tools.read().get(tool_id).cloned()
    }

    /// Look up a tool and downcast it to its concrete type.
    pub fn get_tool_as<T: Tool + Send + Sync>(&self, tool_id: &str) -> Option<Arc<T>> {
        self.get_tool(tool_id)?.into_any().downcast::<T>().ok()
    }
}

impl StateHandler for ToolManager {
    fn state_set(&self) -> &StateSet {
        &self.states
    }
}

impl std::fmt::Debug for ToolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolManager")
            .field("tools", &self.tool_ids.get())
            .field("active", &self.active_tool.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_registers_and_activates() {
        let engine = Arc::new(StateEngine::new());
        let tools = ToolManager::new(Arc::clone(&engine));

        let first = tools.open_tool("arithmeticfilter").unwrap();
        assert_eq!(first.tool_id(), "arithmeticfilter_1");
        assert_eq!(tools.active_tool.get().as_deref(), Some("arithmeticfilter_1"));
        assert!(engine.is_state("arithmeticfilter_1::replace"));

        let second = tools.open_tool("ArithmeticFilter").unwrap();
        assert_eq!(tools.active_tool.get().as_deref(), Some(second.tool_id()));
        assert!(tools.get_tool_as::<ArithmeticFilter>("arithmeticfilter_1").is_some());

        assert!(tools.open_tool("Paintbrush").is_err());

        tools.close_tool("arithmeticfilter_2").unwrap();
        assert_eq!(tools.active_tool.get(), None);
        assert_eq!(tools.tool_ids.get(), vec!["arithmeticfilter_1".to_string()]);
        assert!(!engine.is_state("arithmeticfilter_2::replace"));
    }
}
