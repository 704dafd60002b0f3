use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use super::variable::{StateBase, StateHandle, StateValue, StateVariable};
use crate::error::StateError;

/// The ordered set of state variables owned by one handler.
///
/// States are added while the handler is being constructed and live as long
/// as it does. The set also carries a reentrant lock that owners take around
/// transitions touching several variables, so that bulk readers never see a
/// half-applied change.
pub struct StateSet {
    handler_id: String,
    states: Vec<Arc<dyn StateBase>>,
    lock: ReentrantMutex<()>,
}

impl StateSet {
    pub fn new(handler_id: impl Into<String>) -> Self {
        Self {
            handler_id: handler_id.into(),
            states: Vec::new(),
            lock: ReentrantMutex::new(()),
        }
    }

    pub fn handler_id(&self) -> &str {
        &self.handler_id
    }

    /// Declare a new state. Panics if `name` is already taken in this set.
    pub fn add_state<T: StateValue>(&mut self, name: &str, default: T) -> StateHandle<T> {
        assert!(
            self.get_state(name).is_none(),
            "state '{}' declared twice in '{}'",
            name,
            self.handler_id
        );
        self.push(StateVariable::new(&self.handler_id, name, default))
    }

    /// Declare a state only its owner may write; the text path refuses it.
    /// For states derived from other bookkeeping, like an active id.
    pub fn add_read_only_state<T: StateValue>(&mut self, name: &str, default: T) -> StateHandle<T> {
        assert!(
            self.get_state(name).is_none(),
            "state '{}' declared twice in '{}'",
            name,
            self.handler_id
        );
        self.push(StateVariable::new_read_only(&self.handler_id, name, default))
    }

    fn push<T: StateValue>(&mut self, state: StateVariable<T>) -> StateHandle<T> {
        let state = Arc::new(state);
        self.states.push(Arc::clone(&state) as Arc<dyn StateBase>);
        state
    }

    pub fn get_state(&self, name: &str) -> Option<&Arc<dyn StateBase>> {
        self.states.iter().find(|s| s.name() == name)
    }

    pub fn for_each_state(&self, mut f: impl FnMut(&dyn StateBase)) {
        for state in &self.states {
            f(state.as_ref());
        }
    }

    pub fn states(&self) -> impl Iterator<Item = &Arc<dyn StateBase>> {
        self.states.iter()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Take the compound-transition lock.
    pub fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.lock.lock()
    }

    /// Snapshot every state as `(name, json)` in declaration order.
    pub fn export_states(&self) -> Vec<(String, String)> {
        let _guard = self.lock();
        self.states
            .iter()
            .map(|s| (s.name().to_string(), s.export_to_string()))
            .collect()
    }

    /// Apply a snapshot produced by [`export_states`](Self::export_states).
    ///
    /// Every entry is parsed before any is stored, so a bad entry leaves all
    /// states untouched. Names this set does not own, and read-only states, are
    /// skipped. Returns the
    /// number of states whose value changed.
    pub fn import_states(&self, entries: &[(String, String)]) -> Result<usize, StateError> {
        let _guard = self.lock();
        let mut known = Vec::with_capacity(entries.len());
        for (name, text) in entries {
            match self.get_state(name) {
                Some(state) if state.is_read_only() => {
                    log::debug!(target: "state", "{}: skipping read-only state '{}'", self.handler_id, name)
                }
                Some(state) => {
                    state.check_import_string(text)?;
                    known.push((state, text));
                }
                None => log::warn!(
                    target: "state",
                    "{}: skipping unknown state '{}'",
                    self.handler_id,
                    name
                ),
            }
        }
        let mut changed = 0;
        for (state, text) in known {
            if state.import_from_string(text)? {
                changed += 1;
            }
        }
        Ok(changed)
    }
}

/// An object that owns a named [`StateSet`].
pub trait StateHandler: Send + Sync {
    fn state_set(&self) -> &StateSet;

    fn handler_id(&self) -> &str {
        self.state_set().handler_id()
    }

    fn for_each_state(&self, f: &mut dyn FnMut(&dyn StateBase)) {
        self.state_set().for_each_state(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (StateSet, StateHandle<bool>, StateHandle<String>) {
        let mut set = StateSet::new("tool");
        let replace = set.add_state("replace", false);
        let expr = set.add_state("expression", "A+B".to_string());
        (set, replace, expr)
    }

    #[test]
    fn test_states_keep_declaration_order() {
        let (set, _, _) = sample();
        let mut names = Vec::new();
        set.for_each_state(|s| names.push(s.id().to_string()));
        assert_eq!(names, vec!["tool::replace", "tool::expression"]);
    }

    #[test]
    #[should_panic(expected = "declared twice")]
    fn test_duplicate_names_are_rejected() {
        let mut set = StateSet::new("tool");
        let _a = set.add_state("replace", false);
        let _b = set.add_state("replace", true);
    }

    #[test]
    fn test_export_then_import_restores_values() {
        let (set, replace, expr) = sample();
        let snapshot = set.export_states();
        replace.set(true);
        expr.set("A*B".to_string());

        assert_eq!(set.import_states(&snapshot).unwrap(), 2);
        assert!(!replace.get());
        assert_eq!(expr.get(), "A+B");
    }

    #[test]
    fn test_bad_entry_leaves_everything_untouched() {
        let (set, replace, expr) = sample();
        let entries = vec![
            ("expression".to_string(), "\"A-B\"".to_string()),
            ("replace".to_string(), "maybe".to_string()),
            ("unknown".to_string(), "1".to_string()),
        ];
        assert!(set.import_states(&entries).is_err());
        assert!(!replace.get());
        assert_eq!(expr.get(), "A+B");
    }

    #[test]
    fn test_import_skips_read_only_states() {
        let mut set = StateSet::new("tool_manager");
        let active = set.add_read_only_state("active_tool", None::<String>);
        let visible = set.add_state("visible", false);
        let entries = vec![
            ("active_tool".to_string(), "\"arithmeticfilter_3\"".to_string()),
            ("visible".to_string(), "true".to_string()),
        ];
        assert_eq!(set.import_states(&entries).unwrap(), 1);
        assert_eq!(active.get(), None);
        assert!(visible.get());
    }

    #[test]
    fn test_compound_lock_is_reentrant() {
        let (set, replace, _) = sample();
        let _outer = set.lock();
        let snapshot = set.export_states();
        assert_eq!(snapshot.len(), 2);
        replace.set(true);
        assert_eq!(set.import_states(&snapshot).unwrap(), 1);
    }
}
