use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::handler::StateHandler;
use super::signal::Subscription;
use super::variable::StateBase;
use crate::error::StateError;

type TextObserver = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Registry of every live state, keyed by its full `handler::name` id.
///
/// Constructed once at startup and passed by reference; handlers register
/// their states when they come alive and unregister when they go away.
/// Observers attached with [`watch`](Self::watch) also see states registered
/// after they attached.
#[derive(Default)]
pub struct StateEngine {
    states: RwLock<BTreeMap<String, Arc<dyn StateBase>>>,
    watchers: Mutex<BTreeMap<usize, Watcher>>,
    next_watcher: AtomicUsize,
}

struct Watcher {
    observer: TextObserver,
    subscriptions: Vec<(String, Subscription)>,
}

impl std::fmt::Debug for StateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateEngine")
            .field("states", &self.states.read().len())
            .field("watchers", &self.watchers.lock().len())
            .finish()
    }
}

impl StateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_handler<H: StateHandler + ?Sized>(&self, handler: &H) {
        let mut added = Vec::new();
        {
            let mut index = self.states.write();
            handler.state_set().states().for_each(|state| {
                if index.insert(state.id().to_string(), Arc::clone(state)).is_some() {
                    log::warn!(target: "state", "state '{}' registered twice; replacing", state.id());
                }
                added.push(Arc::clone(state));
            });
        }
        log::debug!(
            target: "state",
            "registered handler '{}' ({} states)",
            handler.handler_id(),
            added.len()
        );

        let mut watchers = self.watchers.lock();
        for watcher in watchers.values_mut() {
            for state in &added {
                let observer = Arc::clone(&watcher.observer);
                let sub = state.subscribe_text(Box::new(move |id, v| observer(id, v)));
                watcher.subscriptions.push((state.id().to_string(), sub));
            }
        }
    }

    pub fn unregister_handler(&self, handler_id: &str) {
        let prefix = format!("{}::", handler_id);
        let removed = {
            let mut states = self.states.write();
            let before = states.len();
            states.retain(|id, _| !id.starts_with(&prefix));
            before - states.len()
        };
        for watcher in self.watchers.lock().values_mut() {
            watcher.subscriptions.retain(|(id, _)| !id.starts_with(&prefix));
        }
        log::debug!(target: "state", "unregistered handler '{}' ({} states)", handler_id, removed);
    }

    pub fn get_state(&self, id: &str) -> Option<Arc<dyn StateBase>> {
        self.states.read().get(id).cloned()
    }

    pub fn is_state(&self, id: &str) -> bool {
        self.states.read().contains_key(id)
    }

    pub fn state_ids(&self) -> Vec<String> {
        self.states.read().keys().cloned().collect()
    }

    pub fn get_string(&self, id: &str) -> Result<String, StateError> {
        self.get_state(id)
            .map(|s| s.export_to_string())
            .ok_or_else(|| StateError::UnknownState(id.to_string()))
    }

    /// Import `text` into the state `id`. Returns whether the value changed.
    pub fn set_from_string(&self, id: &str, text: &str) -> Result<bool, StateError> {
        let state = self
            .get_state(id)
            .ok_or_else(|| StateError::UnknownState(id.to_string()))?;
        state.import_from_string(text)
    }

    /// Every registered state as `(id, json)`, sorted by id.
    pub fn export_all(&self) -> Vec<(String, String)> {
        self.states
            .read()
            .iter()
            .map(|(id, s)| (id.clone(), s.export_to_string()))
            .collect()
    }

    /// Observe every change of every registered state, current and future.
    /// Returns a watcher id usable with [`unwatch`](Self::unwatch).
    pub fn watch(&self, observer: impl Fn(&str, &str) + Send + Sync + 'static) -> usize {
        let observer: TextObserver = Arc::new(observer);
        let subscriptions = self
            .states
            .read()
            .values()
            .map(|state| {
                let observer = Arc::clone(&observer);
                let sub = state.subscribe_text(Box::new(move |id, v| observer(id, v)));
                (state.id().to_string(), sub)
            })
            .collect();
        let id = self.next_watcher.fetch_add(1, Ordering::Relaxed);
        self.watchers.lock().insert(id, Watcher { observer, subscriptions });
        id
    }

    /// Disconnect the watcher returned by [`watch`](Self::watch). It sees no
    /// further changes, including on states registered later.
    pub fn unwatch(&self, id: usize) {
        // Dropped outside the lock; a disconnect may run on this thread.
        let removed = self.watchers.lock().remove(&id);
        if removed.is_none() {
            log::warn!(target: "state", "unwatch of unknown watcher {}", id);
        }
    }
}
