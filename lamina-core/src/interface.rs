use std::collections::{BTreeMap, BTreeSet};

use parking_lot::Mutex;

use crate::state::{Signal, StateHandle, StateHandler, StateSet};

/// Window and dock visibility, plus the registry of windows the front end
/// has made available.
///
/// The registry is a plain set behind one mutex so that window code on any
/// thread can check an id before it directs a signal at it.
pub struct InterfaceManager {
    states: StateSet,
    pub full_screen: StateHandle<bool>,
    visibility: BTreeMap<String, StateHandle<bool>>,
    windowids: Mutex<BTreeSet<String>>,
    /// Emitted with the window id when a window should be shown.
    pub show_window: Signal<String>,
    /// Emitted with the window id when a window should be closed.
    pub close_window: Signal<String>,
}

impl InterfaceManager {
    pub const HANDLER_ID: &'static str = "interface";

    /// Creates a `<window>_visibility` state for every id in `windows` and
    /// registers the ids.
    pub fn new(windows: &[String]) -> Self {
        let mut states = StateSet::new(Self::HANDLER_ID);
        let full_screen = states.add_state("full_screen", false);
        let visibility = windows
            .iter()
            .map(|w| (w.clone(), states.add_state(&format!("{}_visibility", w), false)))
            .collect();
        Self {
            states,
            full_screen,
            visibility,
            windowids: Mutex::new(windows.iter().cloned().collect()),
            show_window: Signal::new(),
            close_window: Signal::new(),
        }
    }

    /// Mark `windowid` as available. Thread-safe.
    pub fn add_windowid(&self, windowid: &str) {
        if self.windowids.lock().insert(windowid.to_string()) {
            log::debug!(target: "state", "window '{}' registered", windowid);
        }
    }

    /// Thread-safe.
    pub fn is_windowid(&self, windowid: &str) -> bool {
        self.windowids.lock().contains(windowid)
    }

    pub fn windowids(&self) -> Vec<String> {
        self.windowids.lock().iter().cloned().collect()
    }

    /// Visibility state of a configured window. Windows registered later
    /// through [`add_windowid`](Self::add_windowid) have none.
    pub fn visibility(&self, windowid: &str) -> Option<&StateHandle<bool>> {
        self.visibility.get(windowid)
    }
}

impl StateHandler for InterfaceManager {
    fn state_set(&self) -> &StateSet {
        &self.states
    }
}

impl std::fmt::Debug for InterfaceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceManager")
            .field("windowids", &self.windowids.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_configured_windows_get_states_and_ids() {
        let interface = InterfaceManager::new(&["history".to_string(), "controller".to_string()]);
        assert!(interface.is_windowid("history"));
        assert!(!interface.is_windowid("viewer1"));
        assert_eq!(
            interface.visibility("controller").map(|s| s.id().to_string()),
            Some("interface::controller_visibility".to_string())
        );
        assert_eq!(interface.state_set().len(), 3);
    }

    #[test]
    fn test_registry_survives_concurrent_inserts() {
        let interface = Arc::new(InterfaceManager::new(&[]));
        interface.add_windowid("viewer1");
        let workers: Vec<_> = (0..8)
            .map(|t| {
                let interface = Arc::clone(&interface);
                thread::spawn(move || {
                    for i in 0..200 {
                        interface.add_windowid(&format!("w{}_{}", t, i));
                        assert!(interface.is_windowid("viewer1"));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(interface.windowids().len(), 8 * 200 + 1);
    }
}
