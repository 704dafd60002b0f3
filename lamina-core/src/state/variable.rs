use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::signal::{Signal, Subscription};
use crate::error::StateError;

/// Bound satisfied by every type that can live in a [`StateVariable`].
pub trait StateValue:
    Clone + PartialEq + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> StateValue for T where
    T: Clone + PartialEq + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

pub type StateHandle<T> = Arc<StateVariable<T>>;

/// A named, observable, thread-safe value.
///
/// Reads are allowed from any thread. Writes are expected from the action
/// dispatcher's owning thread; they are serialized regardless, and each
/// write's notification is delivered before the next write starts. A write
/// that leaves the value unchanged fires nothing.
///
/// A subscriber may write the variable again from inside its callback. The
/// nested write is delivered in full, and the outer delivery stops there, so
/// no subscriber is handed a value that has already been replaced.
///
/// States declared read-only refuse writes through the text path
/// ([`StateBase::import_from_string`]); their owner still sets them in code.
pub struct StateVariable<T> {
    name: String,
    id: String,
    value: RwLock<T>,
    // Held across store + notify. Reentrant so a subscriber may write back.
    write_lock: ReentrantMutex<()>,
    // Bumped by every stored write.
    generation: AtomicU64,
    read_only: bool,
    changed: Signal<T>,
}

impl<T: StateValue> StateVariable<T> {
    pub(crate) fn new(handler_id: &str, name: &str, value: T) -> Self {
        Self {
            name: name.to_string(),
            id: format!("{}::{}", handler_id, name),
            value: RwLock::new(value),
            write_lock: ReentrantMutex::new(()),
            generation: AtomicU64::new(0),
            read_only: false,
            changed: Signal::new(),
        }
    }

    pub(crate) fn new_read_only(handler_id: &str, name: &str, value: T) -> Self {
        Self {
            read_only: true,
            ..Self::new(handler_id, name, value)
        }
    }

    /// Name within the owning handler.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process-wide id, `handler::name`.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Borrow the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.read())
    }

    /// Store `value` and notify subscribers. Returns false, without
    /// notifying, when the value was already equal.
    pub fn set(&self, value: T) -> bool {
        let _write = self.write_lock.lock();
        {
            let mut current = self.value.write();
            if *current == value {
                return false;
            }
            *current = value.clone();
        }
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        log::trace!(target: "state", "{} = {:?}", self.id, value);
        self.changed
            .emit_while(&value, || self.generation.load(Ordering::Acquire) == generation);
        true
    }

    /// Whether the text path refuses to write this state.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Read-modify-write under the write lock.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let _write = self.write_lock.lock();
        let mut next = self.get();
        f(&mut next);
        self.set(next)
    }

    pub fn changed(&self) -> &Signal<T> {
        &self.changed
    }

    /// Shorthand for `changed().connect(callback)`.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.changed.connect(callback)
    }

    fn check_writable(&self) -> Result<(), StateError> {
        if self.read_only {
            Err(StateError::ReadOnly(self.id.clone()))
        } else {
            Ok(())
        }
    }

    fn decode(&self, text: &str) -> Result<T, StateError> {
        match serde_json::from_str::<T>(text) {
            Ok(value) => Ok(value),
            // Bare words are accepted for string-valued states.
            Err(source) => serde_json::from_value(serde_json::Value::String(text.to_string()))
                .map_err(|_| StateError::Parse {
                    state: self.id.clone(),
                    source,
                }),
        }
    }
}

/// Type-erased view of a state variable used for bulk and text-driven access.
pub trait StateBase: Send + Sync {
    fn name(&self) -> &str;
    fn id(&self) -> &str;
    /// Current value as JSON text.
    fn export_to_string(&self) -> String;
    /// Parse `text` and store it. Returns whether the value changed.
    /// Fails for read-only states.
    fn import_from_string(&self, text: &str) -> Result<bool, StateError>;
    /// Parse `text` without storing it. Fails for read-only states.
    fn check_import_string(&self, text: &str) -> Result<(), StateError>;
    fn is_read_only(&self) -> bool;
    /// Observe changes as `(id, json)` pairs.
    fn subscribe_text(&self, callback: Box<dyn Fn(&str, &str) + Send + Sync>) -> Subscription;
}

impl<T: StateValue> StateBase for StateVariable<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn export_to_string(&self) -> String {
        self.with(|v| serde_json::to_string(v)).unwrap_or_else(|e| {
            log::warn!(target: "state", "could not export {}: {}", self.id, e);
            String::new()
        })
    }

    fn import_from_string(&self, text: &str) -> Result<bool, StateError> {
        self.check_writable()?;
        let value = self.decode(text.trim())?;
        Ok(self.set(value))
    }

    fn check_import_string(&self, text: &str) -> Result<(), StateError> {
        self.check_writable()?;
        self.decode(text.trim()).map(|_| ())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn subscribe_text(&self, callback: Box<dyn Fn(&str, &str) + Send + Sync>) -> Subscription {
        let id = self.id.clone();
        self.changed.connect(move |value| {
            if let Ok(text) = serde_json::to_string(value) {
                callback(&id, &text);
            }
        })
    }
}
