//! Callback fan-out with RAII disconnection.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

struct Slot<T> {
    id: u64,
    active: AtomicBool,
    callback: Box<dyn Fn(&T) + Send + Sync>,
}

type Slots<T> = Mutex<Vec<Arc<Slot<T>>>>;

/// A list of callbacks invoked synchronously, in connection order, on the
/// thread that calls [`Signal::emit`].
///
/// The slot list is snapshotted before delivery, so callbacks may connect,
/// disconnect or emit again without deadlocking. A subscriber disconnected
/// mid-delivery is not called for the rest of that delivery.
pub struct Signal<T> {
    slots: Arc<Slots<T>>,
    next_id: AtomicU64,
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Signal<T> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback. It stays connected until the returned
    /// [`Subscription`] is dropped or unsubscribed.
    pub fn connect<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(Slot {
            id,
            active: AtomicBool::new(true),
            callback: Box::new(callback),
        });
        self.slots.lock().push(Arc::clone(&slot));

        let slots: Weak<Slots<T>> = Arc::downgrade(&self.slots);
        Subscription::new(move || {
            slot.active.store(false, Ordering::Release);
            if let Some(slots) = slots.upgrade() {
                slots.lock().retain(|s| s.id != id);
            }
        })
    }

    pub fn emit(&self, value: &T) {
        self.emit_while(value, || true);
    }

    /// Deliver `value`, checking `proceed` before each callback and stopping
    /// at the first `false`.
    pub fn emit_while(&self, value: &T, proceed: impl Fn() -> bool) {
        let snapshot: Vec<Arc<Slot<T>>> = self.slots.lock().clone();
        for slot in snapshot {
            if !proceed() {
                break;
            }
            if slot.active.load(Ordering::Acquire) {
                (slot.callback)(value);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.slots.lock().len()
    }
}

/// Connection handle returned by [`Signal::connect`]. Disconnects on drop.
#[must_use = "dropping a Subscription disconnects its callback"]
pub struct Subscription {
    disconnect: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    fn new(disconnect: impl FnOnce() + Send + 'static) -> Self {
        Self {
            disconnect: Some(Box::new(disconnect)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }

    /// Keep the callback connected for the lifetime of the signal.
    pub fn detach(mut self) {
        self.disconnect = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("connected", &self.disconnect.is_some())
            .finish()
    }
}
