//! Advisory per-resource locks.
//!
//! A [`ResourceLock`] marks a resource (usually a layer) as busy. Actions
//! check [`is_locked`](ResourceLock::is_locked) during validation and report
//! themselves blocked instead of touching a busy resource; the dispatcher then
//! parks them until the lock's unlock event. Nothing stops code from ignoring
//! the lock, so every mutator must check it.

use std::sync::Arc;

use parking_lot::Mutex;

pub type ResourceLockHandle = Arc<ResourceLock>;

type UnlockWaiter = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct LockState {
    holder: Option<String>,
    waiters: Vec<UnlockWaiter>,
}

pub struct ResourceLock {
    name: String,
    state: Mutex<LockState>,
}

impl ResourceLock {
    pub fn new(name: impl Into<String>) -> ResourceLockHandle {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(LockState::default()),
        })
    }

    /// Name of the resource this lock protects.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take the lock for `holder` if nobody holds it. Never blocks.
    pub fn try_lock(&self, holder: &str) -> bool {
        let mut state = self.state.lock();
        if state.holder.is_some() {
            return false;
        }
        state.holder = Some(holder.to_string());
        log::debug!(target: "resource", "{} locked by {}", self.name, holder);
        true
    }

    /// Release the lock if `holder` owns it, then fire the unlock waiters in
    /// registration order. Returns false (and changes nothing) otherwise.
    pub fn unlock(&self, holder: &str) -> bool {
        let waiters = {
            let mut state = self.state.lock();
            match state.holder.as_deref() {
                Some(current) if current == holder => {}
                Some(current) => {
                    log::warn!(
                        target: "resource",
                        "{}: unlock by '{}' refused, held by '{}'",
                        self.name,
                        holder,
                        current
                    );
                    return false;
                }
                None => {
                    log::warn!(target: "resource", "{}: unlock by '{}' while unlocked", self.name, holder);
                    return false;
                }
            }
            state.holder = None;
            std::mem::take(&mut state.waiters)
        };
        log::debug!(target: "resource", "{} unlocked by {} ({} waiting)", self.name, holder, waiters.len());
        for waiter in waiters {
            waiter();
        }
        true
    }

    /// Whether anybody holds the lock. Does not acquire it; the answer may be
    /// stale by the time the caller acts on it.
    pub fn is_locked(&self) -> bool {
        self.state.lock().holder.is_some()
    }

    pub fn holder(&self) -> Option<String> {
        self.state.lock().holder.clone()
    }

    /// Run `waiter` once the lock is next released. Runs it immediately, on
    /// the calling thread, if the lock is free right now.
    pub fn notify_on_unlock(&self, waiter: impl FnOnce() + Send + 'static) {
        {
            let mut state = self.state.lock();
            if state.holder.is_some() {
                state.waiters.push(Box::new(waiter));
                return;
            }
        }
        waiter();
    }

    /// Take the lock and return a guard that releases it on drop.
    pub fn try_acquire(self: &Arc<Self>, holder: &str) -> Option<ResourceGuard> {
        if self.try_lock(holder) {
            Some(ResourceGuard {
                lock: Arc::clone(self),
                holder: holder.to_string(),
            })
        } else {
            None
        }
    }
}

impl std::fmt::Debug for ResourceLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceLock")
            .field("name", &self.name)
            .field("holder", &self.holder())
            .finish()
    }
}

/// Exclusive hold on a [`ResourceLock`]. Dropping it unlocks the resource.
///
/// Guards are `Send`, so a background job can take one, do its work, and
/// hand it to the action that commits the result.
#[must_use = "dropping the guard releases the lock"]
pub struct ResourceGuard {
    lock: ResourceLockHandle,
    holder: String,
}

impl ResourceGuard {
    pub fn lock(&self) -> &ResourceLockHandle {
        &self.lock
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        self.lock.unlock(&self.holder);
    }
}

impl std::fmt::Debug for ResourceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("resource", &self.lock.name())
            .field("holder", &self.holder)
            .finish()
    }
}
