use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;

use super::dispatch_loop::DispatchLoop;
use super::{attempt, Attempt, DispatchMsg, Pending, Shared};
use crate::action::{ActionContext, ActionHandle, LogContext};
use crate::config::Config;

/// Cloneable, `Send` entry point for posting actions from any thread.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: Sender<DispatchMsg>,
    shared: Arc<Shared>,
}

impl DispatcherHandle {
    /// Queue `action` for the owning thread. Outcomes go to the log.
    pub fn post(&self, action: ActionHandle) {
        let label = action.type_name();
        self.post_with_context(action, Box::new(LogContext::new(label)));
    }

    /// Queue `action`; its outcome is reported to `context`. Never blocks.
    pub fn post_with_context(&self, action: ActionHandle, context: Box<dyn ActionContext>) {
        let pending = Pending {
            seq: self.shared.next_seq.fetch_add(1, Ordering::Relaxed),
            origin: thread::current().id(),
            action,
            context,
        };
        if let Err(e) = self.tx.send(DispatchMsg::Post(pending)) {
            let DispatchMsg::Post(pending) = e.into_inner() else {
                return;
            };
            log::warn!(
                target: "dispatch",
                "dispatcher shut down; dropping {}",
                pending.action.type_name()
            );
            pending.context.report_error("action dispatcher is shut down");
        }
    }

    /// Validate and run `action` right now. Must be called on the owning
    /// thread; anywhere else is a programming error and panics. A blocked
    /// action is reported through `context` and not retried.
    pub fn execute_now(&self, action: &mut ActionHandle, context: &dyn ActionContext) -> bool {
        assert!(
            self.is_owning_thread(),
            "execute_now({}) called off the dispatcher's owning thread",
            action.type_name()
        );
        match attempt(action, context) {
            Attempt::Done(ok) => ok,
            Attempt::Blocked(lock) => {
                context.report_need_resource(&lock);
                false
            }
        }
    }

    /// Run `f` on the owning thread, after everything queued before it.
    pub fn run_on_owner(&self, f: impl FnOnce() + Send + 'static) {
        if self.tx.send(DispatchMsg::Call(Box::new(f))).is_err() {
            log::warn!(target: "dispatch", "dispatcher shut down; dropping call");
        }
    }

    /// Block until every message queued before this call has been handled.
    /// Parked actions do not count. Returns false if the dispatcher is gone.
    /// Panics on the owning thread, where it would deadlock.
    pub fn sync(&self) -> bool {
        assert!(
            !self.is_owning_thread(),
            "sync() called on the dispatcher's owning thread"
        );
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        self.run_on_owner(move || {
            let _ = done_tx.send(());
        });
        done_rx.recv().is_ok()
    }

    pub fn is_owning_thread(&self) -> bool {
        self.shared.owner.get() == Some(&thread::current().id())
    }

    /// Ask the owning loop to stop once it reaches this point in the queue.
    /// Parked actions and later posts are then reported as errors. The
    /// spawned dispatcher's thread is joined by
    /// [`ActionDispatcher::shutdown`]; an attached loop sees it as
    /// [`DispatchLoop::process_pending`] returning false.
    pub fn request_shutdown(&self) {
        if self.tx.send(DispatchMsg::Shutdown).is_err() {
            log::debug!(target: "dispatch", "shutdown requested after the dispatcher stopped");
        }
    }
}

impl std::fmt::Debug for DispatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherHandle")
            .field("owner", &self.shared.owner.get())
            .finish()
    }
}

/// Owns the dispatcher's thread. Dropping it shuts the thread down.
pub struct ActionDispatcher {
    handle: DispatcherHandle,
    join_handle: Option<JoinHandle<()>>,
}

impl ActionDispatcher {
    /// Start a dedicated owning thread.
    pub fn spawn(config: &Config) -> std::io::Result<Self> {
        let (handle, dispatch_loop) = Self::attach(config);
        let join_handle = thread::Builder::new()
            .name(config.dispatcher_thread_name())
            .spawn(move || dispatch_loop.run())?;
        log::info!(target: "dispatch", "dispatcher thread '{}' started", config.dispatcher_thread_name());
        Ok(Self {
            handle,
            join_handle: Some(join_handle),
        })
    }

    /// Create the queue without a thread. The thread that first drives the
    /// returned loop becomes the owning thread.
    pub fn attach(config: &Config) -> (DispatcherHandle, DispatchLoop) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared {
            owner: OnceLock::new(),
            next_seq: AtomicU64::new(0),
            log_actions: config.log_actions(),
            stall_warning: config.stall_warning(),
        });
        let handle = DispatcherHandle {
            tx: tx.clone(),
            shared: Arc::clone(&shared),
        };
        (handle, DispatchLoop::new(rx, tx, shared))
    }

    pub fn handle(&self) -> DispatcherHandle {
        self.handle.clone()
    }

    /// Stop the owning thread after it has handled everything queued so
    /// far. Still-parked actions are reported as errors.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(join_handle) = self.join_handle.take() else {
            return;
        };
        self.handle.request_shutdown();
        if join_handle.join().is_err() {
            log::error!(target: "dispatch", "dispatcher thread panicked");
        }
    }
}

impl std::ops::Deref for ActionDispatcher {
    type Target = DispatcherHandle;

    fn deref(&self) -> &DispatcherHandle {
        &self.handle
    }
}

impl Drop for ActionDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
