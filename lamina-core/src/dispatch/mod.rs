//! Action dispatch: the single entry point for state mutation.
//!
//! Any thread may [`post`](DispatcherHandle::post) an action; posting is a
//! non-blocking enqueue onto a crossbeam channel. One owning thread drains
//! that channel in a [`DispatchLoop`] and runs each action's `validate` and
//! `run` back to back. Actions that report a locked resource are parked, not
//! failed, and re-validated when the resource's unlock event arrives.
//!
//! Ordering: actions posted from one thread run in posting order. While one
//! of them is parked, later actions from the same thread wait behind it;
//! actions from other threads keep flowing. Parked actions are woken oldest
//! first. There is no timeout: an action waiting on a resource that never
//! unlocks waits forever (a warning is logged once after the configured
//! stall interval).

mod dispatch_loop;
mod handle;

pub use dispatch_loop::DispatchLoop;
pub use handle::{ActionDispatcher, DispatcherHandle};

use std::sync::atomic::AtomicU64;
use std::sync::OnceLock;
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use crate::action::{ActionContext, ActionHandle, Validation};
use crate::resource::ResourceLockHandle;

pub(crate) enum DispatchMsg {
    Post(Pending),
    /// A resource some parked action waits on was unlocked.
    Wake,
    /// Run a closure on the owning thread.
    Call(Box<dyn FnOnce() + Send>),
    Shutdown,
}

pub(crate) struct Pending {
    pub seq: u64,
    pub origin: ThreadId,
    pub action: ActionHandle,
    pub context: Box<dyn ActionContext>,
}

/// State shared between the handles and the loop.
pub(crate) struct Shared {
    pub owner: OnceLock<ThreadId>,
    pub next_seq: AtomicU64,
    pub log_actions: bool,
    pub stall_warning: Option<Duration>,
}

pub(crate) enum Attempt {
    /// Finished, successfully or not; the context has been told.
    Done(bool),
    /// Validation wants this lock. Nothing has been reported yet.
    Blocked(ResourceLockHandle),
}

/// Validate then, if ready, run. Reports errors and success to `ctx`.
pub(crate) fn attempt(pending_action: &mut ActionHandle, ctx: &dyn ActionContext) -> Attempt {
    let name = pending_action.type_name();
    match pending_action.validate(ctx) {
        Validation::Ready => {}
        Validation::Invalid(message) => {
            log::debug!(target: "dispatch", "{} invalid: {}", name, message);
            ctx.report_error(&message);
            return Attempt::Done(false);
        }
        Validation::Blocked(lock) => return Attempt::Blocked(lock),
    }

    let started = Instant::now();
    match pending_action.run(ctx) {
        Ok(result) => {
            log::trace!(target: "dispatch", "{} ran in {:?}", name, started.elapsed());
            ctx.report_success(result.as_ref());
            Attempt::Done(true)
        }
        Err(message) => {
            log::warn!(target: "dispatch", "{} failed: {}", name, message);
            ctx.report_error(&message);
            Attempt::Done(false)
        }
    }
}
