use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use super::{attempt, Attempt, DispatchMsg, Pending, Shared};
use crate::resource::ResourceLockHandle;

/// Fallback poll interval for stall warnings when nothing else arrives.
const STALL_POLL: Duration = Duration::from_millis(500);

/// An action that could not run yet, or one queued behind it.
struct Parked {
    pending: Pending,
    /// Set only on the front of an origin queue: the lock it is waiting on
    /// and whether an unlock waiter is still registered for it.
    waiting: Option<Waiting>,
}

struct Waiting {
    lock: ResourceLockHandle,
    armed: Arc<AtomicBool>,
    since: Instant,
    warned: bool,
}

/// The consuming side of the dispatch queue. Lives on the owning thread.
pub struct DispatchLoop {
    rx: Receiver<DispatchMsg>,
    wake_tx: Sender<DispatchMsg>,
    shared: Arc<Shared>,
    /// Per posting thread: the parked action at the front, later actions
    /// from that thread behind it.
    parked: HashMap<ThreadId, VecDeque<Parked>>,
    closed: bool,
}

impl DispatchLoop {
    pub(crate) fn new(rx: Receiver<DispatchMsg>, wake_tx: Sender<DispatchMsg>, shared: Arc<Shared>) -> Self {
        Self {
            rx,
            wake_tx,
            shared,
            parked: HashMap::new(),
            closed: false,
        }
    }

    /// Block on the queue until shutdown. Makes the calling thread the
    /// owning thread.
    pub fn run(mut self) {
        self.claim_owner();
        loop {
            let msg = if self.parked.is_empty() || self.shared.stall_warning.is_none() {
                self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
            } else {
                self.rx.recv_timeout(STALL_POLL)
            };
            match msg {
                Ok(msg) => {
                    if !self.handle(msg) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.warn_stalled();
        }
        self.close();
    }

    /// Handle everything currently queued without blocking. For owners that
    /// drive dispatch from their own event loop. Returns false once shutdown
    /// was requested; the loop is then closed and further calls do nothing.
    pub fn process_pending(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.claim_owner();
        loop {
            match self.rx.try_recv() {
                Ok(msg) => {
                    if !self.handle(msg) {
                        self.close();
                        return false;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.close();
                    return false;
                }
            }
        }
        self.warn_stalled();
        true
    }

    /// Handle what is already queued, then close. For attached owners; a
    /// spawned dispatcher uses [`ActionDispatcher::shutdown`](super::ActionDispatcher::shutdown).
    pub fn shutdown(mut self) {
        self.process_pending();
        self.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of actions waiting on a resource or behind one.
    pub fn parked_count(&self) -> usize {
        self.parked.values().map(VecDeque::len).sum()
    }

    fn claim_owner(&self) {
        let me = thread::current().id();
        let owner = *self.shared.owner.get_or_init(|| me);
        assert_eq!(owner, me, "dispatch loop driven from two different threads");
    }

    fn handle(&mut self, msg: DispatchMsg) -> bool {
        match msg {
            DispatchMsg::Post(pending) => self.accept(pending),
            DispatchMsg::Wake => self.sweep(),
            DispatchMsg::Call(f) => f(),
            DispatchMsg::Shutdown => return false,
        }
        true
    }

    fn accept(&mut self, pending: Pending) {
        if self.shared.log_actions {
            log::debug!(target: "dispatch", "#{} {}", pending.seq, pending.action.export_to_string());
        }
        if let Some(queue) = self.parked.get_mut(&pending.origin) {
            log::debug!(
                target: "dispatch",
                "#{} {} held behind a parked action",
                pending.seq,
                pending.action.type_name()
            );
            queue.push_back(Parked { pending, waiting: None });
            return;
        }
        let origin = pending.origin;
        self.parked.insert(origin, VecDeque::from([Parked { pending, waiting: None }]));
        self.drain_origin(origin);
    }

    /// Re-validate the front of every origin queue, oldest first.
    fn sweep(&mut self) {
        let mut fronts: Vec<(u64, ThreadId)> = self
            .parked
            .iter()
            .filter_map(|(origin, queue)| queue.front().map(|p| (p.pending.seq, *origin)))
            .collect();
        fronts.sort_unstable_by_key(|(seq, _)| *seq);
        for (_, origin) in fronts {
            self.drain_origin(origin);
        }
    }

    /// Run the queue of `origin` from the front until it is empty or its
    /// front blocks.
    fn drain_origin(&mut self, origin: ThreadId) {
        loop {
            let Some(queue) = self.parked.get_mut(&origin) else {
                return;
            };
            let Some(mut parked) = queue.pop_front() else {
                self.parked.remove(&origin);
                return;
            };

            let Pending { action, context, .. } = &mut parked.pending;
            match attempt(action, &**context) {
                Attempt::Done(_) => continue,
                Attempt::Blocked(lock) => {
                    self.block(&mut parked, lock);
                    if let Some(queue) = self.parked.get_mut(&origin) {
                        queue.push_front(parked);
                    }
                    return;
                }
            }
        }
    }

    /// Record that `parked` waits on `lock`, telling its context and arming an
    /// unlock waiter unless one is already armed for that very lock.
    fn block(&self, parked: &mut Parked, lock: ResourceLockHandle) {
        if let Some(waiting) = &parked.waiting {
            if Arc::ptr_eq(&waiting.lock, &lock) && waiting.armed.load(Ordering::Acquire) {
                return;
            }
        }

        let same_lock = parked
            .waiting
            .as_ref()
            .is_some_and(|w| Arc::ptr_eq(&w.lock, &lock));
        if !same_lock {
            log::debug!(
                target: "dispatch",
                "#{} {} waiting for {}",
                parked.pending.seq,
                parked.pending.action.type_name(),
                lock.name()
            );
            parked.pending.context.report_need_resource(&lock);
        }

        let armed = Arc::new(AtomicBool::new(true));
        let fired = Arc::clone(&armed);
        let wake_tx = self.wake_tx.clone();
        lock.notify_on_unlock(move || {
            fired.store(false, Ordering::Release);
            let _ = wake_tx.send(DispatchMsg::Wake);
        });

        match &mut parked.waiting {
            Some(waiting) if same_lock => waiting.armed = armed,
            _ => {
                parked.waiting = Some(Waiting {
                    lock,
                    armed,
                    since: Instant::now(),
                    warned: false,
                })
            }
        }
    }

    fn warn_stalled(&mut self) {
        let Some(limit) = self.shared.stall_warning else {
            return;
        };
        for queue in self.parked.values_mut() {
            let Some(front) = queue.front_mut() else {
                continue;
            };
            let Some(waiting) = front.waiting.as_mut() else {
                continue;
            };
            if !waiting.warned && waiting.since.elapsed() >= limit {
                waiting.warned = true;
                log::warn!(
                    target: "dispatch",
                    "#{} {} has waited {:?} for {} (held by {})",
                    front.pending.seq,
                    front.pending.action.type_name(),
                    waiting.since.elapsed(),
                    waiting.lock.name(),
                    waiting.lock.holder().unwrap_or_else(|| "nobody".to_string())
                );
            }
        }
    }

    /// Report every parked or still-queued action as abandoned and drop the
    /// queue, so later posts are reported to their issuer straight away.
    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut abandoned: Vec<Pending> = self
            .parked
            .drain()
            .flat_map(|(_, queue)| queue.into_iter().map(|p| p.pending))
            .collect();
        let rx = std::mem::replace(&mut self.rx, crossbeam_channel::never());
        while let Ok(msg) = rx.try_recv() {
            if let DispatchMsg::Post(pending) = msg {
                abandoned.push(pending);
            }
        }
        drop(rx);
        abandoned.sort_unstable_by_key(|p| p.seq);
        for pending in abandoned {
            log::warn!(
                target: "dispatch",
                "#{} {} abandoned at shutdown",
                pending.seq,
                pending.action.type_name()
            );
            pending
                .context
                .report_error("action dispatcher shut down before the action could run");
        }
        log::info!(target: "dispatch", "dispatcher stopped");
    }
}
