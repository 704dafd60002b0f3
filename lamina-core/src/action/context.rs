use crossbeam_channel::{Receiver, Sender};
use lamina_types::ParamValue;

use crate::resource::ResourceLockHandle;

/// Who issued an action. Lets contexts decide how loudly to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionSource {
    /// A user interaction in the interface.
    Interface,
    /// A console line or replayed script.
    Script,
    /// Code inside the application.
    #[default]
    Programmatic,
}

/// The channel through which one dispatched action reports its outcome.
///
/// A context is created per dispatch, owned by the dispatcher while the
/// action is in flight, and dropped once the outcome has been delivered.
/// Methods are called on the dispatcher's owning thread.
pub trait ActionContext: Send {
    /// Permanent failure: invalid parameters or a failed run.
    fn report_error(&self, message: &str);

    /// The action is parked until `lock` is released. May be reported more
    /// than once if the action blocks again on a different resource.
    fn report_need_resource(&self, lock: &ResourceLockHandle);

    /// The action ran. `result` is the action's result value, if any.
    fn report_success(&self, result: Option<&ParamValue>);

    /// Informational text from inside an action.
    fn report_message(&self, message: &str) {
        log::info!(target: "action", "{}", message);
    }

    fn source(&self) -> ActionSource {
        ActionSource::Programmatic
    }
}

/// Reports nothing. For fire-and-forget programmatic dispatch.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullContext;

impl ActionContext for NullContext {
    fn report_error(&self, _message: &str) {}
    fn report_need_resource(&self, _lock: &ResourceLockHandle) {}
    fn report_success(&self, _result: Option<&ParamValue>) {}
    fn report_message(&self, _message: &str) {}
}

/// Reports through the `log` facade. The default context for `post`.
#[derive(Debug, Clone)]
pub struct LogContext {
    label: String,
    source: ActionSource,
}

impl LogContext {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            source: ActionSource::Programmatic,
        }
    }

    pub fn with_source(mut self, source: ActionSource) -> Self {
        self.source = source;
        self
    }
}

impl ActionContext for LogContext {
    fn report_error(&self, message: &str) {
        log::warn!(target: "action", "{}: {}", self.label, message);
    }

    fn report_need_resource(&self, lock: &ResourceLockHandle) {
        log::info!(target: "action", "{}: waiting for {}", self.label, lock.name());
    }

    fn report_success(&self, result: Option<&ParamValue>) {
        match result {
            Some(value) => log::debug!(target: "action", "{}: done -> {}", self.label, value),
            None => log::debug!(target: "action", "{}: done", self.label),
        }
    }

    fn report_message(&self, message: &str) {
        log::info!(target: "action", "{}: {}", self.label, message);
    }

    fn source(&self) -> ActionSource {
        self.source
    }
}

/// One report delivered through a [`ChannelContext`].
#[derive(Debug, Clone, PartialEq)]
pub enum ContextEvent {
    Error(String),
    /// Name of the resource the action is waiting on.
    NeedResource(String),
    Success(Option<ParamValue>),
    Message(String),
}

impl ContextEvent {
    /// Whether this is the last event the action will produce.
    pub fn is_final(&self) -> bool {
        matches!(self, ContextEvent::Error(_) | ContextEvent::Success(_))
    }
}

/// Forwards every report to the issuer over a crossbeam channel.
#[derive(Debug, Clone)]
pub struct ChannelContext {
    tx: Sender<ContextEvent>,
    source: ActionSource,
}

impl ChannelContext {
    pub fn new() -> (Self, Receiver<ContextEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            Self {
                tx,
                source: ActionSource::Programmatic,
            },
            rx,
        )
    }

    pub fn with_source(mut self, source: ActionSource) -> Self {
        self.source = source;
        self
    }

    fn send(&self, event: ContextEvent) {
        // The issuer may have stopped listening; that is not an error.
        if self.tx.send(event).is_err() {
            log::trace!(target: "action", "context receiver dropped");
        }
    }
}

impl ActionContext for ChannelContext {
    fn report_error(&self, message: &str) {
        self.send(ContextEvent::Error(message.to_string()));
    }

    fn report_need_resource(&self, lock: &ResourceLockHandle) {
        self.send(ContextEvent::NeedResource(lock.name().to_string()));
    }

    fn report_success(&self, result: Option<&ParamValue>) {
        self.send(ContextEvent::Success(result.cloned()));
    }

    fn report_message(&self, message: &str) {
        self.send(ContextEvent::Message(message.to_string()));
    }

    fn source(&self) -> ActionSource {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceLock;

    #[test]
    fn test_channel_context_forwards_reports() {
        let (ctx, rx) = ChannelContext::new();
        let lock = ResourceLock::new("layer_2");
        ctx.report_need_resource(&lock);
        ctx.report_message("halfway");
        ctx.report_success(Some(&ParamValue::Int(3)));

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                ContextEvent::NeedResource("layer_2".into()),
                ContextEvent::Message("halfway".into()),
                ContextEvent::Success(Some(ParamValue::Int(3))),
            ]
        );
        assert!(events[2].is_final());
        assert!(!events[0].is_final());
    }

    #[test]
    fn test_channel_context_survives_dropped_receiver() {
        let (ctx, rx) = ChannelContext::new();
        drop(rx);
        ctx.report_error("nobody listening");
    }
}
