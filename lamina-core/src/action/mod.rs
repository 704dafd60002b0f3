//! The action abstraction: a named, two-phase unit of state mutation.
//!
//! Every mutation of application state is expressed as an [`Action`]. The
//! dispatcher calls [`Action::validate`] and, when it answers
//! [`Validation::Ready`], immediately calls [`Action::run`] on the same
//! thread with nothing interleaved. Actions are built either directly from
//! live handles (each concrete action's `create`) or from text through the
//! [`ActionRegistry`].

mod args;
mod context;
mod registry;

pub use args::ActionArgs;
pub use context::{ActionContext, ActionSource, ChannelContext, ContextEvent, LogContext, NullContext};
pub use registry::{ActionRegistry, RegisteredAction};

use std::fmt;

use lamina_types::ParamValue;

use crate::resource::ResourceLockHandle;

/// Outcome of [`Action::validate`].
#[derive(Debug, Clone)]
pub enum Validation {
    /// The action can run now.
    Ready,
    /// The action can never run; the message says why.
    Invalid(String),
    /// A resource the action needs is locked; retry after it unlocks.
    Blocked(ResourceLockHandle),
}

/// Result of [`Action::run`]: an optional result value, or an execution
/// failure message.
pub type RunResult = Result<Option<ParamValue>, String>;

pub type ActionHandle = Box<dyn Action>;

pub trait Action: Send + fmt::Debug {
    /// Stable name the action is registered under.
    fn type_name(&self) -> &'static str;

    /// Check feasibility without side effects: resolve ids to live objects,
    /// answer `Invalid` if one is gone and `Blocked` if one is locked.
    /// May be called many times before `run`.
    fn validate(&mut self, ctx: &dyn ActionContext) -> Validation;

    /// Apply the mutation. Only called directly after a `Ready` validation.
    /// Compute everything first and commit state at the end; a failure
    /// reported here is not retried.
    fn run(&mut self, ctx: &dyn ActionContext) -> RunResult;

    /// Parameters in declaration order, for logging and replay.
    fn params(&self) -> Vec<(&'static str, ParamValue)> {
        Vec::new()
    }

    /// Command-line form, `TypeName key=value ...`, parseable by
    /// [`ActionRegistry::create_from_string`] for scriptable actions.
    fn export_to_string(&self) -> String {
        let mut out = self.type_name().to_string();
        for (name, value) in self.params() {
            out.push(' ');
            out.push_str(name);
            out.push('=');
            out.push_str(&value.to_arg_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lamina_types::LayerId;

    #[derive(Debug)]
    struct Rename {
        layer: LayerId,
        name: String,
    }

    impl Action for Rename {
        fn type_name(&self) -> &'static str {
            "Rename"
        }
        fn validate(&mut self, _ctx: &dyn ActionContext) -> Validation {
            Validation::Ready
        }
        fn run(&mut self, _ctx: &dyn ActionContext) -> RunResult {
            Ok(None)
        }
        fn params(&self) -> Vec<(&'static str, ParamValue)> {
            vec![("layer", self.layer.into()), ("name", self.name.clone().into())]
        }
    }

    #[test]
    fn test_export_quotes_text_with_spaces() {
        let action = Rename { layer: LayerId::new(4), name: "left lung".into() };
        assert_eq!(action.export_to_string(), "Rename layer=layer_4 name=\"left lung\"");
    }
}
