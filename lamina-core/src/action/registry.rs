use std::collections::{BTreeMap, BTreeSet};

use super::args::ActionArgs;
use super::context::ActionContext;
use super::{Action, ActionHandle};
use crate::app::AppState;
use crate::error::ActionError;

/// An action that can be built from text.
pub trait RegisteredAction: Action + Sized + 'static {
    /// Name used on the command line and in logs.
    const TYPE_NAME: &'static str;
    /// Parameter names in positional order.
    const PARAMS: &'static [&'static str];

    /// Build the action from already-bound parameters. Only parse and
    /// convert here; resolving ids to live objects belongs in `validate`.
    fn from_args(args: &ActionArgs, app: &AppState) -> Result<Self, ActionError>;
}

type Factory = Box<dyn Fn(&ActionArgs, &AppState) -> Result<ActionHandle, ActionError> + Send + Sync>;

struct Entry {
    params: &'static [&'static str],
    factory: Factory,
}

/// Map from stable action type name to a factory for the text-driven path.
///
/// Built once at startup (see [`with_builtin_actions`](Self::with_builtin_actions))
/// and passed by reference to whatever parses command lines.
#[derive(Default)]
pub struct ActionRegistry {
    entries: BTreeMap<&'static str, Entry>,
    // Known actions that need live handles and have no text factory.
    programmatic: BTreeSet<&'static str>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every action this crate defines.
    pub fn with_builtin_actions() -> Self {
        let mut registry = Self::new();
        crate::actions::register_builtin(&mut registry);
        registry
    }

    pub fn register<A: RegisteredAction>(&mut self) {
        let entry = Entry {
            params: A::PARAMS,
            factory: Box::new(|args, app| {
                args.check_names(A::PARAMS)?;
                Ok(Box::new(A::from_args(args, app)?) as ActionHandle)
            }),
        };
        if self.entries.insert(A::TYPE_NAME, entry).is_some() {
            log::warn!(target: "action", "action '{}' registered twice", A::TYPE_NAME);
        }
    }

    /// Record an action type that can only be built in code, so the text
    /// path can say so instead of reporting an unknown action.
    pub fn register_programmatic(&mut self, type_name: &'static str) {
        self.programmatic.insert(type_name);
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn params(&self, type_name: &str) -> Option<&'static [&'static str]> {
        self.entries.get(type_name).map(|e| e.params)
    }

    /// One `TypeName param ...` line per registered action.
    pub fn usage(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(name, entry)| {
                std::iter::once(*name)
                    .chain(entry.params.iter().copied())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }

    pub fn create(&self, mut args: ActionArgs, app: &AppState) -> Result<ActionHandle, ActionError> {
        let Some(entry) = self.entries.get(args.action()) else {
            return Err(if self.programmatic.contains(args.action()) {
                ActionError::NotScriptable(args.action().to_string())
            } else {
                ActionError::UnknownAction(args.action().to_string())
            });
        };
        args.bind_positional(entry.params)?;
        (entry.factory)(&args, app)
    }

    pub fn create_from_string(&self, line: &str, app: &AppState) -> Result<ActionHandle, ActionError> {
        self.create(ActionArgs::parse(line)?, app)
    }

    /// Parse `line` and post the resulting action with `context`. Parse
    /// errors are returned to the caller and also reported to `context`.
    pub fn dispatch_string(
        &self,
        line: &str,
        app: &AppState,
        context: Box<dyn ActionContext>,
    ) -> Result<(), ActionError> {
        match self.create_from_string(line, app) {
            Ok(action) => {
                app.dispatcher.post_with_context(action, context);
                Ok(())
            }
            Err(e) => {
                context.report_error(&e.to_string());
                Err(e)
            }
        }
    }
}
