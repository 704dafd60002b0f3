use std::sync::Arc;

use lamina_types::{LayerId, ParamValue};

use super::check_unlocked;
use crate::action::{Action, ActionArgs, ActionContext, ActionHandle, RegisteredAction, RunResult, Validation};
use crate::app::AppState;
use crate::dispatch::DispatcherHandle;
use crate::error::{ActionError, StateError};
use crate::layer::LayerManager;
use crate::state::StateEngine;

/// Import a text value into any registered state, e.g.
/// `Set stateid=layer_2::opacity value=0.5`.
///
/// States owned by a layer are not written while that layer is locked.
#[derive(Debug)]
pub struct Set {
    state_id: String,
    value: String,
    engine: Arc<StateEngine>,
    layers: Arc<LayerManager>,
}

impl Set {
    pub fn create(app: &AppState, state_id: &str, value: &str) -> ActionHandle {
        Box::new(Self::new(app, state_id, value))
    }

    pub fn dispatch(dispatcher: &DispatcherHandle, app: &AppState, state_id: &str, value: &str) {
        dispatcher.post(Self::create(app, state_id, value));
    }

    fn new(app: &AppState, state_id: &str, value: &str) -> Self {
        Self {
            state_id: state_id.trim().to_string(),
            value: value.to_string(),
            engine: Arc::clone(&app.states),
            layers: Arc::clone(&app.layers),
        }
    }

    fn owning_layer(&self) -> Option<LayerId> {
        let (handler, _) = self.state_id.split_once("::")?;
        handler.strip_prefix("layer_")?.parse().ok().map(LayerId::new)
    }
}

impl Action for Set {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn validate(&mut self, _ctx: &dyn ActionContext) -> Validation {
        let Some(state) = self.engine.get_state(&self.state_id) else {
            return Validation::Invalid(StateError::UnknownState(self.state_id.clone()).to_string());
        };
        if let Err(e) = state.check_import_string(&self.value) {
            return Validation::Invalid(e.to_string());
        }
        match self.owning_layer().and_then(|id| self.layers.get_layer_by_id(id)) {
            Some(layer) => check_unlocked([&layer]),
            None => Validation::Ready,
        }
    }

    fn run(&mut self, _ctx: &dyn ActionContext) -> RunResult {
        self.engine
            .set_from_string(&self.state_id, &self.value)
            .map(|_| None)
            .map_err(|e| e.to_string())
    }

    fn params(&self) -> Vec<(&'static str, ParamValue)> {
        vec![
            ("stateid", self.state_id.clone().into()),
            ("value", self.value.clone().into()),
        ]
    }
}

impl RegisteredAction for Set {
    const TYPE_NAME: &'static str = "Set";
    const PARAMS: &'static [&'static str] = &["stateid", "value"];

    fn from_args(args: &ActionArgs, app: &AppState) -> Result<Self, ActionError> {
        Ok(Self::new(app, args.require("stateid")?, args.require("value")?))
    }
}
