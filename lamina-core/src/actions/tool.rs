use std::sync::Arc;
use std::thread;

use lamina_types::{LayerData, LayerKind, ParamValue};

use super::{check_unlocked, invalid_layer, resolve_layer};
use crate::action::{Action, ActionArgs, ActionContext, ActionHandle, RegisteredAction, RunResult, Validation};
use crate::app::AppState;
use crate::dispatch::DispatcherHandle;
use crate::error::ActionError;
use crate::layer::{Layer, LayerHandle, LayerManager};
use crate::resource::ResourceGuard;
use crate::tool::{compute, ArithmeticFilter, FilterOutput, Operation, ToolManager};

/// Open a tool by type name and make it active. Returns the new tool id.
#[derive(Debug)]
pub struct OpenTool {
    tool_type: String,
    tools: Arc<ToolManager>,
}

impl OpenTool {
    pub fn create(tools: &Arc<ToolManager>, tool_type: &str) -> ActionHandle {
        Box::new(Self {
            tool_type: tool_type.to_string(),
            tools: Arc::clone(tools),
        })
    }

    pub fn dispatch(dispatcher: &DispatcherHandle, tools: &Arc<ToolManager>, tool_type: &str) {
        dispatcher.post(Self::create(tools, tool_type));
    }
}

impl Action for OpenTool {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn validate(&mut self, _ctx: &dyn ActionContext) -> Validation {
        match ToolManager::resolve_tool_type(&self.tool_type) {
            Some(_) => Validation::Ready,
            None => Validation::Invalid(format!("ToolType: '{}' is invalid", self.tool_type)),
        }
    }

    fn run(&mut self, _ctx: &dyn ActionContext) -> RunResult {
        let tool = self.tools.open_tool(&self.tool_type)?;
        Ok(Some(tool.tool_id().to_string().into()))
    }

    fn params(&self) -> Vec<(&'static str, ParamValue)> {
        vec![("tooltype", self.tool_type.clone().into())]
    }
}

impl RegisteredAction for OpenTool {
    const TYPE_NAME: &'static str = "OpenTool";
    const PARAMS: &'static [&'static str] = &["tooltype"];

    fn from_args(args: &ActionArgs, app: &AppState) -> Result<Self, ActionError> {
        Ok(Self {
            tool_type: args.require("tooltype")?.trim().to_string(),
            tools: Arc::clone(&app.tools),
        })
    }
}

/// Start an arithmetic filter in the background.
///
/// The filter takes layer A's lock for its whole run, so anything that
/// validates against A parks until the result has been committed by the
/// [`CommitFilterResult`] the worker posts when it finishes.
#[derive(Debug)]
pub struct RunArithmeticFilter {
    tool_id: String,
    filter: Option<Arc<ArithmeticFilter>>,
    inputs: Option<FilterInputs>,
    tools: Arc<ToolManager>,
    layers: Arc<LayerManager>,
    dispatcher: DispatcherHandle,
}

#[derive(Debug)]
struct FilterInputs {
    op: Operation,
    a: LayerHandle,
    b: Option<LayerHandle>,
}

impl RunArithmeticFilter {
    pub fn create(app: &AppState, tool_id: &str) -> ActionHandle {
        Box::new(Self::new(app, tool_id))
    }

    pub fn dispatch(app: &AppState, tool_id: &str) {
        app.dispatcher.post(Self::create(app, tool_id));
    }

    fn new(app: &AppState, tool_id: &str) -> Self {
        Self {
            tool_id: tool_id.trim().to_string(),
            filter: None,
            inputs: None,
            tools: Arc::clone(&app.tools),
            layers: Arc::clone(&app.layers),
            dispatcher: app.dispatcher.clone(),
        }
    }

    fn resolve(&mut self) -> Result<(), Validation> {
        let filter = match &self.filter {
            Some(filter) => Arc::clone(filter),
            None => {
                let filter = self
                    .tools
                    .get_tool_as::<ArithmeticFilter>(&self.tool_id)
                    .ok_or_else(|| Validation::Invalid(format!("ToolID: '{}' is invalid", self.tool_id)))?;
                self.filter = Some(Arc::clone(&filter));
                filter
            }
        };

        let op = filter.operation().map_err(Validation::Invalid)?;
        let a_id = filter
            .volume_a
            .get()
            .ok_or_else(|| Validation::Invalid("volume A is not set".into()))?;
        let mut cache = self.inputs.as_ref().map(|i| Arc::clone(&i.a));
        let a = resolve_layer(&self.layers, a_id, &mut cache).ok_or_else(|| invalid_layer(a_id))?;
        if a.kind() != LayerKind::Data || a.data().is_none() {
            return Err(Validation::Invalid(format!("{} is not a data layer", a_id)));
        }

        let b = if op.needs_b() {
            let b_id = filter
                .volume_b
                .get()
                .ok_or_else(|| Validation::Invalid(format!("{} needs volume B", op)))?;
            let b = self.layers.get_layer_by_id(b_id).ok_or_else(|| invalid_layer(b_id))?;
            if !ArithmeticFilter::accepts_volume_b(&a, &b) {
                return Err(Validation::Invalid(format!(
                    "{} cannot be combined with {}: kind or size differs",
                    b_id, a_id
                )));
            }
            Some(b)
        } else {
            None
        };

        self.inputs = Some(FilterInputs { op, a, b });
        Ok(())
    }
}

impl Action for RunArithmeticFilter {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn validate(&mut self, _ctx: &dyn ActionContext) -> Validation {
        if let Err(validation) = self.resolve() {
            return validation;
        }
        match &self.inputs {
            Some(inputs) => check_unlocked(std::iter::once(&inputs.a).chain(inputs.b.as_ref())),
            None => Validation::Invalid("filter inputs not resolved".into()),
        }
    }

    fn run(&mut self, ctx: &dyn ActionContext) -> RunResult {
        let (Some(filter), Some(inputs)) = (&self.filter, &self.inputs) else {
            return Err("filter not resolved".into());
        };
        let guard = inputs
            .a
            .resource_lock()
            .try_acquire(&self.tool_id)
            .ok_or_else(|| format!("{} is locked", inputs.a.id()))?;

        let op = inputs.op;
        let a_data = inputs.a.data().ok_or("volume A has no data")?;
        let b_data = inputs.b.as_ref().and_then(|b| b.data());
        let output = filter.output(inputs.a.id(), &inputs.a.name.get());
        let layers = Arc::clone(&self.layers);
        let dispatcher = self.dispatcher.clone();
        let tool_id = self.tool_id.clone();

        // On spawn failure the closure, and with it the guard, is dropped.
        thread::Builder::new()
            .name(format!("lamina-{}", tool_id))
            .spawn(move || {
                log::debug!(target: "action", "{}: computing {}", tool_id, op);
                let result = compute(op, &a_data, b_data.as_deref());
                dispatcher.post(CommitFilterResult::create(&layers, guard, output, result));
            })
            .map_err(|e| format!("could not start filter thread: {}", e))?;

        ctx.report_message(&format!("{} started on {}", self.tool_id, inputs.a.id()));
        Ok(None)
    }

    fn params(&self) -> Vec<(&'static str, ParamValue)> {
        vec![("toolid", self.tool_id.clone().into())]
    }
}

impl RegisteredAction for RunArithmeticFilter {
    const TYPE_NAME: &'static str = "RunArithmeticFilter";
    const PARAMS: &'static [&'static str] = &["toolid"];

    fn from_args(args: &ActionArgs, app: &AppState) -> Result<Self, ActionError> {
        Ok(Self::new(app, args.require("toolid")?))
    }
}

/// Store a filter's result and release the lock the filter held.
///
/// Only built by the filter worker. The lock is released whether the action
/// runs, fails or is discarded.
#[derive(Debug)]
pub struct CommitFilterResult {
    guard: Option<ResourceGuard>,
    output: FilterOutput,
    result: Option<Result<LayerData, String>>,
    target: Option<LayerHandle>,
    layers: Arc<LayerManager>,
}

impl CommitFilterResult {
    pub const TYPE_NAME: &'static str = "CommitFilterResult";

    pub fn create(
        layers: &Arc<LayerManager>,
        guard: ResourceGuard,
        output: FilterOutput,
        result: Result<LayerData, String>,
    ) -> ActionHandle {
        Box::new(Self {
            guard: Some(guard),
            output,
            result: Some(result),
            target: None,
            layers: Arc::clone(layers),
        })
    }

    fn release(&mut self) {
        if let Some(guard) = self.guard.take() {
            log::debug!(target: "action", "filter releasing {}", guard.lock().name());
        }
    }
}

impl Action for CommitFilterResult {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    // The lock on the target is ours, so it is not checked here.
    fn validate(&mut self, _ctx: &dyn ActionContext) -> Validation {
        match &self.output {
            FilterOutput::Replace(id) => match resolve_layer(&self.layers, *id, &mut self.target) {
                Some(_) => Validation::Ready,
                None => invalid_layer(*id),
            },
            FilterOutput::NewLayer(_) => Validation::Ready,
        }
    }

    fn run(&mut self, _ctx: &dyn ActionContext) -> RunResult {
        let outcome = match self.result.take() {
            None => Err("filter result already committed".to_string()),
            Some(Err(e)) => Err(format!("filter failed: {}", e)),
            Some(Ok(data)) => match &self.output {
                FilterOutput::Replace(id) => match &self.target {
                    Some(layer) => {
                        layer.set_data(data);
                        Ok(Some((*id).into()))
                    }
                    None => Err(format!("{} not resolved", id)),
                },
                FilterOutput::NewLayer(name) => {
                    let layer = Layer::new(self.layers.allocate_id(), name, LayerKind::Data, Some(data));
                    self.layers.insert_layer(Arc::clone(&layer));
                    self.layers.set_active_layer(&layer);
                    Ok(Some(layer.id().into()))
                }
            },
        };
        self.release();
        outcome
    }

    fn params(&self) -> Vec<(&'static str, ParamValue)> {
        match &self.output {
            FilterOutput::Replace(id) => vec![("replace", (*id).into())],
            FilterOutput::NewLayer(name) => vec![("name", name.clone().into())],
        }
    }
}
