use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use lamina_types::{LayerData, LayerId, LayerKind, ParamValue};

use super::{check_unlocked, invalid_layer, resolve_layer};
use crate::action::{Action, ActionArgs, ActionContext, ActionHandle, RegisteredAction, RunResult, Validation};
use crate::app::AppState;
use crate::dispatch::DispatcherHandle;
use crate::error::ActionError;
use crate::layer::{Layer, LayerHandle, LayerManager};
use crate::state::StateHandler;

/// Upper bound on voxels in a new layer.
const MAX_VOXELS: usize = 1 << 28;

/// Make a layer the active one.
#[derive(Debug)]
pub struct ActivateLayer {
    layer_id: LayerId,
    layer: Option<LayerHandle>,
    manager: Arc<LayerManager>,
}

impl ActivateLayer {
    pub fn new(manager: &Arc<LayerManager>, layer_id: LayerId) -> Self {
        Self {
            layer_id,
            layer: None,
            manager: Arc::clone(manager),
        }
    }

    pub fn create(manager: &Arc<LayerManager>, layer: &LayerHandle) -> ActionHandle {
        Box::new(Self {
            layer_id: layer.id(),
            layer: Some(Arc::clone(layer)),
            manager: Arc::clone(manager),
        })
    }

    pub fn dispatch(dispatcher: &DispatcherHandle, manager: &Arc<LayerManager>, layer: &LayerHandle) {
        dispatcher.post(Self::create(manager, layer));
    }
}

impl Action for ActivateLayer {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn validate(&mut self, _ctx: &dyn ActionContext) -> Validation {
        match resolve_layer(&self.manager, self.layer_id, &mut self.layer) {
            Some(layer) => check_unlocked([&layer]),
            None => invalid_layer(self.layer_id),
        }
    }

    fn run(&mut self, _ctx: &dyn ActionContext) -> RunResult {
        let layer = self.layer.as_ref().ok_or("layer not resolved")?;
        self.manager.set_active_layer(layer);
        Ok(None)
    }

    fn params(&self) -> Vec<(&'static str, ParamValue)> {
        vec![("layer", self.layer_id.into())]
    }
}

impl RegisteredAction for ActivateLayer {
    const TYPE_NAME: &'static str = "ActivateLayer";
    const PARAMS: &'static [&'static str] = &["layer"];

    fn from_args(args: &ActionArgs, app: &AppState) -> Result<Self, ActionError> {
        Ok(Self::new(&app.layers, args.parse_param("layer")?))
    }
}

/// Volume dimensions on the command line: `64x64x32` or `64,64,32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims(pub [usize; 3]);

impl FromStr for Dims {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(['x', 'X', ',']).map(str::trim).collect();
        let [x, y, z] = parts.as_slice() else {
            return Err(format!("'{}' is not three dimensions", s));
        };
        let parse = |p: &str| p.parse::<usize>().map_err(|_| format!("'{}' is not a dimension", p));
        Ok(Dims([parse(x)?, parse(y)?, parse(z)?]))
    }
}

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.0;
        write!(f, "{}x{}x{}", x, y, z)
    }
}

/// Insert an empty layer on top and activate it. Returns the new layer id.
#[derive(Debug)]
pub struct NewLayer {
    name: String,
    kind: LayerKind,
    dims: Option<Dims>,
    manager: Arc<LayerManager>,
}

impl NewLayer {
    /// `dims` defaults to the configured layer size.
    pub fn create(manager: &Arc<LayerManager>, name: &str, kind: LayerKind, dims: Option<[usize; 3]>) -> ActionHandle {
        Box::new(Self {
            name: name.to_string(),
            kind,
            dims: dims.map(Dims),
            manager: Arc::clone(manager),
        })
    }

    pub fn dispatch(
        dispatcher: &DispatcherHandle,
        manager: &Arc<LayerManager>,
        name: &str,
        kind: LayerKind,
        dims: Option<[usize; 3]>,
    ) {
        dispatcher.post(Self::create(manager, name, kind, dims));
    }

    fn dims(&self) -> [usize; 3] {
        self.dims.map(|d| d.0).unwrap_or_else(|| self.manager.default_dims())
    }
}

impl Action for NewLayer {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn validate(&mut self, _ctx: &dyn ActionContext) -> Validation {
        if self.name.trim().is_empty() {
            return Validation::Invalid("layer name is empty".into());
        }
        let dims = self.dims();
        if dims.contains(&0) {
            return Validation::Invalid(format!("dimensions {} contain a zero", Dims(dims)));
        }
        if dims.iter().try_fold(1usize, |acc, d| acc.checked_mul(*d)).map_or(true, |n| n > MAX_VOXELS) {
            return Validation::Invalid(format!("dimensions {} are too large", Dims(dims)));
        }
        Validation::Ready
    }

    fn run(&mut self, _ctx: &dyn ActionContext) -> RunResult {
        let id = self.manager.allocate_id();
        let layer = Layer::new(id, self.name.trim(), self.kind, Some(LayerData::zeroed(self.dims())));
        // Snapshots of the manager never see the new layer without it being active.
        let _transition = self.manager.state_set().lock();
        self.manager.insert_layer(Arc::clone(&layer));
        self.manager.set_active_layer(&layer);
        Ok(Some(id.into()))
    }

    fn params(&self) -> Vec<(&'static str, ParamValue)> {
        let mut params = vec![
            ("name", self.name.clone().into()),
            ("kind", self.kind.as_str().into()),
        ];
        if let Some(dims) = self.dims {
            params.push(("dims", dims.to_string().into()));
        }
        params
    }
}

impl RegisteredAction for NewLayer {
    const TYPE_NAME: &'static str = "NewLayer";
    const PARAMS: &'static [&'static str] = &["name", "kind", "dims"];

    fn from_args(args: &ActionArgs, app: &AppState) -> Result<Self, ActionError> {
        let kind = match args.get("kind") {
            None => LayerKind::default(),
            Some(raw) => LayerKind::parse(raw.trim()).ok_or_else(|| ActionError::InvalidParameter {
                action: Self::TYPE_NAME.into(),
                param: "kind".into(),
                reason: format!("'{}' is not data or mask", raw),
            })?,
        };
        Ok(Self {
            name: args.require("name")?.to_string(),
            kind,
            dims: args.parse_optional("dims")?,
            manager: Arc::clone(&app.layers),
        })
    }
}

/// Remove a layer. The manager picks a new active layer if needed.
#[derive(Debug)]
pub struct DeleteLayer {
    layer_id: LayerId,
    layer: Option<LayerHandle>,
    manager: Arc<LayerManager>,
}

impl DeleteLayer {
    pub fn new(manager: &Arc<LayerManager>, layer_id: LayerId) -> Self {
        Self {
            layer_id,
            layer: None,
            manager: Arc::clone(manager),
        }
    }

    pub fn create(manager: &Arc<LayerManager>, layer: &LayerHandle) -> ActionHandle {
        Box::new(Self {
            layer_id: layer.id(),
            layer: Some(Arc::clone(layer)),
            manager: Arc::clone(manager),
        })
    }

    pub fn dispatch(dispatcher: &DispatcherHandle, manager: &Arc<LayerManager>, layer: &LayerHandle) {
        dispatcher.post(Self::create(manager, layer));
    }
}

impl Action for DeleteLayer {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn validate(&mut self, _ctx: &dyn ActionContext) -> Validation {
        match resolve_layer(&self.manager, self.layer_id, &mut self.layer) {
            Some(layer) => check_unlocked([&layer]),
            None => invalid_layer(self.layer_id),
        }
    }

    fn run(&mut self, _ctx: &dyn ActionContext) -> RunResult {
        match self.manager.remove_layer(self.layer_id) {
            Some(_) => Ok(None),
            None => Err(format!("{} vanished before it could be deleted", self.layer_id)),
        }
    }

    fn params(&self) -> Vec<(&'static str, ParamValue)> {
        vec![("layer", self.layer_id.into())]
    }
}

impl RegisteredAction for DeleteLayer {
    const TYPE_NAME: &'static str = "DeleteLayer";
    const PARAMS: &'static [&'static str] = &["layer"];

    fn from_args(args: &ActionArgs, app: &AppState) -> Result<Self, ActionError> {
        Ok(Self::new(&app.layers, args.parse_param("layer")?))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use super::*;
    use crate::action::NullContext;
    use crate::state::StateEngine;

    fn manager() -> Arc<LayerManager> {
        let engine = Arc::new(StateEngine::new());
        Arc::new(LayerManager::new(engine, [2, 2, 2]))
    }

    fn insert(manager: &Arc<LayerManager>, name: &str) -> LayerHandle {
        let layer = Layer::new(manager.allocate_id(), name, LayerKind::Data, None);
        manager.insert_layer(Arc::clone(&layer));
        layer
    }

    #[test]
    fn test_dims_parse_and_display() {
        assert_eq!("4x5x6".parse::<Dims>(), Ok(Dims([4, 5, 6])));
        assert_eq!("4, 5, 6".parse::<Dims>(), Ok(Dims([4, 5, 6])));
        assert!("4x5".parse::<Dims>().is_err());
        assert!("4xax6".parse::<Dims>().is_err());
        assert_eq!(Dims([1, 2, 3]).to_string(), "1x2x3");
    }

    #[test]
    fn test_activate_blocks_on_locked_layer() {
        let manager = manager();
        let layer = insert(&manager, "a");
        let mut action = ActivateLayer::new(&manager, layer.id());
        assert!(layer.resource_lock().try_lock("filter"));
        assert!(matches!(action.validate(&NullContext), Validation::Blocked(_)));
        layer.resource_lock().unlock("filter");
        assert!(matches!(action.validate(&NullContext), Validation::Ready));
    }

    #[test]
    fn test_activate_unknown_layer_is_invalid() {
        let manager = manager();
        let mut action = ActivateLayer::new(&manager, LayerId::new(9));
        match action.validate(&NullContext) {
            Validation::Invalid(message) => assert_eq!(message, "LayerID: 'layer_9' is invalid"),
            other => panic!("expected invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_cached_layer_is_dropped_once_deleted() {
        let manager = manager();
        let layer = insert(&manager, "a");
        let mut action = ActivateLayer::create(&manager, &layer);
        manager.remove_layer(layer.id());
        assert!(matches!(action.validate(&NullContext), Validation::Invalid(_)));
    }

    #[test]
    fn test_new_layer_rejects_bad_input() {
        let manager = manager();
        let mut empty = NewLayer::create(&manager, "  ", LayerKind::Data, None);
        assert!(matches!(empty.validate(&NullContext), Validation::Invalid(_)));
        let mut flat = NewLayer::create(&manager, "a", LayerKind::Data, Some([4, 0, 4]));
        assert!(matches!(flat.validate(&NullContext), Validation::Invalid(_)));
        let mut huge = NewLayer::create(&manager, "a", LayerKind::Data, Some([1 << 20, 1 << 20, 1 << 20]));
        assert!(matches!(huge.validate(&NullContext), Validation::Invalid(_)));
    }

    #[test]
    fn test_new_layer_inserts_and_activates() {
        let manager = manager();
        let mut action = NewLayer::create(&manager, "mask", LayerKind::Mask, None);
        assert!(matches!(action.validate(&NullContext), Validation::Ready));
        let id = action.run(&NullContext).unwrap().and_then(|v| v.as_layer()).unwrap();
        let layer = manager.get_layer_by_id(id).unwrap();
        assert_eq!(layer.kind(), LayerKind::Mask);
        assert_eq!(layer.dims(), Some([2, 2, 2]));
        assert_eq!(manager.active_layer.get(), Some(id));
        assert_eq!(action.export_to_string(), "NewLayer name=mask kind=mask");
    }

    #[test]
    fn test_new_layer_is_active_in_every_snapshot() {
        let manager = manager();
        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let manager = Arc::clone(&manager);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut snapshots = 0;
                while !done.load(Ordering::Acquire) {
                    let states: HashMap<String, String> = manager.state_set().export_states().into_iter().collect();
                    let active: Option<u32> = serde_json::from_str(&states["active_layer"]).unwrap();
                    let ids: Vec<u32> = serde_json::from_str(&states["layers"]).unwrap();
                    assert_eq!(active, ids.last().copied(), "torn snapshot {:?}", states);
                    snapshots += 1;
                }
                snapshots
            })
        };

        for i in 0..200 {
            let mut action = NewLayer::create(&manager, &format!("layer {}", i), LayerKind::Data, Some([1, 1, 1]));
            assert!(matches!(action.validate(&NullContext), Validation::Ready));
            action.run(&NullContext).unwrap();
        }
        done.store(true, Ordering::Release);
        assert!(reader.join().unwrap() > 0);
        assert_eq!(manager.len(), 200);
    }
}
