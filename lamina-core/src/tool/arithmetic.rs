use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use lamina_types::{LayerData, LayerId, LayerKind};

use super::Tool;
use crate::layer::{Layer, LayerManager};
use crate::state::{StateHandle, StateHandler, StateSet};

/// Voxel-wise combination of volume A with an optional volume B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Copy,
    Negate,
    Add,
    Subtract,
    Multiply,
    Min,
    Max,
}

impl Operation {
    pub fn needs_b(self) -> bool {
        !matches!(self, Operation::Copy | Operation::Negate)
    }

    fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            Operation::Copy => a,
            Operation::Negate => -a,
            Operation::Add => a + b,
            Operation::Subtract => a - b,
            Operation::Multiply => a * b,
            Operation::Min => a.min(b),
            Operation::Max => a.max(b),
        }
    }
}

impl FromStr for Operation {
    type Err = String;

    /// Accepts `A`, `-A`, `A+B`, `A-B`, `A*B`, `MIN(A,B)`, `MAX(A,B)`;
    /// whitespace and case are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();
        match compact.as_str() {
            "A" => Ok(Operation::Copy),
            "-A" => Ok(Operation::Negate),
            "A+B" => Ok(Operation::Add),
            "A-B" => Ok(Operation::Subtract),
            "A*B" => Ok(Operation::Multiply),
            "MIN(A,B)" => Ok(Operation::Min),
            "MAX(A,B)" => Ok(Operation::Max),
            _ => Err(format!("unsupported expression '{}'", s.trim())),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Copy => "A",
            Operation::Negate => "-A",
            Operation::Add => "A+B",
            Operation::Subtract => "A-B",
            Operation::Multiply => "A*B",
            Operation::Min => "MIN(A,B)",
            Operation::Max => "MAX(A,B)",
        };
        f.write_str(s)
    }
}

/// Where a finished filter run puts its result.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutput {
    /// Overwrite the data of the input layer A.
    Replace(LayerId),
    /// Insert a new data layer with this name.
    NewLayer(String),
}

/// Combines two data layers with a simple expression.
pub struct ArithmeticFilter {
    states: StateSet,
    pub volume_a: StateHandle<Option<LayerId>>,
    pub volume_b: StateHandle<Option<LayerId>>,
    pub expression: StateHandle<String>,
    /// Write the result into A instead of a new layer.
    pub replace: StateHandle<bool>,
}

impl ArithmeticFilter {
    pub const TOOL_TYPE: &'static str = "ArithmeticFilter";

    pub fn new(tool_id: &str) -> Self {
        let mut states = StateSet::new(tool_id);
        let volume_a = states.add_state("volume_a", None);
        let volume_b = states.add_state("volume_b", None);
        let expression = states.add_state("expression", "A+B".to_string());
        let replace = states.add_state("replace", false);
        Self {
            states,
            volume_a,
            volume_b,
            expression,
            replace,
        }
    }

    pub fn operation(&self) -> Result<Operation, String> {
        self.expression.with(|e| e.parse())
    }

    /// Whether `b` can be combined with `a`: both data layers holding
    /// volumes of the same dims.
    pub fn accepts_volume_b(a: &Layer, b: &Layer) -> bool {
        a.kind() == LayerKind::Data && b.kind() == LayerKind::Data && a.dims().is_some() && a.dims() == b.dims()
    }

    /// Layers that volume B may be set to for the current volume A, in
    /// layer order. Empty while A is unset or gone.
    pub fn target_constraint(&self, layers: &LayerManager) -> Vec<LayerId> {
        let Some(a) = self.volume_a.get().and_then(|id| layers.get_layer_by_id(id)) else {
            return Vec::new();
        };
        layers
            .layers()
            .iter()
            .filter(|b| Self::accepts_volume_b(&a, b))
            .map(|b| b.id())
            .collect()
    }

    pub fn output(&self, a: LayerId, a_name: &str) -> FilterOutput {
        if self.replace.get() {
            FilterOutput::Replace(a)
        } else {
            FilterOutput::NewLayer(format!("{} ({})", a_name, self.expression.get().trim()))
        }
    }
}

impl StateHandler for ArithmeticFilter {
    fn state_set(&self) -> &StateSet {
        &self.states
    }
}

impl fmt::Debug for ArithmeticFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArithmeticFilter")
            .field("id", &self.handler_id())
            .field("expression", &self.expression.get())
            .finish()
    }
}

impl Tool for ArithmeticFilter {
    fn tool_type(&self) -> &'static str {
        Self::TOOL_TYPE
    }

    fn activate(&self) {
        log::debug!(target: "state", "{} activated", self.tool_id());
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Apply `op` voxel by voxel. B must match A's dims when the operation
/// reads it.
pub fn compute(op: Operation, a: &LayerData, b: Option<&LayerData>) -> Result<LayerData, String> {
    if !a.is_consistent() {
        return Err("volume A is malformed".into());
    }
    let values = match (op.needs_b(), b) {
        (false, _) => a.values.iter().map(|&x| op.apply(x, 0.0)).collect(),
        (true, None) => return Err(format!("{} needs volume B", op)),
        (true, Some(b)) => {
            if b.dims != a.dims || !b.is_consistent() {
                return Err(format!(
                    "volume B dims {:?} do not match volume A dims {:?}",
                    b.dims, a.dims
                ));
            }
            a.values
                .iter()
                .zip(&b.values)
                .map(|(&x, &y)| op.apply(x, y))
                .collect()
        }
    };
    Ok(LayerData { dims: a.dims, values })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume(values: &[f32]) -> LayerData {
        LayerData {
            dims: [values.len(), 1, 1],
            values: values.to_vec(),
        }
    }

    #[test]
    fn test_parses_expressions_loosely() {
        assert_eq!(" a + b ".parse::<Operation>(), Ok(Operation::Add));
        assert_eq!("max(A, B)".parse::<Operation>(), Ok(Operation::Max));
        assert_eq!("-A".parse::<Operation>(), Ok(Operation::Negate));
        assert!("A/B".parse::<Operation>().is_err());
        assert_eq!(Operation::Min.to_string().parse::<Operation>(), Ok(Operation::Min));
    }

    #[test]
    fn test_compute_voxelwise() {
        let a = volume(&[1.0, 2.0, 3.0]);
        let b = volume(&[3.0, 2.0, 1.0]);
        assert_eq!(compute(Operation::Subtract, &a, Some(&b)).unwrap().values, vec![-2.0, 0.0, 2.0]);
        assert_eq!(compute(Operation::Max, &a, Some(&b)).unwrap().values, vec![3.0, 2.0, 3.0]);
        assert_eq!(compute(Operation::Negate, &a, None).unwrap().values, vec![-1.0, -2.0, -3.0]);
    }

    #[test]
    fn test_compute_rejects_mismatched_volumes() {
        let a = volume(&[1.0, 2.0]);
        assert!(compute(Operation::Add, &a, Some(&volume(&[1.0]))).is_err());
        assert!(compute(Operation::Add, &a, None).is_err());
    }

    #[test]
    fn test_target_constraint_matches_volume_a() {
        let engine = Arc::new(crate::state::StateEngine::new());
        let layers = LayerManager::new(engine, [2, 1, 1]);
        let add = |name: &str, kind: LayerKind, dims: [usize; 3]| {
            let layer = Layer::new(layers.allocate_id(), name, kind, Some(LayerData::zeroed(dims)));
            layers.insert_layer(Arc::clone(&layer));
            layer.id()
        };
        let a = add("a", LayerKind::Data, [2, 1, 1]);
        let same = add("same", LayerKind::Data, [2, 1, 1]);
        let _mask = add("mask", LayerKind::Mask, [2, 1, 1]);
        let _bigger = add("bigger", LayerKind::Data, [3, 1, 1]);

        let filter = ArithmeticFilter::new("arithmeticfilter_1");
        assert!(filter.target_constraint(&layers).is_empty());
        filter.volume_a.set(Some(a));
        assert_eq!(filter.target_constraint(&layers), vec![a, same]);
        filter.volume_a.set(Some(LayerId::new(40)));
        assert!(filter.target_constraint(&layers).is_empty());
    }

    #[test]
    fn test_output_follows_replace_state() {
        let filter = ArithmeticFilter::new("arithmeticfilter_1");
        let a = LayerId::new(2);
        assert_eq!(filter.output(a, "ct"), FilterOutput::NewLayer("ct (A+B)".into()));
        filter.replace.set(true);
        assert_eq!(filter.output(a, "ct"), FilterOutput::Replace(a));
        assert_eq!(filter.operation(), Ok(Operation::Add));
    }
}
