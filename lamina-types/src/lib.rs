//! # lamina-types
//!
//! Shared type definitions for the lamina workspace: identifiers, typed action
//! parameter values and the descriptors used at the layer import/export
//! boundary. Nothing in here knows about threads or dispatch.

mod layer;
mod layer_io;
mod param;

pub use layer::{LayerData, LayerKind};
pub use layer_io::{LayerIoDescriptor, LayerIoMode};
pub use param::ParamValue;

/// Unique identifier for a layer. Displayed as `layer_N`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct LayerId(u32);

impl LayerId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "layer_{}", self.0)
    }
}

impl std::str::FromStr for LayerId {
    type Err = String;

    /// Accepts both the bare number (`3`) and the display form (`layer_3`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s.strip_prefix("layer_").unwrap_or(s);
        digits
            .parse::<u32>()
            .map(LayerId)
            .map_err(|_| format!("'{}' is not a layer id", s))
    }
}
