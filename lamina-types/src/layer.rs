use serde::{Deserialize, Serialize};

/// What a layer's volume represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayerKind {
    #[default]
    Data,
    Mask,
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Data => "data",
            LayerKind::Mask => "mask",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "data" => Some(LayerKind::Data),
            "mask" => Some(LayerKind::Mask),
            _ => None,
        }
    }
}

/// Voxel payload of a layer. Opaque to the dispatch framework; importers
/// produce it, exporters and filters consume it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerData {
    pub dims: [usize; 3],
    pub values: Vec<f32>,
}

impl LayerData {
    /// A zero-filled volume of the given dimensions.
    pub fn zeroed(dims: [usize; 3]) -> Self {
        let len = dims.iter().product();
        Self { dims, values: vec![0.0; len] }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when `dims` agrees with the number of stored values.
    pub fn is_consistent(&self) -> bool {
        self.dims.iter().product::<usize>() == self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_volume_is_consistent() {
        let data = LayerData::zeroed([2, 3, 4]);
        assert_eq!(data.len(), 24);
        assert!(data.is_consistent());
        assert!(data.values.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_kind_parse_is_case_insensitive() {
        assert_eq!(LayerKind::parse("MASK"), Some(LayerKind::Mask));
        assert_eq!(LayerKind::parse("volume"), None);
    }
}
