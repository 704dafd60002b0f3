//! Descriptors shared with the layer import/export collaborators.

use serde::{Deserialize, Serialize};

/// How voxel values are interpreted when a file is turned into layers or
/// layers are written back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerIoMode {
    /// Keep the values as a data volume.
    Data,
    /// Every non-zero value belongs to one mask.
    SingleMask,
    /// Every set bit plane becomes its own mask.
    BitplaneMask,
    /// Every distinct value becomes its own mask.
    LabelMask,
}

impl LayerIoMode {
    pub const ALL: [LayerIoMode; 4] = [
        LayerIoMode::Data,
        LayerIoMode::SingleMask,
        LayerIoMode::BitplaneMask,
        LayerIoMode::LabelMask,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerIoMode::Data => "data",
            LayerIoMode::SingleMask => "single_mask",
            LayerIoMode::BitplaneMask => "bitplane_mask",
            LayerIoMode::LabelMask => "label_mask",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }

    pub fn produces_masks(&self) -> bool {
        !matches!(self, LayerIoMode::Data)
    }
}

/// Name, file extension and supported modes of one importer or exporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerIoDescriptor {
    pub name: String,
    pub extension: String,
    pub modes: Vec<LayerIoMode>,
}

impl LayerIoDescriptor {
    pub fn new(name: impl Into<String>, extension: impl Into<String>, modes: &[LayerIoMode]) -> Self {
        Self {
            name: name.into(),
            extension: extension.into(),
            modes: modes.to_vec(),
        }
    }

    pub fn supports(&self, mode: LayerIoMode) -> bool {
        self.modes.contains(&mode)
    }

    /// Case-insensitive match against a file name or bare extension, with or
    /// without the leading dot.
    pub fn matches_extension(&self, file: &str) -> bool {
        let want = self.extension.trim_start_matches('.').to_lowercase();
        let got = file.rsplit('.').next().unwrap_or(file).to_lowercase();
        !want.is_empty() && want == got
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_strings_round_trip() {
        for mode in LayerIoMode::ALL {
            assert_eq!(LayerIoMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(LayerIoMode::parse("Label_Mask"), Some(LayerIoMode::LabelMask));
        assert_eq!(LayerIoMode::parse("invalid"), None);
    }

    #[test]
    fn test_descriptor_matches_extension() {
        let desc = LayerIoDescriptor::new("NRRD", ".nrrd", &[LayerIoMode::Data]);
        assert!(desc.matches_extension("scan.NRRD"));
        assert!(desc.matches_extension("nrrd"));
        assert!(!desc.matches_extension("scan.png"));
        assert!(desc.supports(LayerIoMode::Data));
        assert!(!desc.supports(LayerIoMode::LabelMask));
    }
}
