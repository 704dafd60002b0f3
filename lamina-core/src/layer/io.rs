//! The boundary to file codecs. Importers produce layer volumes, exporters
//! consume them; the codecs themselves live outside this crate.

use std::sync::Arc;

use lamina_types::{LayerData, LayerIoDescriptor, LayerIoMode, LayerKind};

/// One layer read by an importer, not yet inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedLayer {
    pub name: String,
    pub kind: LayerKind,
    pub data: LayerData,
}

pub trait LayerImporter: Send {
    fn descriptor(&self) -> &LayerIoDescriptor;

    /// Read the source. Runs on the dispatcher thread inside an action, so
    /// implementations should have done their slow I/O up front.
    fn import(&mut self, mode: LayerIoMode) -> Result<Vec<ImportedLayer>, String>;
}

/// A layer handed to an exporter: its current name, kind and volume.
#[derive(Debug, Clone)]
pub struct ExportedLayer {
    pub name: String,
    pub kind: LayerKind,
    pub data: Arc<LayerData>,
}

pub trait LayerExporter: Send {
    fn descriptor(&self) -> &LayerIoDescriptor;

    fn export(&mut self, layers: &[ExportedLayer], mode: LayerIoMode) -> Result<(), String>;
}

/// Check that `mode` suits a set of layer kinds. Mask modes only accept
/// mask layers; data mode takes exactly one data layer.
pub fn check_export_kinds(mode: LayerIoMode, kinds: &[LayerKind]) -> Result<(), String> {
    if kinds.is_empty() {
        return Err("nothing to export".into());
    }
    if mode.produces_masks() {
        if kinds.iter().any(|k| *k != LayerKind::Mask) {
            return Err(format!("{} export only accepts mask layers", mode.as_str()));
        }
        if mode == LayerIoMode::SingleMask && kinds.len() != 1 {
            return Err("single_mask export takes exactly one layer".into());
        }
        return Ok(());
    }
    match kinds {
        [LayerKind::Data] => Ok(()),
        [_] => Err("data export needs a data layer".into()),
        _ => Err("data export takes exactly one layer".into()),
    }
}
