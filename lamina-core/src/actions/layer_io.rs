use std::fmt;
use std::sync::Arc;

use lamina_types::{LayerId, LayerIoMode, ParamValue};

use super::{check_unlocked, invalid_layer};
use crate::action::{Action, ActionContext, ActionHandle, RunResult, Validation};
use crate::dispatch::DispatcherHandle;
use crate::layer::io::{check_export_kinds, ExportedLayer, LayerExporter, LayerImporter};
use crate::layer::{Layer, LayerHandle, LayerManager};

/// Run an importer and insert what it produced. The last imported layer
/// becomes active and is returned.
pub struct ImportLayer {
    importer: Box<dyn LayerImporter>,
    mode: LayerIoMode,
    manager: Arc<LayerManager>,
}

impl ImportLayer {
    pub const TYPE_NAME: &'static str = "ImportLayer";

    pub fn create(manager: &Arc<LayerManager>, importer: Box<dyn LayerImporter>, mode: LayerIoMode) -> ActionHandle {
        Box::new(Self {
            importer,
            mode,
            manager: Arc::clone(manager),
        })
    }

    pub fn dispatch(
        dispatcher: &DispatcherHandle,
        manager: &Arc<LayerManager>,
        importer: Box<dyn LayerImporter>,
        mode: LayerIoMode,
    ) {
        dispatcher.post(Self::create(manager, importer, mode));
    }
}

impl fmt::Debug for ImportLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportLayer")
            .field("importer", &self.importer.descriptor().name)
            .field("mode", &self.mode)
            .finish()
    }
}

impl Action for ImportLayer {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn validate(&mut self, _ctx: &dyn ActionContext) -> Validation {
        let descriptor = self.importer.descriptor();
        if descriptor.supports(self.mode) {
            Validation::Ready
        } else {
            Validation::Invalid(format!("{} cannot import as {}", descriptor.name, self.mode.as_str()))
        }
    }

    fn run(&mut self, ctx: &dyn ActionContext) -> RunResult {
        let imported = self.importer.import(self.mode)?;
        if imported.is_empty() {
            return Err(format!("{} produced no layers", self.importer.descriptor().name));
        }
        if let Some(bad) = imported.iter().find(|l| !l.data.is_consistent()) {
            return Err(format!("imported layer '{}' is malformed", bad.name));
        }

        let mut last = None;
        for layer in imported {
            let layer = Layer::new(self.manager.allocate_id(), &layer.name, layer.kind, Some(layer.data));
            self.manager.insert_layer(Arc::clone(&layer));
            last = Some(layer);
        }
        let last = last.ok_or("no layer imported")?;
        self.manager.set_active_layer(&last);
        ctx.report_message(&format!("imported through {}", self.importer.descriptor().name));
        Ok(Some(last.id().into()))
    }

    fn params(&self) -> Vec<(&'static str, ParamValue)> {
        vec![
            ("importer", self.importer.descriptor().name.clone().into()),
            ("mode", self.mode.as_str().into()),
        ]
    }
}

/// Hand the data of one or more layers to an exporter.
pub struct ExportLayer {
    layer_ids: Vec<LayerId>,
    layers: Vec<LayerHandle>,
    exporter: Box<dyn LayerExporter>,
    mode: LayerIoMode,
    manager: Arc<LayerManager>,
}

impl ExportLayer {
    pub const TYPE_NAME: &'static str = "ExportLayer";

    pub fn create(
        manager: &Arc<LayerManager>,
        layers: &[LayerHandle],
        exporter: Box<dyn LayerExporter>,
        mode: LayerIoMode,
    ) -> ActionHandle {
        Box::new(Self {
            layer_ids: layers.iter().map(|l| l.id()).collect(),
            layers: Vec::new(),
            exporter,
            mode,
            manager: Arc::clone(manager),
        })
    }

    pub fn dispatch(
        dispatcher: &DispatcherHandle,
        manager: &Arc<LayerManager>,
        layers: &[LayerHandle],
        exporter: Box<dyn LayerExporter>,
        mode: LayerIoMode,
    ) {
        dispatcher.post(Self::create(manager, layers, exporter, mode));
    }
}

impl fmt::Debug for ExportLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportLayer")
            .field("layers", &self.layer_ids)
            .field("exporter", &self.exporter.descriptor().name)
            .field("mode", &self.mode)
            .finish()
    }
}

impl Action for ExportLayer {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn validate(&mut self, _ctx: &dyn ActionContext) -> Validation {
        let descriptor = self.exporter.descriptor();
        if !descriptor.supports(self.mode) {
            return Validation::Invalid(format!("{} cannot export as {}", descriptor.name, self.mode.as_str()));
        }

        let mut resolved = Vec::with_capacity(self.layer_ids.len());
        for &id in &self.layer_ids {
            match self.manager.get_layer_by_id(id) {
                Some(layer) if layer.data().is_some() => resolved.push(layer),
                Some(_) => return Validation::Invalid(format!("{} has no data", id)),
                None => return invalid_layer(id),
            }
        }
        let kinds: Vec<_> = resolved.iter().map(|l| l.kind()).collect();
        if let Err(e) = check_export_kinds(self.mode, &kinds) {
            return Validation::Invalid(e);
        }

        let validation = check_unlocked(&resolved);
        self.layers = resolved;
        validation
    }

    fn run(&mut self, _ctx: &dyn ActionContext) -> RunResult {
        let mut exported = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let data = layer.data().ok_or_else(|| format!("{} has no data", layer.id()))?;
            exported.push(ExportedLayer {
                name: layer.name.get(),
                kind: layer.kind(),
                data,
            });
        }
        self.exporter.export(&exported, self.mode)?;
        Ok(None)
    }

    fn params(&self) -> Vec<(&'static str, ParamValue)> {
        let mut params: Vec<(&'static str, ParamValue)> =
            self.layer_ids.iter().map(|id| ("layer", (*id).into())).collect();
        params.push(("exporter", self.exporter.descriptor().name.clone().into()));
        params.push(("mode", self.mode.as_str().into()));
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::NullContext;
    use crate::layer::io::ImportedLayer;
    use crate::state::StateEngine;
    use lamina_types::{LayerData, LayerIoDescriptor, LayerKind};
    use parking_lot::Mutex;

    struct FixedImporter {
        descriptor: LayerIoDescriptor,
        layers: Vec<ImportedLayer>,
    }

    impl LayerImporter for FixedImporter {
        fn descriptor(&self) -> &LayerIoDescriptor {
            &self.descriptor
        }
        fn import(&mut self, _mode: LayerIoMode) -> Result<Vec<ImportedLayer>, String> {
            Ok(std::mem::take(&mut self.layers))
        }
    }

    struct RecordingExporter {
        descriptor: LayerIoDescriptor,
        written: Arc<Mutex<Vec<String>>>,
    }

    impl LayerExporter for RecordingExporter {
        fn descriptor(&self) -> &LayerIoDescriptor {
            &self.descriptor
        }
        fn export(&mut self, layers: &[ExportedLayer], _mode: LayerIoMode) -> Result<(), String> {
            self.written.lock().extend(layers.iter().map(|l| l.name.clone()));
            Ok(())
        }
    }

    fn manager() -> Arc<LayerManager> {
        Arc::new(LayerManager::new(Arc::new(StateEngine::new()), [2, 2, 2]))
    }

    fn mask(name: &str) -> ImportedLayer {
        ImportedLayer {
            name: name.into(),
            kind: LayerKind::Mask,
            data: LayerData::zeroed([2, 2, 2]),
        }
    }

    #[test]
    fn test_import_inserts_all_and_activates_last() {
        let manager = manager();
        let importer = FixedImporter {
            descriptor: LayerIoDescriptor::new("labels", "nrrd", &[LayerIoMode::LabelMask]),
            layers: vec![mask("left"), mask("right")],
        };
        let mut action = ImportLayer::create(&manager, Box::new(importer), LayerIoMode::LabelMask);
        assert!(matches!(action.validate(&NullContext), Validation::Ready));
        let id = action.run(&NullContext).unwrap().and_then(|v| v.as_layer()).unwrap();
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.active_layer.get(), Some(id));
    }

    #[test]
    fn test_import_rejects_unsupported_mode() {
        let importer = FixedImporter {
            descriptor: LayerIoDescriptor::new("raw", "raw", &[LayerIoMode::Data]),
            layers: Vec::new(),
        };
        let mut action = ImportLayer::create(&manager(), Box::new(importer), LayerIoMode::BitplaneMask);
        assert!(matches!(action.validate(&NullContext), Validation::Invalid(_)));
    }

    #[test]
    fn test_export_waits_for_locked_layers() {
        let manager = manager();
        let layer = Layer::new(manager.allocate_id(), "skull", LayerKind::Mask, Some(LayerData::zeroed([2, 2, 2])));
        manager.insert_layer(Arc::clone(&layer));
        let written = Arc::new(Mutex::new(Vec::new()));
        let exporter = RecordingExporter {
            descriptor: LayerIoDescriptor::new("masks", "nrrd", &[LayerIoMode::SingleMask]),
            written: Arc::clone(&written),
        };
        let mut action = ExportLayer::create(&manager, &[Arc::clone(&layer)], Box::new(exporter), LayerIoMode::SingleMask);

        assert!(layer.resource_lock().try_lock("filter"));
        assert!(matches!(action.validate(&NullContext), Validation::Blocked(_)));
        layer.resource_lock().unlock("filter");
        assert!(matches!(action.validate(&NullContext), Validation::Ready));
        action.run(&NullContext).unwrap();
        assert_eq!(*written.lock(), vec!["skull".to_string()]);
    }
}
