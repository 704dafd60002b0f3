#![allow(dead_code)]
//! Test harness utilities for lamina-core integration tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use lamina_core::action::{ActionHandle, ChannelContext, ContextEvent};
use lamina_core::actions::{ImportLayer, NewLayer};
use lamina_core::layer::io::{ImportedLayer, LayerImporter};
use lamina_core::layer::LayerHandle;
use lamina_core::state::{StateHandle, StateValue, Subscription};
use lamina_core::{ActionDispatcher, AppState, Config, LayerData, LayerIoDescriptor, LayerIoMode, LayerKind};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// An application with its own dispatcher thread.
pub struct Harness {
    pub dispatcher: ActionDispatcher,
    pub app: AppState,
}

pub fn spawn_app() -> Harness {
    let config = Config::default();
    let dispatcher = ActionDispatcher::spawn(&config).unwrap();
    let app = AppState::new(&config, dispatcher.handle());
    Harness { dispatcher, app }
}

/// Post `action` and return the receiving end of its context.
pub fn post(app: &AppState, action: ActionHandle) -> Receiver<ContextEvent> {
    let (context, events) = ChannelContext::new();
    app.dispatcher.post_with_context(action, Box::new(context));
    events
}

/// Post `action` and wait for its final report.
pub fn run(app: &AppState, action: ActionHandle) -> ContextEvent {
    let events = post(app, action);
    wait_final(&events)
}

/// Next report of any kind.
pub fn next_event(events: &Receiver<ContextEvent>) -> ContextEvent {
    events
        .recv_timeout(TIMEOUT)
        .unwrap_or_else(|_| panic!("no report within {:?}", TIMEOUT))
}

/// Skip progress reports until success or error arrives.
pub fn wait_final(events: &Receiver<ContextEvent>) -> ContextEvent {
    loop {
        let event = next_event(events);
        if event.is_final() {
            return event;
        }
    }
}

/// Create a data layer through the dispatcher and return it.
pub fn add_layer(app: &AppState, name: &str) -> LayerHandle {
    let event = run(app, NewLayer::create(&app.layers, name, LayerKind::Data, Some([2, 2, 1])));
    layer_from(app, event)
}

/// Import a data layer holding `values` (dims `[len, 1, 1]`).
pub fn import_layer(app: &AppState, name: &str, values: &[f32]) -> LayerHandle {
    let importer = FixedImporter::new(vec![ImportedLayer {
        name: name.to_string(),
        kind: LayerKind::Data,
        data: LayerData {
            dims: [values.len(), 1, 1],
            values: values.to_vec(),
        },
    }]);
    let event = run(app, ImportLayer::create(&app.layers, Box::new(importer), LayerIoMode::Data));
    layer_from(app, event)
}

fn layer_from(app: &AppState, event: ContextEvent) -> LayerHandle {
    match event {
        ContextEvent::Success(Some(value)) => {
            let id = value.as_layer().expect("action returned a layer id");
            app.layers.get_layer_by_id(id).expect("returned layer exists")
        }
        other => panic!("expected success with a layer id, got {:?}", other),
    }
}

/// Record every value `state` notifies.
pub fn record<T: StateValue>(state: &StateHandle<T>) -> (Arc<Mutex<Vec<T>>>, Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = state.subscribe(move |v: &T| sink.lock().push(v.clone()));
    (seen, sub)
}

/// Poll `condition` until it holds or the timeout passes.
pub fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let start = Instant::now();
    while start.elapsed() < TIMEOUT {
        if condition() {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("timed out waiting for {}", what);
}

pub struct FixedImporter {
    descriptor: LayerIoDescriptor,
    layers: Vec<ImportedLayer>,
}

impl FixedImporter {
    pub fn new(layers: Vec<ImportedLayer>) -> Self {
        Self {
            descriptor: LayerIoDescriptor::new("fixed", "fix", &LayerIoMode::ALL),
            layers,
        }
    }
}

impl LayerImporter for FixedImporter {
    fn descriptor(&self) -> &LayerIoDescriptor {
        &self.descriptor
    }

    fn import(&mut self, _mode: LayerIoMode) -> Result<Vec<ImportedLayer>, String> {
        Ok(std::mem::take(&mut self.layers))
    }
}
