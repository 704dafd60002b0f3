mod common;

use std::sync::Arc;

use parking_lot::Mutex;

use lamina_core::action::{ActionArgs, ChannelContext, ContextEvent, NullContext};
use lamina_core::{ActionError, ActionRegistry, ParamValue};

use common::{add_layer, spawn_app, wait_final};

#[test]
fn test_exported_actions_parse_back() {
    let harness = spawn_app();
    let app = &harness.app;
    add_layer(app, "a");
    let registry = ActionRegistry::with_builtin_actions();

    for line in [
        "ActivateLayer layer=layer_1",
        "NewLayer name=\"left lung\" kind=mask dims=4x4x2",
        "NewLayer name=brain kind=data",
        "DeleteLayer layer=layer_1",
        "Set stateid=layer_1::name value=\"\\\"quoted\\\" name\"",
        "ShowWindow windowid=history",
        "CloseWindow windowid=history",
        "OpenTool tooltype=ArithmeticFilter",
        "RunArithmeticFilter toolid=arithmeticfilter_1",
    ] {
        let action = registry.create_from_string(line, app).unwrap();
        assert_eq!(action.export_to_string(), line);
        let again = registry.create_from_string(&action.export_to_string(), app).unwrap();
        assert_eq!(again.export_to_string(), line);
    }
}

#[test]
fn test_positional_parameters() {
    let harness = spawn_app();
    let app = &harness.app;
    let registry = ActionRegistry::with_builtin_actions();

    let action = registry.create_from_string("NewLayer brain mask 8x8x8", app).unwrap();
    assert_eq!(action.export_to_string(), "NewLayer name=brain kind=mask dims=8x8x8");
    let action = registry.create_from_string("ActivateLayer 3", app).unwrap();
    assert_eq!(action.export_to_string(), "ActivateLayer layer=layer_3");
}

#[test]
fn test_text_errors_are_reported() {
    let harness = spawn_app();
    let app = &harness.app;
    let registry = ActionRegistry::with_builtin_actions();

    let (context, events) = ChannelContext::new();
    let err = registry.dispatch_string("Frobnicate x=1", app, Box::new(context)).unwrap_err();
    assert_eq!(err, ActionError::UnknownAction("Frobnicate".into()));
    assert!(matches!(events.try_recv(), Ok(ContextEvent::Error(_))));

    assert!(matches!(
        registry.create_from_string("ImportLayer", app),
        Err(ActionError::NotScriptable(_))
    ));
    assert!(matches!(
        registry.create_from_string("ActivateLayer", app),
        Err(ActionError::MissingParameter { .. })
    ));
    assert!(matches!(
        registry.create_from_string("ActivateLayer layer=first", app),
        Err(ActionError::InvalidParameter { .. })
    ));
    assert!(matches!(
        registry.create_from_string("ActivateLayer layer=1 colour=red", app),
        Err(ActionError::InvalidParameter { .. })
    ));
    assert!(matches!(
        registry.create_from_string("NewLayer a kind=volume", app),
        Err(ActionError::InvalidParameter { .. })
    ));
}

#[test]
fn test_dispatch_string_drives_state() {
    let harness = spawn_app();
    let app = &harness.app;
    let registry = ActionRegistry::with_builtin_actions();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let watcher = app.states.watch(move |id, value| sink.lock().push(format!("{}={}", id, value)));

    let (context, events) = ChannelContext::new();
    registry.dispatch_string("NewLayer brain", app, Box::new(context)).unwrap();
    assert_eq!(wait_final(&events), ContextEvent::Success(Some(ParamValue::Layer(lamina_core::LayerId::new(1)))));

    let (context, events) = ChannelContext::new();
    registry
        .dispatch_string("Set layer_1::name \"left lung\"", app, Box::new(context))
        .unwrap();
    assert_eq!(wait_final(&events), ContextEvent::Success(None));
    assert_eq!(app.layers.get_layer_by_id(lamina_core::LayerId::new(1)).unwrap().name.get(), "left lung");

    let (context, events) = ChannelContext::new();
    registry
        .dispatch_string("Set stateid=layer_1::visible value=maybe", app, Box::new(context))
        .unwrap();
    assert!(matches!(wait_final(&events), ContextEvent::Error(_)));

    let (context, events) = ChannelContext::new();
    registry
        .dispatch_string("Set stateid=layer_7::name value=x", app, Box::new(context))
        .unwrap();
    assert_eq!(
        wait_final(&events),
        ContextEvent::Error("StateID: 'layer_7::name' is invalid".into())
    );

    app.states.unwatch(watcher);
    let seen = seen.lock();
    assert!(seen.contains(&"layer_manager::active_layer=1".to_string()));
    assert!(seen.contains(&"layer_1::name=\"left lung\"".to_string()));
}

#[test]
fn test_args_builder_matches_parsed_line() {
    let harness = spawn_app();
    let app = &harness.app;
    let registry = ActionRegistry::with_builtin_actions();
    let built = registry
        .create(ActionArgs::new("ShowWindow").with("windowid", "viewer"), app)
        .unwrap();
    let mut action = registry.create_from_string("ShowWindow viewer", app).unwrap();
    assert_eq!(built.export_to_string(), action.export_to_string());
    assert!(matches!(action.validate(&NullContext), lamina_core::Validation::Ready));
}

#[test]
fn test_manager_bookkeeping_states_are_read_only() {
    let harness = spawn_app();
    let app = &harness.app;
    let layer = add_layer(app, "a");
    assert!(layer.resource_lock().try_lock("filter"));

    for (state_id, value) in [
        ("layer_manager::active_layer", "99"),
        ("layer_manager::active_layer", "1"),
        ("layer_manager::layers", "[1, 2, 3]"),
        ("tool_manager::active_tool", "\"arithmeticfilter_1\""),
        ("tool_manager::tools", "[\"arithmeticfilter_1\"]"),
    ] {
        let (context, events) = ChannelContext::new();
        app.dispatcher
            .post_with_context(lamina_core::actions::Set::create(app, state_id, value), Box::new(context));
        assert_eq!(
            wait_final(&events),
            ContextEvent::Error(format!("StateID: '{}' is read-only", state_id))
        );
    }

    assert_eq!(app.layers.active_layer.get(), Some(layer.id()));
    assert_eq!(app.layers.layer_ids.get(), vec![layer.id()]);
    assert_eq!(app.tools.active_tool.get(), None);
    assert!(app.tools.tool_ids.get().is_empty());
}
