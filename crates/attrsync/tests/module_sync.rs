//! Tests for modules running against a live registry and preference store.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use attrsync::module::{AttributeEvent, HookCall, MenuItem, Module, ModuleHooks, ModuleMessage};
use attrsync::{
    AppConfig, Application, FloatOptions, Hotkey, HotkeyEvent, KeypressMessage, ModelEvent, NodeTarget,
    PreferenceMessage, RegistryError, RegistryMessage, Role,
};
use serde_json::{Value, json};
use uuid::Uuid;

use common::{WAIT, child_count, init_tracing, probe, set_value, test_config, value_of, wait_until};

fn volume_module(app: &Application, name: &str) -> Module {
    let mut module = app.create_module(name);
    module.add_float_attribute("Volume", "Vol", 1.0, FloatOptions::range(0.0, 2.0));
    module
}

#[test]
fn test_linked_value_follows() {
    init_tracing();
    let app = Application::new(test_config()).unwrap();
    let a = app.spawn_module(volume_module(&app, "a"), ()).unwrap();
    let b = app.spawn_module(volume_module(&app, "b"), ()).unwrap();

    a.send(ModuleMessage::Link {
        peer: b.clone(),
        both_ways: false,
        all_attrs: true,
        initial_push_sync: false,
    })
    .unwrap();
    set_value(&a, "Volume", json!(0.5));

    assert!(wait_until(WAIT, || value_of(&b, "Volume") == json!(0.5)));

    // one-way: b does not drive a
    set_value(&b, "Volume", json!(1.5));
    assert!(wait_until(WAIT, || value_of(&b, "Volume") == json!(1.5)));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(value_of(&a, "Volume"), json!(0.5));
}

#[test]
fn test_two_way_link_does_not_echo() {
    init_tracing();
    let app = Application::new(test_config()).unwrap();
    let a = app.spawn_module(volume_module(&app, "a"), ()).unwrap();
    let b = app.spawn_module(volume_module(&app, "b"), ()).unwrap();
    let events = probe::<AttributeEvent>("a-events");
    a.send(ModuleMessage::JoinEvents(events.recipient())).unwrap();

    a.send(ModuleMessage::Link {
        peer: b.clone(),
        both_ways: true,
        all_attrs: true,
        initial_push_sync: false,
    })
    .unwrap();
    // let the reverse link settle before changing values
    thread::sleep(Duration::from_millis(50));
    set_value(&a, "Volume", json!(0.25));

    assert!(wait_until(WAIT, || value_of(&b, "Volume") == json!(0.25)));
    thread::sleep(Duration::from_millis(200));
    let changes = events.with_events(|events| {
        events
            .iter()
            .filter(|e| matches!(e, AttributeEvent::Changed { role: Role::Value, .. }))
            .count()
    });
    assert_eq!(changes, 1);

    // and the other direction
    set_value(&b, "Volume", json!(0.75));
    assert!(wait_until(WAIT, || value_of(&a, "Volume") == json!(0.75)));
}

#[test]
fn test_initial_push_sync_and_partial_links() {
    init_tracing();
    let app = Application::new(test_config()).unwrap();
    let mut source = volume_module(&app, "source");
    let shared = source.add_boolean_attribute("Shared", "Sh", true);
    source.set_partially_linked(shared, true).unwrap();
    source.set_attribute_value("Volume", 0.1).unwrap();

    let mut target = volume_module(&app, "target");
    target.add_boolean_attribute("Shared", "Sh", false);

    let source = app.spawn_module(source, ()).unwrap();
    let target = app.spawn_module(target, ()).unwrap();
    source
        .send(ModuleMessage::Link {
            peer: target.clone(),
            both_ways: false,
            all_attrs: false,
            initial_push_sync: true,
        })
        .unwrap();

    // only the partially linked attribute travels
    assert!(wait_until(WAIT, || value_of(&target, "Shared") == json!(true)));
    set_value(&source, "Volume", json!(0.3));
    set_value(&source, "Shared", json!(false));
    assert!(wait_until(WAIT, || value_of(&target, "Shared") == json!(false)));
    assert_eq!(value_of(&target, "Volume"), json!(1.0));
}

#[test]
fn test_menu_toggle_updates_registry() {
    init_tracing();
    let app = Application::new(test_config()).unwrap();
    let client = app.registry_client();
    let mut playhead = app.create_module("playhead");
    let looping = playhead.add_boolean_attribute("Loop", "Loop", false);
    let node = playhead
        .insert_menu_item(MenuItem::new("main menu", "Loop", "Playback").attribute(looping))
        .unwrap();
    let playhead = app.spawn_module(playhead, ()).unwrap();

    let checked = |client: &attrsync::RegistryClient| {
        client
            .node_data("main menu", NodeTarget::Node(node))
            .ok()
            .and_then(|data| data.get("is_checked").cloned())
    };
    assert!(wait_until(WAIT, || checked(&client) == Some(json!(false))));

    client
        .activate_menu_node("main menu", NodeTarget::Node(node), Value::Null)
        .unwrap();
    assert!(wait_until(WAIT, || checked(&client) == Some(json!(true))));
    assert_eq!(value_of(&playhead, "Loop"), json!(true));

    let menu = client.model_data("main menu").unwrap();
    assert_eq!(child_count(&menu), 1);
    assert_eq!(menu["children"][0]["name"], "Playback");
    assert_eq!(child_count(&menu["children"][0]), 1);
    assert_eq!(menu["children"][0]["children"][0]["name"], "Loop");

    // changing the value directly refreshes the menu node too
    set_value(&playhead, "Loop", json!(false));
    assert!(wait_until(WAIT, || checked(&client) == Some(json!(false))));
}

#[test]
fn test_every_action_press_reaches_the_toolbar() {
    init_tracing();
    let app = Application::new(test_config()).unwrap();
    let client = app.registry_client();
    let mut viewer = app.create_module("viewer");
    let reset = viewer.add_action_attribute("Reset", "Rst");
    viewer.expose_attribute_in_model_data(reset, "toolbar", true).unwrap();
    let node = viewer
        .insert_menu_item(MenuItem::new("main menu", "", "View").attribute(reset))
        .unwrap();
    let _viewer = app.spawn_module(viewer, ()).unwrap();
    assert!(wait_until(WAIT, || {
        client.node_data("main menu", NodeTarget::Node(node)).is_ok()
            && client.node_data("toolbar", NodeTarget::Attribute(reset)).is_ok()
    }));

    let toolbar = probe::<ModelEvent>("toolbar-client");
    client
        .register_model("toolbar", Value::Null, None, Some(toolbar.recipient()))
        .unwrap();
    for _ in 0..2 {
        client
            .activate_menu_node("main menu", NodeTarget::Node(node), Value::Null)
            .unwrap();
    }

    let presses = || {
        toolbar.with_events(|events| {
            events
                .iter()
                .filter(|event| {
                    matches!(event, ModelEvent::NodeDataChanged { role: Some(role), value, .. }
                        if role == "activated" && *value == json!(true))
                })
                .count()
        })
    };
    assert!(wait_until(WAIT, || presses() == 2));
    assert!(wait_until(WAIT, || {
        client
            .node_data("toolbar", NodeTarget::Attribute(reset))
            .is_ok_and(|data| data["activated"] == json!(false))
    }));
}

#[test]
fn test_toolbar_edits_flow_back() {
    init_tracing();
    let app = Application::new(test_config()).unwrap();
    let client = app.registry_client();
    let mut viewer = app.create_module("viewer");
    let exposure = viewer.add_float_attribute("Exposure", "Exp", 0.0, FloatOptions::default());
    viewer
        .expose_attribute_in_model_data(exposure, "viewer toolbar", true)
        .unwrap();
    let viewer = app.spawn_module(viewer, ()).unwrap();

    let node_value = |client: &attrsync::RegistryClient| {
        client
            .node_data("viewer toolbar", NodeTarget::Attribute(exposure))
            .ok()
            .and_then(|data| data.get("value").cloned())
    };
    assert!(wait_until(WAIT, || node_value(&client) == Some(json!(0.0))));

    // module to model
    set_value(&viewer, "Exposure", json!(1.5));
    assert!(wait_until(WAIT, || node_value(&client) == Some(json!(1.5))));

    // model to module
    client
        .set_node_data(
            "viewer toolbar",
            NodeTarget::Attribute(exposure),
            Some("value"),
            json!(-2.0),
            None,
        )
        .unwrap();
    assert!(wait_until(WAIT, || value_of(&viewer, "Exposure") == json!(-2.0)));
}

#[test]
fn test_concurrent_edits_from_two_modules() {
    init_tracing();
    let app = Application::new(test_config()).unwrap();
    let client = app.registry_client();
    let mut uuids = Vec::new();
    let mut modules = Vec::new();
    for name in ["left", "right"] {
        let mut module = app.create_module(name);
        let uuid = module.add_float_attribute("Gain", "G", 0.0, FloatOptions::default());
        module.expose_attribute_in_model_data(uuid, "mixer", true).unwrap();
        uuids.push(uuid);
        modules.push(app.spawn_module(module, ()).unwrap());
    }

    let writers: Vec<_> = modules
        .iter()
        .cloned()
        .map(|module| {
            thread::spawn(move || {
                for i in 1..=50 {
                    set_value(&module, "Gain", json!(f64::from(i)));
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    for uuid in uuids {
        assert!(wait_until(WAIT, || {
            client
                .node_data("mixer", NodeTarget::Attribute(uuid))
                .is_ok_and(|data| data["value"] == json!(50.0))
        }));
    }
    assert_eq!(child_count(&client.model_data("mixer").unwrap()), 2);
}

#[test]
fn test_teardown_withdraws_projections() {
    init_tracing();
    let app = Application::new(test_config()).unwrap();
    let client = app.registry_client();
    let mut module = app.create_module("transient");
    let a = module.add_boolean_attribute("A", "A", false);
    let b = module.add_boolean_attribute("B", "B", false);
    module.expose_attribute_in_model_data(a, "toolbar", true).unwrap();
    module.expose_attribute_in_model_data(b, "toolbar", true).unwrap();
    let node = module
        .insert_menu_item(MenuItem::new("menu", "", "Tools").attribute(a))
        .unwrap();
    let module = app.spawn_module(module, ()).unwrap();

    assert!(wait_until(WAIT, || {
        client.model_data("toolbar").is_ok_and(|m| child_count(&m) == 2)
            && client.node_data("menu", NodeTarget::Node(node)).is_ok()
    }));

    assert!(app.stop_module(module.id()));
    assert!(!app.stop_module(module.id()));
    assert_eq!(app.module_count(), 0);

    assert!(wait_until(WAIT, || {
        client.model_data("toolbar").is_ok_and(|m| child_count(&m) == 0)
    }));
    assert!(wait_until(WAIT, || matches!(
        client.node_data("menu", NodeTarget::Node(node)),
        Err(RegistryError::NodeNotFound { .. })
    )));
}

#[test]
fn test_preferences_load_and_debounce() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.json");
    std::fs::write(&path, r#"{"ui": {"zoom": {"value": 4.0}}}"#).unwrap();

    let app = Application::new(test_config().preferences_file(&path)).unwrap();
    let mut viewer = app.create_module("viewer");
    let zoom = viewer.add_float_attribute("Zoom", "Z", 1.0, FloatOptions::default());
    viewer.set_role_data(zoom, Role::PreferencePath, "/ui/zoom", false).unwrap();
    let viewer = app.spawn_module(viewer, ()).unwrap();
    let prefs = app.preferences();

    // stored value applied on attach
    assert_eq!(value_of(&viewer, "Zoom"), json!(4.0));

    let stored = || {
        prefs
            .request(
                |reply| PreferenceMessage::GetValue {
                    path: "/ui/zoom".into(),
                    reply,
                },
                common::TIMEOUT,
            )
            .unwrap()
            .ok()
    };
    for zoom in [1.0, 2.0, 3.0] {
        set_value(&viewer, "Zoom", json!(zoom));
    }
    assert_eq!(value_of(&viewer, "Zoom"), json!(3.0));
    assert_eq!(stored(), Some(json!(4.0)));
    assert!(wait_until(WAIT, || stored() == Some(json!(3.0))));

    // external preference changes reach the attribute
    prefs
        .send(PreferenceMessage::SetValue {
            value: json!(8.0),
            path: "/ui/zoom".into(),
            create_if_missing: false,
            broadcast: true,
        })
        .unwrap();
    assert!(wait_until(WAIT, || value_of(&viewer, "Zoom") == json!(8.0)));

    drop(app);
    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved["ui"]["zoom"]["value"], json!(8.0));
}

/// Keeps "Double" at twice "Value" and counts value changes.
struct DoublingHooks {
    changes: Arc<AtomicUsize>,
}

impl ModuleHooks for DoublingHooks {
    fn attribute_changed(&mut self, module: &mut Module, attribute: Uuid, role: Role) {
        if role != Role::Value || module.attribute(attribute).map(|a| a.title()) != Some("Value") {
            return;
        }
        self.changes.fetch_add(1, Ordering::SeqCst);
        let value: f64 = module.get_value(attribute).unwrap();
        module.set_attribute_value("Double", value * 2.0).unwrap();
    }
}

#[test]
fn test_hooks_can_change_the_module() {
    init_tracing();
    let app = Application::new(test_config()).unwrap();
    let mut module = app.create_module("doubler");
    module.add_float_attribute("Value", "V", 0.0, FloatOptions::default());
    module.add_float_attribute("Double", "D", 0.0, FloatOptions::default());
    let changes = Arc::new(AtomicUsize::new(0));
    let module = app
        .spawn_module(
            module,
            DoublingHooks {
                changes: changes.clone(),
            },
        )
        .unwrap();

    set_value(&module, "Value", json!(21.0));
    assert_eq!(value_of(&module, "Double"), json!(42.0));
    assert_eq!(changes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_hotkey_activates_menu_item() {
    init_tracing();
    let keypress = probe::<KeypressMessage>("keypress");
    let app = Application::new(test_config())
        .unwrap()
        .with_keypress(keypress.recipient());
    let mut playhead = app.create_module("playhead");
    let looping = playhead.add_boolean_attribute("Loop", "Loop", false);
    let hotkey = playhead.register_hotkey(Hotkey::new(76, 0, "Toggle Loop"));
    playhead
        .insert_menu_item(
            MenuItem::new("main menu", "Loop", "Playback")
                .attribute(looping)
                .hotkey(hotkey),
        )
        .unwrap();
    let playhead = app.spawn_module(playhead, ()).unwrap();

    assert!(wait_until(WAIT, || keypress.len() == 1));
    let watcher = match keypress.take().pop() {
        Some(KeypressMessage::RegisterHotkey { hotkey: registered, watcher }) => {
            assert_eq!(registered.uuid, hotkey);
            watcher
        }
        None => panic!("no hotkey registration"),
    };

    // not connected to the UI: treated as a release
    watcher.tell(HotkeyEvent {
        hotkey,
        activated: true,
        context: "viewport".into(),
    });
    thread::sleep(Duration::from_millis(100));
    assert_eq!(value_of(&playhead, "Loop"), json!(false));

    playhead.send(ModuleMessage::ConnectToUi).unwrap();
    watcher.tell(HotkeyEvent {
        hotkey,
        activated: true,
        context: "viewport".into(),
    });
    assert!(wait_until(WAIT, || value_of(&playhead, "Loop") == json!(true)));
}

#[test]
fn test_registry_model_round_trips_through_preferences() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.json");
    std::fs::write(
        &path,
        r#"{"panels": {"layout": {"value": {"children": [{"name": "viewer"}]}}}}"#,
    )
    .unwrap();
    let app = Application::new(test_config().preferences_file(&path)).unwrap();
    let client = app.registry_client();

    let model = client
        .register_model("layout", Value::Null, Some("/panels/layout"), None)
        .unwrap();
    assert_eq!(model["children"][0]["name"], "viewer");

    app.registry()
        .send(RegistryMessage::InsertRows {
            model: "layout".into(),
            path: String::new(),
            row: 1,
            count: 1,
            data: json!({"name": "timeline"}),
            requester: None,
        })
        .unwrap();

    let prefs = app.preferences();
    assert!(wait_until(WAIT, || {
        prefs
            .request(
                |reply| PreferenceMessage::GetValue {
                    path: "/panels/layout".into(),
                    reply,
                },
                common::TIMEOUT,
            )
            .unwrap()
            .is_ok_and(|layout| child_count(&layout) == 2)
    }));
}

#[test]
fn test_detached_module_hook_queue() {
    let mut module = Module::new("solo", attrsync::AppContext::new(AppConfig::default()));
    let gain = module.add_float_attribute("Gain", "G", 1.0, FloatOptions::default());
    module.set_attribute_value(gain, 0.5).unwrap();
    module.connect_to_ui();
    assert_eq!(
        module.take_hook_calls(),
        vec![
            HookCall::AttributeChanged {
                attribute: gain,
                role: Role::Value
            },
            HookCall::ConnectedToUiChanged(true),
        ]
    );
}
