//! Integration tests for the devtools recorder
//!
//! These tests verify that:
//! - Every observable component operation lands on the timeline
//! - The component tree mirrors the reference registry
//! - The timeline exports as JSON

use pollster::block_on;
use serde_json::{json, Value};
use trellis_core::{ComponentDef, Options, Phase, Projection, RefSpec, Runtime, State};
use trellis_devtools::{Devtools, RecordKind};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("trellis_devtools=debug")
        .with_test_writer()
        .try_init();
}

#[test]
fn test_full_timeline() {
    init_tracing();
    let runtime = Runtime::new();
    let devtools = Devtools::install(&runtime);

    let app = ComponentDef::new("App")
        .state("n", json!(0))
        .build_detached(&runtime, Options::new());
    app.init(State::new()).unwrap();
    let child = block_on(app.set_ref(
        RefSpec::class("child", ComponentDef::new("Child").detached_class()),
        Projection::new(),
    ))
    .unwrap();
    app.broadcast("sync", &[]);
    block_on(app.destroy()).unwrap();

    let app_uid = app.uid().unwrap();
    let kinds: Vec<RecordKind> = devtools
        .records_for(&app_uid)
        .into_iter()
        .map(|record| record.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            RecordKind::State { keys: vec!["n".into()] },
            RecordKind::Phase { phase: Phase::Active },
            RecordKind::RefAttached { id: "child".into(), child: None },
            RecordKind::Broadcast { event: "sync".into() },
            RecordKind::RefReleased { id: "child".into() },
            RecordKind::Phase { phase: Phase::Destroyed },
        ]
    );

    let child_uid = child.uid().unwrap();
    let child_phases: Vec<RecordKind> = devtools
        .records_for(&child_uid)
        .into_iter()
        .map(|record| record.kind)
        .collect();
    assert_eq!(
        child_phases.last(),
        Some(&RecordKind::Phase { phase: Phase::Destroyed })
    );
}

#[test]
fn test_component_tree() {
    let runtime = Runtime::new();
    let app = ComponentDef::new("App").build_detached(&runtime, Options::new());
    app.init(State::new()).unwrap();
    let group = block_on(app.set_ref(
        RefSpec::class("group", ComponentDef::new("Group").detached_class()),
        Projection::new(),
    ))
    .unwrap();
    block_on(group.set_ref(
        RefSpec::class("leaf", ComponentDef::new("Leaf").detached_class()),
        Projection::new(),
    ))
    .unwrap();

    let tree = Devtools::component_tree(&app);
    assert_eq!(tree.id, None);
    assert_eq!(tree.name, "App");
    assert_eq!(tree.children.len(), 1);
    assert_eq!(tree.children[0].id.as_deref(), Some("group"));
    assert_eq!(tree.children[0].children[0].name, "Leaf");
    assert_eq!(tree.children[0].children[0].phase, Phase::Active);
}

#[test]
fn test_json_export() {
    let runtime = Runtime::new();
    let devtools = Devtools::install(&runtime);
    let app = ComponentDef::new("App").build_detached(&runtime, Options::new());
    app.init(State::new()).unwrap();

    let exported: Value = serde_json::from_str(&devtools.to_json().unwrap()).unwrap();
    let entries = exported.as_array().unwrap();
    assert_eq!(entries.len(), devtools.len());
    assert!(entries.iter().any(|entry| entry["type"] == "phase" && entry["phase"] == "active"));

    devtools.clear();
    assert!(devtools.is_empty());
    runtime.clear_inspector();
    app.broadcast("ignored", &[]);
    assert!(devtools.is_empty());
}
