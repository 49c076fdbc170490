//! Integration tests for mounting, initialization and DOM listeners
//!
//! These tests verify that:
//! - Mount resolves roots, declared elements and listeners
//! - Init assigns identities, binds actions and gates `ready`
//! - Destroy releases everything the component attached

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::{json, Value};
use trellis_core::{
    Component, ComponentDef, ComponentError, Document, Handler, NodeId, OptionValue, Options,
    Phase, Runtime, Selector, State, Trigger, UID_ATTRIBUTE,
};

fn counter_def() -> ComponentDef {
    ComponentDef::new("Counter")
        .state("count", json!(0))
        .selector("btn", Selector::css(".btn"))
        .on_event("click @btn", |cx, _| {
            let count = cx.get_state_or("count", json!(0)).as_i64().unwrap_or(0);
            cx.set_state(json!({ "count": count + 1 }));
        })
}

fn page(runtime: &Runtime) -> (Document, NodeId, NodeId) {
    let doc = runtime.document().clone();
    let root = doc.append_element(doc.body(), "div").unwrap();
    let button = doc.append_element(root, "button").unwrap();
    doc.add_class(button, "btn").unwrap();
    (doc, root, button)
}

/// Clicking a declared element runs its listener
#[test]
fn test_click_on_declared_element() {
    let runtime = Runtime::new();
    let (doc, root, button) = page(&runtime);

    let counter = counter_def().build(&runtime, Options::new());
    counter.mount(root, Some(State::new())).unwrap();
    assert_eq!(counter.els("btn").first(), Some(button));

    doc.dispatch_event(button, "click");
    assert_eq!(counter.get_state("count"), Some(json!(1)));

    // Clicks on the root itself do not match `@btn`
    doc.dispatch_event(root, "click");
    assert_eq!(counter.get_state("count"), Some(json!(1)));
}

/// Listener keys may use a CSS selector as the target
#[test]
fn test_css_listener_target() {
    let runtime = Runtime::new();
    let (doc, root, button) = page(&runtime);
    let second = doc.append_element(root, "button").unwrap();
    doc.add_class(second, "btn").unwrap();

    let hits = Rc::new(Cell::new(0));
    let seen = hits.clone();
    let component = ComponentDef::new("Buttons")
        .on_event("click .btn", move |_, _| seen.set(seen.get() + 1))
        .build(&runtime, Options::new());
    component.mount(root, None).unwrap();
    assert_eq!(component.listener_count(), 2);

    doc.dispatch_event(button, "click");
    doc.dispatch_event(second, "click");
    assert_eq!(hits.get(), 2);
}

/// `[]` selectors collect every match
#[test]
fn test_multi_selector() {
    let runtime = Runtime::new();
    let (doc, root, _) = page(&runtime);
    for _ in 0..3 {
        let item = doc.append_element(root, "li").unwrap();
        doc.add_class(item, "item").unwrap();
    }

    let list = ComponentDef::new("List")
        .selector("items[]", Selector::css(".item"))
        .selector("missing", Selector::css(".nope"))
        .build(&runtime, Options::new());
    list.mount(root, None).unwrap();

    assert_eq!(list.els("items").nodes().len(), 3);
    assert!(list.els("missing").is_missing());
}

#[test]
fn test_named_methods() {
    let runtime = Runtime::new();
    let (doc, root, button) = page(&runtime);

    let component = ComponentDef::new("Named")
        .state("count", json!(0))
        .state("last", Value::Null)
        .event_method("bump", |cx, _| {
            let count = cx.get_state_or("count", json!(0)).as_i64().unwrap_or(0);
            cx.set_state(json!({ "count": count + 1 }));
        })
        .action_method("remember", |cx, next, _| {
            cx.set_state(json!({ "last": next.clone() }));
        })
        .listener("click button", Handler::method("bump"))
        .action("count", Handler::method("remember"))
        .build(&runtime, Options::new());
    component.mount(root, Some(State::new())).unwrap();

    doc.dispatch_event(button, "click");
    doc.dispatch_event(button, "click");
    assert_eq!(component.get_state("last"), Some(json!(2)));
}

#[test]
fn test_unknown_method_is_an_error() {
    let runtime = Runtime::new();
    let (_, root, _) = page(&runtime);

    let component = ComponentDef::new("Broken")
        .listener("click", Handler::method("missing"))
        .build(&runtime, Options::new());
    let err = component.mount(root, None).unwrap_err();
    assert!(matches!(err, ComponentError::UnknownMethod { ref method, .. } if method == "missing"));
}

#[test]
fn test_double_mount_fails() {
    let runtime = Runtime::new();
    let (_, root, _) = page(&runtime);

    let component = counter_def().build(&runtime, Options::new());
    component.mount(root, None).unwrap();
    assert!(matches!(
        component.mount(root, None),
        Err(ComponentError::AlreadyMounted)
    ));
}

/// A selector with no match leaves the component untouched
#[test]
fn test_missing_target_is_soft() {
    let runtime = Runtime::new();
    let _ = page(&runtime);

    let before_mount = Rc::new(Cell::new(false));
    let flag = before_mount.clone();
    let component = counter_def()
        .on_before_mount(move |_| flag.set(true))
        .build(&runtime, Options::new());

    let returned = component.mount("#nowhere", Some(State::new())).unwrap();
    assert!(returned.ptr_eq(&component));
    assert_eq!(component.el(), None);
    assert!(!before_mount.get());
    assert_eq!(component.phase(), Phase::Created);
}

#[test]
fn test_init_marks_the_root() {
    let runtime = Runtime::new();
    let (doc, root, _) = page(&runtime);
    let named = doc.append_element(doc.body(), "div").unwrap();
    doc.set_attribute(named, "id", "main").unwrap();

    let first = counter_def().build(&runtime, Options::new());
    first.mount(root, Some(State::new())).unwrap();
    let uid = first.uid().unwrap();
    assert_eq!(doc.attribute(root, UID_ATTRIBUTE), Some(uid.clone()));
    assert_eq!(doc.id(root), Some(uid));

    let second = counter_def().build(&runtime, Options::new());
    second.mount(named, Some(State::new())).unwrap();
    assert_eq!(doc.id(named).as_deref(), Some("main"));
    assert!(second.uid().is_some());
}

/// A second component on an initialized element adopts its identity
#[test]
fn test_reinit_on_marked_element() {
    let runtime = Runtime::new();
    let (_, root, _) = page(&runtime);

    let ready = Rc::new(Cell::new(0));
    let count = ready.clone();
    let def = counter_def().on_ready(move |_| count.set(count.get() + 1));

    let first = def.clone().build(&runtime, Options::new());
    first.mount(root, Some(State::new())).unwrap();

    let second = def.build(&runtime, Options::new());
    second.mount(root, Some(State::new())).unwrap();

    assert_eq!(second.uid(), first.uid());
    assert!(!second.is_active());
    assert_eq!(ready.get(), 1);
}

#[test]
fn test_init_merges_initial_state() {
    let runtime = Runtime::new();
    let component = ComponentDef::new("Merged")
        .state("a", json!(1))
        .state("b", json!(2))
        .build_detached(&runtime, Options::new());

    let all = Rc::new(RefCell::new(Vec::new()));
    let sink = all.clone();
    let _ = component.on("*", Rc::new(move |args: &[Value]| sink.borrow_mut().push(args[0].clone())));

    let mut state = State::new();
    state.insert("b".into(), json!(20));
    component.init(state).unwrap();

    assert_eq!(Value::Object(component.state()), json!({"a": 1, "b": 20}));
    assert_eq!(
        *all.borrow(),
        vec![json!("change:a"), json!("change:b"), json!("change:*")]
    );
}

#[test]
fn test_actions_receive_next_and_prev() {
    let runtime = Runtime::new();
    let calls = Rc::new(RefCell::new(Vec::new()));
    let sink = calls.clone();

    let component = ComponentDef::new("Watcher")
        .state("a", json!(1))
        .on_change("a", move |_, next, prev| {
            sink.borrow_mut().push((next.clone(), prev.clone()))
        })
        .build_detached(&runtime, Options::new());
    component.init(State::new()).unwrap();
    component.set_state(json!({"a": 2}));

    assert_eq!(
        *calls.borrow(),
        vec![(json!(1), Value::Null), (json!(2), json!(1))]
    );
}

#[test]
fn test_ready_state_gates_ready_once() {
    let runtime = Runtime::new();
    let ready = Rc::new(Cell::new(0));
    let count = ready.clone();

    let component = ComponentDef::new("Loader")
        .state("loaded", json!(false))
        .ready_state(|_, current, _| current.get("loaded") == Some(&json!(true)))
        .on_ready(move |_| count.set(count.get() + 1))
        .build_detached(&runtime, Options::new());

    component.init(State::new()).unwrap();
    assert_eq!(ready.get(), 0);

    component.set_state(json!({"loaded": true}));
    assert_eq!(ready.get(), 1);

    component.set_state(json!({"loaded": false}));
    component.set_state(json!({"loaded": true}));
    assert_eq!(ready.get(), 1);
}

#[test]
fn test_callback_options_are_bound() {
    let runtime = Runtime::new();
    let component = ComponentDef::new("Formatter")
        .state("unit", json!("px"))
        .option(
            "format",
            OptionValue::callback(|cx: &Component, args: &[Value]| {
                let unit = cx.get_state_or("unit", json!(""));
                json!(format!("{}{}", args[0], unit.as_str().unwrap_or("")))
            }),
        )
        .build_detached(&runtime, Options::new());
    component.init(State::new()).unwrap();

    assert_eq!(component.options().call("format", &[json!(4)]), Some(json!("4px")));
}

#[test]
fn test_destroy_releases_listeners() {
    let runtime = Runtime::new();
    let (doc, root, button) = page(&runtime);

    let counter = counter_def().build(&runtime, Options::new());
    counter.mount(root, Some(State::new())).unwrap();
    pollster::block_on(counter.destroy()).unwrap();

    doc.dispatch_event(button, "click");
    assert_eq!(counter.get_state("count"), Some(json!(0)));
    assert_eq!(counter.listener_count(), 0);
    assert!(!doc.has_attribute(root, UID_ATTRIBUTE));
    assert!(counter.hub().is_empty());
    assert!(!counter.is_active());

    let triggers: Vec<Trigger> = counter
        .lifecycle_history()
        .iter()
        .map(|(_, trigger, _)| *trigger)
        .collect();
    assert_eq!(triggers, vec![Trigger::Mount, Trigger::Init, Trigger::Destroy]);
    assert_eq!(counter.phase(), Phase::Destroyed);
}

#[test]
fn test_dropped_component_ignores_events() {
    let runtime = Runtime::new();
    let (doc, root, button) = page(&runtime);

    let counter = counter_def().build(&runtime, Options::new());
    counter.mount(root, Some(State::new())).unwrap();
    let weak = counter.downgrade();
    drop(counter);

    assert!(weak.upgrade().is_none());
    doc.dispatch_event(button, "click");
}
