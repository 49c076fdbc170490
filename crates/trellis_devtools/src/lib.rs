//! Trellis Devtools
//!
//! An [`Inspector`] that records what components do:
//!
//! - lifecycle phase changes
//! - committed state changes (changed keys only)
//! - references attached and released
//! - broadcasts
//!
//! Records are kept in a bounded timeline and can be exported as JSON. The
//! recorder only observes; it never touches the components it sees.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use trellis_core::{ComponentDef, Options, Runtime, State};
//! use trellis_devtools::{Devtools, RecordKind};
//!
//! let runtime = Runtime::new();
//! let devtools = Devtools::install(&runtime);
//!
//! let store = ComponentDef::new("Store")
//!     .state("n", json!(0))
//!     .build_detached(&runtime, Options::new());
//! store.init(State::new()).unwrap();
//! store.set_state(json!({ "n": 1 }));
//!
//! let last = devtools.records().pop().unwrap();
//! assert_eq!(last.kind, RecordKind::State { keys: vec!["n".into()] });
//! ```

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use serde::Serialize;
use tracing::debug;

use trellis_core::{Component, Inspector, Phase, Runtime};

/// Recorder configuration
#[derive(Clone, Debug)]
pub struct DevtoolsConfig {
    /// Oldest records are dropped past this many
    pub max_records: usize,
    /// Whether state changes are recorded
    pub record_state: bool,
}

impl Default for DevtoolsConfig {
    fn default() -> Self {
        Self {
            max_records: 10_000,
            record_state: true,
        }
    }
}

impl DevtoolsConfig {
    /// Lifecycle and reference records only
    pub fn minimal() -> Self {
        Self {
            max_records: 1_000,
            record_state: false,
        }
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn with_state(mut self, record_state: bool) -> Self {
        self.record_state = record_state;
        self
    }
}

/// What happened
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordKind {
    Phase { phase: Phase },
    State { keys: Vec<String> },
    RefAttached { id: String, child: Option<String> },
    RefReleased { id: String },
    Broadcast { event: String },
}

/// One timeline entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Record {
    pub seq: u64,
    /// Uid of the component, when it has one
    pub component: Option<String>,
    /// Behavior name of the component
    pub name: String,
    #[serde(flatten)]
    pub kind: RecordKind,
}

/// Snapshot of a component and its references
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    /// Reference id under the parent; `None` for the root
    pub id: Option<String>,
    pub uid: Option<String>,
    pub name: String,
    pub phase: Phase,
    pub active: bool,
    pub children: Vec<TreeNode>,
}

/// Timeline recorder
#[derive(Debug)]
pub struct Devtools {
    config: DevtoolsConfig,
    records: RefCell<VecDeque<Record>>,
    next_seq: Cell<u64>,
}

impl Default for Devtools {
    fn default() -> Self {
        Self::new(DevtoolsConfig::default())
    }
}

impl Devtools {
    pub fn new(config: DevtoolsConfig) -> Self {
        Self {
            config,
            records: RefCell::new(VecDeque::new()),
            next_seq: Cell::new(0),
        }
    }

    /// Install a recorder with the default configuration on `runtime`
    pub fn install(runtime: &Runtime) -> Rc<Devtools> {
        Self::install_with(runtime, DevtoolsConfig::default())
    }

    pub fn install_with(runtime: &Runtime, config: DevtoolsConfig) -> Rc<Devtools> {
        let devtools = Rc::new(Devtools::new(config));
        runtime.set_inspector(devtools.clone());
        devtools
    }

    /// Recorded entries, oldest first
    pub fn records(&self) -> Vec<Record> {
        self.records.borrow().iter().cloned().collect()
    }

    /// Entries about the component with `uid`
    pub fn records_for(&self, uid: &str) -> Vec<Record> {
        self.records
            .borrow()
            .iter()
            .filter(|record| record.component.as_deref() == Some(uid))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.records.borrow_mut().clear();
    }

    /// Timeline as a JSON array
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&*self.records.borrow())
    }

    /// Walk `root` and its references
    pub fn component_tree(root: &Component) -> TreeNode {
        Self::tree_node(None, root)
    }

    fn tree_node(id: Option<String>, component: &Component) -> TreeNode {
        TreeNode {
            id,
            uid: component.uid(),
            name: component.name().to_string(),
            phase: component.phase(),
            active: component.is_active(),
            children: component
                .refs()
                .iter()
                .map(|(id, child)| Self::tree_node(Some(id.clone()), child))
                .collect(),
        }
    }

    fn push(&self, component: &Component, kind: RecordKind) {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);

        let record = Record {
            seq,
            component: component.uid(),
            name: component.name().to_string(),
            kind,
        };
        debug!(seq, component = %component.label(), kind = ?record.kind, "devtools record");

        let mut records = self.records.borrow_mut();
        records.push_back(record);
        while records.len() > self.config.max_records {
            records.pop_front();
        }
    }
}

impl Inspector for Devtools {
    fn phase_changed(&self, component: &Component, phase: Phase) {
        self.push(component, RecordKind::Phase { phase });
    }

    fn state_changed(&self, component: &Component, keys: &[String]) {
        if self.config.record_state {
            self.push(
                component,
                RecordKind::State {
                    keys: keys.to_vec(),
                },
            );
        }
    }

    fn ref_attached(&self, parent: &Component, id: &str, child: &Component) {
        self.push(
            parent,
            RecordKind::RefAttached {
                id: id.to_string(),
                child: child.uid(),
            },
        );
    }

    fn ref_released(&self, parent: &Component, id: &str) {
        self.push(parent, RecordKind::RefReleased { id: id.to_string() });
    }

    fn broadcast(&self, component: &Component, event: &str) {
        self.push(
            component,
            RecordKind::Broadcast {
                event: event.to_string(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_core::{ComponentDef, Options, State};

    #[test]
    fn test_timeline_is_bounded() {
        let runtime = Runtime::new();
        let devtools = Devtools::install_with(&runtime, DevtoolsConfig::default().with_max_records(2));
        let component = ComponentDef::new("Busy")
            .state("n", json!(0))
            .build_detached(&runtime, Options::new());
        component.init(State::new()).unwrap();
        for n in 1..5 {
            component.set_state(json!({ "n": n }));
        }

        let records = devtools.records();
        assert_eq!(records.len(), 2);
        assert!(records[0].seq < records[1].seq);
    }

    #[test]
    fn test_minimal_skips_state() {
        let runtime = Runtime::new();
        let devtools = Devtools::install_with(&runtime, DevtoolsConfig::minimal());
        let component = ComponentDef::new("Quiet")
            .state("n", json!(0))
            .build_detached(&runtime, Options::new());
        component.init(State::new()).unwrap();
        component.set_state(json!({ "n": 1 }));

        let kinds: Vec<RecordKind> = devtools.records().into_iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![RecordKind::Phase {
                phase: Phase::Active
            }]
        );
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = Record {
            seq: 3,
            component: Some("c.1".into()),
            name: "List".into(),
            kind: RecordKind::RefReleased { id: "row".into() },
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({"seq": 3, "component": "c.1", "name": "List", "type": "ref_released", "id": "row"})
        );
    }
}
