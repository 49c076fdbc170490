//! Keyed component state

use std::rc::Rc;

use serde_json::{Map, Value};

/// Component state: insertion-ordered key/value map
pub type State = Map<String, Value>;

/// Default change detection: scalars by value, arrays and objects always
/// count as changed
pub fn default_should_update(current: &Value, next: &Value) -> bool {
    match (current, next) {
        // Arrays and objects compare by identity; a fresh value is always new
        (Value::Array(_), _) | (Value::Object(_), _) => true,
        (_, Value::Array(_)) | (_, Value::Object(_)) => true,
        _ => current != next,
    }
}

/// Argument of `set_state`
#[derive(Clone)]
pub enum StateUpdate {
    /// Values for some of the existing keys
    Partial(State),
    /// Compute the partial update from the current state
    With(Rc<dyn Fn(&State) -> State>),
}

impl StateUpdate {
    pub fn with<F>(f: F) -> Self
    where
        F: Fn(&State) -> State + 'static,
    {
        StateUpdate::With(Rc::new(f))
    }

    pub(crate) fn resolve(&self, current: &State) -> State {
        match self {
            StateUpdate::Partial(partial) => partial.clone(),
            StateUpdate::With(f) => f(current),
        }
    }
}

impl From<State> for StateUpdate {
    fn from(partial: State) -> Self {
        StateUpdate::Partial(partial)
    }
}

/// Non-object values produce an empty update
impl From<Value> for StateUpdate {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(partial) => StateUpdate::Partial(partial),
            _ => StateUpdate::Partial(State::new()),
        }
    }
}

/// Build a [`State`] from a `json!` object literal
///
/// Non-object values yield an empty state.
pub fn state_from(value: Value) -> State {
    match value {
        Value::Object(map) => map,
        _ => State::new(),
    }
}

/// Result of applying a partial update to a state
pub(crate) struct Diff {
    pub next: State,
    /// Changed keys with their previous value, in state order
    pub changed: Vec<(String, Value)>,
    /// Keys the update mentioned that the state does not have
    pub unknown: Vec<String>,
}

/// Apply `partial` to `current`, keeping only existing keys for which
/// `should_update` reports a difference
pub(crate) fn diff(
    current: &State,
    partial: &State,
    should_update: impl Fn(&str, &Value, &Value) -> bool,
) -> Diff {
    let mut next = current.clone();
    let mut changed = Vec::new();
    for (key, value) in current {
        let Some(candidate) = partial.get(key) else {
            continue;
        };
        if should_update(key, value, candidate) {
            next.insert(key.clone(), candidate.clone());
            changed.push((key.clone(), value.clone()));
        }
    }
    let unknown = partial
        .keys()
        .filter(|key| !current.contains_key(*key))
        .cloned()
        .collect();
    Diff {
        next,
        changed,
        unknown,
    }
}
