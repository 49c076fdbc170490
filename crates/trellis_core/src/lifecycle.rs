//! Component lifecycle machine
//!
//! A flat state machine over [`Phase`] driven by [`Trigger`]s:
//!
//! ```text
//! Created ──mount──▶ Mounted ──init──▶ Active
//!    └────────────────init─────────────▲
//! Created | Mounted | Active ──destroy──▶ Destroyed
//! ```
//!
//! `Destroyed` is terminal. Rejected triggers leave the phase unchanged.

use serde::Serialize;
use smallvec::SmallVec;

/// Lifecycle phase of a component
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Created,
    Mounted,
    Active,
    Destroyed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Created => "created",
            Phase::Mounted => "mounted",
            Phase::Active => "active",
            Phase::Destroyed => "destroyed",
        }
    }
}

/// Events driving the lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Mount,
    Init,
    Destroy,
}

/// A transition in the lifecycle table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: Phase,
    pub trigger: Trigger,
    pub to: Phase,
}

impl Transition {
    pub const fn new(from: Phase, trigger: Trigger, to: Phase) -> Self {
        Self { from, trigger, to }
    }
}

const TRANSITIONS: &[Transition] = &[
    Transition::new(Phase::Created, Trigger::Mount, Phase::Mounted),
    Transition::new(Phase::Created, Trigger::Init, Phase::Active),
    Transition::new(Phase::Mounted, Trigger::Init, Phase::Active),
    Transition::new(Phase::Created, Trigger::Destroy, Phase::Destroyed),
    Transition::new(Phase::Mounted, Trigger::Destroy, Phase::Destroyed),
    Transition::new(Phase::Active, Trigger::Destroy, Phase::Destroyed),
];

/// Current phase plus the transitions taken so far
#[derive(Clone, Debug)]
pub struct Lifecycle {
    current: Phase,
    history: SmallVec<[(Phase, Trigger, Phase); 4]>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            current: Phase::Created,
            history: SmallVec::new(),
        }
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    pub fn is_in(&self, phase: Phase) -> bool {
        self.current == phase
    }

    /// Check if a trigger is accepted in the current phase
    pub fn can_send(&self, trigger: Trigger) -> bool {
        self.find(trigger).is_some()
    }

    /// Apply a trigger; returns the new phase, or `None` if rejected
    pub fn send(&mut self, trigger: Trigger) -> Option<Phase> {
        let transition = self.find(trigger)?;
        self.current = transition.to;
        self.history
            .push((transition.from, transition.trigger, transition.to));
        Some(transition.to)
    }

    /// Transitions taken, oldest first
    pub fn history(&self) -> &[(Phase, Trigger, Phase)] {
        &self.history
    }

    fn find(&self, trigger: Trigger) -> Option<&'static Transition> {
        TRANSITIONS
            .iter()
            .find(|t| t.from == self.current && t.trigger == trigger)
    }
}
