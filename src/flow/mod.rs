//! Composite lifecycle transitions.
//!
//! Operations that need more than one hypervisor call (create-then-start,
//! force-delete) are each a `Flow`: a set of transition rules mapping
//! `(Phase, Event) -> (Phase, Vec<Effect>)`. The runner executes the effects
//! one at a time and feeds each completion back into the flow. A failing
//! effect ends the flow; nothing after it is issued.

pub mod create;
pub mod delete;
pub mod runner;

use crate::instance::{InstanceStatus, NewInstance, StateAction, StateChange};
use crate::operation::Step;

// ── Phases ──────────────────────────────────────────────────────────

/// What the flow currently knows about the instance. Observed, never cached
/// beyond the flow that observed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not yet observed.
    Unknown,
    Absent,
    Stopped,
    Running,
    Frozen,
    Deleted,
}

impl Phase {
    pub fn observed(status: &InstanceStatus) -> Self {
        match status {
            InstanceStatus::Running => Phase::Running,
            InstanceStatus::Stopped => Phase::Stopped,
            InstanceStatus::Frozen => Phase::Frozen,
            InstanceStatus::Other(_) => Phase::Unknown,
        }
    }
}

// ── Events ──────────────────────────────────────────────────────────

/// Completion events fed back by the runner.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Flow just started; triggers initial effects.
    FlowStarted,
    Created,
    Observed(InstanceStatus),
    StateChanged(StateAction),
    Deleted,
}

// ── Effects ─────────────────────────────────────────────────────────

/// Hypervisor calls requested by a flow.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Create the instance from an image and wait for it.
    Create(NewInstance),
    /// Read the instance's current runtime state.
    ObserveState,
    /// Change the instance's state; failures are reported as `step`.
    ChangeState { step: Step, change: StateChange },
    /// Delete the instance and wait for it.
    Delete,
}

// ── Flow trait ──────────────────────────────────────────────────────

pub trait Flow {
    /// Pure transition: given current phase and an event, return the new
    /// phase and any effects to run next.
    ///
    /// Unknown events return the current phase unchanged with no effects.
    fn transition(&self, phase: &Phase, event: &Event) -> (Phase, Vec<Effect>);
}
