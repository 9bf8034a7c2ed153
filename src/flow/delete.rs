//! Delete flow: with force, observe first and stop a running instance before
//! deleting it.

use super::{Effect, Event, Flow, Phase};
use crate::instance::{InstanceStatus, StateAction, StateChange};
use crate::operation;

pub struct DeleteFlow {
    force: bool,
}

impl DeleteFlow {
    pub fn new(force: bool) -> Self {
        Self { force }
    }
}

fn force_stop() -> Effect {
    Effect::ChangeState {
        step: operation::STOP,
        change: StateChange::new(StateAction::Stop).forced(true),
    }
}

impl Flow for DeleteFlow {
    fn transition(&self, phase: &Phase, event: &Event) -> (Phase, Vec<Effect>) {
        match (phase, event) {
            // ── FlowStarted: forced deletes look before they leap ──
            (_, Event::FlowStarted) if self.force => (*phase, vec![Effect::ObserveState]),
            (_, Event::FlowStarted) => (*phase, vec![Effect::Delete]),

            // ── Observed: only a running instance needs stopping ──
            (_, Event::Observed(InstanceStatus::Running)) => (Phase::Running, vec![force_stop()]),
            (_, Event::Observed(status)) => (Phase::observed(status), vec![Effect::Delete]),

            (Phase::Running, Event::StateChanged(StateAction::Stop)) => {
                (Phase::Stopped, vec![Effect::Delete])
            }

            // ── Deleted → terminal ──
            (_, Event::Deleted) => (Phase::Deleted, vec![]),

            _ => (*phase, vec![]),
        }
    }
}
