//! Create flow: create from image, then start unless told not to.

use super::{Effect, Event, Flow, Phase};
use crate::instance::{NewInstance, StateAction, StateChange};
use crate::operation;

pub struct CreateFlow {
    new: NewInstance,
    start: bool,
}

impl CreateFlow {
    pub fn new(new: NewInstance, start: bool) -> Self {
        Self { new, start }
    }
}

impl Flow for CreateFlow {
    fn transition(&self, phase: &Phase, event: &Event) -> (Phase, Vec<Effect>) {
        match (phase, event) {
            (Phase::Unknown | Phase::Absent, Event::FlowStarted) => {
                (Phase::Absent, vec![Effect::Create(self.new.clone())])
            }

            // ── Created: optionally start ──
            (Phase::Absent, Event::Created) if self.start => (
                Phase::Stopped,
                vec![Effect::ChangeState {
                    step: operation::CREATE_START,
                    change: StateChange::new(StateAction::Start),
                }],
            ),
            (Phase::Absent, Event::Created) => (Phase::Stopped, vec![]),

            (Phase::Stopped, Event::StateChanged(StateAction::Start)) => (Phase::Running, vec![]),

            _ => (*phase, vec![]),
        }
    }
}
