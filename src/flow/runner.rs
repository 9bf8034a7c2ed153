//! Drives a flow against a backend.
//!
//! Effects run strictly one after another: each completion event is fed back
//! into the flow before the next effect is issued. The first failing effect
//! ends the run and its error is returned; queued effects are dropped.

use std::collections::VecDeque;

use super::{Effect, Event, Flow, Phase};
use crate::backend::Backend;
use crate::error::ToolError;
use crate::operation;

/// Run `flow` for instance `name` until no effects remain. Returns the final
/// phase.
pub async fn run_flow<B: Backend>(
    flow: &dyn Flow,
    backend: &B,
    name: &str,
    initial: Phase,
) -> Result<Phase, ToolError> {
    let mut phase = initial;
    let mut pending = VecDeque::new();

    let (next, effects) = flow.transition(&phase, &Event::FlowStarted);
    log_transition(name, &phase, &next, &Event::FlowStarted);
    phase = next;
    pending.extend(effects);

    while let Some(effect) = pending.pop_front() {
        let event = execute(effect, backend, name).await?;

        let (next, effects) = flow.transition(&phase, &event);
        log_transition(name, &phase, &next, &event);
        phase = next;
        pending.extend(effects);
    }

    Ok(phase)
}

// ── Effect dispatch ────────────────────────────────────────────────

async fn execute<B: Backend>(effect: Effect, backend: &B, name: &str) -> Result<Event, ToolError> {
    match effect {
        Effect::Create(new) => {
            operation::run(operation::CREATE, backend.create_instance(&new)).await?;
            Ok(Event::Created)
        }
        Effect::ObserveState => {
            let state = backend
                .get_instance_state(name)
                .await
                .map_err(|source| ToolError::Backend {
                    context: "Failed getting instance state",
                    source,
                })?;
            Ok(Event::Observed(state.status()))
        }
        Effect::ChangeState { step, change } => {
            operation::run(step, backend.update_instance_state(name, change)).await?;
            Ok(Event::StateChanged(change.action))
        }
        Effect::Delete => {
            operation::run(operation::DELETE, backend.delete_instance(name)).await?;
            Ok(Event::Deleted)
        }
    }
}

fn log_transition(name: &str, old: &Phase, new: &Phase, event: &Event) {
    tracing::debug!(instance = name, ?old, ?new, ?event, "flow transition");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{Call, MockBackend};
    use crate::flow::delete::DeleteFlow;
    use crate::instance::{StateAction, StateChange};

    /// Flow that emits nothing: terminal immediately.
    struct IdleFlow;

    impl Flow for IdleFlow {
        fn transition(&self, phase: &Phase, _event: &Event) -> (Phase, Vec<Effect>) {
            (*phase, vec![])
        }
    }

    /// Flow that queues two effects up front.
    struct TwoStepFlow;

    impl Flow for TwoStepFlow {
        fn transition(&self, phase: &Phase, event: &Event) -> (Phase, Vec<Effect>) {
            match event {
                Event::FlowStarted => (
                    Phase::Stopped,
                    vec![
                        Effect::ChangeState {
                            step: operation::START,
                            change: StateChange::new(StateAction::Start),
                        },
                        Effect::ChangeState {
                            step: operation::FREEZE,
                            change: StateChange::new(StateAction::Freeze),
                        },
                    ],
                ),
                Event::StateChanged(StateAction::Start) => (Phase::Running, vec![]),
                Event::StateChanged(StateAction::Freeze) => (Phase::Frozen, vec![]),
                _ => (*phase, vec![]),
            }
        }
    }

    #[tokio::test]
    async fn no_effects_issues_nothing() {
        let backend = MockBackend::new().with_instance("c1", "Running");
        let phase = run_flow(&IdleFlow, &backend, "c1", Phase::Unknown)
            .await
            .unwrap();
        assert_eq!(phase, Phase::Unknown);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn effects_run_in_order() {
        let backend = MockBackend::new().with_instance("c1", "Stopped");
        let phase = run_flow(&TwoStepFlow, &backend, "c1", Phase::Unknown)
            .await
            .unwrap();
        assert_eq!(phase, Phase::Frozen);
        assert_eq!(backend.status().as_deref(), Some("Frozen"));
    }

    #[tokio::test]
    async fn first_failure_drops_remaining_effects() {
        let backend = MockBackend::new()
            .with_instance("c1", "Stopped")
            .failing_wait("start", "Failed to run: forkstart");
        let err = run_flow(&TwoStepFlow, &backend, "c1", Phase::Unknown)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed waiting for instance start: Failed to run: forkstart"
        );
        assert_eq!(
            backend.operation_calls(),
            vec![Call::ChangeState(
                "c1".into(),
                StateChange::new(StateAction::Start)
            )]
        );
    }

    #[tokio::test]
    async fn observe_failure_is_reported_as_state_read() {
        let backend = MockBackend::new();
        let err = run_flow(&DeleteFlow::new(true), &backend, "ghost", Phase::Unknown)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed getting instance state: Instance not found"
        );
        assert!(backend.operation_calls().is_empty());
    }
}
