//! Instance state transitions.
//!
//! Every call here issues its hypervisor operations in order and waits each to
//! a terminal state before returning. The returned text is the confirmation
//! handed back to the caller.

use std::collections::BTreeMap;

use crate::backend::Backend;
use crate::error::ToolError;
use crate::flow::create::CreateFlow;
use crate::flow::delete::DeleteFlow;
use crate::flow::runner::run_flow;
use crate::flow::Phase;
use crate::image;
use crate::instance::{InstanceType, NewInstance, StateAction, StateChange};
use crate::merge::merge_config;
use crate::operation::{self, Step};

/// Create `name` from `image`, then start it when `start` is set.
pub async fn create<B: Backend>(
    backend: &B,
    name: &str,
    image: &str,
    kind: InstanceType,
    start: bool,
) -> Result<String, ToolError> {
    if image.is_empty() {
        return Err(ToolError::MissingParameter("Image"));
    }

    let source = image::resolve(image);
    tracing::info!(
        instance = name,
        %kind,
        alias = %source.alias,
        local = source.is_local(),
        start,
        "creating instance"
    );

    let new = NewInstance {
        name: name.to_string(),
        kind,
        source,
    };
    let phase = run_flow(&CreateFlow::new(new, start), backend, name, Phase::Absent).await?;

    Ok(if phase == Phase::Running {
        format!("Instance {name} created successfully and started")
    } else {
        format!("Instance {name} created successfully")
    })
}

/// Delete `name`. With `force`, a running instance is stopped first.
pub async fn delete<B: Backend>(backend: &B, name: &str, force: bool) -> Result<String, ToolError> {
    tracing::info!(instance = name, force, "deleting instance");
    run_flow(&DeleteFlow::new(force), backend, name, Phase::Unknown).await?;
    Ok(format!("Instance {name} deleted successfully"))
}

async fn change_state<B: Backend>(
    backend: &B,
    name: &str,
    step: Step,
    change: StateChange,
) -> Result<(), ToolError> {
    tracing::info!(instance = name, action = ?change.action, force = change.force, "changing state");
    operation::run(step, backend.update_instance_state(name, change)).await?;
    Ok(())
}

pub async fn start<B: Backend>(backend: &B, name: &str) -> Result<String, ToolError> {
    change_state(backend, name, operation::START, StateChange::new(StateAction::Start)).await?;
    Ok(format!("Instance {name} started successfully"))
}

pub async fn stop<B: Backend>(backend: &B, name: &str, force: bool) -> Result<String, ToolError> {
    let change = StateChange::new(StateAction::Stop).forced(force);
    change_state(backend, name, operation::STOP, change).await?;
    Ok(format!("Instance {name} stopped successfully"))
}

pub async fn restart<B: Backend>(backend: &B, name: &str, force: bool) -> Result<String, ToolError> {
    let change = StateChange::new(StateAction::Restart).forced(force);
    change_state(backend, name, operation::RESTART, change).await?;
    Ok(format!("Instance {name} restarted successfully"))
}

pub async fn freeze<B: Backend>(backend: &B, name: &str) -> Result<String, ToolError> {
    change_state(backend, name, operation::FREEZE, StateChange::new(StateAction::Freeze)).await?;
    Ok(format!("Instance {name} frozen successfully"))
}

pub async fn unfreeze<B: Backend>(backend: &B, name: &str) -> Result<String, ToolError> {
    let change = StateChange::new(StateAction::Unfreeze);
    change_state(backend, name, operation::UNFREEZE, change).await?;
    Ok(format!("Instance {name} unfrozen successfully"))
}

pub async fn rename<B: Backend>(
    backend: &B,
    name: &str,
    new_name: &str,
) -> Result<String, ToolError> {
    tracing::info!(instance = name, new_name, "renaming instance");
    operation::run(operation::RENAME, backend.rename_instance(name, new_name)).await?;
    Ok(format!("Instance {name} renamed to {new_name} successfully"))
}

/// Merge `patch` into the instance's configuration and write it back with the
/// ETag from the read it was merged into.
pub async fn update<B: Backend>(
    backend: &B,
    name: &str,
    patch: &BTreeMap<String, String>,
) -> Result<String, ToolError> {
    let (mut instance, etag) =
        backend
            .get_instance(name)
            .await
            .map_err(|source| ToolError::Backend {
                context: "Failed getting instance",
                source,
            })?;

    tracing::info!(instance = name, keys = ?patch.keys().collect::<Vec<_>>(), "updating config");
    instance.config = Some(merge_config(instance.config.take(), patch));

    operation::run(
        operation::UPDATE,
        backend.update_instance(name, &instance, etag),
    )
    .await?;
    Ok(format!("Instance {name} updated successfully"))
}
