//! Read-only queries. Records are passed through as the daemon reports them.

use serde::Serialize;

use crate::backend::Backend;
use crate::error::{BackendError, ToolError};

fn render(value: &impl Serialize) -> Result<String, ToolError> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn read_failed(context: &'static str) -> impl FnOnce(BackendError) -> ToolError {
    move |source| ToolError::Backend { context, source }
}

pub async fn list_instances<B: Backend>(backend: &B) -> Result<String, ToolError> {
    let instances = backend
        .list_instances()
        .await
        .map_err(read_failed("Failed listing instances"))?;
    tracing::debug!(count = instances.len(), "listed instances");
    render(&instances)
}

pub async fn get_instance<B: Backend>(backend: &B, name: &str) -> Result<String, ToolError> {
    let (instance, _) = backend
        .get_instance(name)
        .await
        .map_err(read_failed("Failed getting instance"))?;
    render(&instance)
}

pub async fn get_instance_state<B: Backend>(backend: &B, name: &str) -> Result<String, ToolError> {
    let state = backend
        .get_instance_state(name)
        .await
        .map_err(read_failed("Failed getting instance state"))?;
    render(&state)
}

pub async fn list_images<B: Backend>(backend: &B) -> Result<String, ToolError> {
    let images = backend
        .list_images()
        .await
        .map_err(read_failed("Failed listing images"))?;
    tracing::debug!(count = images.len(), "listed images");
    render(&images)
}
