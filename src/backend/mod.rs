//! The hypervisor boundary.
//!
//! Everything the tools need from the daemon goes through [`Backend`]. Calls
//! that change state hand back an [`Operation`]; plain reads are synchronous.

pub mod lxd;
#[cfg(test)]
pub(crate) mod mock;
mod wire;

use serde_json::{Map, Value};

use crate::error::BackendError;
use crate::instance::{CapturedOutput, Etag, Instance, InstanceState, NewInstance, StateChange};

/// Handle on an asynchronous daemon-side action.
#[allow(async_fn_in_trait)] // trait is internal-only
pub trait Operation {
    /// Block until the action reaches a terminal state. Failure and
    /// cancellation are returned as errors.
    async fn wait(&mut self) -> Result<(), BackendError>;

    /// Metadata reported with the most recently observed state of the
    /// operation; after a successful `wait` this is the terminal metadata.
    fn metadata(&self) -> Option<&Map<String, Value>>;
}

#[allow(async_fn_in_trait)] // trait is internal-only
pub trait Backend {
    type Operation: Operation;

    async fn list_instances(&self) -> Result<Vec<Instance>, BackendError>;
    async fn get_instance(&self, name: &str) -> Result<(Instance, Etag), BackendError>;
    async fn get_instance_state(&self, name: &str) -> Result<InstanceState, BackendError>;
    async fn list_images(&self) -> Result<Vec<Value>, BackendError>;

    async fn create_instance(&self, new: &NewInstance) -> Result<Self::Operation, BackendError>;
    async fn update_instance_state(
        &self,
        name: &str,
        change: StateChange,
    ) -> Result<Self::Operation, BackendError>;
    async fn rename_instance(
        &self,
        name: &str,
        new_name: &str,
    ) -> Result<Self::Operation, BackendError>;
    /// Write back `instance` (its writable fields). `etag` must come from the
    /// read that produced `instance`.
    async fn update_instance(
        &self,
        name: &str,
        instance: &Instance,
        etag: Etag,
    ) -> Result<Self::Operation, BackendError>;
    async fn delete_instance(&self, name: &str) -> Result<Self::Operation, BackendError>;

    /// Run `command` inside the instance with output recorded by the daemon.
    async fn exec_instance(
        &self,
        name: &str,
        command: &[String],
    ) -> Result<Self::Operation, BackendError>;

    /// Fetch the output recorded by a finished `exec_instance` operation.
    async fn exec_output(
        &self,
        name: &str,
        operation: &Self::Operation,
    ) -> Result<CapturedOutput, BackendError>;
}
