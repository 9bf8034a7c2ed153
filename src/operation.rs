//! Issue-then-wait for daemon operations.
//!
//! Each hypervisor call that changes state is a [`Step`]: submit, and block
//! until the operation is terminal. A submission error is reported with the
//! step's `issue` text and the operation is never waited on; a failed or
//! cancelled operation is reported with its `wait` text.

use std::future::Future;

use crate::backend::Operation;
use crate::error::{BackendError, ToolError};

/// Reason prefixes for one issue/wait step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub issue: &'static str,
    pub wait: &'static str,
}

pub const CREATE: Step = Step {
    issue: "Failed creating instance",
    wait: "Failed waiting for instance creation",
};

pub const CREATE_START: Step = Step {
    issue: "Instance created but failed starting",
    wait: "Instance created but failed waiting for start",
};

pub const START: Step = Step {
    issue: "Failed starting instance",
    wait: "Failed waiting for instance start",
};

pub const STOP: Step = Step {
    issue: "Failed stopping instance",
    wait: "Failed waiting for instance stop",
};

pub const RESTART: Step = Step {
    issue: "Failed restarting instance",
    wait: "Failed waiting for instance restart",
};

pub const FREEZE: Step = Step {
    issue: "Failed freezing instance",
    wait: "Failed waiting for instance freeze",
};

pub const UNFREEZE: Step = Step {
    issue: "Failed unfreezing instance",
    wait: "Failed waiting for instance unfreeze",
};

pub const RENAME: Step = Step {
    issue: "Failed renaming instance",
    wait: "Failed waiting for instance rename",
};

pub const UPDATE: Step = Step {
    issue: "Failed updating instance",
    wait: "Failed waiting for instance update",
};

pub const DELETE: Step = Step {
    issue: "Failed deleting instance",
    wait: "Failed waiting for instance deletion",
};

pub const EXEC: Step = Step {
    issue: "Failed executing command",
    wait: "Failed waiting for command execution",
};

/// Await the submission, then the operation it produced. Returns the
/// finished operation so callers can read its terminal metadata.
pub async fn run<O, F>(step: Step, issued: F) -> Result<O, ToolError>
where
    O: Operation,
    F: Future<Output = Result<O, BackendError>>,
{
    let mut operation = issued.await.map_err(|source| ToolError::Backend {
        context: step.issue,
        source,
    })?;
    operation.wait().await.map_err(|source| ToolError::Operation {
        context: step.wait,
        source,
    })?;
    Ok(operation)
}
