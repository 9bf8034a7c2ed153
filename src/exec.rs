//! Command execution inside an instance.

use serde_json::{Map, Value};

use crate::backend::{Backend, Operation};
use crate::error::{ExitCodeError, ToolError};
use crate::operation;

/// Outcome of one finished execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Read the exit status from an execution's terminal metadata (`return`).
pub fn decode_exit_code(metadata: Option<&Map<String, Value>>) -> Result<i32, ExitCodeError> {
    let value = metadata
        .ok_or(ExitCodeError::NoMetadata)?
        .get("return")
        .ok_or(ExitCodeError::Missing)?;

    let not_numeric = || ExitCodeError::NotNumeric {
        value: value.to_string(),
    };
    if let Some(code) = value.as_i64() {
        return i32::try_from(code).map_err(|_| not_numeric());
    }
    // JSON numbers may arrive as floats; accept only whole values.
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= f64::from(i32::MIN) && f <= f64::from(i32::MAX) => {
            Ok(f as i32)
        }
        _ => Err(not_numeric()),
    }
}

/// Run `command` in `name`, wait for it, and collect its exit code and output.
pub async fn run<B: Backend>(
    backend: &B,
    name: &str,
    command: &[String],
) -> Result<ExecResult, ToolError> {
    if command.is_empty() {
        return Err(ToolError::MissingParameter("Command"));
    }
    tracing::info!(instance = name, ?command, "executing command");

    let op = operation::run(operation::EXEC, backend.exec_instance(name, command)).await?;

    // Output is collected, and its logs removed, before the exit code is decoded.
    let output = backend
        .exec_output(name, &op)
        .await
        .map_err(|source| ToolError::Backend {
            context: "Failed reading command output",
            source,
        })?;
    let exit_code = decode_exit_code(op.metadata())?;
    tracing::debug!(
        instance = name,
        exit_code,
        stdout_bytes = output.stdout.len(),
        stderr_bytes = output.stderr.len(),
        "command finished"
    );

    Ok(ExecResult {
        exit_code,
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// The textual report: command, exit code, then stdout and stderr sections
/// only when non-empty.
pub fn report(command: &[String], result: &ExecResult) -> Result<String, ToolError> {
    let mut text = format!(
        "Executed command: {}\nExit code: {}",
        serde_json::to_string(command)?,
        result.exit_code
    );
    if !result.stdout.is_empty() {
        text.push_str("\nStdout:\n");
        text.push_str(&String::from_utf8_lossy(&result.stdout));
    }
    if !result.stderr.is_empty() {
        text.push_str("\nStderr:\n");
        text.push_str(&String::from_utf8_lossy(&result.stderr));
    }
    Ok(text)
}
