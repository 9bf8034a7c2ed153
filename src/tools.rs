//! The tool table: names, descriptions, input schemas and dispatch.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::backend::Backend;
use crate::error::ToolError;
use crate::instance::InstanceType;
use crate::{exec, lifecycle, query};

pub struct Tool {
    pub name: &'static str,
    pub description: &'static str,
    schema: fn() -> Value,
}

impl Tool {
    /// The entry advertised by `tools/list`.
    pub fn definition(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": (self.schema)(),
        })
    }
}

pub const TOOLS: &[Tool] = &[
    Tool {
        name: "list_instances",
        description: "List all LXD instances (containers and VMs)",
        schema: no_arguments,
    },
    Tool {
        name: "get_instance",
        description: "Get detailed information about a specific instance",
        schema: name_only,
    },
    Tool {
        name: "get_instance_state",
        description: "Get current state and resource usage of an instance",
        schema: name_only,
    },
    Tool {
        name: "create_instance",
        description: "Create a new LXD instance (container or VM)",
        schema: create_schema,
    },
    Tool {
        name: "delete_instance",
        description: "Delete an instance",
        schema: delete_schema,
    },
    Tool {
        name: "start_instance",
        description: "Start a stopped instance",
        schema: name_only,
    },
    Tool {
        name: "stop_instance",
        description: "Stop a running instance",
        schema: stop_schema,
    },
    Tool {
        name: "restart_instance",
        description: "Restart a running instance",
        schema: restart_schema,
    },
    Tool {
        name: "freeze_instance",
        description: "Freeze (pause) a running instance",
        schema: name_only,
    },
    Tool {
        name: "unfreeze_instance",
        description: "Unfreeze (resume) a frozen instance",
        schema: name_only,
    },
    Tool {
        name: "rename_instance",
        description: "Rename an instance",
        schema: rename_schema,
    },
    Tool {
        name: "update_instance",
        description: "Update instance configuration (e.g., CPU, memory limits)",
        schema: update_schema,
    },
    Tool {
        name: "exec_instance",
        description: "Execute a command in an instance",
        schema: exec_schema,
    },
    Tool {
        name: "list_images",
        description: "List available images",
        schema: no_arguments,
    },
];

pub fn definitions() -> Vec<Value> {
    TOOLS.iter().map(Tool::definition).collect()
}

pub fn find(name: &str) -> Option<&'static Tool> {
    TOOLS.iter().find(|t| t.name == name)
}

// ── Schemas ─────────────────────────────────────────────────────────

fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn name_property() -> Value {
    json!({ "type": "string", "description": "Name of the instance" })
}

fn no_arguments() -> Value {
    object(json!({}), &[])
}

fn name_only() -> Value {
    object(json!({ "name": name_property() }), &["name"])
}

fn with_force(description: &str) -> Value {
    object(
        json!({
            "name": name_property(),
            "force": { "type": "boolean", "description": description },
        }),
        &["name"],
    )
}

fn delete_schema() -> Value {
    with_force("Force deletion even if running")
}

fn stop_schema() -> Value {
    with_force("Force stop (immediate shutdown)")
}

fn restart_schema() -> Value {
    with_force("Force restart")
}

fn create_schema() -> Value {
    object(
        json!({
            "name": name_property(),
            "image": {
                "type": "string",
                "description": "Image to use (e.g. 'ubuntu:24.04' or 'images:alpine/3.18')"
            },
            "type": {
                "type": "string",
                "enum": ["container", "virtual-machine"],
                "description": "Instance type: 'container' or 'virtual-machine'"
            },
            "start": {
                "type": "boolean",
                "description": "Start the instance after creation"
            },
        }),
        &["name", "image"],
    )
}

fn rename_schema() -> Value {
    object(
        json!({
            "name": { "type": "string", "description": "Current name of the instance" },
            "new_name": { "type": "string", "description": "New name for the instance" },
        }),
        &["name", "new_name"],
    )
}

fn update_schema() -> Value {
    object(
        json!({
            "name": name_property(),
            "config": {
                "type": "object",
                "additionalProperties": { "type": "string" },
                "description": "Configuration key-value pairs (e.g. {'limits.cpu': '2' 'limits.memory': '2GiB'})"
            },
        }),
        &["name", "config"],
    )
}

fn exec_schema() -> Value {
    object(
        json!({
            "name": name_property(),
            "command": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Command to execute as array of strings"
            },
        }),
        &["name", "command"],
    )
}

// ── Arguments ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct NameArgs {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreateArgs {
    name: String,
    #[serde(default)]
    image: String,
    #[serde(default, rename = "type")]
    kind: String,
    start: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ForceArgs {
    name: String,
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Deserialize)]
struct RenameArgs {
    name: String,
    new_name: String,
}

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    name: String,
    #[serde(default)]
    config: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ExecArgs {
    name: String,
    #[serde(default)]
    command: Vec<String>,
}

/// Decode tool arguments. Absent arguments decode as an empty object.
fn parse<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    let args = match args {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

// ── Dispatch ────────────────────────────────────────────────────────

/// Run tool `name` with `args` and return its report.
pub async fn call<B: Backend>(backend: &B, name: &str, args: Value) -> Result<String, ToolError> {
    tracing::info!(tool = name, "tool call");
    match name {
        "list_instances" => query::list_instances(backend).await,
        "get_instance" => {
            let a: NameArgs = parse(name, args)?;
            query::get_instance(backend, &a.name).await
        }
        "get_instance_state" => {
            let a: NameArgs = parse(name, args)?;
            query::get_instance_state(backend, &a.name).await
        }
        "create_instance" => {
            let a: CreateArgs = parse(name, args)?;
            let kind = InstanceType::parse(name, &a.kind)?;
            lifecycle::create(backend, &a.name, &a.image, kind, a.start.unwrap_or(true)).await
        }
        "delete_instance" => {
            let a: ForceArgs = parse(name, args)?;
            lifecycle::delete(backend, &a.name, a.force).await
        }
        "start_instance" => {
            let a: NameArgs = parse(name, args)?;
            lifecycle::start(backend, &a.name).await
        }
        "stop_instance" => {
            let a: ForceArgs = parse(name, args)?;
            lifecycle::stop(backend, &a.name, a.force).await
        }
        "restart_instance" => {
            let a: ForceArgs = parse(name, args)?;
            lifecycle::restart(backend, &a.name, a.force).await
        }
        "freeze_instance" => {
            let a: NameArgs = parse(name, args)?;
            lifecycle::freeze(backend, &a.name).await
        }
        "unfreeze_instance" => {
            let a: NameArgs = parse(name, args)?;
            lifecycle::unfreeze(backend, &a.name).await
        }
        "rename_instance" => {
            let a: RenameArgs = parse(name, args)?;
            lifecycle::rename(backend, &a.name, &a.new_name).await
        }
        "update_instance" => {
            let a: UpdateArgs = parse(name, args)?;
            lifecycle::update(backend, &a.name, &a.config).await
        }
        "exec_instance" => {
            let a: ExecArgs = parse(name, args)?;
            let result = exec::run(backend, &a.name, &a.command).await?;
            exec::report(&a.command, &result)
        }
        "list_images" => query::list_images(backend).await,
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}
