//! Shared vocabulary for instances as the hypervisor reports them.
//!
//! Status is owned by the daemon. Nothing here is cached: every value is the
//! result of a fresh read and is dropped once the invocation returns.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::image::ImageSource;

/// Fields of an instance record that may be written back by an update.
const WRITABLE_FIELDS: &[&str] = &[
    "architecture",
    "devices",
    "ephemeral",
    "profiles",
    "stateful",
    "description",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceType {
    #[default]
    Container,
    VirtualMachine,
}

impl InstanceType {
    /// Parse the `type` tool argument. An empty value means container.
    pub fn parse(tool: &str, value: &str) -> Result<Self, ToolError> {
        match value {
            "" | "container" => Ok(InstanceType::Container),
            "virtual-machine" => Ok(InstanceType::VirtualMachine),
            other => Err(ToolError::InvalidArguments {
                tool: tool.to_string(),
                message: format!(
                    "unknown instance type '{other}' (expected 'container' or 'virtual-machine')"
                ),
            }),
        }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceType::Container => write!(f, "container"),
            InstanceType::VirtualMachine => write!(f, "virtual-machine"),
        }
    }
}

/// Lifecycle status as observed on the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceStatus {
    Running,
    Stopped,
    Frozen,
    /// Transitional or error states (`Starting`, `Error`, ...), kept verbatim.
    Other(String),
}

impl InstanceStatus {
    pub fn from_status(status: &str) -> Self {
        match status {
            "Running" => InstanceStatus::Running,
            "Stopped" => InstanceStatus::Stopped,
            "Frozen" => InstanceStatus::Frozen,
            other => InstanceStatus::Other(other.to_string()),
        }
    }
}

/// An instance record. Fields not modelled here are carried in `extra` so the
/// record can be presented, and written back, without loss.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub config: Option<BTreeMap<String, String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Instance {
    pub fn status(&self) -> InstanceStatus {
        InstanceStatus::from_status(&self.status)
    }

    /// The writable subset of the record, as accepted by an instance update.
    pub fn writable(&self) -> Map<String, Value> {
        let mut body: Map<String, Value> = WRITABLE_FIELDS
            .iter()
            .filter_map(|key| self.extra.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect();
        let config = self.config.clone().unwrap_or_default();
        body.insert(
            "config".into(),
            Value::Object(
                config
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect(),
            ),
        );
        body
    }
}

/// Runtime state of an instance (status, resource usage, network).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InstanceState {
    pub fn status(&self) -> InstanceStatus {
        InstanceStatus::from_status(&self.status)
    }
}

/// Concurrency token issued with an instance read. Consumed by the one write
/// it was read for.
#[derive(Debug, PartialEq, Eq)]
pub struct Etag(String);

impl Etag {
    pub fn new(value: impl Into<String>) -> Self {
        Etag(value.into())
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateAction {
    Start,
    Stop,
    Restart,
    Freeze,
    Unfreeze,
}

/// A requested state transition. A timeout of `-1` waits indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateChange {
    pub action: StateAction,
    pub timeout: i64,
    pub force: bool,
    pub stateful: bool,
}

impl StateChange {
    pub fn new(action: StateAction) -> Self {
        Self {
            action,
            timeout: -1,
            force: false,
            stateful: false,
        }
    }

    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Everything needed to create an instance from an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInstance {
    pub name: String,
    pub kind: InstanceType,
    pub source: ImageSource,
}

/// Output captured from a finished execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_parsing_keeps_unknown_states() {
        assert_eq!(InstanceStatus::from_status("Running"), InstanceStatus::Running);
        assert_eq!(InstanceStatus::from_status("Frozen"), InstanceStatus::Frozen);
        assert_eq!(
            InstanceStatus::from_status("Error"),
            InstanceStatus::Other("Error".into())
        );
        // Case-sensitive, as reported by the daemon.
        assert_eq!(
            InstanceStatus::from_status("running"),
            InstanceStatus::Other("running".into())
        );
    }

    #[test]
    fn instance_type_parse_defaults_to_container() {
        assert_eq!(
            InstanceType::parse("create_instance", "").unwrap(),
            InstanceType::Container
        );
        assert_eq!(
            InstanceType::parse("create_instance", "virtual-machine").unwrap(),
            InstanceType::VirtualMachine
        );
        let err = InstanceType::parse("create_instance", "vm").unwrap_err();
        assert!(err.to_string().contains("unknown instance type 'vm'"));
    }

    #[test]
    fn instance_record_round_trips_unmodelled_fields() {
        let raw = json!({
            "name": "c1",
            "status": "Running",
            "type": "container",
            "config": { "limits.cpu": "2" },
            "devices": { "root": { "path": "/", "pool": "default", "type": "disk" } },
            "profiles": ["default"],
            "created_at": "2024-01-01T00:00:00Z"
        });
        let instance: Instance = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(instance.status(), InstanceStatus::Running);
        assert_eq!(instance.extra["type"], "container");
        assert_eq!(serde_json::to_value(&instance).unwrap(), raw);
    }

    #[test]
    fn null_config_is_absent() {
        let instance: Instance =
            serde_json::from_value(json!({ "name": "c1", "config": null })).unwrap();
        assert!(instance.config.is_none());
    }

    #[test]
    fn writable_keeps_only_writable_fields() {
        let instance: Instance = serde_json::from_value(json!({
            "name": "c1",
            "status": "Stopped",
            "config": { "limits.cpu": "2" },
            "profiles": ["default"],
            "ephemeral": false,
            "created_at": "2024-01-01T00:00:00Z",
            "state": null
        }))
        .unwrap();
        let body = instance.writable();
        assert_eq!(body["config"], json!({ "limits.cpu": "2" }));
        assert_eq!(body["profiles"], json!(["default"]));
        assert_eq!(body["ephemeral"], json!(false));
        assert!(!body.contains_key("created_at"));
        assert!(!body.contains_key("name"));
        assert!(!body.contains_key("status"));
    }

    #[test]
    fn writable_without_config_sends_empty_mapping() {
        let instance = Instance {
            name: "c1".into(),
            ..Default::default()
        };
        assert_eq!(instance.writable()["config"], json!({}));
    }

    #[test]
    fn state_change_defaults_to_indefinite_timeout() {
        let change = StateChange::new(StateAction::Stop).forced(true);
        assert_eq!(
            serde_json::to_value(change).unwrap(),
            json!({ "action": "stop", "timeout": -1, "force": true, "stateful": false })
        );
    }
}
