//! LXD REST payloads and response envelope decoding.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BackendError;
use crate::image::ImageSource;
use crate::instance::{InstanceType, NewInstance};

/// Operation status codes as reported by LXD.
const STATUS_SUCCESS: i64 = 200;
const STATUS_FAILURE: i64 = 400;
const STATUS_CANCELLED: i64 = 401;

/// The envelope every `/1.0` endpoint answers with.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_code: u16,
    #[serde(default)]
    pub metadata: Value,
}

/// Decoded envelope payload.
#[derive(Debug, PartialEq)]
pub enum Response {
    Sync(Value),
    Async { id: String, metadata: Value },
}

pub fn decode_envelope(status: u16, body: &[u8]) -> Result<Response, BackendError> {
    let envelope: Envelope = serde_json::from_slice(body).map_err(|e| {
        if (200..300).contains(&status) {
            BackendError::Decode {
                message: e.to_string(),
            }
        } else {
            BackendError::Api {
                status,
                message: String::from_utf8_lossy(body).trim().to_string(),
            }
        }
    })?;

    match envelope.kind.as_str() {
        "sync" => Ok(Response::Sync(envelope.metadata)),
        "async" => {
            let id = operation_id(&envelope.operation).ok_or_else(|| BackendError::Decode {
                message: format!("async response without operation: '{}'", envelope.operation),
            })?;
            Ok(Response::Async {
                id,
                metadata: envelope.metadata,
            })
        }
        "error" => Err(BackendError::Api {
            status: if envelope.error_code != 0 {
                envelope.error_code
            } else {
                status
            },
            message: envelope.error,
        }),
        other => Err(BackendError::Decode {
            message: format!("unknown response type '{other}'"),
        }),
    }
}

/// `/1.0/operations/<id>` → `<id>`
pub fn operation_id(path: &str) -> Option<String> {
    let path = path.split('?').next().unwrap_or(path);
    let id = path.strip_prefix("/1.0/operations/")?.trim_end_matches('/');
    (!id.is_empty() && !id.contains('/')).then(|| id.to_string())
}

/// The operation record returned by the wait endpoint.
#[derive(Debug, Deserialize)]
pub struct OperationRecord {
    #[serde(default)]
    pub status: String,
    pub status_code: i64,
    #[serde(default)]
    pub err: String,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// Turn a terminal operation record into success (with its metadata) or the
/// failure it reports.
pub fn terminal_outcome(record: OperationRecord) -> Result<Option<Map<String, Value>>, BackendError> {
    match record.status_code {
        STATUS_SUCCESS => Ok(record.metadata),
        STATUS_FAILURE => Err(BackendError::OperationFailed {
            message: if record.err.is_empty() {
                record.status
            } else {
                record.err
            },
        }),
        STATUS_CANCELLED => Err(BackendError::OperationCancelled),
        other => Err(BackendError::Decode {
            message: format!(
                "operation still in status '{}' ({other}) after wait",
                record.status
            ),
        }),
    }
}

#[derive(Debug, Serialize)]
pub struct InstancesPost<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub kind: InstanceType,
    pub source: InstanceSource<'a>,
}

#[derive(Debug, Serialize)]
pub struct InstanceSource<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(flatten)]
    pub image: &'a ImageSource,
}

impl<'a> From<&'a NewInstance> for InstancesPost<'a> {
    fn from(new: &'a NewInstance) -> Self {
        Self {
            name: &new.name,
            kind: new.kind,
            source: InstanceSource {
                kind: "image",
                image: &new.source,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InstancePost<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct InstanceExecPost<'a> {
    pub command: &'a [String],
    #[serde(rename = "wait-for-websocket")]
    pub wait_for_websocket: bool,
    pub interactive: bool,
    #[serde(rename = "record-output")]
    pub record_output: bool,
}

/// Recorded output log paths for stdout (`"1"`) and stderr (`"2"`).
pub fn exec_output_paths(metadata: Option<&Map<String, Value>>) -> (Option<String>, Option<String>) {
    let output = metadata
        .and_then(|m| m.get("output"))
        .and_then(Value::as_object);
    let path = |fd: &str| {
        output
            .and_then(|o| o.get(fd))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    (path("1"), path("2"))
}
