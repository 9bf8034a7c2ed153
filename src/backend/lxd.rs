use std::path::PathBuf;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::Client;
use hyperlocal::{UnixClientExt, UnixConnector, Uri as UnixUri};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::Serialize;
use serde_json::{Map, Value};

use super::wire::{self, Response};
use crate::config::LxdConfig;
use crate::error::BackendError;
use crate::instance::{CapturedOutput, Etag, Instance, InstanceState, NewInstance, StateChange};

/// Client for the LXD REST API on the local unix socket.
#[derive(Clone)]
pub struct LxdClient {
    http: Client<UnixConnector, Full<Bytes>>,
    socket: PathBuf,
    project: Option<String>,
}

/// A raw HTTP exchange: status, ETag header and body.
struct Reply {
    status: u16,
    etag: Option<String>,
    body: Bytes,
}

impl LxdClient {
    /// Connect to the daemon and check it answers. Nothing is retried.
    pub async fn connect(config: &LxdConfig) -> Result<Self, BackendError> {
        let client = Self {
            http: Client::unix(),
            socket: config.socket_path(),
            project: config.project.clone(),
        };

        client.sync(Method::GET, "/1.0").await.map_err(|e| match e {
            BackendError::Transport { message } => BackendError::Connect {
                socket: client.socket.display().to_string(),
                message,
            },
            other => other,
        })?;
        tracing::info!(socket = %client.socket.display(), project = ?client.project, "connected to LXD");

        Ok(client)
    }

    /// Append the project selector, if any, to an API path.
    fn scoped(&self, path: &str) -> String {
        match &self.project {
            Some(project) => {
                let sep = if path.contains('?') { '&' } else { '?' };
                format!("{path}{sep}project={project}")
            }
            None => path.to_string(),
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        etag: Option<String>,
    ) -> Result<Reply, BackendError> {
        let path = self.scoped(path);
        tracing::debug!(%method, path = %path, "lxd request");

        let uri: Uri = UnixUri::new(&self.socket, &path).into();
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        if let Some(etag) = etag {
            builder = builder.header("if-match", etag);
        }
        let request = builder
            .body(Full::new(body.map(Bytes::from).unwrap_or_default()))
            .map_err(|e| BackendError::Transport {
                message: format!("building request for {path}: {e}"),
            })?;

        let response = self
            .http
            .request(request)
            .await
            .map_err(|e| BackendError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let etag = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string());
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| BackendError::Transport {
                message: format!("reading response for {path}: {e}"),
            })?
            .to_bytes();

        Ok(Reply { status, etag, body })
    }

    async fn sync(&self, method: Method, path: &str) -> Result<(Value, Option<String>), BackendError> {
        let reply = self.send(method, path, None, None).await?;
        match wire::decode_envelope(reply.status, &reply.body)? {
            Response::Sync(metadata) => Ok((metadata, reply.etag)),
            Response::Async { .. } => Err(BackendError::Decode {
                message: format!("expected a synchronous response from {path}"),
            }),
        }
    }

    async fn submit(
        &self,
        method: Method,
        path: &str,
        body: &impl Serialize,
        etag: Option<Etag>,
    ) -> Result<LxdOperation, BackendError> {
        let body = serde_json::to_vec(body).map_err(|e| BackendError::Decode {
            message: format!("encoding request body: {e}"),
        })?;
        self.submit_raw(method, path, Some(body), etag).await
    }

    async fn submit_raw(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        etag: Option<Etag>,
    ) -> Result<LxdOperation, BackendError> {
        let reply = self
            .send(method, path, body, etag.map(Etag::into_inner))
            .await?;
        match wire::decode_envelope(reply.status, &reply.body)? {
            Response::Async { id, metadata } => {
                tracing::debug!(operation = %id, path, "operation created");
                Ok(LxdOperation {
                    client: self.clone(),
                    id,
                    metadata: match metadata {
                        Value::Object(map) => Some(map),
                        _ => None,
                    },
                })
            }
            Response::Sync(_) => Err(BackendError::Decode {
                message: format!("expected an operation from {path}"),
            }),
        }
    }

    /// Fetch a raw (non-envelope) resource such as a recorded output log.
    async fn raw(&self, path: &str) -> Result<Vec<u8>, BackendError> {
        let reply = self.send(Method::GET, path, None, None).await?;
        if (200..300).contains(&reply.status) {
            return Ok(reply.body.to_vec());
        }
        match wire::decode_envelope(reply.status, &reply.body) {
            Err(e) => Err(e),
            Ok(_) => Err(BackendError::Api {
                status: reply.status,
                message: format!("unexpected status fetching {path}"),
            }),
        }
    }

    async fn fetch_log(&self, path: Option<&str>) -> Result<Vec<u8>, BackendError> {
        match path {
            Some(path) => self.raw(path).await,
            None => Ok(Vec::new()),
        }
    }

    async fn remove_log(&self, path: &str) {
        match self.send(Method::DELETE, path, None, None).await {
            Ok(reply) if (200..300).contains(&reply.status) => {}
            Ok(reply) => {
                tracing::warn!(path, status = reply.status, "failed to remove exec output log")
            }
            Err(e) => tracing::warn!(path, "failed to remove exec output log: {e}"),
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, BackendError> {
    serde_json::from_value(value).map_err(|e| BackendError::Decode {
        message: e.to_string(),
    })
}

/// Characters escaped in a single path segment. `/`, `?`, `#` and `%` would
/// otherwise leave the segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn instance_path(name: &str) -> String {
    format!("/1.0/instances/{}", utf8_percent_encode(name, SEGMENT))
}

impl super::Backend for LxdClient {
    type Operation = LxdOperation;

    async fn list_instances(&self) -> Result<Vec<Instance>, BackendError> {
        let (metadata, _) = self.sync(Method::GET, "/1.0/instances?recursion=1").await?;
        decode(metadata)
    }

    async fn get_instance(&self, name: &str) -> Result<(Instance, Etag), BackendError> {
        let (metadata, etag) = self.sync(Method::GET, &instance_path(name)).await?;
        let etag = etag.ok_or_else(|| BackendError::Decode {
            message: format!("no ETag returned for instance '{name}'"),
        })?;
        Ok((decode(metadata)?, Etag::new(etag)))
    }

    async fn get_instance_state(&self, name: &str) -> Result<InstanceState, BackendError> {
        let (metadata, _) = self
            .sync(Method::GET, &format!("{}/state", instance_path(name)))
            .await?;
        decode(metadata)
    }

    async fn list_images(&self) -> Result<Vec<Value>, BackendError> {
        let (metadata, _) = self.sync(Method::GET, "/1.0/images?recursion=1").await?;
        decode(metadata)
    }

    async fn create_instance(&self, new: &NewInstance) -> Result<LxdOperation, BackendError> {
        self.submit(
            Method::POST,
            "/1.0/instances",
            &wire::InstancesPost::from(new),
            None,
        )
        .await
    }

    async fn update_instance_state(
        &self,
        name: &str,
        change: StateChange,
    ) -> Result<LxdOperation, BackendError> {
        self.submit(
            Method::PUT,
            &format!("{}/state", instance_path(name)),
            &change,
            None,
        )
        .await
    }

    async fn rename_instance(
        &self,
        name: &str,
        new_name: &str,
    ) -> Result<LxdOperation, BackendError> {
        self.submit(
            Method::POST,
            &instance_path(name),
            &wire::InstancePost { name: new_name },
            None,
        )
        .await
    }

    async fn update_instance(
        &self,
        name: &str,
        instance: &Instance,
        etag: Etag,
    ) -> Result<LxdOperation, BackendError> {
        self.submit(
            Method::PUT,
            &instance_path(name),
            &instance.writable(),
            Some(etag),
        )
        .await
    }

    async fn delete_instance(&self, name: &str) -> Result<LxdOperation, BackendError> {
        self.submit_raw(Method::DELETE, &instance_path(name), None, None)
            .await
    }

    async fn exec_instance(
        &self,
        name: &str,
        command: &[String],
    ) -> Result<LxdOperation, BackendError> {
        self.submit(
            Method::POST,
            &format!("{}/exec", instance_path(name)),
            &wire::InstanceExecPost {
                command,
                wait_for_websocket: false,
                interactive: false,
                record_output: true,
            },
            None,
        )
        .await
    }

    async fn exec_output(
        &self,
        name: &str,
        operation: &LxdOperation,
    ) -> Result<CapturedOutput, BackendError> {
        let (stdout_path, stderr_path) = wire::exec_output_paths(operation.metadata.as_ref());
        if stdout_path.is_none() && stderr_path.is_none() {
            tracing::warn!(name, operation = %operation.id, "exec reported no recorded output");
        }

        let stdout = self.fetch_log(stdout_path.as_deref()).await;
        let stderr = self.fetch_log(stderr_path.as_deref()).await;

        // Logs are removed whether or not they could be read.
        for path in stdout_path.iter().chain(stderr_path.iter()) {
            self.remove_log(path).await;
        }

        Ok(CapturedOutput {
            stdout: stdout?,
            stderr: stderr?,
        })
    }
}

/// An LXD background operation.
pub struct LxdOperation {
    client: LxdClient,
    id: String,
    metadata: Option<Map<String, Value>>,
}

impl super::Operation for LxdOperation {
    async fn wait(&mut self) -> Result<(), BackendError> {
        let (record, _) = self
            .client
            .sync(
                Method::GET,
                &format!("/1.0/operations/{}/wait?timeout=-1", self.id),
            )
            .await?;
        let record: wire::OperationRecord = decode(record)?;
        let outcome = wire::terminal_outcome(record);
        tracing::debug!(operation = %self.id, ok = outcome.is_ok(), "operation finished");
        self.metadata = outcome?;
        Ok(())
    }

    fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }
}
