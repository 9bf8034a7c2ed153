//! In-memory backend recording every call, for orchestration tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use serde_json::{Map, Value, json};

use super::{Backend, Operation};
use crate::error::BackendError;
use crate::instance::{
    CapturedOutput, Etag, Instance, InstanceState, NewInstance, StateAction, StateChange,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListInstances,
    GetInstance(String),
    GetState(String),
    ListImages,
    Create(NewInstance),
    ChangeState(String, StateChange),
    Rename(String, String),
    Update {
        name: String,
        config: BTreeMap<String, String>,
        etag: String,
    },
    Delete(String),
    Exec(String, Vec<String>),
    ExecOutput(String),
}

impl Call {
    fn kind(&self) -> &'static str {
        match self {
            Call::ListInstances => "list",
            Call::GetInstance(_) => "get",
            Call::GetState(_) => "state",
            Call::ListImages => "images",
            Call::Create(_) => "create",
            Call::ChangeState(_, change) => match change.action {
                StateAction::Start => "start",
                StateAction::Stop => "stop",
                StateAction::Restart => "restart",
                StateAction::Freeze => "freeze",
                StateAction::Unfreeze => "unfreeze",
            },
            Call::Rename(..) => "rename",
            Call::Update { .. } => "update",
            Call::Delete(_) => "delete",
            Call::Exec(..) => "exec",
            Call::ExecOutput(_) => "exec_output",
        }
    }

    /// Whether the call issues an operation (as opposed to a plain read).
    pub fn is_operation(&self) -> bool {
        matches!(
            self,
            Call::Create(_)
                | Call::ChangeState(..)
                | Call::Rename(..)
                | Call::Update { .. }
                | Call::Delete(_)
                | Call::Exec(..)
        )
    }
}

/// A single instance held in memory. Deleting it leaves the mock empty.
pub struct MockBackend {
    calls: Mutex<Vec<Call>>,
    instance: Mutex<Option<Instance>>,
    etag: String,
    submit_failures: HashMap<&'static str, String>,
    wait_failures: HashMap<&'static str, String>,
    exec_metadata: Option<Map<String, Value>>,
    exec_output: CapturedOutput,
    images: Vec<Value>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            instance: Mutex::new(None),
            etag: "etag-1".into(),
            submit_failures: HashMap::new(),
            wait_failures: HashMap::new(),
            exec_metadata: json!({ "return": 0 }).as_object().cloned(),
            exec_output: CapturedOutput::default(),
            images: Vec::new(),
        }
    }

    pub fn with_instance(self, name: &str, status: &str) -> Self {
        *self.instance.lock().unwrap() = Some(Instance {
            name: name.into(),
            status: status.into(),
            config: None,
            extra: Map::new(),
        });
        self
    }

    pub fn with_config(self, config: &[(&str, &str)]) -> Self {
        if let Some(instance) = self.instance.lock().unwrap().as_mut() {
            instance.config = Some(
                config
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
        }
        self
    }

    /// Reject submission of calls of `kind` with an API error.
    pub fn failing_submit(mut self, kind: &'static str, message: &str) -> Self {
        self.submit_failures.insert(kind, message.into());
        self
    }

    /// Accept calls of `kind`, but fail their operation.
    pub fn failing_wait(mut self, kind: &'static str, message: &str) -> Self {
        self.wait_failures.insert(kind, message.into());
        self
    }

    pub fn with_exec_result(mut self, metadata: Value, stdout: &str, stderr: &str) -> Self {
        self.exec_metadata = metadata.as_object().cloned();
        self.exec_output = CapturedOutput {
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        };
        self
    }

    pub fn with_images(mut self, images: Vec<Value>) -> Self {
        self.images = images;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn operation_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_operation).collect()
    }

    pub fn status(&self) -> Option<String> {
        self.instance
            .lock()
            .unwrap()
            .as_ref()
            .map(|i| i.status.clone())
    }

    pub fn instance(&self) -> Option<Instance> {
        self.instance.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn lookup(&self, name: &str) -> Result<Instance, BackendError> {
        match self.instance.lock().unwrap().as_ref() {
            Some(instance) if instance.name == name => Ok(instance.clone()),
            _ => Err(not_found()),
        }
    }

    /// Record `call`, then either reject it or hand back an operation that
    /// applies `effect` when waited on successfully.
    fn issue(
        &self,
        call: Call,
        effect: impl FnOnce(&mut Option<Instance>) -> Result<(), BackendError>,
    ) -> Result<MockOperation, BackendError> {
        let kind = call.kind();
        self.record(call);

        if let Some(message) = self.submit_failures.get(kind) {
            return Err(BackendError::Api {
                status: 400,
                message: message.clone(),
            });
        }
        if let Some(message) = self.wait_failures.get(kind) {
            return Ok(MockOperation::failed(message));
        }

        let mut instance = self.instance.lock().unwrap();
        effect(&mut *instance)?;
        Ok(MockOperation::succeeded(None))
    }
}

fn not_found() -> BackendError {
    BackendError::Api {
        status: 404,
        message: "Instance not found".into(),
    }
}

fn existing<'a>(
    slot: &'a mut Option<Instance>,
    name: &str,
) -> Result<&'a mut Instance, BackendError> {
    slot.as_mut().filter(|i| i.name == name).ok_or_else(not_found)
}

fn bad_request(message: &str) -> BackendError {
    BackendError::Api {
        status: 400,
        message: message.into(),
    }
}

#[derive(Debug)]
pub struct MockOperation {
    outcome: Option<String>,
    metadata: Option<Map<String, Value>>,
    waited: bool,
}

impl MockOperation {
    fn succeeded(metadata: Option<Map<String, Value>>) -> Self {
        Self {
            outcome: None,
            metadata,
            waited: false,
        }
    }

    fn failed(message: &str) -> Self {
        Self {
            outcome: Some(message.into()),
            metadata: None,
            waited: false,
        }
    }
}

impl Operation for MockOperation {
    async fn wait(&mut self) -> Result<(), BackendError> {
        self.waited = true;
        match &self.outcome {
            Some(message) => Err(BackendError::OperationFailed {
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn metadata(&self) -> Option<&Map<String, Value>> {
        if self.waited { self.metadata.as_ref() } else { None }
    }
}

impl Backend for MockBackend {
    type Operation = MockOperation;

    async fn list_instances(&self) -> Result<Vec<Instance>, BackendError> {
        self.record(Call::ListInstances);
        Ok(self.instance.lock().unwrap().iter().cloned().collect())
    }

    async fn get_instance(&self, name: &str) -> Result<(Instance, Etag), BackendError> {
        self.record(Call::GetInstance(name.into()));
        Ok((self.lookup(name)?, Etag::new(self.etag.clone())))
    }

    async fn get_instance_state(&self, name: &str) -> Result<InstanceState, BackendError> {
        self.record(Call::GetState(name.into()));
        let instance = self.lookup(name)?;
        Ok(InstanceState {
            status: instance.status,
            extra: Map::new(),
        })
    }

    async fn list_images(&self) -> Result<Vec<Value>, BackendError> {
        self.record(Call::ListImages);
        Ok(self.images.clone())
    }

    async fn create_instance(&self, new: &NewInstance) -> Result<MockOperation, BackendError> {
        let name = new.name.clone();
        self.issue(Call::Create(new.clone()), |slot| {
            if slot.is_some() {
                return Err(bad_request("Instance already exists"));
            }
            *slot = Some(Instance {
                name,
                status: "Stopped".into(),
                config: None,
                extra: Map::new(),
            });
            Ok(())
        })
    }

    async fn update_instance_state(
        &self,
        name: &str,
        change: StateChange,
    ) -> Result<MockOperation, BackendError> {
        self.issue(Call::ChangeState(name.into(), change), |slot| {
            let instance = existing(slot, name)?;
            let next = match (change.action, instance.status.as_str()) {
                (StateAction::Start, "Stopped") => "Running",
                (StateAction::Start, _) => {
                    return Err(bad_request("The instance is already running"));
                }
                (StateAction::Stop, "Stopped") => {
                    return Err(bad_request("The instance is already stopped"));
                }
                (StateAction::Stop, _) => "Stopped",
                (StateAction::Restart, "Running") => "Running",
                (StateAction::Restart, _) => {
                    return Err(bad_request("The instance isn't running"));
                }
                (StateAction::Freeze, "Running") => "Frozen",
                (StateAction::Freeze, _) => {
                    return Err(bad_request("The instance isn't running"));
                }
                (StateAction::Unfreeze, "Frozen") => "Running",
                (StateAction::Unfreeze, _) => {
                    return Err(bad_request("The instance isn't frozen"));
                }
            };
            instance.status = next.into();
            Ok(())
        })
    }

    async fn rename_instance(
        &self,
        name: &str,
        new_name: &str,
    ) -> Result<MockOperation, BackendError> {
        self.issue(Call::Rename(name.into(), new_name.into()), |slot| {
            existing(slot, name)?.name = new_name.into();
            Ok(())
        })
    }

    async fn update_instance(
        &self,
        name: &str,
        instance: &Instance,
        etag: Etag,
    ) -> Result<MockOperation, BackendError> {
        let etag = etag.into_inner();
        let call = Call::Update {
            name: name.into(),
            config: instance.config.clone().unwrap_or_default(),
            etag: etag.clone(),
        };
        let config = instance.config.clone();
        let current = self.etag.clone();
        self.issue(call, |slot| {
            if etag != current {
                return Err(BackendError::Api {
                    status: 412,
                    message: "ETag doesn't match".into(),
                });
            }
            existing(slot, name)?.config = config;
            Ok(())
        })
    }

    async fn delete_instance(&self, name: &str) -> Result<MockOperation, BackendError> {
        self.issue(Call::Delete(name.into()), |slot| {
            if existing(slot, name)?.status == "Running" {
                return Err(bad_request("Instance is running"));
            }
            *slot = None;
            Ok(())
        })
    }

    async fn exec_instance(
        &self,
        name: &str,
        command: &[String],
    ) -> Result<MockOperation, BackendError> {
        let operation = self.issue(Call::Exec(name.into(), command.to_vec()), |slot| {
            existing(slot, name).map(|_| ())
        })?;
        Ok(match operation.outcome {
            None => MockOperation::succeeded(self.exec_metadata.clone()),
            Some(_) => operation,
        })
    }

    async fn exec_output(
        &self,
        name: &str,
        _operation: &MockOperation,
    ) -> Result<CapturedOutput, BackendError> {
        self.record(Call::ExecOutput(name.into()));
        Ok(self.exec_output.clone())
    }
}
