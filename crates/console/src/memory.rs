//! In-memory cloud used by the command-line driver and the scenario tests.
//!
//! The cloud is loaded from a [`CloudFixture`] (YAML or JSON), serves every
//! collaborator role, records each call it receives, and can be told to fail
//! specific operations.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use anyhow::anyhow;
use nimbus_engine::ResourceClient;
use nimbus_types::{CollaboratorError, Requester, Resource, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};
use tracing::debug;

/// Collaborator operation, used for call recording and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    List,
    Get,
    Create,
    Delete,
    GetAuxiliary,
    SetAuxiliary,
}

/// Class of failure an injected fault produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    #[default]
    Unavailable,
    Rejected,
    Unexpected,
}

/// Makes every `operation` on `kind` fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectedFailure {
    pub operation: Operation,
    pub kind: ResourceKind,
    #[serde(default)]
    pub mode: FailureMode,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Serialized state of a cloud plus the requester acting on it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudFixture {
    pub requester: Requester,
    pub resources: BTreeMap<ResourceKind, Vec<Resource>>,
    /// Auxiliary data keyed by kind, then entity id.
    pub auxiliary: BTreeMap<ResourceKind, BTreeMap<String, JsonMap<String, Value>>>,
    pub failures: Vec<InjectedFailure>,
}

/// One call received by the cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub operation: Operation,
    pub kind: ResourceKind,
    pub id: Option<String>,
}

#[derive(Debug, Default)]
struct CloudState {
    resources: BTreeMap<ResourceKind, Vec<Resource>>,
    auxiliary: BTreeMap<ResourceKind, BTreeMap<String, JsonMap<String, Value>>>,
    failures: Vec<InjectedFailure>,
    calls: Vec<CallRecord>,
    next_id: u64,
}

/// Thread-safe in-memory implementation of every collaborator role.
#[derive(Debug)]
pub struct InMemoryCloud {
    state: Mutex<CloudState>,
}

impl InMemoryCloud {
    pub fn new() -> Self {
        Self::from_fixture(&CloudFixture::default())
    }

    /// Builds the cloud from a fixture; the fixture's requester is not part of the cloud.
    pub fn from_fixture(fixture: &CloudFixture) -> Self {
        Self {
            state: Mutex::new(CloudState {
                resources: fixture.resources.clone(),
                auxiliary: fixture.auxiliary.clone(),
                failures: fixture.failures.clone(),
                calls: Vec::new(),
                next_id: 1,
            }),
        }
    }

    pub fn with_resource(self, kind: ResourceKind, resource: Resource) -> Self {
        self.lock().resources.entry(kind).or_default().push(resource);
        self
    }

    pub fn with_auxiliary(self, kind: ResourceKind, id: impl Into<String>, data: JsonMap<String, Value>) -> Self {
        self.lock().auxiliary.entry(kind).or_default().insert(id.into(), data);
        self
    }

    /// Makes every later `operation` on `kind` fail with `mode`.
    pub fn fail(&self, operation: Operation, kind: ResourceKind, mode: FailureMode) {
        self.lock().failures.push(InjectedFailure {
            operation,
            kind,
            mode,
            reason: None,
        });
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, operation: Operation, kind: ResourceKind) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation == operation && call.kind == kind)
            .count()
    }

    /// Snapshot of the stored entities of `kind`.
    pub fn resources(&self, kind: ResourceKind) -> Vec<Resource> {
        self.lock().resources.get(&kind).cloned().unwrap_or_default()
    }

    pub fn contains(&self, kind: ResourceKind, id: &str) -> bool {
        self.lock()
            .resources
            .get(&kind)
            .is_some_and(|items| items.iter().any(|item| item.id == id))
    }

    pub fn auxiliary(&self, kind: ResourceKind, id: &str) -> Option<JsonMap<String, Value>> {
        self.lock().auxiliary.get(&kind).and_then(|entries| entries.get(id)).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the call and returns the injected failure, if any.
    fn enter(&self, operation: Operation, kind: ResourceKind, id: Option<&str>) -> Result<MutexGuard<'_, CloudState>, CollaboratorError> {
        let mut state = self.lock();
        debug!(operation = ?operation, kind = %kind, id = ?id, "in-memory cloud call");
        state.calls.push(CallRecord {
            operation,
            kind,
            id: id.map(str::to_string),
        });

        let failure = state
            .failures
            .iter()
            .find(|failure| failure.operation == operation && failure.kind == kind)
            .cloned();
        match failure {
            None => Ok(state),
            Some(failure) => Err(injected_error(&failure)),
        }
    }
}

fn service_name(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Image => "image",
        ResourceKind::Volume | ResourceKind::VolumeSnapshot => "block storage",
        ResourceKind::Network | ResourceKind::SecurityGroup => "network",
        ResourceKind::Flavor | ResourceKind::AvailabilityZone | ResourceKind::Keypair | ResourceKind::Server => "compute",
    }
}

fn injected_error(failure: &InjectedFailure) -> CollaboratorError {
    let reason = failure.reason.clone().unwrap_or_else(|| "connection refused".to_string());
    match failure.mode {
        FailureMode::Unavailable => CollaboratorError::unavailable(service_name(failure.kind), reason),
        FailureMode::Rejected => CollaboratorError::Rejected(reason),
        FailureMode::Unexpected => CollaboratorError::Unexpected(anyhow!("{} failed: {}", failure.kind, reason)),
    }
}

impl ResourceClient for InMemoryCloud {
    fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>, CollaboratorError> {
        let state = self.enter(Operation::List, kind, None)?;
        Ok(state.resources.get(&kind).cloned().unwrap_or_default())
    }

    fn get(&self, kind: ResourceKind, id: &str) -> Result<Resource, CollaboratorError> {
        let state = self.enter(Operation::Get, kind, Some(id))?;
        state
            .resources
            .get(&kind)
            .and_then(|items| items.iter().find(|item| item.id == id))
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound { kind, id: id.to_string() })
    }

    fn create(&self, kind: ResourceKind, attributes: &JsonMap<String, Value>) -> Result<Resource, CollaboratorError> {
        let mut state = self.enter(Operation::Create, kind, None)?;
        let mut attributes = attributes.clone();

        let id = match attributes.remove("id") {
            Some(Value::String(id)) if !id.is_empty() => id,
            Some(Value::Number(number)) => number.to_string(),
            _ => {
                let id = format!("{}-{}", kind, state.next_id);
                state.next_id += 1;
                id
            }
        };
        let name = match attributes.remove("name") {
            Some(Value::String(name)) => name,
            _ => String::new(),
        };

        let items = state.resources.entry(kind).or_default();
        if items.iter().any(|item| item.id == id) {
            return Err(CollaboratorError::Rejected(format!("{} '{}' already exists", kind, id)));
        }

        let resource = Resource { id, name, attributes };
        items.push(resource.clone());
        Ok(resource)
    }

    fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), CollaboratorError> {
        let mut state = self.enter(Operation::Delete, kind, Some(id))?;
        let items = state.resources.entry(kind).or_default();
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return Err(CollaboratorError::NotFound { kind, id: id.to_string() });
        }
        if let Some(entries) = state.auxiliary.get_mut(&kind) {
            entries.remove(id);
        }
        Ok(())
    }

    fn get_auxiliary(&self, kind: ResourceKind, id: &str) -> Result<JsonMap<String, Value>, CollaboratorError> {
        let state = self.enter(Operation::GetAuxiliary, kind, Some(id))?;
        let exists = state
            .resources
            .get(&kind)
            .is_some_and(|items| items.iter().any(|item| item.id == id));
        if !exists {
            return Err(CollaboratorError::NotFound { kind, id: id.to_string() });
        }
        Ok(state
            .auxiliary
            .get(&kind)
            .and_then(|entries| entries.get(id))
            .cloned()
            .unwrap_or_default())
    }

    fn set_auxiliary(&self, kind: ResourceKind, id: &str, data: &JsonMap<String, Value>) -> Result<(), CollaboratorError> {
        let mut state = self.enter(Operation::SetAuxiliary, kind, Some(id))?;
        let exists = state
            .resources
            .get(&kind)
            .is_some_and(|items| items.iter().any(|item| item.id == id));
        if !exists {
            return Err(CollaboratorError::NotFound { kind, id: id.to_string() });
        }
        state
            .auxiliary
            .entry(kind)
            .or_default()
            .entry(id.to_string())
            .or_default()
            .extend(data.clone());
        Ok(())
    }
}
