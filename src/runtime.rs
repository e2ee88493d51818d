//! External collaborator contracts
//!
//! The IR layer assembles records; everything that actually moves work
//! (local execution, remote dispatch, group preparation, chord barrier
//! coordination) lives behind these traits. `Runtime` bundles the
//! collaborator handles a composition needs at invocation time.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::WeftError;
use crate::signature::Signature;

/// An executable task, resolved from its registered name.
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    /// Run the task in-process and return its result.
    fn apply_local(
        &self,
        args: &[Value],
        kwargs: &Map<String, Value>,
        options: &Map<String, Value>,
    ) -> Result<Value, WeftError>;

    /// Submit the task for remote execution, returning a handle to its
    /// eventual result.
    fn apply_remote(
        &self,
        args: &[Value],
        kwargs: &Map<String, Value>,
        options: &Map<String, Value>,
    ) -> Result<Arc<dyn ResultHandle>, WeftError>;
}

/// Name-to-task lookup. Read-mostly, assumed thread-safe; the IR layer
/// only ever queries it.
pub trait TaskRegistry: Send + Sync {
    fn resolve(&self, name: &str) -> Result<Arc<dyn Task>, WeftError>;
}

/// Handle to the eventual result of a dispatched invocation.
///
/// Cancellation and timeout are owned entirely by the handle's
/// implementation, never by the IR layer.
pub trait ResultHandle: Send + Sync {
    /// Correlation id of the invocation this handle tracks.
    fn id(&self) -> &str;

    /// Block until the result is available.
    fn wait(&self) -> Result<Value, WeftError>;
}

/// Outcome of group preparation.
pub struct PreparedGroup {
    /// Members as prepared for dispatch, each with its own correlation id.
    pub tasks: Vec<Signature>,
    /// Handle over the whole batch.
    pub handle: Arc<dyn ResultHandle>,
    /// Id assigned to the group as a unit.
    pub group_id: String,
    /// Partial args the batch was prepared with.
    pub args: Vec<Value>,
}

/// Prepares and dispatches a parallel batch.
pub trait GroupCoordinator: Send + Sync {
    /// Assign member correlation ids and a group id, dispatch the batch,
    /// and hand back a result handle. Members arrive pre-cloned;
    /// implementations own them outright.
    fn prepare(
        &self,
        options: &Map<String, Value>,
        members: Vec<Signature>,
        partial_args: &[Value],
    ) -> Result<PreparedGroup, WeftError>;
}

/// Barrier coordination for chords: dispatch every header member, count
/// completions, and fire the body with the aggregated results once all
/// complete.
pub trait ChordCoordinator: Send + Sync {
    fn invoke(
        &self,
        header: &[Signature],
        body: &Signature,
        options: &Map<String, Value>,
    ) -> Result<Arc<dyn ResultHandle>, WeftError>;
}

/// Collaborator bundle handed to every invocation entry point.
pub struct Runtime {
    registry: Arc<dyn TaskRegistry>,
    groups: Arc<dyn GroupCoordinator>,
    chords: Arc<dyn ChordCoordinator>,
    /// Process-wide eager toggle; consulted only by chord invocation.
    eager: bool,
}

impl Runtime {
    pub fn new(
        registry: Arc<dyn TaskRegistry>,
        groups: Arc<dyn GroupCoordinator>,
        chords: Arc<dyn ChordCoordinator>,
    ) -> Self {
        Self {
            registry,
            groups,
            chords,
            eager: false,
        }
    }

    pub fn with_eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }

    pub fn registry(&self) -> &dyn TaskRegistry {
        self.registry.as_ref()
    }

    pub fn groups(&self) -> &dyn GroupCoordinator {
        self.groups.as_ref()
    }

    pub fn chords(&self) -> &dyn ChordCoordinator {
        self.chords.as_ref()
    }

    pub fn is_eager(&self) -> bool {
        self.eager
    }
}

/// Handle over an already-computed value. Used for eager invocations,
/// where the work finished before the handle was handed out.
pub struct ReadyHandle {
    id: String,
    value: Value,
}

impl ReadyHandle {
    pub fn new(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

impl ResultHandle for ReadyHandle {
    fn id(&self) -> &str {
        &self.id
    }

    fn wait(&self) -> Result<Value, WeftError> {
        Ok(self.value.clone())
    }
}
