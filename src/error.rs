//! Error types for the composition IR

use thiserror::Error;

/// All failures the IR layer can surface.
///
/// Collaborator-side failures (task execution, group preparation, chord
/// coordination) are funneled through `Execution`.
#[derive(Error, Debug)]
pub enum WeftError {
    /// A task name could not be resolved through the registry. Raised
    /// lazily at first access, never at construction.
    #[error("unknown task '{0}'")]
    UnknownTask(String),

    /// A wire record was missing or mistyped a field a composite needs.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Neither operand defined a sequential composition.
    #[error("no sequential composition defined between `{left}` and `{right}`")]
    Composition { left: String, right: String },

    /// Chunk sizes below 1 are rejected at construction.
    #[error("chunk size must be at least 1")]
    InvalidChunkSize,

    /// The operation needs a chord body, and this chord has none.
    #[error("chord has no body")]
    MissingChordBody,

    /// A collaborator reported a failure.
    #[error("execution failed: {0}")]
    Execution(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
