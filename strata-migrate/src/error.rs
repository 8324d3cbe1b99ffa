//! Error types for the migration engine.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Errors that can occur during diffing, artifact handling and compilation.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema loading or validation error.
    #[error("Schema error: {0}")]
    Schema(#[from] strata_schema::SchemaError),

    /// A step expression could not be parsed.
    #[error("Malformed step: {0}")]
    MalformedStep(String),

    /// A persisted artifact does not have the expected shape.
    #[error("Malformed migration artifact '{path}': {reason}")]
    MalformedArtifact {
        /// Path of the offending file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A migration artifact was requested that does not exist.
    #[error("Migration file not found at '{path}'")]
    ArtifactNotFound {
        /// The expected path.
        path: PathBuf,
    },

    /// A step references a model slug absent from the target model set.
    #[error("Unknown model '{0}' referenced by migration step")]
    UnknownModel(String),

    /// The external decision collaborator failed or was cancelled.
    #[error("Prompt failed: {0}")]
    Prompt(String),

    /// The external statement executor failed.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// General migration error.
    #[error("Migration error: {0}")]
    Other(String),
}

impl MigrateError {
    /// Create a malformed-step error.
    pub fn malformed_step(msg: impl Into<String>) -> Self {
        Self::MalformedStep(msg.into())
    }

    /// Create a malformed-artifact error.
    pub fn malformed_artifact(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a prompt error.
    pub fn prompt(msg: impl Into<String>) -> Self {
        Self::Prompt(msg.into())
    }

    /// Create an execution error.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create an other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
