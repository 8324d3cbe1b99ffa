//! Error types for schema loading and validation.

use thiserror::Error;

/// Result type alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while loading or validating model definitions.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Definition file could not be parsed.
    #[error("Invalid model definitions: {0}")]
    InvalidDefinitions(String),

    /// Two models (or two fields within a model) share a slug.
    #[error("Duplicate slug '{0}'")]
    DuplicateSlug(String),

    /// A link field points at a model that does not exist.
    #[error("Model '{model}' links to unknown target '{target}'")]
    UnknownTarget {
        /// Model owning the link field.
        model: String,
        /// The missing target slug.
        target: String,
    },

    /// Models form a dependency cycle through their link targets.
    #[error("Dependency cycle involving model '{0}'")]
    DependencyCycle(String),
}

impl SchemaError {
    /// Create an invalid-definitions error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidDefinitions(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchemaError::UnknownTarget {
            model: "post".to_string(),
            target: "author".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("post"));
        assert!(msg.contains("author"));
    }

    #[test]
    fn test_cycle_display() {
        let err = SchemaError::DependencyCycle("account".to_string());
        assert!(err.to_string().contains("account"));
    }
}
