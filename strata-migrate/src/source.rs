//! Collaborator traits for reading and writing live state.
//!
//! The engine never talks to a database directly. A [`ModelSource`]
//! supplies the models currently in effect, and a [`StatementExecutor`]
//! applies compiled statements. Both are implemented by the caller.

use strata_schema::Model;

use crate::error::MigrateResult;
use crate::sql::SqlStatement;

/// Supplies the model set currently in effect.
#[async_trait::async_trait]
pub trait ModelSource: Send + Sync {
    /// Return every model as it currently exists.
    async fn get_models(&self) -> MigrateResult<Vec<Model>>;
}

/// Applies compiled statements to the live database.
#[async_trait::async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Execute the statements in order. Implementations should wrap the
    /// batch in a transaction so a failure leaves the database untouched.
    async fn execute(&self, statements: &[SqlStatement]) -> MigrateResult<()>;
}

/// A source backed by an in-memory model list.
#[derive(Debug, Default)]
pub struct StaticSource {
    models: Vec<Model>,
}

impl StaticSource {
    /// Create a source that always returns the given models.
    pub fn new(models: Vec<Model>) -> Self {
        Self { models }
    }

    /// A source representing an empty database.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ModelSource for StaticSource {
    async fn get_models(&self) -> MigrateResult<Vec<Model>> {
        Ok(self.models.clone())
    }
}
