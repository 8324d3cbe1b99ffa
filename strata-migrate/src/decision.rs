//! External decision collaborators.
//!
//! Rename confirmations and required-field defaults are decisions the diff
//! engine cannot make on its own. It suspends on an injected handler, one
//! question at a time, so the comparison logic stays free of terminal I/O
//! and unit-testable. Handler errors propagate to the caller unchanged.

use serde_json::Value;

use crate::error::{MigrateError, MigrateResult};

/// Resolves the decisions the differ defers to an external party.
#[async_trait::async_trait]
pub trait DecisionHandler: Send + Sync {
    /// Answer a yes/no question (one call per rename candidate).
    async fn confirm(&self, message: &str, default_answer: bool) -> MigrateResult<bool>;

    /// Supply a value (one call per field that needs a backfill default).
    async fn prompt_value(&self, message: &str) -> MigrateResult<Value>;
}

/// A handler with fixed answers. Used when a caller flag pre-decides
/// renames, and in tests.
#[derive(Debug, Clone)]
pub struct AutoDecision {
    confirm_answer: bool,
    value_answer: Option<Value>,
}

impl AutoDecision {
    /// Answer every confirmation with `answer`; refuse value prompts.
    pub fn new(answer: bool) -> Self {
        Self {
            confirm_answer: answer,
            value_answer: None,
        }
    }

    /// Also answer every value prompt with `value`.
    pub fn with_value(mut self, value: Value) -> Self {
        self.value_answer = Some(value);
        self
    }
}

#[async_trait::async_trait]
impl DecisionHandler for AutoDecision {
    async fn confirm(&self, _message: &str, _default_answer: bool) -> MigrateResult<bool> {
        Ok(self.confirm_answer)
    }

    async fn prompt_value(&self, message: &str) -> MigrateResult<Value> {
        self.value_answer
            .clone()
            .ok_or_else(|| MigrateError::prompt(format!("no value available for: {message}")))
    }
}
