//! # strata-schema
//!
//! Model, field, index and trigger definitions for the Strata migration
//! engine, plus the loader for locally declared model definitions.
//!
//! Models are ephemeral in-memory data: both the "defined" set (declared
//! definitions) and the "existing" set (database snapshot) are loaded fresh
//! per invocation and never mutated by the diff engine.

pub mod definitions;
pub mod error;
pub mod field;
pub mod index;
pub mod model;

// Re-exports
pub use definitions::{load_model_definitions, order_by_dependencies, parse_model_definitions};
pub use error::{SchemaError, SchemaResult};
pub use field::{Field, FieldType, LinkKind};
pub use index::{Index, IndexField, Trigger, TriggerAction, TriggerWhen};
pub use model::Model;
