//! # strata-migrate
//!
//! Migration engine for Strata model definitions.
//!
//! This crate provides functionality for:
//! - Diffing defined models against the models currently in effect
//! - Interactive rename detection with confirmation prompts
//! - Temp-model and temp-column rebuild choreography for constraint
//!   changes that cannot be expressed as in-place alters
//! - Index and trigger reconciliation
//! - Migration artifact persistence (`migration-NNNN.strata` files)
//! - SQL compilation targeting SQLite
//!
//! ## Architecture
//!
//! The engine compares two model sets and emits an ordered list of
//! [`Step`]s. Steps render to a textual surface form, persist as numbered
//! artifacts, and compile to SQL statements:
//!
//! ```text
//! ┌───────────────┐     ┌──────────────┐     ┌───────────────────┐
//! │ Defined models│────▶│ Model differ │────▶│ Protocol (steps)  │
//! └───────────────┘     └──────────────┘     └───────────────────┘
//!         ▲                    │                      │
//! ┌───────────────┐            ▼                      ▼
//! │ Model source  │     ┌──────────────┐     ┌───────────────────┐
//! └───────────────┘     │ Decisions    │     │ SQLite statements │
//!                       └──────────────┘     └───────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_migrate::{
//!     AutoDecision, MigrationConfig, MigrationEngine, PassthroughFormatter, StaticSource,
//! };
//!
//! async fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     let defined = strata_schema::load_model_definitions("./models.json")?;
//!
//!     let config = MigrationConfig::new().migrations_dir("./migrations");
//!     let engine = MigrationEngine::new(config, AutoDecision::new(true));
//!
//!     let plan = engine.plan(&defined, &StaticSource::empty()).await?;
//!     println!("Plan: {}", plan.summary());
//!
//!     if !plan.is_empty() {
//!         let path = engine.create(&plan, &PassthroughFormatter).await?;
//!         println!("Wrote {}", path.display());
//!     }
//!     Ok(())
//! }
//! ```

pub mod decision;
pub mod engine;
pub mod error;
pub mod field_diff;
pub mod model_diff;
pub mod options;
pub mod parse;
pub mod protocol;
pub mod reconcile;
pub mod source;
pub mod sql;
pub mod step;

// Re-exports
pub use decision::{AutoDecision, DecisionHandler};
pub use engine::{ApplyResult, MigrationConfig, MigrationEngine, MigrationPlan};
pub use error::{MigrateError, MigrateResult};
pub use field_diff::diff_fields;
pub use model_diff::diff_models;
pub use options::{DiffOptions, MetaPolicy, RenamePolicy};
pub use parse::parse_step;
pub use protocol::{next_sequence_number, Formatter, PassthroughFormatter, Protocol};
pub use reconcile::{reconcile_indexes, reconcile_triggers};
pub use source::{ModelSource, StatementExecutor, StaticSource};
pub use sql::{SqlStatement, SqliteCompiler};
pub use step::Step;
