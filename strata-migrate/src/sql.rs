//! SQLite statement compilation.
//!
//! Compiles structured steps into executable SQL against a target model
//! set. The compiler keeps a working copy of the model set and applies
//! create/drop/rename steps to it as it goes, so shadow models created
//! mid-migration resolve for the copy steps that follow. A step that
//! references a slug absent from the working set fails compilation.

use indexmap::IndexMap;
use serde_json::Value;
use strata_schema::{Field, FieldType, Model, Trigger, TriggerAction};

use crate::error::{MigrateError, MigrateResult};
use crate::parse::parse_step;
use crate::step::Step;

/// A single executable statement with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    /// The SQL text.
    pub statement: String,
    /// Positional parameters, in order.
    pub params: Vec<Value>,
}

impl SqlStatement {
    /// A statement without parameters.
    pub fn plain(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            params: Vec::new(),
        }
    }
}

/// SQL compiler targeting SQLite.
#[derive(Debug, Default)]
pub struct SqliteCompiler;

impl SqliteCompiler {
    /// Create a new compiler.
    pub fn new() -> Self {
        Self
    }

    /// Compile an ordered step list against the target model set.
    pub fn compile(&self, steps: &[Step], models: &[Model]) -> MigrateResult<Vec<SqlStatement>> {
        let mut working: IndexMap<String, Model> = models
            .iter()
            .map(|m| (m.slug.clone(), m.clone()))
            .collect();

        let mut statements = Vec::new();
        for step in steps {
            statements.extend(self.compile_step(step, &mut working)?);
        }
        Ok(statements)
    }

    fn compile_step(
        &self,
        step: &Step,
        working: &mut IndexMap<String, Model>,
    ) -> MigrateResult<Vec<SqlStatement>> {
        match step {
            Step::CreateModel { model } => {
                // Registered before trigger compilation so effects may
                // reference the model itself.
                working.insert(model.slug.clone(), model.clone());

                let mut stmts = vec![SqlStatement::plain(self.create_table(model))];
                for field in model.fields.values() {
                    if field.is_link_many() {
                        stmts.push(SqlStatement::plain(self.create_join_table(model, field)));
                    }
                }
                for index in model.indexes.values() {
                    stmts.push(SqlStatement::plain(create_index_sql(&model.slug, index)));
                }
                for trigger in model.triggers.values() {
                    stmts.push(self.create_trigger(model, trigger, working)?);
                }
                Ok(stmts)
            }
            Step::DropModel { model } => {
                require(working, model)?;
                working.shift_remove(model);
                Ok(vec![SqlStatement::plain(format!(
                    "DROP TABLE \"{model}\";"
                ))])
            }
            Step::RenameModel { from, to } => {
                let model = require(working, from)?.renamed(to.clone());
                working.shift_remove(from);
                working.insert(to.clone(), model);
                Ok(vec![SqlStatement::plain(format!(
                    "ALTER TABLE \"{from}\" RENAME TO \"{to}\";"
                ))])
            }
            Step::AlterModelMeta { model, name } => {
                // Naming metadata lives outside the table definition; the
                // statement list only validates the reference.
                let entry = require_mut(working, model)?;
                entry.name = Some(name.clone());
                Ok(vec![])
            }
            Step::CreateField { model, field } => {
                let entry = require_mut(working, model)?;
                entry.fields.insert(field.slug.clone(), field.clone());
                if field.is_link_many() {
                    let owner = entry.clone();
                    return Ok(vec![SqlStatement::plain(
                        self.create_join_table(&owner, field),
                    )]);
                }
                Ok(vec![SqlStatement::plain(format!(
                    "ALTER TABLE \"{model}\" ADD COLUMN {};",
                    column_definition(field)
                ))])
            }
            Step::AlterField { model, field, to } => {
                let entry = require_mut(working, model)?;
                entry.fields.insert(field.clone(), to.clone());
                // Only metadata alters compile here; shape changes arrive
                // as rebuild choreographies.
                Ok(vec![])
            }
            Step::RenameField { model, from, to } => {
                let entry = require_mut(working, model)?;
                if let Some(mut f) = entry.fields.shift_remove(from) {
                    f.slug = to.clone();
                    entry.fields.insert(to.clone(), f);
                }
                Ok(vec![SqlStatement::plain(format!(
                    "ALTER TABLE \"{model}\" RENAME COLUMN \"{from}\" TO \"{to}\";"
                ))])
            }
            Step::DropField { model, field } => {
                let entry = require_mut(working, model)?;
                entry.fields.shift_remove(field);
                Ok(vec![SqlStatement::plain(format!(
                    "ALTER TABLE \"{model}\" DROP COLUMN \"{field}\";"
                ))])
            }
            Step::CreateIndex { model, index } => {
                let entry = require_mut(working, model)?;
                entry.indexes.insert(index.slug.clone(), index.clone());
                Ok(vec![SqlStatement::plain(create_index_sql(model, index))])
            }
            Step::DropIndex { model, index } => {
                let entry = require_mut(working, model)?;
                entry.indexes.shift_remove(index);
                Ok(vec![SqlStatement::plain(format!(
                    "DROP INDEX \"{model}_{index}\";"
                ))])
            }
            Step::CreateTrigger { model, trigger } => {
                let owner = require(working, model)?.clone();
                let stmt = self.create_trigger(&owner, trigger, working)?;
                let entry = require_mut(working, model)?;
                entry.triggers.insert(trigger.slug.clone(), trigger.clone());
                Ok(vec![stmt])
            }
            Step::DropTrigger { model, trigger } => {
                let entry = require_mut(working, model)?;
                entry.triggers.shift_remove(trigger);
                Ok(vec![SqlStatement::plain(format!(
                    "DROP TRIGGER \"{model}_{trigger}\";"
                ))])
            }
            Step::CopyModelData { from, to } => {
                let source = require(working, from)?;
                let dest = require(working, to)?;

                // Copy the columns both sides share; new constrained
                // columns fall back to their declared defaults.
                let mut columns = vec!["\"id\"".to_string()];
                for slug in dest.fields.keys() {
                    if source.fields.contains_key(slug)
                        && !dest.fields[slug].is_link_many()
                    {
                        columns.push(format!("\"{slug}\""));
                    }
                }
                let columns = columns.join(", ");
                Ok(vec![SqlStatement::plain(format!(
                    "INSERT INTO \"{to}\" ({columns}) SELECT {columns} FROM \"{from}\";"
                ))])
            }
            Step::CopyFieldData { model, from, to } => {
                require(working, model)?;
                Ok(vec![SqlStatement::plain(format!(
                    "UPDATE \"{model}\" SET \"{to}\" = \"{from}\";"
                ))])
            }
            Step::BackfillField {
                model,
                field,
                value,
            } => {
                require(working, model)?;
                Ok(vec![SqlStatement {
                    statement: format!(
                        "UPDATE \"{model}\" SET \"{field}\" = ?1 WHERE \"{field}\" IS NULL;"
                    ),
                    params: vec![value.clone()],
                }])
            }
        }
    }

    /// Generate the CREATE TABLE statement. Every model carries an
    /// implicit prefixed-ID column; link-many fields live in join tables
    /// and produce no column here.
    fn create_table(&self, model: &Model) -> String {
        let mut columns = vec!["\"id\" TEXT PRIMARY KEY".to_string()];
        for field in model.fields.values() {
            if !field.is_link_many() {
                columns.push(column_definition(field));
            }
        }
        format!(
            "CREATE TABLE \"{}\" (\n    {}\n);",
            model.slug,
            columns.join(",\n    ")
        )
    }

    /// Generate the join table for a link-many field.
    fn create_join_table(&self, model: &Model, field: &Field) -> String {
        let target = field.target.as_deref().unwrap_or_default();
        format!(
            "CREATE TABLE \"{model}_{field_slug}\" (\n    \"source\" TEXT NOT NULL REFERENCES \"{model}\" (\"id\"),\n    \"target\" TEXT NOT NULL REFERENCES \"{target}\" (\"id\")\n);",
            model = model.slug,
            field_slug = field.slug,
        )
    }

    /// Generate a CREATE TRIGGER statement. Effect expressions use the
    /// same step vocabulary and are compiled against the working set.
    fn create_trigger(
        &self,
        model: &Model,
        trigger: &Trigger,
        working: &mut IndexMap<String, Model>,
    ) -> MigrateResult<SqlStatement> {
        let mut head = format!(
            "CREATE TRIGGER \"{}_{}\" {} {}",
            model.slug,
            trigger.slug,
            trigger.when.as_sql(),
            trigger.action.as_sql()
        );
        if let Some(fields) = &trigger.fields {
            if trigger.action == TriggerAction::Update {
                let cols: Vec<String> =
                    fields.iter().map(|f| format!("\"{}\"", f.slug)).collect();
                head.push_str(&format!(" OF {}", cols.join(", ")));
            }
        }
        head.push_str(&format!(" ON \"{}\" FOR EACH ROW BEGIN", model.slug));

        let mut body = Vec::new();
        for effect in &trigger.effects {
            let step = parse_step(effect)?;
            for stmt in self.compile_step(&step, working)? {
                // Trigger bodies cannot carry bound parameters, so any
                // placeholders are inlined as literals.
                let mut text = stmt.statement;
                for (position, param) in stmt.params.iter().enumerate() {
                    text = text.replace(
                        &format!("?{}", position + 1),
                        &sql_literal(param),
                    );
                }
                body.push(format!("    {text}"));
            }
        }

        let mut sql = head;
        sql.push('\n');
        for line in body {
            sql.push_str(&line);
            sql.push('\n');
        }
        sql.push_str("END;");
        Ok(SqlStatement::plain(sql))
    }
}

/// Column definition for a field.
fn column_definition(field: &Field) -> String {
    let mut parts = vec![format!("\"{}\"", field.slug), sql_type(field).to_string()];

    if field.increment {
        parts.push("PRIMARY KEY AUTOINCREMENT".to_string());
    }
    if field.required {
        parts.push("NOT NULL".to_string());
    }
    if field.unique {
        parts.push("UNIQUE".to_string());
    }
    if let Some(default) = &field.default_value {
        parts.push(format!("DEFAULT {}", sql_literal(default)));
    }
    if field.field_type == FieldType::Link && !field.is_link_many() {
        if let Some(target) = &field.target {
            parts.push(format!("REFERENCES \"{target}\" (\"id\")"));
        }
    }

    parts.join(" ")
}

/// SQLite storage type for a field.
fn sql_type(field: &Field) -> &'static str {
    match field.field_type {
        FieldType::String => "TEXT",
        FieldType::Number => "INTEGER",
        FieldType::Boolean => "BOOLEAN",
        FieldType::Date => "DATETIME",
        FieldType::Blob => "BLOB",
        FieldType::Json => "TEXT",
        FieldType::Link => "TEXT",
    }
}

/// Render a JSON value as a SQL literal for DEFAULT clauses.
fn sql_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

fn require<'m>(working: &'m IndexMap<String, Model>, slug: &str) -> MigrateResult<&'m Model> {
    working
        .get(slug)
        .ok_or_else(|| MigrateError::UnknownModel(slug.to_string()))
}

/// CREATE INDEX for a model-scoped index. Index names are prefixed with
/// the owning model slug because SQLite's index namespace is global.
fn create_index_sql(model: &str, index: &strata_schema::Index) -> String {
    let unique = if index.unique { "UNIQUE " } else { "" };
    let cols: Vec<String> = index
        .fields
        .iter()
        .map(|f| format!("\"{}\"", f.slug))
        .collect();
    format!(
        "CREATE {unique}INDEX \"{model}_{}\" ON \"{model}\" ({});",
        index.slug,
        cols.join(", ")
    )
}

fn require_mut<'m>(
    working: &'m mut IndexMap<String, Model>,
    slug: &str,
) -> MigrateResult<&'m mut Model> {
    working
        .get_mut(slug)
        .ok_or_else(|| MigrateError::UnknownModel(slug.to_string()))
}
