//! The migration step vocabulary.
//!
//! Each step is a tagged variant carrying a strongly-typed payload; the
//! textual surface form (`create.model({...})`, `drop.model("x")`, ...) is
//! produced only at the persistence boundary by [`Step::render`] and read
//! back by the parser. The surface forms are stable: existing migration
//! files must replay byte-for-byte.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_schema::{Field, Index, IndexField, Model, Trigger};

/// A single schema-mutation operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Create a model with its fields (and indexes/triggers) inlined.
    CreateModel {
        /// The model to create.
        model: Model,
    },
    /// Drop a model.
    DropModel {
        /// Slug of the model to drop.
        model: String,
    },
    /// Rename a model.
    RenameModel {
        /// Current slug.
        from: String,
        /// New slug.
        to: String,
    },
    /// Change a model's human-readable name in place.
    AlterModelMeta {
        /// Slug of the model.
        model: String,
        /// New name.
        name: String,
    },
    /// Add a field to a model.
    CreateField {
        /// Owning model slug.
        model: String,
        /// The field to add.
        field: Field,
    },
    /// Replace a field's shape in place.
    AlterField {
        /// Owning model slug.
        model: String,
        /// Slug of the field to alter.
        field: String,
        /// The new shape.
        to: Field,
    },
    /// Rename a field.
    RenameField {
        /// Owning model slug.
        model: String,
        /// Current field slug.
        from: String,
        /// New field slug.
        to: String,
    },
    /// Drop a field.
    DropField {
        /// Owning model slug.
        model: String,
        /// Slug of the field to drop.
        field: String,
    },
    /// Create an index.
    CreateIndex {
        /// Owning model slug.
        model: String,
        /// The index to create.
        index: Index,
    },
    /// Drop an index.
    DropIndex {
        /// Owning model slug.
        model: String,
        /// Slug of the index to drop.
        index: String,
    },
    /// Create a trigger.
    CreateTrigger {
        /// Owning model slug.
        model: String,
        /// The trigger to create.
        trigger: Trigger,
    },
    /// Drop a trigger.
    DropTrigger {
        /// Owning model slug.
        model: String,
        /// Slug of the trigger to drop.
        trigger: String,
    },
    /// Copy all records from one model into another (temp-model rebuilds).
    CopyModelData {
        /// Source model slug.
        from: String,
        /// Destination model slug.
        to: String,
    },
    /// Copy one field's values into another field of the same model
    /// (temp-column rebuilds).
    CopyFieldData {
        /// Owning model slug.
        model: String,
        /// Source field slug.
        from: String,
        /// Destination field slug.
        to: String,
    },
    /// Backfill a field with a literal value where it is unset.
    BackfillField {
        /// Owning model slug.
        model: String,
        /// Field slug.
        field: String,
        /// Value to backfill with.
        value: Value,
    },
}

impl Step {
    /// Render the textual surface form of this step.
    pub fn render(&self) -> String {
        match self {
            Self::CreateModel { model } => {
                format!("create.model({})", model_literal(model))
            }
            Self::DropModel { model } => format!("drop.model({})", dquote(model)),
            Self::RenameModel { from, to } => {
                format!("alter.model({}).to({{slug: {}}})", dquote(from), dquote(to))
            }
            Self::AlterModelMeta { model, name } => {
                format!(
                    "alter.model({}).to({{name: {}}})",
                    dquote(model),
                    dquote(name)
                )
            }
            Self::CreateField { model, field } => {
                format!(
                    "alter.model({}).create.field({})",
                    dquote(model),
                    field_literal(field)
                )
            }
            Self::AlterField { model, field, to } => {
                format!(
                    "alter.model({}).alter.field({}).to({})",
                    dquote(model),
                    dquote(field),
                    field_literal(to)
                )
            }
            Self::RenameField { model, from, to } => {
                format!(
                    "alter.model({}).alter.field({}).to({{slug: {}}})",
                    dquote(model),
                    dquote(from),
                    dquote(to)
                )
            }
            Self::DropField { model, field } => {
                format!(
                    "alter.model({}).drop.field({})",
                    dquote(model),
                    dquote(field)
                )
            }
            Self::CreateIndex { model, index } => {
                format!(
                    "alter.model({}).create.index({})",
                    dquote(model),
                    index_literal(index)
                )
            }
            Self::DropIndex { model, index } => {
                format!(
                    "alter.model({}).drop.index({})",
                    dquote(model),
                    dquote(index)
                )
            }
            Self::CreateTrigger { model, trigger } => {
                format!(
                    "alter.model({}).create.trigger({})",
                    dquote(model),
                    trigger_literal(trigger)
                )
            }
            Self::DropTrigger { model, trigger } => {
                format!(
                    "alter.model({}).drop.trigger({})",
                    dquote(model),
                    dquote(trigger)
                )
            }
            Self::CopyModelData { from, to } => {
                format!("add.{to}.with(() => get.{from}())")
            }
            Self::CopyFieldData { model, from, to } => {
                format!("set.{model}.to.{to}(f => f.{from})")
            }
            Self::BackfillField { model, field, value } => {
                format!("set.{model}.to.{field}({})", value_literal(value))
            }
        }
    }
}

/// Render a model as an object literal.
///
/// Model literals join properties with a bare comma; nested field/index/
/// trigger literals use `, `. Absent metadata and empty collections are
/// omitted.
pub(crate) fn model_literal(model: &Model) -> String {
    let mut props = vec![format!("slug:{}", quote(&model.slug))];

    if let Some(plural) = &model.plural_slug {
        props.push(format!("pluralSlug:{}", quote(plural)));
    }
    if let Some(name) = &model.name {
        props.push(format!("name:{}", quote(name)));
    }
    if let Some(plural) = &model.plural_name {
        props.push(format!("pluralName:{}", quote(plural)));
    }
    if let Some(prefix) = &model.id_prefix {
        props.push(format!("idPrefix:{}", quote(prefix)));
    }

    let fields: Vec<String> = model.fields.values().map(field_literal).collect();
    props.push(format!("fields:[{}]", fields.join(", ")));

    if !model.indexes.is_empty() {
        let indexes: Vec<String> = model.indexes.values().map(index_literal).collect();
        props.push(format!("indexes:[{}]", indexes.join(", ")));
    }
    if !model.triggers.is_empty() {
        let triggers: Vec<String> = model.triggers.values().map(trigger_literal).collect();
        props.push(format!("triggers:[{}]", triggers.join(", ")));
    }

    format!("{{{}}}", props.join(","))
}

/// Render a field as an object literal. Flags that are `false` and absent
/// options are omitted; `type` always comes last.
pub(crate) fn field_literal(field: &Field) -> String {
    let mut props = vec![format!("slug:{}", quote(&field.slug))];

    if let Some(name) = &field.name {
        if !name.is_empty() {
            props.push(format!("name:{}", quote(name)));
        }
    }
    if field.required {
        props.push("required:true".to_string());
    }
    if field.unique {
        props.push("unique:true".to_string());
    }
    if field.increment {
        props.push("increment:true".to_string());
    }
    if let Some(default) = &field.default_value {
        props.push(format!("defaultValue:{}", value_literal(default)));
    }
    if let Some(target) = &field.target {
        props.push(format!("target:{}", quote(target)));
    }
    if let Some(kind) = &field.kind {
        let kind = match kind {
            strata_schema::LinkKind::One => "one",
            strata_schema::LinkKind::Many => "many",
        };
        props.push(format!("kind:{}", quote(kind)));
    }
    props.push(format!("type:{}", quote(field.field_type.as_str())));

    format!("{{{}}}", props.join(", "))
}

/// Render an index as an object literal.
pub(crate) fn index_literal(index: &Index) -> String {
    let mut props = vec![format!("slug:{}", quote(&index.slug))];
    props.push(format!("fields:[{}]", index_fields_literal(&index.fields)));
    if index.unique {
        props.push("unique:true".to_string());
    }
    format!("{{{}}}", props.join(", "))
}

/// Render a trigger as an object literal.
pub(crate) fn trigger_literal(trigger: &Trigger) -> String {
    let mut props = vec![format!("slug:{}", quote(&trigger.slug))];
    props.push(format!("action:{}", quote(trigger.action.as_sql())));
    props.push(format!("when:{}", quote(trigger.when.as_sql())));
    if let Some(fields) = &trigger.fields {
        props.push(format!("fields:[{}]", index_fields_literal(fields)));
    }
    let effects: Vec<String> = trigger.effects.iter().map(|e| quote(e)).collect();
    props.push(format!("effects:[{}]", effects.join(", ")));
    format!("{{{}}}", props.join(", "))
}

fn index_fields_literal(fields: &[IndexField]) -> String {
    fields
        .iter()
        .map(|f| format!("{{slug:{}}}", quote(&f.slug)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render a JSON value as a literal: single-quoted strings, bare numbers
/// and booleans. Objects and arrays recurse in the same grammar the parser
/// reads back (bare keys, single quotes), so any JSON default or backfill
/// value survives a persist/load round trip.
pub(crate) fn value_literal(value: &Value) -> String {
    match value {
        Value::String(s) => quote(s),
        Value::Null => "null".to_string(),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(value_literal).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => {
            let props: Vec<String> = map
                .iter()
                .map(|(key, value)| format!("{}:{}", key_literal(key), value_literal(value)))
                .collect();
            format!("{{{}}}", props.join(", "))
        }
        other => other.to_string(),
    }
}

/// Object keys render bare when they are plain identifiers, quoted
/// otherwise.
fn key_literal(key: &str) -> String {
    let plain = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if plain {
        key.to_string()
    } else {
        quote(key)
    }
}

/// Single-quote a string, escaping backslashes, embedded quotes and
/// control characters.
fn quote(s: &str) -> String {
    format!("'{}'", escape(s, '\''))
}

/// Double-quote a string with the same escaping rules.
fn dquote(s: &str) -> String {
    format!("\"{}\"", escape(s, '"'))
}

fn escape(s: &str, delim: char) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == delim => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}
