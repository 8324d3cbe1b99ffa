//! Field definitions for Strata models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Textual value.
    String,
    /// Numeric value.
    Number,
    /// Boolean value.
    Boolean,
    /// Date/time value.
    Date,
    /// Binary value.
    Blob,
    /// Arbitrary JSON value.
    Json,
    /// Reference to another model.
    Link,
}

impl FieldType {
    /// Get the lowercase name used in definitions and step payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Blob => "blob",
            Self::Json => "json",
            Self::Link => "link",
        }
    }
}

/// Cardinality of a link field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Points at a single record of the target model.
    One,
    /// Points at many records of the target model (join-table semantics).
    Many,
}

/// A field in a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Stable identifier; the join key during diffing.
    pub slug: String,
    /// Storage type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Human-readable name. Compiler-generated and may be absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether values must be unique across records.
    #[serde(default)]
    pub unique: bool,
    /// Whether the field is non-nullable.
    #[serde(default)]
    pub required: bool,
    /// Default value applied to new records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Whether the field auto-increments.
    #[serde(default)]
    pub increment: bool,
    /// Target model slug. Only set for `link` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Link cardinality. Only set for `link` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<LinkKind>,
}

impl Field {
    /// Create a new field with the given slug and type.
    pub fn new(slug: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            slug: slug.into(),
            field_type,
            name: None,
            unique: false,
            required: false,
            default_value: None,
            increment: false,
            target: None,
            kind: None,
        }
    }

    /// Create a link field pointing at the given target model.
    pub fn link(slug: impl Into<String>, target: impl Into<String>, kind: LinkKind) -> Self {
        let mut field = Self::new(slug, FieldType::Link);
        field.target = Some(target.into());
        field.kind = Some(kind);
        field
    }

    /// Set the human-readable name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark the field unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark the field required (non-nullable).
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Mark the field auto-incrementing.
    pub fn increment(mut self) -> Self {
        self.increment = true;
        self
    }

    /// Check whether this is a link field.
    pub fn is_link(&self) -> bool {
        self.field_type == FieldType::Link
    }

    /// Check whether this is a link field of cardinality `many`.
    pub fn is_link_many(&self) -> bool {
        self.is_link() && self.kind == Some(LinkKind::Many)
    }

    /// The `(type, unique, required)` triple used to pair rename candidates.
    pub fn shape(&self) -> (FieldType, bool, bool) {
        (self.field_type, self.unique, self.required)
    }

    /// Check whether this (defined) field differs from an existing field.
    ///
    /// Any attribute except `name` counts; `name` only counts when the
    /// defined side carries a non-empty name that disagrees.
    pub fn differs_from(&self, existing: &Field) -> bool {
        if self.field_type != existing.field_type
            || self.unique != existing.unique
            || self.required != existing.required
            || self.default_value != existing.default_value
            || self.increment != existing.increment
            || self.target != existing.target
            || self.kind != existing.kind
        {
            return true;
        }

        match &self.name {
            Some(name) if !name.is_empty() => existing.name.as_deref() != Some(name),
            _ => false,
        }
    }
}
