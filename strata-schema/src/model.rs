//! Model definitions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::field::Field;
use crate::index::{Index, Trigger};

/// A model definition (roughly, a table).
///
/// The `slug` is the primary identity key across diff operations. Naming
/// metadata (`name`, `plural_name`, `id_prefix`) is compiler-generated and
/// may be absent on a raw database snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Stable identifier; unique within a model set.
    pub slug: String,
    /// Plural form of the slug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural_slug: Option<String>,
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Human-readable plural name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural_name: Option<String>,
    /// Record-ID namespace prefix. Baked into every record identifier, so a
    /// change forces a full data-copy rebuild.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_prefix: Option<String>,
    /// Fields keyed by slug, in declaration order.
    #[serde(default)]
    pub fields: IndexMap<String, Field>,
    /// Indexes keyed by slug.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub indexes: IndexMap<String, Index>,
    /// Triggers keyed by slug.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub triggers: IndexMap<String, Trigger>,
}

impl Model {
    /// Create an empty model with the given slug.
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            plural_slug: None,
            name: None,
            plural_name: None,
            id_prefix: None,
            fields: IndexMap::new(),
            indexes: IndexMap::new(),
            triggers: IndexMap::new(),
        }
    }

    /// Set the human-readable name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the record-ID prefix.
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = Some(prefix.into());
        self
    }

    /// Add a field, keyed by its slug.
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.insert(field.slug.clone(), field);
        self
    }

    /// Add an index, keyed by its slug.
    pub fn with_index(mut self, index: Index) -> Self {
        self.indexes.insert(index.slug.clone(), index);
        self
    }

    /// Add a trigger, keyed by its slug.
    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.insert(trigger.slug.clone(), trigger);
        self
    }

    /// Get a field by slug.
    pub fn get_field(&self, slug: &str) -> Option<&Field> {
        self.fields.get(slug)
    }

    /// Field slugs in declaration order. Used to pair model rename
    /// candidates, which requires an order-sensitive match.
    pub fn field_slugs(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// Whether the model carries any naming metadata at all.
    pub fn has_meta(&self) -> bool {
        self.name.is_some() || self.id_prefix.is_some()
    }

    /// Replace this model's slug, preserving everything else.
    pub fn renamed(&self, slug: impl Into<String>) -> Self {
        let mut model = self.clone();
        model.slug = slug.into();
        model
    }
}
