//! Index and trigger definitions.
//!
//! Both are keyed by slug within their owning model. Equality is deep
//! structural equality of the whole shape; the reconciler never emits a
//! modify-in-place operation, so "changed" always means drop-then-create.

use serde::{Deserialize, Serialize};

/// A field reference inside an index or trigger scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexField {
    /// Slug of the referenced field.
    pub slug: String,
}

impl IndexField {
    /// Create a field reference.
    pub fn new(slug: impl Into<String>) -> Self {
        Self { slug: slug.into() }
    }
}

/// An index on a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Stable identifier within the owning model.
    pub slug: String,
    /// Ordered list of indexed fields.
    pub fields: Vec<IndexField>,
    /// Whether the index enforces uniqueness.
    #[serde(default)]
    pub unique: bool,
}

impl Index {
    /// Create an index over the given field slugs.
    pub fn new(slug: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            slug: slug.into(),
            fields: fields.iter().map(|f| IndexField::new(*f)).collect(),
            unique: false,
        }
    }

    /// Mark the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// The row operation a trigger fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerAction {
    /// Fires on INSERT.
    Insert,
    /// Fires on UPDATE.
    Update,
    /// Fires on DELETE.
    Delete,
}

impl TriggerAction {
    /// SQL keyword for the action.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// When a trigger fires relative to the row operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerWhen {
    /// Fires before the operation.
    Before,
    /// Fires after the operation.
    After,
}

impl TriggerWhen {
    /// SQL keyword for the timing.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Before => "BEFORE",
            Self::After => "AFTER",
        }
    }
}

/// A trigger on a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Stable identifier within the owning model.
    pub slug: String,
    /// Row operation the trigger fires on.
    pub action: TriggerAction,
    /// Whether it fires before or after the operation.
    pub when: TriggerWhen,
    /// Optional scope: only fire when one of these fields changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<IndexField>>,
    /// Ordered effect expressions in the migration step vocabulary.
    pub effects: Vec<String>,
}

impl Trigger {
    /// Create a trigger with the given firing point.
    pub fn new(slug: impl Into<String>, action: TriggerAction, when: TriggerWhen) -> Self {
        Self {
            slug: slug.into(),
            action,
            when,
            fields: None,
            effects: Vec::new(),
        }
    }

    /// Scope the trigger to specific field changes.
    pub fn on_fields(mut self, fields: &[&str]) -> Self {
        self.fields = Some(fields.iter().map(|f| IndexField::new(*f)).collect());
        self
    }

    /// Add an effect expression.
    pub fn with_effect(mut self, effect: impl Into<String>) -> Self {
        self.effects.push(effect.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_equality_is_structural() {
        let a = Index::new("by_email", &["email"]).unique();
        let b = Index::new("by_email", &["email"]).unique();
        let c = Index::new("by_email", &["email"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_index_field_order_matters() {
        let a = Index::new("pair", &["a", "b"]);
        let b = Index::new("pair", &["b", "a"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_trigger_equality() {
        let a = Trigger::new("audit", TriggerAction::Update, TriggerWhen::After)
            .on_fields(&["email"])
            .with_effect("add.audit_log.with(() => get.account())");
        let mut b = a.clone();
        assert_eq!(a, b);

        b.when = TriggerWhen::Before;
        assert_ne!(a, b);
    }

    #[test]
    fn test_action_sql() {
        assert_eq!(TriggerAction::Delete.as_sql(), "DELETE");
        assert_eq!(TriggerWhen::Before.as_sql(), "BEFORE");
    }
}
