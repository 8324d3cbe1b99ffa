//! Caller-supplied options for a diff run.

use std::collections::HashMap;

use serde_json::Value;

/// How rename candidates are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenamePolicy {
    /// Ask the decision handler for each candidate.
    #[default]
    Ask,
    /// Treat every candidate pair as a rename without asking.
    Always,
    /// Never rename; candidates stay independent creates and drops.
    Never,
}

/// When meta-property (name/id-prefix) drift is diffed.
///
/// Meta values are compiler-generated and may be absent from a raw database
/// snapshot; comparing against an absent side would force spurious rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetaPolicy {
    /// Skip the meta diff when the existing side carries neither a name nor
    /// an id-prefix.
    #[default]
    SkipWhenAbsent,
    /// Always compare whatever is present.
    Always,
}

/// Options controlling a diff run.
#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    /// Rename resolution policy.
    pub rename: RenamePolicy,
    /// Pre-supplied backfill defaults keyed by `"model.field"`. Consulted
    /// before prompting when a field becomes required on populated data.
    pub default_values: HashMap<String, Value>,
    /// Whether indexes/triggers present only on the existing side are
    /// dropped. Defaults to true.
    pub drop_orphans: bool,
    /// Meta-property diff policy.
    pub meta: MetaPolicy,
}

impl DiffOptions {
    /// Create options with defaults (ask for renames, drop orphans).
    pub fn new() -> Self {
        Self {
            drop_orphans: true,
            ..Default::default()
        }
    }

    /// Set the rename policy.
    pub fn rename(mut self, policy: RenamePolicy) -> Self {
        self.rename = policy;
        self
    }

    /// Supply a backfill default for `model`.`field`.
    pub fn default_value(
        mut self,
        model: &str,
        field: &str,
        value: Value,
    ) -> Self {
        self.default_values.insert(format!("{model}.{field}"), value);
        self
    }

    /// Set whether orphaned indexes/triggers are dropped.
    pub fn drop_orphans(mut self, drop: bool) -> Self {
        self.drop_orphans = drop;
        self
    }

    /// Set the meta-property policy.
    pub fn meta(mut self, policy: MetaPolicy) -> Self {
        self.meta = policy;
        self
    }

    /// Look up a pre-supplied default for a field.
    pub fn supplied_default(&self, model: &str, field: &str) -> Option<&Value> {
        self.default_values.get(&format!("{model}.{field}"))
    }
}
