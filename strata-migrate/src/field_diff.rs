//! Field-level diffing.
//!
//! Compares the field lists of a defined and an existing model sharing a
//! slug, classifying each field as created, dropped, renamed or adjusted,
//! and deciding whether the change can be applied directly or needs a
//! rebuild. The target engine has restrictive `ALTER TABLE` semantics:
//! uniqueness and nullability cannot be added to a live column, and a
//! foreign-key-bearing column cannot be renamed in place, so those paths go
//! through a temp-model rebuild (create shadow model, copy rows, drop
//! original, rename shadow). Plain shape changes use the cheaper temp-column
//! rebuild.

use serde_json::Value;
use strata_schema::{Field, Model};

use crate::decision::DecisionHandler;
use crate::error::MigrateResult;
use crate::options::{DiffOptions, RenamePolicy};
use crate::step::Step;

/// Prefix for shadow models created during a temp-model rebuild.
pub const TEMP_MODEL_PREFIX: &str = "tmp_";

/// Suffix for shadow columns created during a temp-column rebuild.
pub const TEMP_FIELD_SUFFIX: &str = "_tmp";

/// Shadow slug for a model being rebuilt.
pub fn temp_model_slug(slug: &str) -> String {
    format!("{TEMP_MODEL_PREFIX}{slug}")
}

/// Shadow slug for a field being rebuilt in place.
pub fn temp_field_slug(slug: &str) -> String {
    format!("{slug}{TEMP_FIELD_SUFFIX}")
}

/// Diff the fields of two models sharing a slug.
///
/// Rename confirmations happen strictly before create/drop/adjust emission,
/// so no field is both renamed and independently created or dropped. When
/// any change requires a temp-model rebuild, all remaining creates, drops
/// and adjustments fold into that single rebuild.
pub async fn diff_fields(
    defined: &Model,
    existing: &Model,
    decisions: &dyn DecisionHandler,
    options: &DiffOptions,
) -> MigrateResult<Vec<Step>> {
    let slug = defined.slug.as_str();

    let mut to_create: Vec<&Field> = defined
        .fields
        .values()
        .filter(|f| !existing.fields.contains_key(&f.slug))
        .collect();
    let mut to_drop: Vec<&Field> = existing
        .fields
        .values()
        .filter(|f| !defined.fields.contains_key(&f.slug))
        .collect();

    // Greedy rename pairing on the (type, unique, required) triple; first
    // match wins and is removed from further matching.
    let proposals = pair_rename_candidates(&to_create, &to_drop);

    let mut rename_steps = Vec::new();
    // Link renames applied inside the shadow model during a rebuild.
    let mut deferred_renames: Vec<(String, String)> = Vec::new();
    let mut rebuild = false;

    for (from, to) in proposals {
        let confirmed = match options.rename {
            RenamePolicy::Always => true,
            RenamePolicy::Never => false,
            RenamePolicy::Ask => {
                let message = format!(
                    "Did you mean to rename field \"{slug}.{}\" to \"{slug}.{}\"?",
                    from.slug, to.slug
                );
                decisions.confirm(&message, true).await?
            }
        };
        if !confirmed {
            continue;
        }

        to_create.retain(|f| f.slug != to.slug);
        to_drop.retain(|f| f.slug != from.slug);

        if to.is_link() {
            // The engine cannot rename a foreign-key-bearing column.
            rebuild = true;
            deferred_renames.push((from.slug.clone(), to.slug.clone()));
        } else {
            rename_steps.push(Step::RenameField {
                model: slug.to_string(),
                from: from.slug.clone(),
                to: to.slug.clone(),
            });
        }
    }

    // Backfill values gathered while classifying, applied inside the
    // rebuild between the data copy and the swap.
    let mut backfills: Vec<(String, Value)> = Vec::new();
    let mut create_steps = Vec::new();

    for field in &to_create {
        if field.unique || field.required {
            // Adding a constrained column to populated data needs the
            // rebuild path; a required column additionally needs a value
            // for the rows being copied across.
            rebuild = true;
            if field.required {
                let value = backfill_value(slug, field, decisions, options).await?;
                backfills.push((field.slug.clone(), value));
            }
        } else {
            create_steps.push(Step::CreateField {
                model: slug.to_string(),
                field: (*field).clone(),
            });
        }
    }

    let mut adjust_steps = Vec::new();

    for (field_slug, defined_field) in &defined.fields {
        let Some(existing_field) = existing.fields.get(field_slug) else {
            continue;
        };
        if !defined_field.differs_from(existing_field) {
            continue;
        }

        if structurally_equal(defined_field, existing_field) {
            // Only the name changed; a metadata alter needs no column work.
            adjust_steps.push(Step::AlterField {
                model: slug.to_string(),
                field: field_slug.clone(),
                to: defined_field.clone(),
            });
        } else if defined_field.unique || existing_field.unique {
            // Adding (or removing) a uniqueness constraint requires the
            // database to re-validate all rows.
            rebuild = true;
        } else if defined_field.required && !existing_field.required {
            rebuild = true;
            let value = backfill_value(slug, defined_field, decisions, options).await?;
            backfills.push((field_slug.clone(), value));
        } else if defined_field.is_link_many() {
            // Join-table semantics; only expressible as a rebuild.
            rebuild = true;
        } else {
            adjust_steps.extend(temp_column_rebuild(slug, field_slug, defined_field));
        }
    }

    let mut steps = rename_steps;

    if rebuild {
        steps.extend(temp_model_rebuild(
            defined,
            &deferred_renames,
            &backfills,
        ));
        return Ok(steps);
    }

    steps.extend(create_steps);
    for field in &to_drop {
        steps.push(Step::DropField {
            model: slug.to_string(),
            field: field.slug.clone(),
        });
    }
    steps.extend(adjust_steps);

    Ok(steps)
}

/// Pair create candidates with shape-matching drop candidates.
fn pair_rename_candidates<'a>(
    to_create: &[&'a Field],
    to_drop: &[&'a Field],
) -> Vec<(&'a Field, &'a Field)> {
    let mut available: Vec<&Field> = to_drop.to_vec();
    let mut proposals = Vec::new();

    for create in to_create {
        if let Some(pos) = available.iter().position(|drop| drop.shape() == create.shape()) {
            proposals.push((available.remove(pos), *create));
        }
    }

    proposals
}

/// Whether two fields agree on everything except the name.
fn structurally_equal(a: &Field, b: &Field) -> bool {
    a.field_type == b.field_type
        && a.unique == b.unique
        && a.required == b.required
        && a.default_value == b.default_value
        && a.increment == b.increment
        && a.target == b.target
        && a.kind == b.kind
}

/// Obtain the value used to backfill a field that is becoming required on
/// populated data: the field's own declared default, a caller-supplied
/// default, or the value prompt, in that order.
async fn backfill_value(
    model: &str,
    field: &Field,
    decisions: &dyn DecisionHandler,
    options: &DiffOptions,
) -> MigrateResult<Value> {
    if let Some(value) = &field.default_value {
        return Ok(value.clone());
    }
    if let Some(value) = options.supplied_default(model, &field.slug) {
        return Ok(value.clone());
    }
    let message = format!(
        "Provide a default value for the required field \"{model}.{}\"",
        field.slug
    );
    decisions.prompt_value(&message).await
}

/// The full temp-model choreography: create the shadow model with the
/// desired shape, copy all rows, apply deferred link renames and backfills
/// inside the shadow, drop the original, rename the shadow into place.
pub(crate) fn temp_model_rebuild(
    defined: &Model,
    deferred_renames: &[(String, String)],
    backfills: &[(String, Value)],
) -> Vec<Step> {
    let slug = defined.slug.as_str();
    let tmp = temp_model_slug(slug);

    let mut shadow = defined.clone();
    shadow.slug = tmp.clone();
    // Fields being link-renamed start under their old slug so the row copy
    // lines up, then get renamed inside the shadow.
    for (from, to) in deferred_renames {
        if let Some(mut field) = shadow.fields.shift_remove(to) {
            field.slug = from.clone();
            shadow.fields.insert(from.clone(), field);
        }
    }
    // Give backfilled fields their backfill as column default, so the copy
    // itself cannot violate the new constraint.
    for (field_slug, value) in backfills {
        if let Some(field) = shadow.fields.get_mut(field_slug) {
            if field.default_value.is_none() {
                field.default_value = Some(value.clone());
            }
        }
    }

    let mut steps = vec![
        Step::CreateModel { model: shadow },
        Step::CopyModelData {
            from: slug.to_string(),
            to: tmp.clone(),
        },
    ];

    for (from, to) in deferred_renames {
        steps.push(Step::RenameField {
            model: tmp.clone(),
            from: from.clone(),
            to: to.clone(),
        });
    }
    for (field_slug, value) in backfills {
        steps.push(Step::BackfillField {
            model: tmp.clone(),
            field: field_slug.clone(),
            value: value.clone(),
        });
    }

    steps.push(Step::DropModel {
        model: slug.to_string(),
    });
    steps.push(Step::RenameModel {
        from: tmp,
        to: slug.to_string(),
    });

    steps
}

/// The single-column choreography: create a shadow column with the new
/// shape, copy values across, drop the original, rename the shadow.
fn temp_column_rebuild(model: &str, field_slug: &str, defined_field: &Field) -> Vec<Step> {
    let tmp = temp_field_slug(field_slug);
    let mut shadow = defined_field.clone();
    shadow.slug = tmp.clone();

    vec![
        Step::CreateField {
            model: model.to_string(),
            field: shadow,
        },
        Step::CopyFieldData {
            model: model.to_string(),
            from: field_slug.to_string(),
            to: tmp.clone(),
        },
        Step::DropField {
            model: model.to_string(),
            field: field_slug.to_string(),
        },
        Step::RenameField {
            model: model.to_string(),
            from: tmp,
            to: field_slug.to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::AutoDecision;
    use serde_json::json;
    use strata_schema::{FieldType, LinkKind};

    fn model(slug: &str, fields: Vec<Field>) -> Model {
        fields
            .into_iter()
            .fold(Model::new(slug), |m, f| m.with_field(f))
    }

    #[tokio::test]
    async fn test_no_changes_is_empty() {
        let m = model("account", vec![Field::new("email", FieldType::String)]);
        let steps = diff_fields(&m, &m, &AutoDecision::new(true), &DiffOptions::new())
            .await
            .unwrap();
        assert!(steps.is_empty());
    }

    #[tokio::test]
    async fn test_plain_create_and_drop() {
        let defined = model("account", vec![Field::new("email", FieldType::String)]);
        let existing = model("account", vec![Field::new("handle", FieldType::Number)]);

        // Shapes differ, so no rename pairing happens.
        let steps = diff_fields(&defined, &existing, &AutoDecision::new(true), &DiffOptions::new())
            .await
            .unwrap();
        assert_eq!(steps.len(), 2);
        assert!(matches!(&steps[0], Step::CreateField { field, .. } if field.slug == "email"));
        assert!(matches!(&steps[1], Step::DropField { field, .. } if field == "handle"));
    }

    #[tokio::test]
    async fn test_rename_confirmed() {
        let defined = model("account", vec![Field::new("username", FieldType::String)]);
        let existing = model("account", vec![Field::new("handle", FieldType::String)]);

        let steps = diff_fields(&defined, &existing, &AutoDecision::new(true), &DiffOptions::new())
            .await
            .unwrap();
        assert_eq!(
            steps,
            vec![Step::RenameField {
                model: "account".to_string(),
                from: "handle".to_string(),
                to: "username".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_rename_declined_becomes_create_and_drop() {
        let defined = model("account", vec![Field::new("username", FieldType::String)]);
        let existing = model("account", vec![Field::new("handle", FieldType::String)]);

        let steps = diff_fields(&defined, &existing, &AutoDecision::new(false), &DiffOptions::new())
            .await
            .unwrap();
        assert_eq!(steps.len(), 2);
        assert!(matches!(&steps[0], Step::CreateField { .. }));
        assert!(matches!(&steps[1], Step::DropField { .. }));
    }

    #[tokio::test]
    async fn test_rename_policy_never_skips_prompt() {
        let defined = model("account", vec![Field::new("username", FieldType::String)]);
        let existing = model("account", vec![Field::new("handle", FieldType::String)]);

        // AutoDecision(true) would confirm, but the policy forbids asking.
        let options = DiffOptions::new().rename(RenamePolicy::Never);
        let steps = diff_fields(&defined, &existing, &AutoDecision::new(true), &options)
            .await
            .unwrap();
        assert!(steps.iter().all(|s| !matches!(s, Step::RenameField { .. })));
    }

    #[tokio::test]
    async fn test_greedy_first_match_pairing() {
        // Two drop candidates share the create candidate's shape; the first
        // one in declaration order wins.
        let defined = model("m", vec![Field::new("c", FieldType::String)]);
        let existing = model(
            "m",
            vec![
                Field::new("a", FieldType::String),
                Field::new("b", FieldType::String),
            ],
        );

        let steps = diff_fields(&defined, &existing, &AutoDecision::new(true), &DiffOptions::new())
            .await
            .unwrap();
        assert_eq!(steps.len(), 2);
        assert!(matches!(&steps[0], Step::RenameField { from, to, .. } if from == "a" && to == "c"));
        assert!(matches!(&steps[1], Step::DropField { field, .. } if field == "b"));
    }

    #[tokio::test]
    async fn test_link_rename_forces_rebuild() {
        let defined = model("post", vec![Field::link("writer", "account", LinkKind::One)]);
        let existing = model("post", vec![Field::link("author", "account", LinkKind::One)]);

        let steps = diff_fields(&defined, &existing, &AutoDecision::new(true), &DiffOptions::new())
            .await
            .unwrap();

        // create temp, copy, rename inside temp, drop original, swap.
        assert_eq!(steps.len(), 5);
        let Step::CreateModel { model } = &steps[0] else {
            panic!("expected shadow model creation");
        };
        assert_eq!(model.slug, "tmp_post");
        assert!(model.get_field("author").is_some(), "shadow starts under the old slug");
        assert!(matches!(&steps[1], Step::CopyModelData { from, to } if from == "post" && to == "tmp_post"));
        assert!(matches!(&steps[2], Step::RenameField { model, from, to }
            if model == "tmp_post" && from == "author" && to == "writer"));
        assert!(matches!(&steps[3], Step::DropModel { model } if model == "post"));
        assert!(matches!(&steps[4], Step::RenameModel { from, to } if from == "tmp_post" && to == "post"));
    }

    #[tokio::test]
    async fn test_unique_adjustment_is_four_step_rebuild() {
        let defined = model("account", vec![Field::new("email", FieldType::String).unique()]);
        let existing = model("account", vec![Field::new("email", FieldType::String)]);

        let steps = diff_fields(&defined, &existing, &AutoDecision::new(true), &DiffOptions::new())
            .await
            .unwrap();
        assert_eq!(steps.len(), 4);
        assert!(matches!(&steps[0], Step::CreateModel { model } if model.slug == "tmp_account"));
        assert!(matches!(&steps[1], Step::CopyModelData { .. }));
        assert!(matches!(&steps[2], Step::DropModel { .. }));
        assert!(matches!(&steps[3], Step::RenameModel { .. }));
    }

    #[tokio::test]
    async fn test_required_adjustment_backfills() {
        let defined = model("account", vec![Field::new("plan", FieldType::String).required()]);
        let existing = model("account", vec![Field::new("plan", FieldType::String)]);

        let options = DiffOptions::new().default_value("account", "plan", json!("free"));
        let steps = diff_fields(&defined, &existing, &AutoDecision::new(true), &options)
            .await
            .unwrap();

        assert_eq!(steps.len(), 5);
        assert!(matches!(&steps[2], Step::BackfillField { field, value, .. }
            if field == "plan" && *value == json!("free")));

        // The shadow column carries the backfill as its default.
        let Step::CreateModel { model } = &steps[0] else {
            panic!("expected shadow model");
        };
        assert_eq!(
            model.get_field("plan").unwrap().default_value,
            Some(json!("free"))
        );
    }

    #[tokio::test]
    async fn test_required_adjustment_prompts_without_default() {
        let defined = model("account", vec![Field::new("plan", FieldType::String).required()]);
        let existing = model("account", vec![Field::new("plan", FieldType::String)]);

        let handler = AutoDecision::new(true).with_value(json!("basic"));
        let steps = diff_fields(&defined, &existing, &handler, &DiffOptions::new())
            .await
            .unwrap();
        assert!(steps.iter().any(|s| matches!(s, Step::BackfillField { value, .. } if *value == json!("basic"))));

        // Without a handler value, the prompt error propagates.
        let err = diff_fields(&defined, &existing, &AutoDecision::new(true), &DiffOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::MigrateError::Prompt(_)));
    }

    #[tokio::test]
    async fn test_link_many_adjustment_rebuilds() {
        let defined = model("post", vec![Field::link("tags", "tag", LinkKind::Many)]);
        let existing = model("post", vec![Field::link("tags", "tag", LinkKind::One)]);

        let steps = diff_fields(&defined, &existing, &AutoDecision::new(true), &DiffOptions::new())
            .await
            .unwrap();
        assert!(matches!(&steps[0], Step::CreateModel { model } if model.slug == "tmp_post"));
    }

    #[tokio::test]
    async fn test_type_change_uses_temp_column() {
        let defined = model("account", vec![Field::new("age", FieldType::Number)]);
        let existing = model("account", vec![Field::new("age", FieldType::String)]);

        let steps = diff_fields(&defined, &existing, &AutoDecision::new(true), &DiffOptions::new())
            .await
            .unwrap();
        assert_eq!(steps.len(), 4);
        assert!(matches!(&steps[0], Step::CreateField { field, .. } if field.slug == "age_tmp"));
        assert!(matches!(&steps[1], Step::CopyFieldData { from, to, .. } if from == "age" && to == "age_tmp"));
        assert!(matches!(&steps[2], Step::DropField { field, .. } if field == "age"));
        assert!(matches!(&steps[3], Step::RenameField { from, to, .. } if from == "age_tmp" && to == "age"));
    }

    #[tokio::test]
    async fn test_name_only_change_alters_in_place() {
        let defined = model("account", vec![Field::new("age", FieldType::Number).with_name("Age")]);
        let existing = model("account", vec![Field::new("age", FieldType::Number)]);

        let steps = diff_fields(&defined, &existing, &AutoDecision::new(true), &DiffOptions::new())
            .await
            .unwrap();
        assert_eq!(steps.len(), 1);
        assert!(matches!(&steps[0], Step::AlterField { field, .. } if field == "age"));
    }

    #[tokio::test]
    async fn test_unique_creation_folds_drop_into_rebuild() {
        let defined = model("account", vec![Field::new("email", FieldType::String).unique()]);
        let existing = model("account", vec![Field::new("legacy", FieldType::Blob)]);

        let steps = diff_fields(&defined, &existing, &AutoDecision::new(true), &DiffOptions::new())
            .await
            .unwrap();

        // The rebuild carries the final shape; no separate drop of "legacy".
        assert!(steps.iter().all(|s| !matches!(s, Step::DropField { .. })));
        assert!(matches!(&steps[0], Step::CreateModel { model } if model.get_field("legacy").is_none()));
    }
}
