//! Model-level diffing.
//!
//! Compares two full model sets and assembles the final ordered step list.
//! Emission order is fixed: meta adjustments, confirmed renames, model
//! drops, model creations (fields inlined), per-model field diffs, index
//! recreation, trigger recreation. Drops precede creates so an unconfirmed
//! rename pair can never collide on a slug mid-migration, and index/trigger
//! recreation comes last because it depends on final field slugs.

use std::collections::{HashMap, HashSet};

use strata_schema::Model;

use crate::decision::DecisionHandler;
use crate::error::MigrateResult;
use crate::field_diff::{diff_fields, temp_model_rebuild};
use crate::options::{DiffOptions, MetaPolicy, RenamePolicy};
use crate::reconcile::{reconcile_indexes, reconcile_triggers};
use crate::step::Step;

/// Diff two model sets into an ordered list of migration steps.
///
/// Inputs are immutable snapshots; models are compared strictly in input
/// order. Replaying the returned steps against the existing state yields
/// the defined state.
pub async fn diff_models(
    defined: &[Model],
    existing: &[Model],
    decisions: &dyn DecisionHandler,
    options: &DiffOptions,
) -> MigrateResult<Vec<Step>> {
    let existing_by_slug: HashMap<&str, &Model> =
        existing.iter().map(|m| (m.slug.as_str(), m)).collect();
    let defined_by_slug: HashMap<&str, &Model> =
        defined.iter().map(|m| (m.slug.as_str(), m)).collect();

    // Models flagged here are fully reconstructed by some earlier step and
    // skip the separate field/index/trigger passes.
    let mut rebuilt: HashSet<String> = HashSet::new();
    let mut meta_steps = Vec::new();

    for model in defined {
        let Some(current) = existing_by_slug.get(model.slug.as_str()) else {
            continue;
        };
        if options.meta == MetaPolicy::SkipWhenAbsent && !current.has_meta() {
            continue;
        }

        if model.id_prefix.is_some() && model.id_prefix != current.id_prefix {
            // The prefix is baked into every record identifier: only a
            // data-copy rebuild can change it. Existing record IDs are not
            // retroactively renumbered.
            meta_steps.extend(temp_model_rebuild(model, &[], &[]));
            rebuilt.insert(model.slug.clone());
        } else if model.name.is_some() && model.name != current.name {
            meta_steps.push(Step::AlterModelMeta {
                model: model.slug.clone(),
                name: model.name.clone().unwrap_or_default(),
            });
        }
    }

    // Index/trigger reconciliation is computed before rename resolution so
    // it reflects final index/trigger states, but only applied for models
    // that end up not being fully rebuilt.
    let mut recon_indexes: Vec<(String, Vec<Step>)> = Vec::new();
    let mut recon_triggers: Vec<(String, Vec<Step>)> = Vec::new();
    for model in defined {
        if let Some(current) = existing_by_slug.get(model.slug.as_str()) {
            recon_indexes.push((
                model.slug.clone(),
                reconcile_indexes(model, current, options),
            ));
            recon_triggers.push((
                model.slug.clone(),
                reconcile_triggers(model, current, options),
            ));
        }
    }

    // Rename detection at model granularity: a create/drop pair is a
    // rename candidate when their ordered field-slug lists are identical.
    let mut to_create: Vec<&Model> = defined
        .iter()
        .filter(|m| !existing_by_slug.contains_key(m.slug.as_str()))
        .collect();
    let mut to_drop: Vec<&Model> = existing
        .iter()
        .filter(|m| !defined_by_slug.contains_key(m.slug.as_str()))
        .collect();

    let mut rename_steps = Vec::new();
    let proposals = pair_rename_candidates(&to_create, &to_drop);
    for (from, to) in proposals {
        let confirmed = match options.rename {
            RenamePolicy::Always => true,
            RenamePolicy::Never => false,
            RenamePolicy::Ask => {
                let message = format!(
                    "Did you mean to rename model \"{}\" to \"{}\"?",
                    from.slug, to.slug
                );
                decisions.confirm(&message, true).await?
            }
        };
        if !confirmed {
            continue;
        }
        to_create.retain(|m| m.slug != to.slug);
        to_drop.retain(|m| m.slug != from.slug);
        rename_steps.push(Step::RenameModel {
            from: from.slug.clone(),
            to: to.slug.clone(),
        });
    }

    let mut steps = meta_steps;
    steps.extend(rename_steps);

    for model in &to_drop {
        steps.push(Step::DropModel {
            model: model.slug.clone(),
        });
    }
    for model in &to_create {
        steps.push(Step::CreateModel {
            model: (*model).clone(),
        });
    }

    // Field-level diffs for models present in both sets and not already
    // reconstructed by a meta change.
    for model in defined {
        let Some(current) = existing_by_slug.get(model.slug.as_str()) else {
            continue;
        };
        if rebuilt.contains(&model.slug) {
            continue;
        }

        let field_steps = diff_fields(model, current, decisions, options).await?;
        if field_steps
            .iter()
            .any(|s| matches!(s, Step::CreateModel { .. }))
        {
            // The field diff escalated to a full rebuild, which already
            // carries the final index/trigger set.
            rebuilt.insert(model.slug.clone());
        }
        steps.extend(field_steps);
    }

    for (slug, index_steps) in recon_indexes {
        if !rebuilt.contains(&slug) {
            steps.extend(index_steps);
        }
    }
    for (slug, trigger_steps) in recon_triggers {
        if !rebuilt.contains(&slug) {
            steps.extend(trigger_steps);
        }
    }

    Ok(steps)
}

/// Pair model create candidates with drop candidates whose ordered
/// field-slug lists match exactly. Greedy first match, as for fields.
fn pair_rename_candidates<'a>(
    to_create: &[&'a Model],
    to_drop: &[&'a Model],
) -> Vec<(&'a Model, &'a Model)> {
    let mut available: Vec<&Model> = to_drop.to_vec();
    let mut proposals = Vec::new();

    for create in to_create {
        if let Some(pos) = available
            .iter()
            .position(|drop| drop.field_slugs() == create.field_slugs())
        {
            proposals.push((available.remove(pos), *create));
        }
    }

    proposals
}
