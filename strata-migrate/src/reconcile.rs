//! Index and trigger reconciliation.
//!
//! Indexes and triggers are keyed by slug and compared by deep structural
//! equality. The underlying engine has no modify-in-place operation for
//! either, so a changed shape is always drop-old then create-new. Orphans
//! (present only on the existing side) are dropped by default; the
//! add-only behavior of older implementations is available through
//! `DiffOptions::drop_orphans(false)`.
//!
//! Callers skip this pass entirely for models undergoing a full rebuild,
//! since the rebuilt model already carries the final index/trigger set.

use strata_schema::Model;

use crate::options::DiffOptions;
use crate::step::Step;

/// Reconcile the indexes of two models sharing a slug.
pub fn reconcile_indexes(defined: &Model, existing: &Model, options: &DiffOptions) -> Vec<Step> {
    let slug = defined.slug.clone();
    let mut steps = Vec::new();

    if options.drop_orphans {
        for index_slug in existing.indexes.keys() {
            if !defined.indexes.contains_key(index_slug) {
                steps.push(Step::DropIndex {
                    model: slug.clone(),
                    index: index_slug.clone(),
                });
            }
        }
    }

    for (index_slug, index) in &defined.indexes {
        match existing.indexes.get(index_slug) {
            Some(current) if current == index => {}
            Some(_) => {
                steps.push(Step::DropIndex {
                    model: slug.clone(),
                    index: index_slug.clone(),
                });
                steps.push(Step::CreateIndex {
                    model: slug.clone(),
                    index: index.clone(),
                });
            }
            None => {
                steps.push(Step::CreateIndex {
                    model: slug.clone(),
                    index: index.clone(),
                });
            }
        }
    }

    steps
}

/// Reconcile the triggers of two models sharing a slug.
pub fn reconcile_triggers(defined: &Model, existing: &Model, options: &DiffOptions) -> Vec<Step> {
    let slug = defined.slug.clone();
    let mut steps = Vec::new();

    if options.drop_orphans {
        for trigger_slug in existing.triggers.keys() {
            if !defined.triggers.contains_key(trigger_slug) {
                steps.push(Step::DropTrigger {
                    model: slug.clone(),
                    trigger: trigger_slug.clone(),
                });
            }
        }
    }

    for (trigger_slug, trigger) in &defined.triggers {
        match existing.triggers.get(trigger_slug) {
            Some(current) if current == trigger => {}
            Some(_) => {
                steps.push(Step::DropTrigger {
                    model: slug.clone(),
                    trigger: trigger_slug.clone(),
                });
                steps.push(Step::CreateTrigger {
                    model: slug.clone(),
                    trigger: trigger.clone(),
                });
            }
            None => {
                steps.push(Step::CreateTrigger {
                    model: slug.clone(),
                    trigger: trigger.clone(),
                });
            }
        }
    }

    steps
}
