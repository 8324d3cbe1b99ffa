//! Loading locally declared model definitions.
//!
//! Definitions live in a JSON file containing an array of models. After
//! parsing, models are topologically ordered by their link targets so that
//! referenced models always precede referencing ones; a cycle among link
//! targets is fatal before any diffing happens.

use std::collections::HashSet;
use std::path::Path;

use crate::error::{SchemaError, SchemaResult};
use crate::model::Model;

/// Load model definitions from a JSON file.
pub fn load_model_definitions(path: impl AsRef<Path>) -> SchemaResult<Vec<Model>> {
    let content = std::fs::read_to_string(path)?;
    parse_model_definitions(&content)
}

/// Parse model definitions from JSON text.
pub fn parse_model_definitions(content: &str) -> SchemaResult<Vec<Model>> {
    let models: Vec<Model> =
        serde_json::from_str(content).map_err(|e| SchemaError::invalid(e.to_string()))?;

    let mut seen = HashSet::new();
    for model in &models {
        if !seen.insert(model.slug.as_str()) {
            return Err(SchemaError::DuplicateSlug(model.slug.clone()));
        }
    }

    order_by_dependencies(models)
}

/// Topologically order models by link-target dependencies.
///
/// Self-references are allowed (a model may link to itself); a cycle through
/// two or more models is an error.
pub fn order_by_dependencies(models: Vec<Model>) -> SchemaResult<Vec<Model>> {
    let slugs: HashSet<&str> = models.iter().map(|m| m.slug.as_str()).collect();

    // Validate link targets before ordering.
    for model in &models {
        for field in model.fields.values() {
            if let Some(target) = &field.target {
                if !slugs.contains(target.as_str()) {
                    return Err(SchemaError::UnknownTarget {
                        model: model.slug.clone(),
                        target: target.clone(),
                    });
                }
            }
        }
    }

    let mut ordered = Vec::with_capacity(models.len());
    let mut done: HashSet<String> = HashSet::new();
    let mut in_progress: HashSet<String> = HashSet::new();

    fn visit(
        slug: &str,
        models: &[Model],
        done: &mut HashSet<String>,
        in_progress: &mut HashSet<String>,
        ordered: &mut Vec<Model>,
    ) -> SchemaResult<()> {
        if done.contains(slug) {
            return Ok(());
        }
        if !in_progress.insert(slug.to_string()) {
            return Err(SchemaError::DependencyCycle(slug.to_string()));
        }

        // Unwrap is safe: targets were validated against the slug set.
        let model = models.iter().find(|m| m.slug == slug).unwrap();
        for field in model.fields.values() {
            if let Some(target) = &field.target {
                if target != slug {
                    visit(target, models, done, in_progress, ordered)?;
                }
            }
        }

        in_progress.remove(slug);
        done.insert(slug.to_string());
        ordered.push(model.clone());
        Ok(())
    }

    for model in &models {
        visit(
            &model.slug,
            &models,
            &mut done,
            &mut in_progress,
            &mut ordered,
        )?;
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, LinkKind};
    use std::io::Write;

    fn link_model(slug: &str, target: &str) -> Model {
        Model::new(slug).with_field(Field::link("ref", target, LinkKind::One))
    }

    #[test]
    fn test_parse_definitions() {
        let content = r#"[
            {"slug": "account", "fields": {"email": {"slug": "email", "type": "string", "unique": true}}}
        ]"#;
        let models = parse_model_definitions(content).unwrap();
        assert_eq!(models.len(), 1);
        assert!(models[0].get_field("email").unwrap().unique);
    }

    #[test]
    fn test_duplicate_model_slug() {
        let content = r#"[{"slug": "a", "fields": {}}, {"slug": "a", "fields": {}}]"#;
        let err = parse_model_definitions(content).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateSlug(s) if s == "a"));
    }

    #[test]
    fn test_dependency_ordering() {
        let models = vec![link_model("post", "account"), Model::new("account")];
        let ordered = order_by_dependencies(models).unwrap();
        let slugs: Vec<&str> = ordered.iter().map(|m| m.slug.as_str()).collect();
        assert_eq!(slugs, vec!["account", "post"]);
    }

    #[test]
    fn test_self_reference_allowed() {
        let models = vec![link_model("category", "category")];
        assert!(order_by_dependencies(models).is_ok());
    }

    #[test]
    fn test_cycle_is_fatal() {
        let models = vec![link_model("a", "b"), link_model("b", "a")];
        let err = order_by_dependencies(models).unwrap_err();
        assert!(matches!(err, SchemaError::DependencyCycle(_)));
    }

    #[test]
    fn test_unknown_target() {
        let models = vec![link_model("post", "ghost")];
        let err = order_by_dependencies(models).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownTarget { target, .. } if target == "ghost"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"slug": "account", "fields": {{}}}}]"#).unwrap();

        let models = load_model_definitions(file.path()).unwrap();
        assert_eq!(models[0].slug, "account");
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_model_definitions("/nonexistent/models.json").unwrap_err();
        assert!(matches!(err, SchemaError::Io(_)));
    }
}
