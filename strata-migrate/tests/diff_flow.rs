//! Integration tests for the full diff, persist, load, compile flow.
//!
//! These tests drive the engine the way a caller would: plan a migration
//! between two model sets, write the artifact to disk, read it back, and
//! compile the recovered steps to SQL.

use pretty_assertions::assert_eq;
use strata_migrate::{
    AutoDecision, MigrationConfig, MigrationEngine, PassthroughFormatter, Protocol, StaticSource,
    Step,
};
use strata_schema::{Field, FieldType, Index, Model};

fn engine(dir: &std::path::Path) -> MigrationEngine<AutoDecision> {
    MigrationEngine::new(
        MigrationConfig::new().migrations_dir(dir),
        AutoDecision::new(true),
    )
}

#[tokio::test]
async fn test_plan_persist_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());

    let defined = vec![
        Model::new("account")
            .with_field(Field::new("email", FieldType::String).required().unique())
            .with_index(Index::new("by_email", &["email"]).unique()),
        Model::new("post").with_field(Field::new("title", FieldType::String)),
    ];

    let plan = engine
        .plan(&defined, &StaticSource::empty())
        .await
        .unwrap();
    assert_eq!(plan.protocol.steps().len(), 2);

    let path = engine.create(&plan, &PassthroughFormatter).await.unwrap();
    assert!(path.to_string_lossy().ends_with("migration-0001.strata"));

    let recovered = Protocol::load(&path).await.unwrap();
    assert_eq!(recovered.steps(), plan.protocol.steps());

    let statements = recovered.compile(&[]).unwrap();
    assert!(statements[0].statement.contains("CREATE TABLE \"account\""));
}

#[tokio::test]
async fn test_rename_confirmed_produces_rename_steps() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());

    let existing = vec![Model::new("account").with_field(Field::new("handle", FieldType::String))];
    let defined = vec![Model::new("account").with_field(Field::new("username", FieldType::String))];

    let plan = engine
        .plan(&defined, &StaticSource::new(existing))
        .await
        .unwrap();
    assert_eq!(
        plan.protocol.steps().to_vec(),
        vec![Step::RenameField {
            model: "account".to_string(),
            from: "handle".to_string(),
            to: "username".to_string(),
        }]
    );
    assert_eq!(
        plan.protocol.render(),
        "alter.model(\"account\").alter.field(\"handle\").to({slug: \"username\"})\n"
    );
}

#[tokio::test]
async fn test_unique_change_compiles_to_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());

    let existing = vec![Model::new("account").with_field(Field::new("email", FieldType::String))];
    let defined =
        vec![Model::new("account").with_field(Field::new("email", FieldType::String).unique())];

    let plan = engine
        .plan(&defined, &StaticSource::new(existing.clone()))
        .await
        .unwrap();

    let rendered = plan.protocol.render();
    assert!(rendered.contains("create.model({slug:'tmp_account'"));
    assert!(rendered.contains("drop.model(\"account\")"));

    let statements = plan.compile().unwrap();
    let sql: Vec<&str> = statements.iter().map(|s| s.statement.as_str()).collect();
    assert!(sql[0].contains("CREATE TABLE \"tmp_account\""));
    assert!(sql.contains(&"DROP TABLE \"account\";"));
    assert!(sql.contains(&"ALTER TABLE \"tmp_account\" RENAME TO \"account\";"));
}

#[tokio::test]
async fn test_sequence_numbers_advance_across_creates() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());

    let first = engine
        .plan(&[Model::new("account")], &StaticSource::empty())
        .await
        .unwrap();
    let first_path = engine.create(&first, &PassthroughFormatter).await.unwrap();

    let second = engine
        .plan(&[Model::new("post")], &StaticSource::empty())
        .await
        .unwrap();
    let second_path = engine.create(&second, &PassthroughFormatter).await.unwrap();

    assert!(first_path.to_string_lossy().ends_with("migration-0001.strata"));
    assert!(second_path.to_string_lossy().ends_with("migration-0002.strata"));
}

#[tokio::test]
async fn test_artifact_text_is_parseable_step_per_line() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());

    let defined = vec![Model::new("team").with_field(Field::new("name", FieldType::String))];
    let plan = engine
        .plan(&defined, &StaticSource::empty())
        .await
        .unwrap();
    let path = engine.create(&plan, &PassthroughFormatter).await.unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("-- migration-0001"));
    assert!(lines.next().unwrap().starts_with("-- Generated at "));

    let recovered = Protocol::parse_text(&text).unwrap();
    assert_eq!(recovered.steps(), plan.protocol.steps());
}
