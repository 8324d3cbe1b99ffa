//! The migration artifact.
//!
//! A protocol holds an ordered list of steps and moves them across the
//! persistence boundary: rendering to the textual surface form on the way
//! to disk, parsing back on the way in. Materialization is all-or-nothing;
//! a single malformed line fails the whole artifact.
//!
//! Files are named `migration-NNNN.strata` with a zero-padded sequence
//! number derived from the highest suffix already present in the target
//! directory. There is no hidden counter state: the next number is a pure
//! function of a directory listing.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use strata_schema::Model;
use tracing::debug;

use crate::error::{MigrateError, MigrateResult};
use crate::parse::parse_step;
use crate::sql::{SqlStatement, SqliteCompiler};
use crate::step::Step;

/// File extension for persisted migration artifacts.
pub const ARTIFACT_EXTENSION: &str = "strata";

/// Prefix shared by all artifact filenames.
pub const ARTIFACT_PREFIX: &str = "migration-";

/// An external code formatter applied to artifact text before it is
/// written. The engine itself does no pretty-printing.
pub trait Formatter: Send + Sync {
    /// Format the artifact source text.
    fn format(&self, source: &str) -> String;
}

/// A formatter that leaves the text untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughFormatter;

impl Formatter for PassthroughFormatter {
    fn format(&self, source: &str) -> String {
        source.to_string()
    }
}

/// A replayable migration artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Protocol {
    steps: Vec<Step>,
}

impl Protocol {
    /// Create an artifact from an ordered step list.
    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// The structured steps, in order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Whether the artifact contains no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Render the artifact body: one step per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            out.push_str(&step.render());
            out.push('\n');
        }
        out
    }

    /// Materialize an artifact from its textual form. Comment lines
    /// (`--`) and blank lines are ignored; any malformed step fails the
    /// whole artifact.
    pub fn parse_text(text: &str) -> MigrateResult<Self> {
        let mut steps = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("--") {
                continue;
            }
            steps.push(parse_step(line)?);
        }
        Ok(Self::from_steps(steps))
    }

    /// SHA-256 checksum of the rendered steps.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.render().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Compile the artifact into SQL statements against a target model set.
    pub fn compile(&self, models: &[Model]) -> MigrateResult<Vec<SqlStatement>> {
        SqliteCompiler::new().compile(&self.steps, models)
    }

    /// Persist the artifact into `dir`, returning the written path.
    ///
    /// The filename continues the directory's sequence. The rendered text
    /// is passed through the formatter collaborator before writing; the
    /// directory is created if absent. Single-writer access is assumed
    /// (one invocation at a time); no file locking is performed.
    pub async fn persist(&self, dir: &Path, formatter: &dyn Formatter) -> MigrateResult<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }

        let number = next_sequence_number(names.iter().map(String::as_str));
        let stem = format!("{ARTIFACT_PREFIX}{number:04}");
        let path = dir.join(format!("{stem}.{ARTIFACT_EXTENSION}"));

        let mut text = format!(
            "-- {stem}\n-- Generated at {}\n",
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
        );
        text.push_str(&self.render());
        let text = formatter.format(&text);

        tokio::fs::write(&path, text).await?;
        debug!(path = %path.display(), steps = self.steps.len(), "persisted migration artifact");
        Ok(path)
    }

    /// Load a previously persisted artifact. A missing file is a hard
    /// error naming the expected path; malformed content fails outright.
    pub async fn load(path: &Path) -> MigrateResult<Self> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MigrateError::ArtifactNotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        Self::parse_text(&text).map_err(|e| match e {
            MigrateError::MalformedStep(reason) => MigrateError::malformed_artifact(path, reason),
            other => other,
        })
    }
}

/// Derive the next migration sequence number from a directory listing.
///
/// Filenames that do not match `migration-NNNN.*` are ignored. The
/// sequence starts at 1 and is monotonically increasing.
pub fn next_sequence_number<'a>(filenames: impl IntoIterator<Item = &'a str>) -> u32 {
    filenames
        .into_iter()
        .filter_map(sequence_of)
        .max()
        .map_or(1, |n| n + 1)
}

fn sequence_of(filename: &str) -> Option<u32> {
    let stem = filename.split('.').next().unwrap_or(filename);
    stem.strip_prefix(ARTIFACT_PREFIX)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_schema::{Field, FieldType};

    fn sample() -> Protocol {
        Protocol::from_steps(vec![
            Step::CreateModel {
                model: Model::new("account")
                    .with_field(Field::new("email", FieldType::String).unique()),
            },
            Step::DropModel {
                model: "legacy".to_string(),
            },
        ])
    }

    #[test]
    fn test_next_sequence_number() {
        assert_eq!(next_sequence_number([]), 1);
        assert_eq!(
            next_sequence_number(["migration-0001.strata", "migration-0002.strata"]),
            3
        );
        assert_eq!(
            next_sequence_number(["migration-0007.strata", "notes.txt", "migration-0002.strata"]),
            8
        );
        assert_eq!(next_sequence_number(["unrelated.sql"]), 1);
    }

    #[test]
    fn test_render_and_parse_roundtrip() {
        let protocol = sample();
        let parsed = Protocol::parse_text(&protocol.render()).unwrap();
        assert_eq!(parsed, protocol);
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let text = "-- header\n\ndrop.model(\"a\")\n";
        let protocol = Protocol::parse_text(text).unwrap();
        assert_eq!(protocol.steps().len(), 1);
    }

    #[test]
    fn test_parse_is_all_or_nothing() {
        let text = "drop.model(\"a\")\nexplode.model(\"b\")\n";
        assert!(Protocol::parse_text(text).is_err());
    }

    #[test]
    fn test_checksum_stable() {
        assert_eq!(sample().checksum(), sample().checksum());
        assert_ne!(
            sample().checksum(),
            Protocol::from_steps(vec![]).checksum()
        );
    }

    #[tokio::test]
    async fn test_persist_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let protocol = sample();

        let path = protocol
            .persist(dir.path(), &PassthroughFormatter)
            .await
            .unwrap();
        assert!(path.ends_with("migration-0001.strata"));

        let loaded = Protocol::load(&path).await.unwrap();
        assert_eq!(loaded, protocol);

        // The next persist continues the sequence.
        let path = protocol
            .persist(dir.path(), &PassthroughFormatter)
            .await
            .unwrap();
        assert!(path.ends_with("migration-0002.strata"));
    }

    #[tokio::test]
    async fn test_load_missing_file_names_path() {
        let err = Protocol::load(Path::new("/nonexistent/migration-0001.strata"))
            .await
            .unwrap_err();
        let MigrateError::ArtifactNotFound { path } = err else {
            panic!("expected ArtifactNotFound");
        };
        assert!(path.to_string_lossy().contains("migration-0001"));
    }

    #[tokio::test]
    async fn test_load_malformed_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migration-0001.strata");
        tokio::fs::write(&path, "not a step\n").await.unwrap();

        let err = Protocol::load(&path).await.unwrap_err();
        assert!(matches!(err, MigrateError::MalformedArtifact { .. }));
    }

    #[tokio::test]
    async fn test_formatter_is_applied() {
        struct Upcasing;
        impl Formatter for Upcasing {
            fn format(&self, source: &str) -> String {
                // Only touches comments, so the artifact stays loadable.
                source
                    .lines()
                    .map(|l| {
                        if l.starts_with("--") {
                            l.to_uppercase()
                        } else {
                            l.to_string()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = sample().persist(dir.path(), &Upcasing).await.unwrap();
        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(text.starts_with("-- MIGRATION-0001"));
    }
}
