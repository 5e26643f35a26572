//! Writes one script file per object, grouped by category directory.
//!
//! Layout: `<database dir>/<category dir>/<object name>.sql`. Before a
//! category is written its directory is created, or cleared of `*.sql` files
//! if it already exists, so every run starts from an empty category.
//! Statements are appended, which means objects that share a name within a
//! category end up in the same file.

use crate::Result;
use crate::adapters::ScriptEngine;
use crate::config::{FailurePolicy, ScriptingOptions};
use crate::error::ScripterError;
use crate::models::{CatalogObject, CategoryBucket, ObjectCategory};
use crate::normalize::LineEndingNormalizer;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Batch separator understood by SQL Server client tools.
pub const BATCH_TERMINATOR: &str = "GO";

/// What happened to a directory during reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryReset {
    Created,
    /// Existing directory; the number of `.sql` files removed
    Cleared(usize),
}

/// A single object that could not be scripted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectFailure {
    pub object: String,
    pub urn: String,
    pub message: String,
}

/// Result of writing one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketReport {
    pub category: ObjectCategory,
    pub directory: PathBuf,
    /// Objects whose script was written
    pub scripted: usize,
    /// Distinct files touched, in write order
    pub files: Vec<PathBuf>,
    pub failures: Vec<ObjectFailure>,
    /// Objects never attempted because the category was aborted
    pub skipped: Vec<String>,
}

impl BucketReport {
    fn new(category: ObjectCategory, directory: PathBuf) -> Self {
        Self {
            category,
            directory,
            scripted: 0,
            files: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }
}

/// Ensures `path` exists and holds no `.sql` files.
///
/// The check runs against the full path it is given, never a bare
/// directory name relative to the working directory.
///
/// # Errors
/// Returns error if the directory cannot be created, listed or cleaned
pub async fn reset_directory(path: &Path) -> Result<DirectoryReset> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => {
            let removed = clear_sql_files(path).await?;
            Ok(DirectoryReset::Cleared(removed))
        }
        Ok(_) => Err(ScripterError::configuration(format!(
            "{} exists and is not a directory",
            path.display()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::create_dir_all(path).await.map_err(|e| {
                ScripterError::io(format!("Failed to create {}", path.display()), e)
            })?;
            Ok(DirectoryReset::Created)
        }
        Err(e) => Err(ScripterError::io(
            format!("Failed to inspect {}", path.display()),
            e,
        )),
    }
}

/// Deletes every `*.sql` file directly inside `path`. Other files and
/// subdirectories are left alone.
///
/// # Errors
/// Returns error if the directory cannot be read or a file cannot be removed
pub async fn clear_sql_files(path: &Path) -> Result<usize> {
    let mut entries = tokio::fs::read_dir(path)
        .await
        .map_err(|e| ScripterError::io(format!("Failed to list {}", path.display()), e))?;

    let mut removed = 0usize;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ScripterError::io(format!("Failed to list {}", path.display()), e))?
    {
        let file_path = entry.path();
        let is_sql = file_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"));
        if !is_sql {
            continue;
        }
        let file_type = entry.file_type().await.map_err(|e| {
            ScripterError::io(format!("Failed to inspect {}", file_path.display()), e)
        })?;
        if !file_type.is_file() {
            continue;
        }
        tokio::fs::remove_file(&file_path).await.map_err(|e| {
            ScripterError::io(format!("Failed to delete {}", file_path.display()), e)
        })?;
        removed += 1;
    }

    Ok(removed)
}

/// File name for an object: `<name>.sql`, with path separators replaced.
pub fn script_file_name(object_name: &str) -> String {
    let safe: String = object_name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            other => other,
        })
        .collect();
    format!("{}.sql", safe)
}

/// Joins statements into file content, adding a batch terminator line after
/// each statement when requested.
pub fn format_script(statements: &[String], batch_terminator: bool) -> String {
    let mut out = String::new();
    for statement in statements {
        let statement = statement.trim_end();
        if statement.is_empty() {
            continue;
        }
        out.push_str(statement);
        out.push('\n');
        if batch_terminator {
            out.push_str(BATCH_TERMINATOR);
            out.push('\n');
        }
    }
    out
}

/// Writes buckets of objects to disk through a [`ScriptEngine`].
#[derive(Debug, Clone, Default)]
pub struct ScriptWriter {
    options: ScriptingOptions,
    policy: FailurePolicy,
    normalizer: Option<LineEndingNormalizer>,
}

impl ScriptWriter {
    pub fn new(options: ScriptingOptions, policy: FailurePolicy) -> Self {
        Self {
            options,
            policy,
            normalizer: None,
        }
    }

    /// Runs `normalizer` on every file once its category is written.
    pub fn with_normalizer(mut self, normalizer: LineEndingNormalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    /// Writes every object in `bucket` below `database_dir`.
    ///
    /// Per-object failures never make this return `Err`; they end up in the
    /// report according to the [`FailurePolicy`].
    ///
    /// # Errors
    /// Returns error only if the category directory cannot be prepared
    pub async fn write_bucket<E>(
        &self,
        engine: &mut E,
        database_dir: &Path,
        bucket: &CategoryBucket,
    ) -> Result<BucketReport>
    where
        E: ScriptEngine + ?Sized,
    {
        let category_dir = database_dir.join(bucket.category.directory_name());
        tracing::info!("Describe and save: {}", bucket.category);

        match reset_directory(&category_dir).await? {
            DirectoryReset::Created => {
                tracing::debug!("Created {}", category_dir.display());
            }
            DirectoryReset::Cleared(removed) => {
                tracing::debug!(
                    "Removed {} old files from {}",
                    removed,
                    category_dir.display()
                );
            }
        }

        let mut report = BucketReport::new(bucket.category, category_dir.clone());

        for (position, object) in bucket.objects.iter().enumerate() {
            let path = category_dir.join(script_file_name(&object.name));
            match self.write_object(engine, object, &path).await {
                Ok(()) => {
                    report.scripted += 1;
                    if !report.files.contains(&path) {
                        report.files.push(path);
                    }
                }
                Err(e) => {
                    report.failures.push(ObjectFailure {
                        object: object.to_string(),
                        urn: object.urn.to_string(),
                        message: e.chain(),
                    });

                    if self.policy == FailurePolicy::AbortBucket {
                        report.skipped = bucket.objects[position + 1..]
                            .iter()
                            .map(ToString::to_string)
                            .collect();
                        tracing::error!(
                            "Describe object failed: {}",
                            bucket.describe_contents()
                        );
                        tracing::error!("Message: {}", e);
                        tracing::error!("Cause: {}", e.chain());
                        break;
                    }
                }
            }
        }

        if self.policy == FailurePolicy::ContinueBucket {
            for failure in &report.failures {
                tracing::error!(
                    "Describe object failed: {} ({}): {}",
                    failure.object,
                    failure.urn,
                    failure.message
                );
            }
        }

        if let Some(normalizer) = &self.normalizer {
            for file in &report.files {
                normalizer.normalize(file).await;
            }
        }

        Ok(report)
    }

    async fn write_object<E>(&self, engine: &mut E, object: &CatalogObject, path: &Path) -> Result<()>
    where
        E: ScriptEngine + ?Sized,
    {
        tracing::info!("Write script for: {}", script_file_name(&object.name));

        let options = self.options.with_file_name(path);
        let statements = engine.script_object(&object.urn, &options).await?;
        let content = format_script(&statements, options.batch_terminator);

        let mut open = tokio::fs::OpenOptions::new();
        open.create(true);
        if options.append_to_file {
            open.append(true);
        } else {
            open.write(true).truncate(true);
        }

        let mut file = open
            .open(path)
            .await
            .map_err(|e| ScripterError::io(format!("Failed to open {}", path.display()), e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| ScripterError::io(format!("Failed to write {}", path.display()), e))?;
        file.flush()
            .await
            .map_err(|e| ScripterError::io(format!("Failed to flush {}", path.display()), e))?;

        Ok(())
    }
}
