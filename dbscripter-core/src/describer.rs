//! Orchestrates one describe run: connect, locate the database, collect,
//! write.
//!
//! # Example
//! ```rust,no_run
//! # async fn run(connector: &dyn dbscripter_core::adapters::SessionConnector,
//! #              config: dbscripter_core::config::DescriberConfig)
//! #     -> dbscripter_core::Result<()> {
//! use dbscripter_core::describer::DatabaseDescriber;
//!
//! let report = DatabaseDescriber::new(config).execute(connector).await?;
//! println!("{}", report.failure_count());
//! # Ok(())
//! # }
//! ```

use crate::Result;
use crate::adapters::SessionConnector;
use crate::collector::Collector;
use crate::config::{DescriberConfig, MissingDatabasePolicy};
use crate::error::ScripterError;
use crate::normalize::LineEndingNormalizer;
use crate::writer::{BucketReport, DirectoryReset, ScriptWriter, reset_directory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Final state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DescribeOutcome {
    /// Every object was written
    Success,
    /// The run finished but at least one object failed or was skipped
    PartialFailure,
    /// No database on the server matched the requested name
    DatabaseNotFound,
    /// No match, and the run was configured to treat that as a no-op
    DatabaseIgnored,
}

/// Summary of a describe run, serializable for `--report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeReport {
    /// Name as requested on the command line
    pub database: String,
    /// Name as the server reports it, when found
    pub matched: Option<String>,
    pub outcome: DescribeOutcome,
    pub database_dir: Option<PathBuf>,
    pub categories: Vec<BucketReport>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl DescribeReport {
    fn new(database: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            database: database.to_string(),
            matched: None,
            outcome: DescribeOutcome::Success,
            database_dir: None,
            categories: Vec::new(),
            started_at,
            elapsed_ms: 0,
        }
    }

    /// Objects that failed or were skipped across all categories.
    pub fn failure_count(&self) -> usize {
        self.categories
            .iter()
            .map(|c| c.failures.len() + c.skipped.len())
            .sum()
    }

    pub fn scripted_count(&self) -> usize {
        self.categories.iter().map(|c| c.scripted).sum()
    }

    /// Writes the report as pretty JSON.
    ///
    /// # Errors
    /// Returns error if serialization or the file write fails
    pub async fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            ScripterError::Serialization {
                context: "Failed to serialize describe report".to_string(),
                source: e,
            }
        })?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| ScripterError::io(format!("Failed to write {}", path.display()), e))
    }
}

/// Formats a duration as `HH:MM:SS <total> ms`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02} {} ms",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60,
        elapsed.as_millis()
    )
}

/// Finds the first name equal to `wanted` ignoring case.
pub fn find_database<'a>(databases: &'a [String], wanted: &str) -> Option<&'a str> {
    let wanted = wanted.to_lowercase();
    databases
        .iter()
        .find(|name| name.to_lowercase() == wanted)
        .map(String::as_str)
}

/// Runs the export described by a [`DescriberConfig`].
#[derive(Debug, Clone)]
pub struct DatabaseDescriber {
    config: DescriberConfig,
}

impl DatabaseDescriber {
    pub fn new(config: DescriberConfig) -> Self {
        Self { config }
    }

    /// Executes the run against a server reached through `connector`.
    ///
    /// A missing database is not an error; it is reported through
    /// [`DescribeOutcome`]. Per-object failures are reported the same way.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid, the connection or a
    /// catalog query fails, or an output directory cannot be prepared
    pub async fn execute(&self, connector: &dyn SessionConnector) -> Result<DescribeReport> {
        let started = Instant::now();
        let mut report = DescribeReport::new(&self.config.database, Utc::now());

        self.config.validate()?;

        let settings = &self.config.connection;
        tracing::info!("Connecting to {} via {}", settings, connector.describe());
        let mut session = tokio::time::timeout(settings.connect_timeout, connector.connect(settings))
            .await
            .map_err(|_| ScripterError::Timeout {
                seconds: settings.connect_timeout.as_secs(),
            })??;

        let databases = session.list_databases().await?;
        tracing::debug!("Server reports {} databases", databases.len());

        let Some(matched) = find_database(&databases, &self.config.database) else {
            report.outcome = match self.config.missing_database {
                MissingDatabasePolicy::Fail => {
                    tracing::error!("Database {} not found", self.config.database);
                    DescribeOutcome::DatabaseNotFound
                }
                MissingDatabasePolicy::Ignore => {
                    tracing::warn!("Database {} not found, nothing to do", self.config.database);
                    DescribeOutcome::DatabaseIgnored
                }
            };
            report.elapsed_ms = elapsed_ms(started);
            return Ok(report);
        };
        let matched = matched.to_string();
        report.matched = Some(matched.clone());

        let output_dir = self.config.output_dir();
        tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
            ScripterError::io(format!("Failed to create {}", output_dir.display()), e)
        })?;

        let database_dir = self.config.database_dir();
        if let DirectoryReset::Cleared(removed) = reset_directory(&database_dir).await? {
            tracing::debug!("Removed {} old files from {}", removed, database_dir.display());
        }
        report.database_dir = Some(database_dir.clone());

        let catalog = session
            .load_catalog(&matched, self.config.scripting.allow_system_objects)
            .await?;
        let buckets = Collector::new(self.config.allow_list.clone()).collect(&catalog);

        let mut writer = ScriptWriter::new(
            self.config.scripting.clone(),
            self.config.failure_policy,
        );
        if self.config.normalize_line_endings {
            writer = writer.with_normalizer(LineEndingNormalizer::default());
        }

        for bucket in &buckets {
            let bucket_report = writer
                .write_bucket(session.as_mut(), &database_dir, bucket)
                .await?;
            report.categories.push(bucket_report);
        }

        if report.failure_count() > 0 {
            report.outcome = DescribeOutcome::PartialFailure;
            tracing::warn!(
                "{} objects written, {} failed or skipped",
                report.scripted_count(),
                report.failure_count()
            );
        } else {
            tracing::info!("{} objects written", report.scripted_count());
        }

        report.elapsed_ms = elapsed_ms(started);
        Ok(report)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
