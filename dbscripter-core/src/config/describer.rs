//! Run configuration for one describe operation.

use super::{ConnectionSettings, ScriptingOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Schema name used when no allow-list is given.
pub const DEFAULT_SCHEMA: &str = "dbo";

/// Schemas whose objects are exported.
///
/// Matching is exact and case-sensitive, the same comparison the server
/// catalog reports names with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaAllowList {
    schemas: Vec<String>,
}

impl SchemaAllowList {
    /// Builds an allow-list; falls back to the default schema when empty.
    pub fn new<I, S>(schemas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for schema in schemas.into_iter().map(Into::into) {
            if !unique.contains(&schema) {
                unique.push(schema);
            }
        }
        if unique.is_empty() {
            return Self::default();
        }
        Self { schemas: unique }
    }

    pub fn allows(&self, schema: Option<&str>) -> bool {
        schema.is_some_and(|s| self.schemas.iter().any(|allowed| allowed == s))
    }

    pub fn schemas(&self) -> &[String] {
        &self.schemas
    }
}

impl Default for SchemaAllowList {
    fn default() -> Self {
        Self {
            schemas: vec![DEFAULT_SCHEMA.to_string()],
        }
    }
}

/// What the writer does when one object in a category fails to script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Record the failure and keep going with the next object
    #[default]
    ContinueBucket,
    /// Stop the category at the first failure; later objects are skipped
    AbortBucket,
}

/// What a run does when the target database does not exist on the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingDatabasePolicy {
    /// Report the run as `DatabaseNotFound`
    #[default]
    Fail,
    /// Log a warning and finish as a successful no-op
    Ignore,
}

/// Immutable configuration for a describe run.
#[derive(Debug, Clone)]
pub struct DescriberConfig {
    pub connection: ConnectionSettings,
    pub database: String,
    pub output_dir: PathBuf,
    pub allow_list: SchemaAllowList,
    pub failure_policy: FailurePolicy,
    pub missing_database: MissingDatabasePolicy,
    pub normalize_line_endings: bool,
    pub scripting: ScriptingOptions,
}

impl DescriberConfig {
    pub fn new(
        connection: ConnectionSettings,
        database: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            connection,
            database: database.into(),
            output_dir: output_dir.into(),
            allow_list: SchemaAllowList::default(),
            failure_policy: FailurePolicy::default(),
            missing_database: MissingDatabasePolicy::default(),
            normalize_line_endings: false,
            scripting: ScriptingOptions::default(),
        }
    }

    pub fn with_allow_list(mut self, allow_list: SchemaAllowList) -> Self {
        self.allow_list = allow_list;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_missing_database(mut self, policy: MissingDatabasePolicy) -> Self {
        self.missing_database = policy;
        self
    }

    pub fn with_normalize_line_endings(mut self, normalize: bool) -> Self {
        self.normalize_line_endings = normalize;
        self
    }

    pub fn with_scripting(mut self, scripting: ScriptingOptions) -> Self {
        self.scripting = scripting;
        self
    }

    /// Per-database output directory: `<output>/<database lowercased>`.
    pub fn database_dir(&self) -> PathBuf {
        self.output_dir.join(self.database.to_lowercase())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Validates the whole run configuration.
    ///
    /// # Errors
    /// Returns error if the database name is blank or a nested setting is invalid
    pub fn validate(&self) -> crate::Result<()> {
        if self.database.trim().is_empty() {
            return Err(crate::error::ScripterError::configuration(
                "database name cannot be empty",
            ));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(crate::error::ScripterError::configuration(
                "output directory cannot be empty",
            ));
        }
        self.connection.validate()?;
        self.scripting.validate()
    }
}
