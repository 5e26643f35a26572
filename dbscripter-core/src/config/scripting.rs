//! Options handed to the scripting engine for every object.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Immutable scripting options.
///
/// The writer derives a fresh value per destination file through
/// [`ScriptingOptions::with_file_name`]; the base value is never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptingOptions {
    /// Prefix object names with their schema
    pub schema_qualify: bool,
    /// Script referenced objects too (not supported)
    pub with_dependencies: bool,
    /// Emit a `GO` line after each statement
    pub batch_terminator: bool,
    /// Include index definitions in table scripts
    pub indexes: bool,
    /// Include `is_ms_shipped` objects in the catalog
    pub allow_system_objects: bool,
    /// Append to the destination file instead of truncating it
    pub append_to_file: bool,
    /// Keep rendering the rest of an object when an optional part fails
    pub continue_on_error: bool,
    /// Start every script with `USE [database]`
    pub include_database_context: bool,
    /// Start every script with an object header comment
    pub include_headers: bool,
    /// Drop `COLLATE` clauses from column definitions
    pub no_collation: bool,
    pub ansi_padding: bool,
    pub file_name: Option<PathBuf>,
}

impl Default for ScriptingOptions {
    fn default() -> Self {
        Self {
            schema_qualify: true,
            with_dependencies: false,
            batch_terminator: true,
            indexes: true,
            allow_system_objects: false,
            append_to_file: true,
            continue_on_error: true,
            include_database_context: true,
            include_headers: false,
            no_collation: false,
            ansi_padding: false,
            file_name: None,
        }
    }
}

impl ScriptingOptions {
    /// Returns a copy targeting `path`.
    pub fn with_file_name(&self, path: impl AsRef<Path>) -> Self {
        Self {
            file_name: Some(path.as_ref().to_path_buf()),
            ..self.clone()
        }
    }

    pub fn with_headers(mut self, include: bool) -> Self {
        self.include_headers = include;
        self
    }

    /// Validates option combinations the engine can honor.
    ///
    /// # Errors
    /// Returns error if dependency scripting is requested
    pub fn validate(&self) -> crate::Result<()> {
        if self.with_dependencies {
            return Err(crate::error::ScripterError::configuration(
                "with_dependencies is not supported; objects are scripted one at a time",
            ));
        }
        Ok(())
    }
}
