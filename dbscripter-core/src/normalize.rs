//! Optional line-ending normalization of written scripts.
//!
//! Module definitions come back from the server with whatever line endings
//! they were created with, usually CRLF. When enabled, every written file is
//! passed to an external converter (`dos2unix` by default). The step is
//! best-effort: a missing tool or a non-zero exit leaves the file as written.

use std::ffi::OsString;
use std::path::Path;
use tokio::process::Command;

/// Default converter program.
pub const DEFAULT_PROGRAM: &str = "dos2unix";

/// Runs an external line-ending converter on files.
#[derive(Debug, Clone)]
pub struct LineEndingNormalizer {
    program: OsString,
    args: Vec<OsString>,
}

impl Default for LineEndingNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM).with_args(["-q"])
    }
}

impl LineEndingNormalizer {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Arguments passed before the file path.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Converts `path` in place. Never fails.
    ///
    /// Returns whether the converter ran and exited successfully, so callers
    /// can log it; the file is untouched otherwise.
    pub async fn normalize(&self, path: &Path) -> bool {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => true,
            Ok(status) => {
                tracing::debug!(
                    "{} exited with {} for {}",
                    self.program.to_string_lossy(),
                    status,
                    path.display()
                );
                false
            }
            Err(e) => {
                tracing::debug!(
                    "{} could not be started for {}: {}",
                    self.program.to_string_lossy(),
                    path.display(),
                    e
                );
                false
            }
        }
    }
}
