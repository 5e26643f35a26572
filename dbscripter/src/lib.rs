//! Command-line front end for dbscripter.
//!
//! Parses and validates the command line, runs the describer, writes the
//! optional JSON report and maps the outcome to a process exit code.
//!
//! # Exit codes
//! | Code | Meaning                                      |
//! |------|----------------------------------------------|
//! | 0    | Success, or missing database when allowed    |
//! | 1    | Connection, catalog or I/O failure           |
//! | 2    | Invalid or missing arguments                 |
//! | 3    | Database not found                           |
//! | 4    | At least one object failed to script         |

use anyhow::Context;
use clap::{ArgAction, Parser};
use dbscripter_core::adapters::SessionConnector;
use dbscripter_core::config::{
    ConnectionSettings, DescriberConfig, FailurePolicy, MissingDatabasePolicy, SchemaAllowList,
    ServerAddress,
};
use dbscripter_core::describer::{DatabaseDescriber, DescribeOutcome, format_elapsed};
use dbscripter_core::security::Credentials;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info};

/// Environment variable consulted when `--password` is not given.
pub const PASSWORD_ENV: &str = "DBSCRIPTER_PASSWORD";

#[derive(Parser)]
#[command(name = "dbscripter")]
#[command(about = "Export SQL Server database objects as .sql scripts")]
#[command(version)]
#[command(disable_help_flag = true, disable_version_flag = true)]
#[command(long_about = "
dbscripter - one script file per database object

Connects to a SQL Server instance, finds the named database (case-insensitive)
and writes the definition of every table, view, procedure, function, trigger,
index and table type in the allowed schemas to:

  <output>/<database>/<Category>/<object>.sql

Category directories are emptied of .sql files before each run, so the
output always mirrors the current database.

EXAMPLES:
  dbscripter -d sales -s db01 -u reader -p secret -o ./schema
  dbscripter -d sales -s 'db01\\SQLEXPRESS' -u reader -o ./schema --schema dbo --schema audit
  DBSCRIPTER_PASSWORD=secret dbscripter -d sales -s db01,1444 -u reader -o ./schema
")]
pub struct Cli {
    /// Database name
    #[arg(short = 'd', long, value_name = "NAME", help = "Database to export (matched case-insensitively)")]
    pub database: Option<String>,

    /// Server address
    #[arg(short = 's', long, value_name = "SERVER", help = "Server: host, host,port or host\\instance")]
    pub server: Option<String>,

    /// Login name
    #[arg(short = 'u', long, value_name = "USER", help = "SQL Server login")]
    pub username: Option<String>,

    /// Login password
    #[arg(
        short = 'p',
        long,
        value_name = "PASSWORD",
        env = PASSWORD_ENV,
        hide_env_values = true,
        help = "Password for the login (never logged)"
    )]
    pub password: Option<String>,

    /// Output directory
    #[arg(short = 'o', long, value_name = "DIR", help = "Root directory for the exported scripts")]
    pub output: Option<PathBuf>,

    /// Allowed schemas
    #[arg(
        long = "schema",
        value_name = "NAME",
        help = "Schema to export; repeat for several (default: dbo)"
    )]
    pub schemas: Vec<String>,

    /// Stop a category at its first failing object
    #[arg(long, help = "Stop a category at the first object that fails to script")]
    pub abort_category_on_error: bool,

    /// Missing database is not an error
    #[arg(long, help = "Exit successfully when the database does not exist")]
    pub allow_missing_database: bool,

    /// Run dos2unix on every written file
    #[arg(long, help = "Convert written files to LF line endings with dos2unix")]
    pub normalize_line_endings: bool,

    /// Skip certificate validation
    #[arg(long, help = "Trust the server certificate without validation")]
    pub trust_server_certificate: bool,

    /// Connect deadline
    #[arg(long, value_name = "SECS", default_value_t = 30, help = "Seconds allowed for connect and login")]
    pub connect_timeout: u64,

    /// JSON report path
    #[arg(long, value_name = "FILE", help = "Write a JSON run report to FILE")]
    pub report: Option<PathBuf>,

    /// Increase verbosity
    #[arg(long, action = ArgAction::Count, help = "Increase verbosity (--verbose, --verbose --verbose)")]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, help = "Suppress all output except errors")]
    pub quiet: bool,

    /// JSON log lines
    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    /// Print version
    #[arg(short = 'v', long, action = ArgAction::Version, help = "Print version")]
    pub version: Option<bool>,

    /// Print help
    #[arg(short = 'h', long, short_alias = '?', action = ArgAction::Help, help = "Print help")]
    pub help: Option<bool>,
}

/// Problems with the command line, reported before any connection is made.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing database name.")]
    MissingDatabase,
    #[error("Missing server.")]
    MissingServer,
    #[error("Missing user password.")]
    MissingPassword,
    #[error("Missing user.")]
    MissingUser,
    #[error("Missing output directory.")]
    MissingOutput,
    #[error("{0}")]
    Invalid(String),
}

/// Process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    RuntimeFailure,
    InvalidArguments,
    DatabaseNotFound,
    PartialFailure,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::RuntimeFailure => 1,
            Self::InvalidArguments => 2,
            Self::DatabaseNotFound => 3,
            Self::PartialFailure => 4,
        }
    }
}

impl From<DescribeOutcome> for ExitStatus {
    fn from(outcome: DescribeOutcome) -> Self {
        match outcome {
            DescribeOutcome::Success | DescribeOutcome::DatabaseIgnored => Self::Success,
            DescribeOutcome::PartialFailure => Self::PartialFailure,
            DescribeOutcome::DatabaseNotFound => Self::DatabaseNotFound,
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Checks the required flags in a fixed order and builds the run
/// configuration.
///
/// # Errors
/// Returns the first missing or blank required flag, or an invalid value
pub fn validate(cli: &Cli) -> Result<DescriberConfig, ValidationError> {
    let database = present(cli.database.as_deref()).ok_or(ValidationError::MissingDatabase)?;
    let server = present(cli.server.as_deref()).ok_or(ValidationError::MissingServer)?;
    let password = non_empty(cli.password.as_deref()).ok_or(ValidationError::MissingPassword)?;
    let username = present(cli.username.as_deref()).ok_or(ValidationError::MissingUser)?;
    let output = cli
        .output
        .as_deref()
        .filter(|p| !p.to_string_lossy().trim().is_empty())
        .ok_or(ValidationError::MissingOutput)?;

    if cli.schemas.iter().any(|s| s.trim().is_empty()) {
        return Err(ValidationError::Invalid(
            "schema names cannot be blank".to_string(),
        ));
    }

    let server: ServerAddress = server
        .parse()
        .map_err(|e: dbscripter_core::ScripterError| ValidationError::Invalid(e.to_string()))?;

    let connection = ConnectionSettings::new(
        server,
        Credentials::new(username.trim().to_string(), password.to_string()),
    )
    .with_trust_server_certificate(cli.trust_server_certificate)
    .with_connect_timeout(Duration::from_secs(cli.connect_timeout));

    let config = DescriberConfig::new(connection, database.trim(), output)
        .with_allow_list(SchemaAllowList::new(cli.schemas.iter().cloned()))
        .with_failure_policy(if cli.abort_category_on_error {
            FailurePolicy::AbortBucket
        } else {
            FailurePolicy::ContinueBucket
        })
        .with_missing_database(if cli.allow_missing_database {
            MissingDatabasePolicy::Ignore
        } else {
            MissingDatabasePolicy::Fail
        })
        .with_normalize_line_endings(cli.normalize_line_endings);

    config
        .validate()
        .map_err(|e| ValidationError::Invalid(e.to_string()))?;
    Ok(config)
}

/// Runs the export with the given connector.
pub async fn run_with(cli: &Cli, connector: &dyn SessionConnector) -> ExitStatus {
    let config = match validate(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitStatus::InvalidArguments;
        }
    };

    let started = Instant::now();
    let describer = DatabaseDescriber::new(config);
    let status = match describer.execute(connector).await {
        Ok(report) => {
            let mut status = ExitStatus::from(report.outcome);
            if let Some(path) = &cli.report {
                let written = report
                    .write_json(path)
                    .await
                    .with_context(|| format!("Failed to write report to {}", path.display()));
                match written {
                    Ok(()) => info!("Report written to {}", path.display()),
                    Err(e) => {
                        error!("{:#}", e);
                        status = ExitStatus::RuntimeFailure;
                    }
                }
            }
            status
        }
        Err(e) => {
            error!("{}", e.chain());
            ExitStatus::RuntimeFailure
        }
    };

    println!("Program executed in: {}", format_elapsed(started.elapsed()));
    status
}

/// Runs the export against SQL Server.
pub async fn run(cli: &Cli) -> ExitStatus {
    #[cfg(feature = "mssql")]
    {
        run_with(cli, &dbscripter_core::adapters::mssql::SqlServerConnector::new()).await
    }
    #[cfg(not(feature = "mssql"))]
    {
        let _ = cli;
        eprintln!("dbscripter was built without SQL Server support (feature \"mssql\")");
        ExitStatus::RuntimeFailure
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use async_trait::async_trait;
    use dbscripter_core::adapters::{CatalogProvider, ScriptEngine, ServerSession};
    use dbscripter_core::config::ScriptingOptions;
    use dbscripter_core::models::{CatalogEntry, DatabaseCatalog, Urn};
    use std::path::Path;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["dbscripter"];
        argv.extend_from_slice(args);
        temp_env::with_var_unset(PASSWORD_ENV, || Cli::try_parse_from(argv).unwrap())
    }

    const FULL: &[&str] = &["-d", "sales", "-s", "db01", "-p", "pw", "-u", "sa", "-o", "out"];

    #[test]
    fn test_missing_flags_reported_in_order() {
        let cases: [(&[&str], ValidationError); 5] = [
            (&[], ValidationError::MissingDatabase),
            (&["-d", "sales"], ValidationError::MissingServer),
            (&["-d", "sales", "-s", "db01"], ValidationError::MissingPassword),
            (&["-d", "sales", "-s", "db01", "-p", "pw"], ValidationError::MissingUser),
            (
                &["-d", "sales", "-s", "db01", "-p", "pw", "-u", "sa"],
                ValidationError::MissingOutput,
            ),
        ];
        for (args, expected) in cases {
            assert_eq!(validate(&parse(args)).unwrap_err(), expected, "args {:?}", args);
        }
    }

    #[test]
    fn test_missing_flag_messages() {
        assert_eq!(ValidationError::MissingDatabase.to_string(), "Missing database name.");
        assert_eq!(ValidationError::MissingServer.to_string(), "Missing server.");
        assert_eq!(ValidationError::MissingPassword.to_string(), "Missing user password.");
        assert_eq!(ValidationError::MissingUser.to_string(), "Missing user.");
        assert_eq!(ValidationError::MissingOutput.to_string(), "Missing output directory.");
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        assert_eq!(
            validate(&parse(&["-d", "  "])).unwrap_err(),
            ValidationError::MissingDatabase
        );
        assert_eq!(
            validate(&parse(&["-d", "sales", "-s", "db01", "-p", "pw", "-u", " "])).unwrap_err(),
            ValidationError::MissingUser
        );
    }

    #[test]
    fn test_whitespace_password_is_kept() {
        let config = validate(&parse(&[
            "-d", "sales", "-s", "db01", "-p", "  ", "-u", "sa", "-o", "out",
        ]))
        .unwrap();
        assert_eq!(config.connection.credentials.password(), "  ");

        assert_eq!(
            validate(&parse(&["-d", "sales", "-s", "db01", "-p", ""])).unwrap_err(),
            ValidationError::MissingPassword
        );
    }

    #[test]
    fn test_blank_schema_rejected() {
        for blank in ["", "   "] {
            let mut args = FULL.to_vec();
            args.extend_from_slice(&["--schema", "dbo", "--schema", blank]);
            assert_eq!(
                validate(&parse(&args)).unwrap_err(),
                ValidationError::Invalid("schema names cannot be blank".to_string()),
                "schema {:?}",
                blank
            );
        }
    }

    #[test]
    fn test_full_command_line_builds_config() {
        let mut args = FULL.to_vec();
        args.extend_from_slice(&[
            "--schema",
            "dbo",
            "--schema",
            "audit",
            "--abort-category-on-error",
            "--allow-missing-database",
            "--connect-timeout",
            "5",
        ]);
        let config = validate(&parse(&args)).unwrap();

        assert_eq!(config.database, "sales");
        assert_eq!(config.database_dir(), PathBuf::from("out").join("sales"));
        assert_eq!(config.allow_list.schemas(), ["dbo", "audit"]);
        assert_eq!(config.failure_policy, FailurePolicy::AbortBucket);
        assert_eq!(config.missing_database, MissingDatabasePolicy::Ignore);
        assert_eq!(config.connection.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.connection.credentials.username(), "sa");
    }

    #[test]
    fn test_defaults() {
        let config = validate(&parse(FULL)).unwrap();
        assert_eq!(config.allow_list.schemas(), ["dbo"]);
        assert_eq!(config.failure_policy, FailurePolicy::ContinueBucket);
        assert_eq!(config.missing_database, MissingDatabasePolicy::Fail);
        assert!(!config.normalize_line_endings);
    }

    #[test]
    fn test_password_from_environment() {
        let cli = temp_env::with_var(PASSWORD_ENV, Some("from-env"), || {
            Cli::try_parse_from(["dbscripter", "-d", "sales", "-s", "db01", "-u", "sa", "-o", "out"])
                .unwrap()
        });
        let config = validate(&cli).unwrap();
        assert_eq!(config.connection.credentials.password(), "from-env");
    }

    #[test]
    fn test_invalid_server_and_timeout() {
        let cli = parse(&["-d", "sales", "-s", "db01,notaport", "-p", "pw", "-u", "sa", "-o", "out"]);
        assert!(matches!(validate(&cli).unwrap_err(), ValidationError::Invalid(_)));

        let mut args = FULL.to_vec();
        args.extend_from_slice(&["--connect-timeout", "0"]);
        assert!(matches!(
            validate(&parse(&args)).unwrap_err(),
            ValidationError::Invalid(_)
        ));
    }

    #[test]
    fn test_help_and_version_flags() {
        for flag in ["-h", "-?", "--help"] {
            let err = Cli::try_parse_from(["dbscripter", flag]).err().unwrap();
            assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp, "flag {}", flag);
        }
        for flag in ["-v", "--version"] {
            let err = Cli::try_parse_from(["dbscripter", flag]).err().unwrap();
            assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion, "flag {}", flag);
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitStatus::from(DescribeOutcome::Success).code(), 0);
        assert_eq!(ExitStatus::from(DescribeOutcome::DatabaseIgnored).code(), 0);
        assert_eq!(ExitStatus::RuntimeFailure.code(), 1);
        assert_eq!(ExitStatus::InvalidArguments.code(), 2);
        assert_eq!(ExitStatus::from(DescribeOutcome::DatabaseNotFound).code(), 3);
        assert_eq!(ExitStatus::from(DescribeOutcome::PartialFailure).code(), 4);
    }

    struct OneDatabase;

    #[async_trait]
    impl CatalogProvider for OneDatabase {
        async fn list_databases(&mut self) -> dbscripter_core::Result<Vec<String>> {
            Ok(vec!["Sales".to_string()])
        }

        async fn load_catalog(
            &mut self,
            database: &str,
            _include_system_objects: bool,
        ) -> dbscripter_core::Result<DatabaseCatalog> {
            let mut catalog = DatabaseCatalog::new(database);
            catalog.views.push(CatalogEntry::new(Some("dbo"), "OrderSummary", 7));
            Ok(catalog)
        }
    }

    #[async_trait]
    impl ScriptEngine for OneDatabase {
        async fn script_object(
            &mut self,
            urn: &Urn,
            _options: &ScriptingOptions,
        ) -> dbscripter_core::Result<Vec<String>> {
            Ok(vec![format!("CREATE VIEW [dbo].[{}] AS SELECT 1", urn.name)])
        }
    }

    struct OneDatabaseConnector;

    #[async_trait]
    impl SessionConnector for OneDatabaseConnector {
        async fn connect(
            &self,
            _settings: &ConnectionSettings,
        ) -> dbscripter_core::Result<Box<dyn ServerSession>> {
            Ok(Box::new(OneDatabase))
        }

        fn describe(&self) -> &'static str {
            "test"
        }
    }

    fn cli_for(database: &str, out: &Path, extra: &[&str]) -> Cli {
        let out = out.to_string_lossy().into_owned();
        let mut args = vec!["-d", database, "-s", "db01", "-p", "pw", "-u", "sa", "-o", out.as_str()];
        args.extend_from_slice(extra);
        parse(&args)
    }

    #[tokio::test]
    async fn test_run_with_writes_scripts_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("report.json");
        let report_arg = report.to_string_lossy().into_owned();
        let cli = cli_for("sales", dir.path(), &["--report", report_arg.as_str()]);

        let status = run_with(&cli, &OneDatabaseConnector).await;
        assert_eq!(status, ExitStatus::Success);
        assert!(
            dir.path()
                .join("sales")
                .join("Views")
                .join("OrderSummary.sql")
                .exists()
        );
        let json = std::fs::read_to_string(report).unwrap();
        assert!(json.contains("\"matched\": \"Sales\""));
    }

    #[tokio::test]
    async fn test_run_with_unwritable_report_is_runtime_failure() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("missing").join("report.json");
        let report_arg = report.to_string_lossy().into_owned();
        let cli = cli_for("sales", dir.path(), &["--report", report_arg.as_str()]);

        let status = run_with(&cli, &OneDatabaseConnector).await;
        assert_eq!(status, ExitStatus::RuntimeFailure);
        assert!(!report.exists());
        assert!(dir.path().join("sales").join("Views").join("OrderSummary.sql").exists());
    }

    #[tokio::test]
    async fn test_run_with_missing_database_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");

        let status = run_with(&cli_for("hr", &out, &[]), &OneDatabaseConnector).await;
        assert_eq!(status.code(), 3);
        assert!(!out.exists());

        let status = run_with(
            &cli_for("hr", &out, &["--allow-missing-database"]),
            &OneDatabaseConnector,
        )
        .await;
        assert_eq!(status.code(), 0);
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_run_with_invalid_arguments() {
        let cli = parse(&["-d", "sales"]);
        assert_eq!(run_with(&cli, &OneDatabaseConnector).await, ExitStatus::InvalidArguments);
    }
}
