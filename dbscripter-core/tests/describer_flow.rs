//! End-to-end describe runs against an in-memory server.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use async_trait::async_trait;
use dbscripter_core::adapters::{CatalogProvider, ScriptEngine, ServerSession, SessionConnector};
use dbscripter_core::config::{
    ConnectionSettings, DescriberConfig, FailurePolicy, MissingDatabasePolicy, SchemaAllowList,
    ScriptingOptions,
};
use dbscripter_core::describer::{DatabaseDescriber, DescribeOutcome};
use dbscripter_core::error::ScripterError;
use dbscripter_core::models::{CatalogEntry, DatabaseCatalog, IndexEntry, TableEntry, Urn};
use dbscripter_core::{Credentials, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Default)]
struct FakeServer {
    catalogs: Vec<DatabaseCatalog>,
    fail_on: HashSet<String>,
}

struct FakeSession {
    server: FakeServer,
}

#[async_trait]
impl CatalogProvider for FakeSession {
    async fn list_databases(&mut self) -> Result<Vec<String>> {
        let mut names = vec!["master".to_string(), "tempdb".to_string()];
        names.extend(self.server.catalogs.iter().map(|c| c.name.clone()));
        Ok(names)
    }

    async fn load_catalog(&mut self, database: &str, _include_system_objects: bool) -> Result<DatabaseCatalog> {
        self.server
            .catalogs
            .iter()
            .find(|c| c.name == database)
            .cloned()
            .ok_or_else(|| ScripterError::configuration(format!("no catalog for {}", database)))
    }
}

#[async_trait]
impl ScriptEngine for FakeSession {
    async fn script_object(&mut self, urn: &Urn, options: &ScriptingOptions) -> Result<Vec<String>> {
        assert!(options.file_name.is_some());
        if self.server.fail_on.contains(&urn.name) {
            return Err(ScripterError::scripting(urn.to_string(), "cannot script"));
        }
        let name = match &urn.schema {
            Some(schema) => format!("[{}].[{}]", schema, urn.name),
            None => format!("[{}]", urn.name),
        };
        Ok(vec![
            format!("USE [{}]", urn.database),
            format!("CREATE {} {}", urn.category.urn_element().to_uppercase(), name),
        ])
    }
}

struct FakeConnector {
    server: FakeServer,
}

#[async_trait]
impl SessionConnector for FakeConnector {
    async fn connect(&self, _settings: &ConnectionSettings) -> Result<Box<dyn ServerSession>> {
        Ok(Box::new(FakeSession {
            server: self.server.clone(),
        }))
    }

    fn describe(&self) -> &'static str {
        "in-memory"
    }
}

struct SlowConnector;

#[async_trait]
impl SessionConnector for SlowConnector {
    async fn connect(&self, _settings: &ConnectionSettings) -> Result<Box<dyn ServerSession>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(ScripterError::configuration("unreachable"))
    }

    fn describe(&self) -> &'static str {
        "slow"
    }
}

struct RefusingConnector;

#[async_trait]
impl SessionConnector for RefusingConnector {
    async fn connect(&self, _settings: &ConnectionSettings) -> Result<Box<dyn ServerSession>> {
        Err(ScripterError::connection_failed(
            "Failed to reach db01",
            std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        ))
    }

    fn describe(&self) -> &'static str {
        "refusing"
    }
}

fn sales_catalog() -> DatabaseCatalog {
    let mut orders = TableEntry::new(CatalogEntry::new(Some("dbo"), "Orders", 101));
    orders.indexes.push(IndexEntry {
        name: "PK_Orders".to_string(),
        index_id: 1,
    });
    DatabaseCatalog {
        name: "Sales".to_string(),
        tables: vec![orders],
        views: vec![CatalogEntry::new(Some("dbo"), "OrderSummary", 201)],
        ..DatabaseCatalog::default()
    }
}

fn config(database: &str, output: &Path) -> DescriberConfig {
    DescriberConfig::new(
        ConnectionSettings::new(
            "localhost".parse().unwrap(),
            Credentials::new("sa".to_string(), "pw".to_string()),
        ),
        database,
        output,
    )
}

fn connector(catalog: DatabaseCatalog) -> FakeConnector {
    FakeConnector {
        server: FakeServer {
            catalogs: vec![catalog],
            fail_on: HashSet::new(),
        },
    }
}

/// All files below `root`, keyed by relative path.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, String> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, String>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                out.insert(rel, std::fs::read_to_string(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_describe_sales_end_to_end() {
    let out = tempfile::tempdir().unwrap();
    let report = DatabaseDescriber::new(config("sales", out.path()))
        .execute(&connector(sales_catalog()))
        .await
        .unwrap();

    assert_eq!(report.outcome, DescribeOutcome::Success);
    assert_eq!(report.matched.as_deref(), Some("Sales"));
    assert_eq!(report.categories.len(), 8);

    let db_dir = out.path().join("sales");
    assert_eq!(
        entries(&db_dir),
        [
            "DatabaseTriggers",
            "StoredProcedures",
            "TableIndexes",
            "TableTriggers",
            "Tables",
            "UserDefinedFunctions",
            "UserDefinedTableType",
            "Views",
        ]
    );
    assert_eq!(
        std::fs::read_to_string(db_dir.join("Tables").join("Orders.sql")).unwrap(),
        "USE [Sales]\nGO\nCREATE TABLE [dbo].[Orders]\nGO\n"
    );
    assert_eq!(
        std::fs::read_to_string(db_dir.join("Views").join("OrderSummary.sql")).unwrap(),
        "USE [Sales]\nGO\nCREATE VIEW [dbo].[OrderSummary]\nGO\n"
    );
    assert_eq!(entries(&db_dir.join("TableIndexes")), ["PK_Orders.sql"]);

    for empty in [
        "StoredProcedures",
        "UserDefinedFunctions",
        "UserDefinedTableType",
        "TableTriggers",
        "DatabaseTriggers",
    ] {
        assert!(entries(&db_dir.join(empty)).is_empty(), "{} should be empty", empty);
    }
}

#[tokio::test]
async fn test_describe_twice_is_idempotent() {
    let out = tempfile::tempdir().unwrap();
    let describer = DatabaseDescriber::new(config("sales", out.path()));
    let connector = connector(sales_catalog());

    describer.execute(&connector).await.unwrap();
    let first = snapshot(out.path());
    describer.execute(&connector).await.unwrap();
    let second = snapshot(out.path());

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_describe_respects_allow_list() {
    let mut catalog = sales_catalog();
    let mut events = TableEntry::new(CatalogEntry::new(Some("audit"), "Events", 301));
    events.indexes.push(IndexEntry {
        name: "IX_Events_At".to_string(),
        index_id: 2,
    });
    events
        .triggers
        .push(CatalogEntry::new(Some("audit"), "trg_Events", 302));
    catalog.tables.push(events);
    catalog
        .procedures
        .push(CatalogEntry::new(Some("audit"), "usp_Purge", 303));
    catalog
        .functions
        .push(CatalogEntry::new(Some("report"), "fn_Daily", 304));
    catalog
        .table_types
        .push(CatalogEntry::new(Some("audit"), "EventRows", 305));

    let out = tempfile::tempdir().unwrap();
    DatabaseDescriber::new(config("sales", out.path()))
        .execute(&connector(catalog.clone()))
        .await
        .unwrap();

    let db_dir = out.path().join("sales");
    assert_eq!(entries(&db_dir.join("Tables")), ["Orders.sql"]);
    assert!(entries(&db_dir.join("TableTriggers")).is_empty());
    assert!(entries(&db_dir.join("StoredProcedures")).is_empty());
    assert!(entries(&db_dir.join("UserDefinedFunctions")).is_empty());
    assert!(entries(&db_dir.join("UserDefinedTableType")).is_empty());
    // Indexes are collected for every table
    assert_eq!(
        entries(&db_dir.join("TableIndexes")),
        ["IX_Events_At.sql", "PK_Orders.sql"]
    );

    let wide = tempfile::tempdir().unwrap();
    DatabaseDescriber::new(
        config("sales", wide.path()).with_allow_list(SchemaAllowList::new(["dbo", "audit"])),
    )
    .execute(&connector(catalog))
    .await
    .unwrap();
    let db_dir = wide.path().join("sales");
    assert_eq!(entries(&db_dir.join("Tables")), ["Events.sql", "Orders.sql"]);
    assert_eq!(entries(&db_dir.join("TableTriggers")), ["trg_Events.sql"]);
    assert_eq!(entries(&db_dir.join("StoredProcedures")), ["usp_Purge.sql"]);
    assert!(entries(&db_dir.join("UserDefinedFunctions")).is_empty());
}

#[tokio::test]
async fn test_describe_missing_database() {
    let out = tempfile::tempdir().unwrap();
    let target = out.path().join("exports");

    let report = DatabaseDescriber::new(config("hr", &target))
        .execute(&connector(sales_catalog()))
        .await
        .unwrap();
    assert_eq!(report.outcome, DescribeOutcome::DatabaseNotFound);
    assert!(report.matched.is_none());
    assert!(!target.exists());

    let report = DatabaseDescriber::new(
        config("hr", &target).with_missing_database(MissingDatabasePolicy::Ignore),
    )
    .execute(&connector(sales_catalog()))
    .await
    .unwrap();
    assert_eq!(report.outcome, DescribeOutcome::DatabaseIgnored);
    assert!(!target.exists());
}

#[tokio::test]
async fn test_describe_matches_database_case_insensitively() {
    let out = tempfile::tempdir().unwrap();
    let report = DatabaseDescriber::new(config("SALES", out.path()))
        .execute(&connector(sales_catalog()))
        .await
        .unwrap();

    assert_eq!(report.matched.as_deref(), Some("Sales"));
    assert!(out.path().join("sales").join("Tables").join("Orders.sql").exists());
}

#[tokio::test]
async fn test_describe_clears_stale_files() {
    let out = tempfile::tempdir().unwrap();
    let db_dir = out.path().join("sales");
    std::fs::create_dir_all(db_dir.join("Tables")).unwrap();
    std::fs::create_dir_all(db_dir.join("StoredProcedures")).unwrap();
    std::fs::write(db_dir.join("leftover.sql"), "old").unwrap();
    std::fs::write(db_dir.join("Tables").join("Dropped.sql"), "old").unwrap();
    std::fs::write(db_dir.join("StoredProcedures").join("usp_Gone.sql"), "old").unwrap();
    std::fs::write(db_dir.join("Tables").join("README.txt"), "keep").unwrap();

    DatabaseDescriber::new(config("sales", out.path()))
        .execute(&connector(sales_catalog()))
        .await
        .unwrap();

    assert!(!db_dir.join("leftover.sql").exists());
    assert_eq!(entries(&db_dir.join("Tables")), ["Orders.sql", "README.txt"]);
    assert!(entries(&db_dir.join("StoredProcedures")).is_empty());
}

fn catalog_with_views(names: &[&str]) -> DatabaseCatalog {
    DatabaseCatalog {
        name: "sales".to_string(),
        views: names
            .iter()
            .enumerate()
            .map(|(i, n)| CatalogEntry::new(Some("dbo"), *n, 400 + i32::try_from(i).unwrap()))
            .collect(),
        procedures: vec![CatalogEntry::new(Some("dbo"), "usp_After", 500)],
        ..DatabaseCatalog::default()
    }
}

#[tokio::test]
async fn test_describe_abort_policy_stops_category() {
    let mut connector = connector(catalog_with_views(&["v1", "v2", "v3"]));
    connector.server.fail_on.insert("v2".to_string());

    let out = tempfile::tempdir().unwrap();
    let report = DatabaseDescriber::new(
        config("sales", out.path()).with_failure_policy(FailurePolicy::AbortBucket),
    )
    .execute(&connector)
    .await
    .unwrap();

    assert_eq!(report.outcome, DescribeOutcome::PartialFailure);
    let db_dir = out.path().join("sales");
    assert_eq!(entries(&db_dir.join("Views")), ["v1.sql"]);
    // Later categories still run
    assert_eq!(entries(&db_dir.join("StoredProcedures")), ["usp_After.sql"]);

    let views = report
        .categories
        .iter()
        .find(|c| c.directory.ends_with("Views"))
        .unwrap();
    assert_eq!(views.failures.len(), 1);
    assert_eq!(views.skipped, ["dbo.v3"]);
}

#[tokio::test]
async fn test_describe_continue_policy_isolates_failures() {
    let mut connector = connector(catalog_with_views(&["v1", "v2", "v3"]));
    connector.server.fail_on.insert("v2".to_string());

    let out = tempfile::tempdir().unwrap();
    let report = DatabaseDescriber::new(config("sales", out.path()))
        .execute(&connector)
        .await
        .unwrap();

    assert_eq!(report.outcome, DescribeOutcome::PartialFailure);
    assert_eq!(report.failure_count(), 1);
    assert_eq!(
        entries(&out.path().join("sales").join("Views")),
        ["v1.sql", "v3.sql"]
    );
}

#[tokio::test]
async fn test_describe_writes_json_report() {
    let out = tempfile::tempdir().unwrap();
    let report = DatabaseDescriber::new(config("sales", out.path()))
        .execute(&connector(sales_catalog()))
        .await
        .unwrap();

    let report_path = out.path().join("report.json");
    report.write_json(&report_path).await.unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(json["outcome"], "Success");
    assert_eq!(json["matched"], "Sales");
    assert_eq!(json["categories"].as_array().unwrap().len(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_describe_connect_timeout() {
    let out = tempfile::tempdir().unwrap();
    let mut config = config("sales", out.path());
    config.connection = config.connection.with_connect_timeout(Duration::from_secs(5));

    let err = DatabaseDescriber::new(config)
        .execute(&SlowConnector)
        .await
        .unwrap_err();
    assert!(matches!(err, ScripterError::Timeout { seconds: 5 }));
}

#[tokio::test]
async fn test_describe_connection_failure_is_error() {
    let out = tempfile::tempdir().unwrap();
    let err = DatabaseDescriber::new(config("sales", out.path()))
        .execute(&RefusingConnector)
        .await
        .unwrap_err();

    assert!(matches!(err, ScripterError::Connection { .. }));
    assert!(!err.chain().contains("pw"));
}
