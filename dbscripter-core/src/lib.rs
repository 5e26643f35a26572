//! Core library for dbscripter.
//!
//! Exports the schema of one SQL Server database as a tree of `.sql` files,
//! one file per object, grouped into a directory per object category:
//!
//! ```text
//! <output>/<database>/Tables/Orders.sql
//! <output>/<database>/Views/OrderSummary.sql
//! ...
//! ```
//!
//! # Architecture
//! - [`adapters`] defines the collaborator traits a server backend
//!   implements; the SQL Server backend sits behind the `mssql` feature
//! - [`collector`] turns an enumerated catalog into per-category buckets
//! - [`writer`] resets category directories and writes one file per object
//! - [`describer`] runs the whole export and reports what happened
//!
//! # Security Guarantees
//! - Catalog access is read-only
//! - Passwords are held in zeroizing buffers and never logged

pub mod adapters;
pub mod collector;
pub mod config;
pub mod describer;
pub mod error;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod security;
pub mod writer;

// Re-export commonly used types
pub use adapters::{CatalogProvider, ScriptEngine, ServerSession, SessionConnector};
pub use config::{
    ConnectionSettings, DescriberConfig, FailurePolicy, MissingDatabasePolicy, SchemaAllowList,
    ScriptingOptions, ServerAddress,
};
pub use describer::{DatabaseDescriber, DescribeOutcome, DescribeReport, format_elapsed};
pub use error::{Result, ScripterError};
pub use logging::init_logging;
pub use models::{CatalogObject, CategoryBucket, DatabaseCatalog, ObjectCategory, Urn};
pub use security::Credentials;
