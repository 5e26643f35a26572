//! Configuration types for a describe run.
//!
//! - `connection`: server address parsing and [`ConnectionSettings`]
//! - `scripting`: the immutable [`ScriptingOptions`] value
//! - `describer`: [`DescriberConfig`] and the run policies

mod connection;
mod describer;
mod scripting;

pub use connection::{ConnectionSettings, DEFAULT_PORT, ServerAddress};
pub use describer::{
    DEFAULT_SCHEMA, DescriberConfig, FailurePolicy, MissingDatabasePolicy, SchemaAllowList,
};
pub use scripting::ScriptingOptions;
