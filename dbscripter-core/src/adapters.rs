//! Collaborator traits for catalog access and script rendering.
//!
//! The describer only talks to a server through these traits:
//! - [`SessionConnector`] opens a session from [`ConnectionSettings`]
//! - [`CatalogProvider`] lists databases and enumerates one database's objects
//! - [`ScriptEngine`] renders the definition statements of one object
//!
//! A [`ServerSession`] is anything that is both a provider and an engine.
//! All traits are object-safe, so sessions travel as `Box<dyn ServerSession>`.

use crate::Result;
use crate::config::{ConnectionSettings, ScriptingOptions};
use crate::models::{DatabaseCatalog, Urn};
use async_trait::async_trait;

/// Enumerates databases and their objects.
#[async_trait]
pub trait CatalogProvider: Send {
    /// Lists database names on the server, in server order.
    ///
    /// # Errors
    /// Returns error if the server catalog cannot be queried
    async fn list_databases(&mut self) -> Result<Vec<String>>;

    /// Enumerates the objects of one database.
    ///
    /// `include_system_objects` controls whether objects shipped with the
    /// server are returned.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or a catalog query fails
    async fn load_catalog(
        &mut self,
        database: &str,
        include_system_objects: bool,
    ) -> Result<DatabaseCatalog>;
}

/// Renders definition scripts for single objects.
#[async_trait]
pub trait ScriptEngine: Send {
    /// Returns the statements that recreate the object, without batch
    /// terminators. Several statements are normal (settings, create, keys).
    ///
    /// # Errors
    /// Returns error if the object cannot be located or rendered
    async fn script_object(&mut self, urn: &Urn, options: &ScriptingOptions)
    -> Result<Vec<String>>;
}

/// A connected session that can both enumerate and script.
pub trait ServerSession: CatalogProvider + ScriptEngine {}

impl<T: CatalogProvider + ScriptEngine> ServerSession for T {}

/// Opens server sessions.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Opens a new session.
    ///
    /// # Errors
    /// Returns error if the server is unreachable, login fails or the
    /// connect deadline passes
    async fn connect(&self, settings: &ConnectionSettings) -> Result<Box<dyn ServerSession>>;

    /// Short description for logs (no credentials).
    fn describe(&self) -> &'static str;
}

#[cfg(feature = "mssql")]
pub mod mssql;
