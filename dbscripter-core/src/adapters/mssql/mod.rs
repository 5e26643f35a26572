//! SQL Server backend built on tiberius.
//!
//! One [`SqlServerSession`] wraps one TDS connection and serves as both the
//! catalog provider and the scripting engine. Catalog enumeration lives in
//! `catalog`, per-object metadata loading in `scripting`, and the DDL text
//! itself in [`render`].
//!
//! # Security
//! - Only `SELECT` queries against catalog views and `USE` are issued
//! - The password is handed to tiberius at connect time and never logged

mod catalog;
pub mod render;
mod scripting;

use crate::Result;
use crate::adapters::{ServerSession, SessionConnector};
use crate::config::ConnectionSettings;
use crate::error::ScripterError;
use async_trait::async_trait;
use render::quote_ident;
use tiberius::{AuthMethod, Client, Config, Row, SqlBrowser, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

type TdsClient = Client<Compat<TcpStream>>;

/// Builds the tiberius configuration for a connection.
pub fn build_config(settings: &ConnectionSettings) -> Config {
    let mut config = Config::new();
    config.host(&settings.server.host);
    match &settings.server.instance {
        // The SQL Browser supplies the port unless one is given
        Some(instance) => {
            config.instance_name(instance);
            if let Some(port) = settings.server.port {
                config.port(port);
            }
        }
        None => config.port(settings.server.effective_port()),
    }
    config.authentication(AuthMethod::sql_server(
        settings.credentials.username(),
        settings.credentials.password(),
    ));
    config.application_name(&settings.application_name);
    if settings.trust_server_certificate {
        config.trust_cert();
    }
    config
}

/// Opens [`SqlServerSession`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerConnector;

impl SqlServerConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionConnector for SqlServerConnector {
    async fn connect(&self, settings: &ConnectionSettings) -> Result<Box<dyn ServerSession>> {
        let session = SqlServerSession::connect(settings).await?;
        Ok(Box::new(session))
    }

    fn describe(&self) -> &'static str {
        "tiberius (TDS)"
    }
}

/// A logged-in connection to one server.
pub struct SqlServerSession {
    client: TdsClient,
    current_database: Option<String>,
}

impl std::fmt::Debug for SqlServerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlServerSession")
            .field("current_database", &self.current_database)
            .finish_non_exhaustive()
    }
}

impl SqlServerSession {
    /// Connects and logs in.
    ///
    /// Named instances without an explicit port are resolved through the
    /// SQL Browser service. A routing answer from the server (Azure SQL
    /// gateways) is followed once.
    ///
    /// # Errors
    /// Returns error if the TCP connection or the login fails
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self> {
        let config = build_config(settings);
        let target = settings.server.to_string();

        let tcp = if settings.server.instance.is_some() && settings.server.port.is_none() {
            TcpStream::connect_named(&config).await.map_err(|e| {
                ScripterError::connection_failed(format!("SQL Browser lookup for {} failed", target), e)
            })?
        } else {
            TcpStream::connect(config.get_addr()).await.map_err(|e| {
                ScripterError::connection_failed(format!("Failed to reach {}", target), e)
            })?
        };
        tcp.set_nodelay(true)
            .map_err(|e| ScripterError::connection_failed(format!("Failed to configure socket for {}", target), e))?;

        let client = match Client::connect(config.clone(), tcp.compat_write()).await {
            Ok(client) => client,
            Err(tiberius::error::Error::Routing { host, port }) => {
                tracing::debug!("Server redirected login to {}:{}", host, port);
                let mut routed = config;
                routed.host(&host);
                routed.port(port);
                let tcp = TcpStream::connect(routed.get_addr()).await.map_err(|e| {
                    ScripterError::connection_failed(format!("Failed to reach {}:{}", host, port), e)
                })?;
                tcp.set_nodelay(true).map_err(|e| {
                    ScripterError::connection_failed(format!("Failed to configure socket for {}", host), e)
                })?;
                Client::connect(routed, tcp.compat_write()).await.map_err(|e| {
                    ScripterError::connection_failed(format!("Login to {}:{} failed", host, port), e)
                })?
            }
            Err(e) => {
                return Err(ScripterError::connection_failed(
                    format!("Login to {} failed", target),
                    e,
                ));
            }
        };

        tracing::info!("Connected to {}", target);
        Ok(Self {
            client,
            current_database: None,
        })
    }

    /// Switches the session's database context unless it is already there.
    async fn use_database(&mut self, database: &str) -> Result<()> {
        if self.current_database.as_deref() == Some(database) {
            return Ok(());
        }
        let sql = format!("USE {}", quote_ident(database));
        self.client
            .simple_query(sql)
            .await
            .map_err(|e| ScripterError::catalog_failed(format!("Failed to open database {}", database), e))?
            .into_results()
            .await
            .map_err(|e| ScripterError::catalog_failed(format!("Failed to open database {}", database), e))?;
        self.current_database = Some(database.to_string());
        Ok(())
    }

    /// Runs a parameterized query and returns the rows of its first result.
    async fn fetch(&mut self, sql: &str, params: &[&dyn ToSql], context: &str) -> Result<Vec<Row>> {
        let stream = self
            .client
            .query(sql, params)
            .await
            .map_err(|e| ScripterError::catalog_failed(context, e))?;
        stream
            .into_first_result()
            .await
            .map_err(|e| ScripterError::catalog_failed(context, e))
    }
}

fn unexpected_null(context: &str, column: usize) -> ScripterError {
    ScripterError::Catalog {
        context: context.to_string(),
        source: format!("unexpected NULL in column {}", column).into(),
    }
}

pub(crate) fn get_str(row: &Row, idx: usize, context: &str) -> Result<String> {
    get_opt_str(row, idx, context)?.ok_or_else(|| unexpected_null(context, idx))
}

pub(crate) fn get_opt_str(row: &Row, idx: usize, context: &str) -> Result<Option<String>> {
    row.try_get::<&str, _>(idx)
        .map(|v| v.map(str::to_string))
        .map_err(|e| ScripterError::catalog_failed(context, e))
}

pub(crate) fn get_i32(row: &Row, idx: usize, context: &str) -> Result<i32> {
    row.try_get::<i32, _>(idx)
        .map_err(|e| ScripterError::catalog_failed(context, e))?
        .ok_or_else(|| unexpected_null(context, idx))
}

pub(crate) fn get_bool(row: &Row, idx: usize, context: &str) -> Result<bool> {
    Ok(get_opt_bool(row, idx, context)?.unwrap_or(false))
}

pub(crate) fn get_opt_bool(row: &Row, idx: usize, context: &str) -> Result<Option<bool>> {
    row.try_get::<bool, _>(idx)
        .map_err(|e| ScripterError::catalog_failed(context, e))
}
