//! Server address parsing and connection settings.

use crate::security::Credentials;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default SQL Server TCP port.
pub const DEFAULT_PORT: u16 = 1433;

/// Where to reach the server.
///
/// Accepts the formats SQL Server tooling uses on the command line:
/// `host`, `host,port` and `host\instance`.
///
/// # Example
/// ```rust
/// use dbscripter_core::config::ServerAddress;
///
/// let addr: ServerAddress = "127.0.0.1,1443".parse().unwrap();
/// assert_eq!(addr.host, "127.0.0.1");
/// assert_eq!(addr.port, Some(1443));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAddress {
    pub host: String,
    pub port: Option<u16>,
    /// Named instance, resolved through the SQL Browser service
    pub instance: Option<String>,
}

impl ServerAddress {
    /// Port to connect to when no named instance is involved.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

impl std::str::FromStr for ServerAddress {
    type Err = crate::error::ScripterError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let raw = raw.strip_prefix("tcp:").unwrap_or(raw);

        let (host_part, port) = match raw.split_once(',') {
            Some((host, port)) => {
                let port = port.trim().parse::<u16>().map_err(|_| {
                    crate::error::ScripterError::configuration(format!(
                        "invalid port '{}' in server address",
                        port.trim()
                    ))
                })?;
                (host.trim(), Some(port))
            }
            None => (raw, None),
        };

        let (host, instance) = match host_part.split_once('\\') {
            Some((host, instance)) if !instance.is_empty() => (host, Some(instance.to_string())),
            Some((host, _)) => (host, None),
            None => (host_part, None),
        };

        let host = match host {
            "." | "(local)" => "localhost",
            other => other,
        };

        if host.is_empty() {
            return Err(crate::error::ScripterError::configuration(
                "server address has no host",
            ));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            instance,
        })
    }
}

impl std::fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.host)?;
        if let Some(instance) = &self.instance {
            write!(f, "\\{}", instance)?;
        }
        if let Some(port) = self.port {
            write!(f, ",{}", port)?;
        }
        Ok(())
    }
}

/// Everything needed to open a server session.
///
/// # Security
/// The password is only reachable through [`Credentials::password`];
/// `Debug` and `Display` never include it.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub server: ServerAddress,
    pub credentials: Credentials,
    /// Accept the server certificate without validation
    pub trust_server_certificate: bool,
    /// Deadline for TCP connect plus login
    pub connect_timeout: Duration,
    pub application_name: String,
}

impl ConnectionSettings {
    pub fn new(server: ServerAddress, credentials: Credentials) -> Self {
        Self {
            server,
            credentials,
            trust_server_certificate: false,
            connect_timeout: Duration::from_secs(30),
            application_name: "dbscripter".to_string(),
        }
    }

    pub fn with_trust_server_certificate(mut self, trust: bool) -> Self {
        self.trust_server_certificate = trust;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Validates connection settings.
    ///
    /// # Errors
    /// Returns error if the host, port, login, password or timeout is unusable
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.host.is_empty() {
            return Err(crate::error::ScripterError::configuration(
                "host cannot be empty",
            ));
        }

        if self.server.port == Some(0) {
            return Err(crate::error::ScripterError::configuration(
                "port must be greater than 0",
            ));
        }

        if self.credentials.username().is_empty() {
            return Err(crate::error::ScripterError::configuration(
                "username cannot be empty",
            ));
        }

        if !self.credentials.has_password() {
            return Err(crate::error::ScripterError::configuration(
                "password cannot be empty",
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(crate::error::ScripterError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl std::fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Login name and password never appear here
        write!(f, "sqlserver://{}", self.server)
    }
}
