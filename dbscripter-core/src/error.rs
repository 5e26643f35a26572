//! Error types for catalog collection and script export.
//!
//! Error messages carry server names, object names and file paths, but
//! never credentials. Passwords only live inside
//! [`crate::security::Credentials`].

use thiserror::Error;

/// Main error type for dbscripter operations.
#[derive(Debug, Error)]
pub enum ScripterError {
    /// Server connection or login failed (credentials sanitized)
    #[error("Database connection failed: {context}")]
    Connection {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A catalog enumeration query failed
    #[error("Catalog query failed: {context}")]
    Catalog {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Rendering the script for one object failed
    #[error("Scripting {object} failed: {message}")]
    Scripting { object: String, message: String },

    /// Configuration or validation error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The scripting engine cannot render this kind of object
    #[error("Unsupported object: {object} ({reason})")]
    UnsupportedObject { object: String, reason: String },

    /// Connect step exceeded its deadline
    #[error("Connection timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// I/O operation failed
    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization failed
    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results with ScripterError
pub type Result<T> = std::result::Result<T, ScripterError>;

impl ScripterError {
    /// Creates a connection error with sanitized context
    pub fn connection_failed<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connection {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates a catalog query error with context
    pub fn catalog_failed<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Catalog {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates a scripting error for a single object
    pub fn scripting(object: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Scripting {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an unsupported object error
    pub fn unsupported_object(object: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedObject {
            object: object.into(),
            reason: reason.into(),
        }
    }

    /// Wraps an I/O error with the path or operation it concerns
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Renders the error and all of its sources on one line.
    ///
    /// Used when logging per-object failures, where the source chain
    /// (driver message, server error number) is the useful part.
    pub fn chain(&self) -> String {
        let mut rendered = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            rendered.push_str(": ");
            rendered.push_str(&cause.to_string());
            source = cause.source();
        }
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = ScripterError::configuration("Invalid server address");
        assert!(error.to_string().contains("Invalid server address"));

        let error = ScripterError::scripting("[dbo].[Orders]", "definition not available");
        assert_eq!(
            error.to_string(),
            "Scripting [dbo].[Orders] failed: definition not available"
        );

        let error = ScripterError::unsupported_object("IX_Geo", "SPATIAL index");
        assert!(error.to_string().contains("SPATIAL index"));
    }

    #[test]
    fn test_error_chain_includes_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = ScripterError::io("Failed to create out/sales", io);

        let chain = error.chain();
        assert!(chain.starts_with("I/O operation failed: Failed to create out/sales"));
        assert!(chain.ends_with("access denied"));
    }

    #[test]
    fn test_timeout_message() {
        let error = ScripterError::Timeout { seconds: 30 };
        assert_eq!(error.to_string(), "Connection timed out after 30s");
    }
}
