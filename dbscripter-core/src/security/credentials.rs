//! SQL login credentials with automatic memory zeroing.
//!
//! # Security
//! - Username and password live in `Zeroizing<String>` containers
//! - Memory is cleared when the credentials go out of scope
//! - `Debug` output never includes the password

use zeroize::{Zeroize, Zeroizing};

/// SQL Server login that zeros its memory on drop.
///
/// # Example
///
/// ```rust
/// use dbscripter_core::security::Credentials;
///
/// let creds = Credentials::new("sa".to_string(), "secret".to_string());
/// assert_eq!(creds.username(), "sa");
/// assert!(!format!("{:?}", creds).contains("secret"));
/// ```
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Credentials {
    username: Zeroizing<String>,
    password: Zeroizing<String>,
}

impl Credentials {
    /// Creates new credentials with automatic memory zeroing.
    pub fn new(username: String, password: String) -> Self {
        Self {
            username: Zeroizing::new(username),
            password: Zeroizing::new(password),
        }
    }

    /// Gets the login name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Exposes the password for the login handshake only.
    ///
    /// Callers must not log or persist the returned value.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Checks if a non-empty password is present without exposing it.
    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username.as_str())
            .field("password", &"****")
            .finish()
    }
}
