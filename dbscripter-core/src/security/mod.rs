//! Credential handling.
//!
//! The password is needed exactly once, for the TDS login. It is kept in a
//! zeroizing container and redacted from every `Debug` rendering of the
//! configuration that carries it.

mod credentials;

pub use credentials::Credentials;
