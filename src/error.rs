//! Error types for the wtinylfu library.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: Returned when container configuration parameters are
//!   invalid (e.g. out-of-range tiny segment percentage).
//! - [`InvariantError`]: Returned when internal data-structure invariants are
//!   violated (`check_invariants` methods).
//! - [`RestoreError`]: Returned when a saved container state cannot be
//!   restored (e.g. an entry key the resolver no longer knows).
//!
//! Ordinary operational failures are not errors: `add` on an entry that is
//! already linked, `remove` on one that is not, and a failed try-lock update
//! all report `false` from the corresponding container method.
//!
//! ## Example Usage
//!
//! ```
//! use wtinylfu::{Config, ConfigError};
//!
//! // Fallible validation for user-configurable parameters
//! let ok = Config::default().validate();
//! assert!(ok.is_ok());
//!
//! // Invalid percentage is caught without panicking
//! let bad = Config {
//!     tiny_size_percent: 75,
//!     ..Config::default()
//! };
//! let err: ConfigError = bad.validate().unwrap_err();
//! assert!(err.to_string().contains("tiny_size_percent"));
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when container configuration parameters are invalid.
///
/// Produced by [`Config::validate`](crate::Config::validate) and the fallible
/// container constructors. The message names the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal container invariants are violated.
///
/// Produced by `check_invariants` methods on the container and its data
/// structures. Carries a human-readable description of which invariant
/// failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// RestoreError
// ---------------------------------------------------------------------------

/// Error returned when restoring a container from a saved state fails.
///
/// Produced by [`Container::restore`](crate::Container::restore) when the
/// snapshot's configuration is invalid or when the entry resolver cannot
/// produce an entry for a recorded key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreError(String);

impl RestoreError {
    /// Creates a new `RestoreError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RestoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for RestoreError {}

impl From<ConfigError> for RestoreError {
    fn from(err: ConfigError) -> Self {
        RestoreError::new(format!("saved config is invalid: {err}"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
