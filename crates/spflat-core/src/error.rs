//! Error types for the SPF reconciliation system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the reconciliation system
#[derive(Error, Debug)]
pub enum Error {
    /// No provider zone owns the given name or any of its parent suffixes
    #[error("Can't find a zone for {0}")]
    ZoneNotFound(String),

    /// A `(name, type)` lookup matched more than one record
    #[error("Multiple records found: {count} {record_type} records named {name}")]
    MultipleRecordsFound {
        /// Fully-qualified record name
        name: String,
        /// Record type of the lookup
        record_type: String,
        /// Number of records returned by the provider
        count: usize,
    },

    /// Provider transport or API error (not retried)
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// SPF crawler errors
    #[error("Crawler error: {0}")]
    Crawler(String),

    /// Notification delivery errors
    #[error("Notifier error: {0}")]
    Notifier(String),

    /// State file errors
    #[error("State store error: {0}")]
    StateStore(String),
}

impl Error {
    /// Create a "zone not found" error
    pub fn zone_not_found(fqdn: impl Into<String>) -> Self {
        Self::ZoneNotFound(fqdn.into())
    }

    /// Create a "multiple records found" error
    pub fn multiple_records(
        name: impl Into<String>,
        record_type: impl Into<String>,
        count: usize,
    ) -> Self {
        Self::MultipleRecordsFound {
            name: name.into(),
            record_type: record_type.into(),
            count,
        }
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a crawler error
    pub fn crawler(msg: impl Into<String>) -> Self {
        Self::Crawler(msg.into())
    }

    /// Create a notifier error
    pub fn notifier(msg: impl Into<String>) -> Self {
        Self::Notifier(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }
}
