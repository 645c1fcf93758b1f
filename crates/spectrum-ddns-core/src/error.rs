//! Error types for the Spectrum DDNS system
//!
//! This module defines all error types used throughout the workspace.
//!
//! Errors fall into three families:
//! - **Configuration**: fatal at startup, never retried
//! - **Resolution**: reported on the poll stream, the poller backs off and retries
//! - **Registry**: returned from reconciliation, wrapping the underlying API failure

use thiserror::Error;

/// Result type alias for Spectrum DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the Spectrum DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// A mandatory configuration value is absent
    #[error("missing required configuration: '{0}'")]
    MissingField(&'static str),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The DNS query itself failed (transport, timeout, malformed reply)
    #[error("DNS lookup for {hostname} failed: {reason}")]
    LookupFailed {
        /// Hostname that was queried
        hostname: String,
        /// Underlying cause
        reason: String,
    },

    /// The DNS reply carried no usable A record
    #[error("no answers returned for {0}")]
    NoRecordsFound(String),

    /// No Spectrum application matches the domain
    ///
    /// Only used inside reconciliation, where it selects the create path.
    #[error("no spectrum application with domain {0}")]
    RecordNotFound(String),

    /// Listing the zone's applications failed
    #[error("looking up spectrum application for {domain} failed")]
    RegistryLookup {
        /// Domain being looked up
        domain: String,
        /// Underlying registry failure
        #[source]
        source: Box<Error>,
    },

    /// Creating an application failed
    #[error("creating spectrum application for {domain} failed")]
    RegistryCreate {
        /// Domain of the application being created
        domain: String,
        /// Underlying registry failure
        #[source]
        source: Box<Error>,
    },

    /// Updating an application failed
    #[error("updating spectrum application {app_id} failed")]
    RegistryUpdate {
        /// Identifier of the application being updated
        app_id: String,
        /// Underlying registry failure
        #[source]
        source: Box<Error>,
    },

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from registry APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Remote object not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a lookup failure for `hostname`
    pub fn lookup_failed(hostname: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LookupFailed {
            hostname: hostname.into(),
            reason: reason.into(),
        }
    }

    /// Create a "no records" error for `hostname`
    pub fn no_records(hostname: impl Into<String>) -> Self {
        Self::NoRecordsFound(hostname.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Wrap a failed listing of applications
    pub fn registry_lookup(domain: impl Into<String>, source: Error) -> Self {
        Self::RegistryLookup {
            domain: domain.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a failed application creation
    pub fn registry_create(domain: impl Into<String>, source: Error) -> Self {
        Self::RegistryCreate {
            domain: domain.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a failed application update
    pub fn registry_update(app_id: impl Into<String>, source: Error) -> Self {
        Self::RegistryUpdate {
            app_id: app_id.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error came out of hostname resolution
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::LookupFailed { .. } | Self::NoRecordsFound(_))
    }

    /// Whether this error came out of a registry call made during reconciliation
    pub fn is_registry(&self) -> bool {
        matches!(
            self,
            Self::RegistryLookup { .. } | Self::RegistryCreate { .. } | Self::RegistryUpdate { .. }
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
