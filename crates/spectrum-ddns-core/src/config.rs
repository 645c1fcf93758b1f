//! Configuration types for the Spectrum DDNS system
//!
//! This module defines all configuration structures used throughout the crate.
//! The configuration is built once at startup and handed to each component's
//! constructor; nothing reads process-wide state afterwards.

use crate::protocol::{ApplicationIdentity, SpectrumProtocol};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variable names, also used to report missing fields
pub mod env {
    pub const CLOUDFLARE_API_KEY: &str = "CLOUDFLARE_API_KEY";
    pub const CLOUDFLARE_API_EMAIL: &str = "CLOUDFLARE_API_EMAIL";
    pub const CLOUDFLARE_ZONE_NAME: &str = "CLOUDFLARE_ZONE_NAME";
    pub const SPECTRUM_APP_DOMAIN: &str = "SPECTRUM_APP_DOMAIN";
    pub const SPECTRUM_APP_PROTOCOL: &str = "SPECTRUM_APP_PROTOCOL";
    pub const DDNS_HOSTNAME: &str = "DDNS_HOSTNAME";
    pub const DNS_SERVER: &str = "DNS_SERVER";
}

/// Main Spectrum DDNS configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpectrumDdnsConfig {
    /// Cloudflare account and zone
    pub cloudflare: CloudflareConfig,

    /// Spectrum application to keep in sync
    pub app: AppConfig,

    /// Hostname resolution settings
    pub resolver: ResolverConfig,

    /// Poll loop settings
    #[serde(default)]
    pub poller: PollerConfig,

    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Verbose logging
    #[serde(default)]
    pub debug: bool,
}

impl SpectrumDdnsConfig {
    /// Validate the configuration
    ///
    /// Fails with [`Error::MissingField`](crate::Error::MissingField) naming
    /// the first mandatory value that is empty.
    pub fn validate(&self) -> Result<(), crate::Error> {
        let required = [
            (env::CLOUDFLARE_API_KEY, self.cloudflare.api_key.is_empty()),
            (env::CLOUDFLARE_API_EMAIL, self.cloudflare.api_email.is_empty()),
            (env::CLOUDFLARE_ZONE_NAME, self.cloudflare.zone_name.is_empty()),
            (env::SPECTRUM_APP_DOMAIN, self.app.domain.is_empty()),
            (env::SPECTRUM_APP_PROTOCOL, self.app.protocol.is_none()),
            (env::DDNS_HOSTNAME, self.resolver.hostname.is_empty()),
            (env::DNS_SERVER, self.resolver.dns_server.is_empty()),
        ];

        if let Some((name, _)) = required.into_iter().find(|(_, missing)| *missing) {
            return Err(crate::Error::MissingField(name));
        }

        self.resolver.validate()?;
        self.engine.validate()?;

        Ok(())
    }

    /// The application identity, once validated
    pub fn identity(&self) -> Result<ApplicationIdentity, crate::Error> {
        let protocol = self
            .app
            .protocol
            .ok_or(crate::Error::MissingField(env::SPECTRUM_APP_PROTOCOL))?;
        Ok(ApplicationIdentity::new(protocol, self.app.domain.clone()))
    }

    /// Copy of the configuration with credentials masked, safe to log
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.cloudflare.api_key = redact(&copy.cloudflare.api_key);
        copy.cloudflare.api_email = redact(&copy.cloudflare.api_email);
        copy
    }
}

/// Characters of a secret left visible by [`redact`]
const REDACT_VISIBLE_CHARS: usize = 3;

/// Keep the first three characters of a secret
///
/// Secrets no longer than that are masked entirely.
fn redact(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    if secret.chars().count() <= REDACT_VISIBLE_CHARS {
        return "**********".to_string();
    }
    let visible: String = secret.chars().take(REDACT_VISIBLE_CHARS).collect();
    format!("{}**********", visible)
}

/// Cloudflare credentials and zone
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CloudflareConfig {
    /// Global API key
    pub api_key: String,

    /// Account email paired with the API key
    pub api_email: String,

    /// Zone (domain) holding the Spectrum application
    pub zone_name: String,

    /// Perform reads but skip writes
    #[serde(default)]
    pub dry_run: bool,
}

// Credentials never reach Debug output
impl fmt::Debug for CloudflareConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudflareConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_email", &redact(&self.api_email))
            .field("zone_name", &self.zone_name)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// Spectrum application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// DNS name of the application (e.g. "ssh.example.com")
    pub domain: String,

    /// Proxied protocol
    pub protocol: Option<SpectrumProtocol>,
}

/// Which A record wins when an answer holds several
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSelection {
    /// The last A record enumerated
    #[default]
    Last,
    /// The first A record enumerated
    First,
}

/// Hostname resolution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Dynamic DNS hostname to follow
    pub hostname: String,

    /// Upstream DNS server, `host` or `host:port` (port 53 when omitted)
    pub dns_server: String,

    /// Per-query timeout (in seconds)
    #[serde(default = "default_query_timeout_secs")]
    pub timeout_secs: u64,

    /// Answer selection when several A records are returned
    #[serde(default)]
    pub answer_selection: AnswerSelection,
}

impl ResolverConfig {
    pub fn new(hostname: impl Into<String>, dns_server: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            dns_server: dns_server.into(),
            timeout_secs: default_query_timeout_secs(),
            answer_selection: AnswerSelection::default(),
        }
    }

    /// Validate the resolver configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("DNS query timeout must be > 0"));
        }
        Ok(())
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::new(String::new(), String::new())
    }
}

/// Poll loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// TTL assumed before the first successful resolution (in seconds)
    ///
    /// This is the backoff used when the very first lookups fail.
    #[serde(default = "default_initial_ttl_secs")]
    pub initial_ttl_secs: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            initial_ttl_secs: default_initial_ttl_secs(),
        }
    }
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Keep polling after the first successful reconciliation
    #[serde(default)]
    pub polling: bool,

    /// Log resolution failures and keep going instead of stopping
    #[serde(default)]
    pub tolerate_resolution_errors: bool,

    /// Capacity of the monitoring event channel
    ///
    /// When full, new engine events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            polling: false,
            tolerate_resolution_errors: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_query_timeout_secs() -> u64 {
    5
}

fn default_initial_ttl_secs() -> u32 {
    60
}

fn default_event_channel_capacity() -> usize {
    100
}
