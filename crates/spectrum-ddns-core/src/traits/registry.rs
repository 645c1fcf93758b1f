// # Spectrum Registry Trait
//
// Defines the interface to the remote registry of Spectrum applications.
//
// ## Implementations
//
// - Cloudflare API v4: `spectrum-ddns-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use spectrum_ddns_core::SpectrumRegistry;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let registry = /* SpectrumRegistry implementation */;
//
//     for app in registry.list_apps("zone-id").await? {
//         println!("{} -> {:?}", app.dns.name, app.origin_direct);
//     }
//
//     Ok(())
// }
// ```

use crate::protocol::{OriginAddress, SpectrumProtocol};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::IpAddr;

/// DNS record type used for newly created applications
pub const APPLICATION_DNS_TYPE: &str = "CNAME";

/// DNS block of a Spectrum application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectrumDns {
    /// Record type (`CNAME` or `ADDRESS`)
    #[serde(rename = "type", default)]
    pub record_type: String,
    /// Name the application answers on
    #[serde(default)]
    pub name: String,
}

/// A Spectrum application as held by the registry
///
/// Fields the core does not interpret are kept in `extra`, so an update
/// built from a fetched application sends them back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectrumApplication {
    /// Registry-assigned identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Edge protocol, e.g. `tcp/22`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    /// DNS match block
    #[serde(default)]
    pub dns: SpectrumDns,

    /// Origin addresses traffic is forwarded to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub origin_direct: Vec<String>,

    /// Creation timestamp (assigned by the registry)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<DateTime<Utc>>,

    /// Last modification timestamp (assigned by the registry)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_on: Option<DateTime<Utc>>,

    /// Any further fields returned by the registry
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SpectrumApplication {
    /// Build a new application for `domain` pointing at `ip`
    pub fn new_for(protocol: SpectrumProtocol, domain: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            protocol: Some(protocol.edge_protocol()),
            dns: SpectrumDns {
                record_type: APPLICATION_DNS_TYPE.to_string(),
                name: domain.into(),
            },
            origin_direct: vec![protocol.origin(ip).to_string()],
            ..Self::default()
        }
    }

    /// True when the application has exactly one origin and it equals `origin`
    pub fn has_sole_origin(&self, origin: &OriginAddress) -> bool {
        match self.origin_direct.as_slice() {
            [only] => *only == origin.to_string(),
            _ => false,
        }
    }

    /// Update payload replacing the origins with `origin`
    ///
    /// Identifier and timestamps are cleared so the registry assigns fresh ones.
    pub fn with_sole_origin(&self, origin: &OriginAddress) -> Self {
        Self {
            id: None,
            created_on: None,
            modified_on: None,
            origin_direct: vec![origin.to_string()],
            ..self.clone()
        }
    }
}

/// Trait for Spectrum application registries
///
/// Registries are single-shot: one remote call per method, no retries, no
/// caching beyond a single call. Reconciliation policy lives in
/// [`SpectrumReconciler`](crate::reconciler::SpectrumReconciler).
#[async_trait]
pub trait SpectrumRegistry: Send + Sync {
    /// List every application in the zone
    async fn list_apps(&self, zone_id: &str) -> Result<Vec<SpectrumApplication>, crate::Error>;

    /// Create an application in the zone
    async fn create_app(
        &self,
        zone_id: &str,
        app: &SpectrumApplication,
    ) -> Result<SpectrumApplication, crate::Error>;

    /// Replace the application identified by `app_id`
    async fn update_app(
        &self,
        zone_id: &str,
        app_id: &str,
        app: &SpectrumApplication,
    ) -> Result<SpectrumApplication, crate::Error>;

    /// Registry name (for logging/debugging)
    fn registry_name(&self) -> &'static str;
}
