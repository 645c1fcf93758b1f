// # Host Resolver Trait
//
// Defines the interface for turning the dynamic DNS hostname into an address.
//
// ## Implementations
//
// - UDP DNS against a configured upstream: `spectrum-ddns-dns` crate
//
// ## Usage
//
// ```rust,ignore
// use spectrum_ddns_core::HostResolver;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let resolver = /* HostResolver implementation */;
//
//     let observation = resolver.resolve("home.example.net").await?;
//     println!("{} (ttl {}s)", observation.ip, observation.ttl);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;

/// An address together with the TTL it was advertised with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressObservation {
    /// The resolved address
    pub ip: IpAddr,
    /// Time-to-live of the answer record, in seconds
    pub ttl: u32,
}

impl AddressObservation {
    pub fn new(ip: IpAddr, ttl: u32) -> Self {
        Self { ip, ttl }
    }

    /// TTL as a wait duration
    pub fn ttl_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.ttl))
    }
}

/// Trait for hostname resolver implementations
///
/// A resolver performs exactly one lookup per call and keeps no state between
/// calls. It must not retry or back off on its own; the
/// [`IpPoller`](crate::poller::IpPoller) owns the pacing.
///
/// # Errors
///
/// Implementations distinguish two failures so callers can tell them apart:
/// - [`Error::LookupFailed`](crate::Error::LookupFailed): the query could not be completed
/// - [`Error::NoRecordsFound`](crate::Error::NoRecordsFound): the answer held no usable record
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolve `hostname` to its current address and TTL
    async fn resolve(&self, hostname: &str) -> Result<AddressObservation, crate::Error>;

    /// Resolver name (for logging/debugging)
    fn resolver_name(&self) -> &'static str {
        "dns"
    }
}
