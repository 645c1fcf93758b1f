//! Application identity and origin address types
//!
//! A Spectrum application is identified by the protocol it proxies and the
//! DNS name it answers on. Each protocol maps to a fixed origin port, so the
//! origin address for a given IP is fully determined by the protocol.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Protocols that can be fronted by a Spectrum application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectrumProtocol {
    /// Secure shell on port 22
    Ssh,
    /// Minecraft Java edition on port 25565
    Minecraft,
}

impl SpectrumProtocol {
    /// Every supported protocol
    pub const ALL: [SpectrumProtocol; 2] = [SpectrumProtocol::Ssh, SpectrumProtocol::Minecraft];

    /// Well-known origin port for this protocol
    pub fn port(self) -> u16 {
        match self {
            SpectrumProtocol::Ssh => 22,
            SpectrumProtocol::Minecraft => 25565,
        }
    }

    /// Transport scheme used in origin addresses
    pub fn scheme(self) -> &'static str {
        "tcp"
    }

    /// Configuration name of the protocol
    pub fn as_str(self) -> &'static str {
        match self {
            SpectrumProtocol::Ssh => "ssh",
            SpectrumProtocol::Minecraft => "minecraft",
        }
    }

    /// Value of the application's `protocol` field, e.g. `tcp/22`
    pub fn edge_protocol(self) -> String {
        format!("{}/{}", self.scheme(), self.port())
    }

    /// Origin address pointing at `ip` on this protocol's port
    pub fn origin(self, ip: IpAddr) -> OriginAddress {
        OriginAddress::new(self.scheme(), ip, self.port())
    }
}

impl fmt::Display for SpectrumProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpectrumProtocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ssh" => Ok(SpectrumProtocol::Ssh),
            "minecraft" => Ok(SpectrumProtocol::Minecraft),
            other => Err(Error::config(format!(
                "unsupported spectrum protocol '{}' (supported: ssh, minecraft)",
                other
            ))),
        }
    }
}

/// The (protocol, domain) pair naming one Spectrum application
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationIdentity {
    /// Proxied protocol
    pub protocol: SpectrumProtocol,
    /// DNS name the application answers on
    pub domain: String,
}

impl ApplicationIdentity {
    pub fn new(protocol: SpectrumProtocol, domain: impl Into<String>) -> Self {
        Self {
            protocol,
            domain: domain.into(),
        }
    }
}

impl fmt::Display for ApplicationIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.protocol, self.domain)
    }
}

/// A `scheme://ip:port` origin, as stored in `origin_direct`
///
/// IPv6 addresses are bracketed so the string can be parsed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OriginAddress {
    scheme: &'static str,
    addr: SocketAddr,
}

impl OriginAddress {
    pub fn new(scheme: &'static str, ip: IpAddr, port: u16) -> Self {
        Self {
            scheme,
            addr: SocketAddr::new(ip, port),
        }
    }

    pub fn scheme(&self) -> &'static str {
        self.scheme
    }

    pub fn ip(&self) -> IpAddr {
        self.addr.ip()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl fmt::Display for OriginAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.addr)
    }
}

impl FromStr for OriginAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| Error::invalid_input(format!("origin '{}' has no scheme", s)))?;

        let scheme = match scheme {
            "tcp" => "tcp",
            "udp" => "udp",
            other => {
                return Err(Error::invalid_input(format!(
                    "origin scheme '{}' is not tcp or udp",
                    other
                )));
            }
        };

        let addr: SocketAddr = rest
            .parse()
            .map_err(|e| Error::invalid_input(format!("origin '{}' is not ip:port: {}", s, e)))?;

        Ok(Self { scheme, addr })
    }
}

impl Serialize for OriginAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OriginAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
