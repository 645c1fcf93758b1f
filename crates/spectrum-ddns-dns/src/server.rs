// Upstream DNS server address
//
// Accepts what users put in `DNS_SERVER`: a bare IP, an IP with port, a
// bracketed IPv6 address, or a hostname with or without port.

use spectrum_ddns_core::{Error, Result};
use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Port used when the configured server has none
pub const DEFAULT_DNS_PORT: u16 = 53;

/// Host and port of the upstream DNS server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Socket address to send queries to
    ///
    /// IP literals are used as-is; hostnames go through the system resolver
    /// on every call.
    pub async fn socket_addr(&self) -> io::Result<SocketAddr> {
        if let Ok(ip) = self.host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }

        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("DNS server {} has no address", self.host),
                )
            })
    }
}

impl From<SocketAddr> for ServerAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ServerAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::config(format!("invalid DNS server address '{}'", s));

        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(invalid());
        }

        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(addr.into());
        }

        // Bare IPv4/IPv6, or bracketed IPv6 without port
        let unbracketed = s.strip_prefix('[').and_then(|rest| rest.strip_suffix(']'));
        if let Ok(ip) = unbracketed.unwrap_or(s).parse::<IpAddr>() {
            return Ok(Self::new(ip.to_string(), DEFAULT_DNS_PORT));
        }

        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && !host.contains(':') => {
                let port = port.parse::<u16>().map_err(|_| invalid())?;
                Ok(Self::new(host, port))
            }
            Some(_) => Err(invalid()),
            None => Ok(Self::new(s, DEFAULT_DNS_PORT)),
        }
    }
}
