// # UDP DNS Resolver
//
// This crate resolves the dynamic DNS hostname against one configured
// upstream server over plain UDP.
//
// ## Behaviour
//
// - One query per `resolve` call, no retries and no caching
// - The query name is made fully qualified
// - The whole exchange (bind, send, receive) is bounded by one timeout
// - Replies with a foreign message id are discarded while waiting
//
// Pacing and backoff belong to the poller in `spectrum-ddns-core`.

pub mod message;
pub mod server;

pub use message::{build_query, extract_answer, fully_qualified, parse_reply};
pub use server::{DEFAULT_DNS_PORT, ServerAddress};

use async_trait::async_trait;
use spectrum_ddns_core::config::{AnswerSelection, ResolverConfig};
use spectrum_ddns_core::{AddressObservation, Error, HostResolver, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, trace};

/// Default per-query timeout
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest reply accepted
const MAX_UDP_REPLY_SIZE: usize = 4096;

/// Resolver querying one upstream DNS server over UDP
#[derive(Debug, Clone)]
pub struct DnsResolver {
    server: ServerAddress,
    timeout: Duration,
    selection: AnswerSelection,
}

impl DnsResolver {
    /// Create a resolver for `server` with default settings
    pub fn new(server: ServerAddress) -> Self {
        Self {
            server,
            timeout: DEFAULT_QUERY_TIMEOUT,
            selection: AnswerSelection::default(),
        }
    }

    /// Create a resolver from configuration
    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        config.validate()?;
        let server = config.dns_server.parse::<ServerAddress>()?;

        Ok(Self::new(server)
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_selection(config.answer_selection))
    }

    /// Override the per-query timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Choose which A record wins when several are returned
    pub fn with_selection(mut self, selection: AnswerSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn server(&self) -> &ServerAddress {
        &self.server
    }

    /// Send `query` and wait for the reply carrying `id`
    async fn exchange(&self, hostname: &str, id: u16, query: &[u8]) -> Result<Vec<u8>> {
        let fail = |what: &str, e: std::io::Error| {
            Error::lookup_failed(hostname, format!("{} ({}): {}", what, self.server, e))
        };

        let server = self
            .server
            .socket_addr()
            .await
            .map_err(|e| fail("cannot resolve DNS server", e))?;

        let bind_addr = if server.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| fail("failed to bind UDP socket", e))?;
        socket
            .connect(server)
            .await
            .map_err(|e| fail("failed to connect UDP socket", e))?;
        socket
            .send(query)
            .await
            .map_err(|e| fail("failed to send query", e))?;

        trace!(hostname, server = %server, id, bytes = query.len(), "Query sent");

        let mut buf = vec![0u8; MAX_UDP_REPLY_SIZE];
        loop {
            let len = socket
                .recv(&mut buf)
                .await
                .map_err(|e| fail("failed to receive reply", e))?;

            match message::reply_id(&buf[..len]) {
                Some(reply) if reply == id => {
                    buf.truncate(len);
                    return Ok(buf);
                }
                other => {
                    debug!(hostname, expected = id, received = ?other, "Discarding reply with foreign id");
                }
            }
        }
    }
}

#[async_trait]
impl HostResolver for DnsResolver {
    async fn resolve(&self, hostname: &str) -> Result<AddressObservation> {
        if hostname.trim().is_empty() {
            return Err(Error::lookup_failed(hostname, "empty hostname"));
        }

        let (id, query) = build_query(hostname)?;

        let reply = tokio::time::timeout(self.timeout, self.exchange(hostname, id, &query))
            .await
            .map_err(|_| {
                Error::lookup_failed(
                    hostname,
                    format!("no reply from {} within {:?}", self.server, self.timeout),
                )
            })??;

        let message = parse_reply(hostname, &reply)?;
        extract_answer(hostname, &message, self.selection)
    }

    fn resolver_name(&self) -> &'static str {
        "udp-dns"
    }
}
