//! TTL-paced hostname poller
//!
//! The [`IpPoller`] turns repeated point-in-time lookups into an ordered
//! stream of [`PollEvent`]s. It paces itself off the TTL of the answers it
//! receives and, when a lookup fails, waits the last known TTL before trying
//! again.
//!
//! ## State Machine
//!
//! ```text
//!            ┌──────────── success: ttl := answer.ttl ───────────┐
//!            │                                                   ▼
//!      ┌───────────┐                                       ┌───────────┐
//! ───► │ Resolving │ ── failure: ttl unchanged ──────────► │  Waiting  │
//!      └───────────┘                                       └───────────┘
//!            ▲                                                   │
//!            └──────────────────── after ttl ────────────────────┘
//!
//!      cancellation at any suspension point ──► Terminated (stream ends)
//! ```
//!
//! ## Backpressure
//!
//! Each iteration reserves the single channel slot before resolving. The slot
//! frees up only when the consumer takes the previous event, so the loop cannot
//! start the next resolution until the current event has been delivered. A
//! busy consumer therefore never receives a stale observation.

use crate::config::PollerConfig;
use crate::error::Error;
use crate::traits::{AddressObservation, HostResolver};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// TTL assumed until the first successful resolution
pub const DEFAULT_INITIAL_TTL_SECS: u32 = 60;

/// One outcome of a poll iteration
#[derive(Debug)]
pub enum PollEvent {
    /// The hostname resolved
    Observed(AddressObservation),
    /// The lookup failed; the poller is backing off
    Failed(Error),
}

/// Adaptive timing state of one poll loop
///
/// Owned by the poll task alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollState {
    last_known_ttl: u32,
}

impl PollState {
    pub fn new(initial_ttl_secs: u32) -> Self {
        Self {
            last_known_ttl: initial_ttl_secs,
        }
    }

    /// TTL of the most recent successful resolution, or the seed
    pub fn last_known_ttl(&self) -> u32 {
        self.last_known_ttl
    }

    /// Record a successful resolution and return the wait before the next one
    pub fn record_success(&mut self, observation: &AddressObservation) -> Duration {
        self.last_known_ttl = observation.ttl;
        observation.ttl_duration()
    }

    /// Wait before retrying after a failed resolution
    pub fn record_failure(&self) -> Duration {
        Duration::from_secs(u64::from(self.last_known_ttl))
    }
}

impl Default for PollState {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_TTL_SECS)
    }
}

/// Stream of poll events returned by [`IpPoller::start`]
///
/// Ends once the poll loop terminates (cancellation or a dropped consumer).
pub struct PollStream {
    events: ReceiverStream<PollEvent>,
    task: JoinHandle<()>,
}

impl PollStream {
    /// Whether the poll loop has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Stream for PollStream {
    type Item = PollEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

/// Repeatedly resolves a hostname, paced by the answer's TTL
pub struct IpPoller {
    resolver: Arc<dyn HostResolver>,
    initial_ttl_secs: u32,
}

impl IpPoller {
    /// Create a poller using the default TTL seed
    pub fn new(resolver: Arc<dyn HostResolver>) -> Self {
        Self {
            resolver,
            initial_ttl_secs: DEFAULT_INITIAL_TTL_SECS,
        }
    }

    /// Create a poller from configuration
    pub fn from_config(resolver: Arc<dyn HostResolver>, config: &PollerConfig) -> Self {
        Self::new(resolver).with_initial_ttl(config.initial_ttl_secs)
    }

    /// Override the TTL assumed before the first successful resolution
    pub fn with_initial_ttl(mut self, secs: u32) -> Self {
        self.initial_ttl_secs = secs;
        self
    }

    /// Start polling `hostname` until `token` is cancelled
    ///
    /// The loop runs on its own task. Every successful resolution is emitted,
    /// changed or not; deduplication is left to reconciliation.
    pub fn start(&self, token: CancellationToken, hostname: impl Into<String>) -> PollStream {
        let (tx, rx) = mpsc::channel(1);

        let task = tokio::spawn(poll_loop(
            Arc::clone(&self.resolver),
            hostname.into(),
            PollState::new(self.initial_ttl_secs),
            tx,
            token,
        ));

        PollStream {
            events: ReceiverStream::new(rx),
            task,
        }
    }
}

async fn poll_loop(
    resolver: Arc<dyn HostResolver>,
    hostname: String,
    mut state: PollState,
    tx: mpsc::Sender<PollEvent>,
    token: CancellationToken,
) {
    info!(
        hostname = %hostname,
        resolver = resolver.resolver_name(),
        initial_ttl = state.last_known_ttl(),
        "Starting poll loop"
    );

    loop {
        // A slot frees up only once the consumer has taken the previous event
        let permit = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            permit = tx.reserve() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    debug!(hostname = %hostname, "Poll consumer dropped");
                    break;
                }
            },
        };

        let resolved = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            resolved = resolver.resolve(&hostname) => resolved,
        };

        let (event, wait) = match resolved {
            Ok(observation) => {
                debug!(hostname = %hostname, ip = %observation.ip, ttl = observation.ttl, "Resolved");
                let wait = state.record_success(&observation);
                (PollEvent::Observed(observation), wait)
            }
            Err(e) => {
                warn!(
                    hostname = %hostname,
                    error = %e,
                    backoff_secs = state.last_known_ttl(),
                    "Resolution failed"
                );
                (PollEvent::Failed(e), state.record_failure())
            }
        };

        permit.send(event);

        debug!(hostname = %hostname, wait_secs = wait.as_secs(), "Waiting before next resolution");
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
    }

    info!(hostname = %hostname, "Poll loop stopped");
}
