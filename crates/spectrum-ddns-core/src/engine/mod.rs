//! Core Spectrum DDNS engine
//!
//! The SpectrumEngine is responsible for:
//! - Driving the [`IpPoller`] for the dynamic DNS hostname
//! - Reconciling the Spectrum application on every observed address
//! - Deciding whether a failure ends the run
//! - Emitting events for monitoring
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  IpPoller   │─── PollEvent ───┐
//! └─────────────┘                 │
//!                                 ▼
//!                        ┌────────────────┐
//!                        │ SpectrumEngine │
//!                        └────────────────┘
//!                                 │
//!              ┌──────────────────┴──────────────────┐
//!              ▼                                     ▼
//!    ┌────────────────────┐                  ┌─────────────┐
//!    │ SpectrumReconciler │                  │   Events    │
//!    │ (list/create/put)  │                  │  (notify)   │
//!    └────────────────────┘                  └─────────────┘
//! ```
//!
//! ## Event Flow
//!
//! 1. `Observed` arrives from the poll stream
//! 2. Reconcile the application against the observed address
//! 3. A reconcile failure ends the run with that error
//! 4. In one-shot mode the first successful reconcile ends the run
//! 5. `Failed` ends the run or is logged, depending on the failure policy
//!
//! Events are consumed one at a time, so at most one reconcile is in flight.

use crate::config::SpectrumDdnsConfig;
use crate::error::{Error, Result};
use crate::poller::{IpPoller, PollEvent};
use crate::protocol::ApplicationIdentity;
use crate::reconciler::SpectrumReconciler;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What the engine does when a resolution fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolutionFailurePolicy {
    /// Stop the run and return the error
    #[default]
    Abort,
    /// Log the error and keep consuming; the poller backs off on its own
    Tolerate,
}

/// Runtime settings of a [`SpectrumEngine`]
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Dynamic DNS hostname to follow
    pub hostname: String,

    /// Application kept in sync with the hostname
    pub identity: ApplicationIdentity,

    /// Keep running after the first successful reconcile
    pub polling: bool,

    /// Behaviour on resolution failures
    pub resolution_failure_policy: ResolutionFailurePolicy,

    /// Capacity of the monitoring event channel
    pub event_channel_capacity: usize,
}

impl EngineSettings {
    /// Build engine settings from a validated configuration
    pub fn from_config(config: &SpectrumDdnsConfig) -> Result<Self> {
        let policy = if config.engine.tolerate_resolution_errors {
            ResolutionFailurePolicy::Tolerate
        } else {
            ResolutionFailurePolicy::Abort
        };

        Ok(Self {
            hostname: config.resolver.hostname.clone(),
            identity: config.identity()?,
            polling: config.engine.polling,
            resolution_failure_policy: policy,
            event_channel_capacity: config.engine.event_channel_capacity,
        })
    }
}

/// How a run ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineExit {
    /// One-shot mode reconciled successfully
    Completed,
    /// The cancellation token fired
    Cancelled,
}

/// Events emitted by the SpectrumEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        hostname: String,
        identity: String,
    },

    /// The hostname resolved to an address
    AddressObserved {
        ip: IpAddr,
        ttl: u32,
    },

    /// A resolution failed
    ResolutionFailed {
        error: String,
    },

    /// The application was reconciled
    Reconciled {
        ip: IpAddr,
        outcome: &'static str,
    },

    /// Reconciliation failed
    ReconcileFailed {
        ip: IpAddr,
        error: String,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// Core Spectrum DDNS engine
///
/// ## Lifecycle
///
/// 1. Create with [`SpectrumEngine::new()`]
/// 2. Run with [`SpectrumEngine::run()`] under a cancellation token
/// 3. The run returns on cancellation, one-shot completion or a fatal error
///
/// The poll loop is always cancelled before `run` returns.
pub struct SpectrumEngine {
    poller: IpPoller,
    reconciler: Arc<SpectrumReconciler>,
    settings: EngineSettings,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl SpectrumEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        poller: IpPoller,
        reconciler: Arc<SpectrumReconciler>,
        settings: EngineSettings,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel(settings.event_channel_capacity.max(1));

        let engine = Self {
            poller,
            reconciler,
            settings,
            event_tx: tx,
        };

        (engine, rx)
    }

    /// Engine settings
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run the engine until cancellation, one-shot completion or a fatal error
    ///
    /// # Returns
    ///
    /// - `Ok(EngineExit::Completed)`: One-shot mode reconciled once
    /// - `Ok(EngineExit::Cancelled)`: `token` was cancelled
    /// - `Err(Error)`: A reconcile failed, or a resolution failed under
    ///   [`ResolutionFailurePolicy::Abort`]
    pub async fn run(&self, token: &CancellationToken) -> Result<EngineExit> {
        let poll_token = token.child_token();
        let _stop_poller = poll_token.clone().drop_guard();

        let identity = &self.settings.identity;
        info!(
            hostname = %self.settings.hostname,
            identity = %identity,
            polling = self.settings.polling,
            policy = ?self.settings.resolution_failure_policy,
            "Engine starting"
        );
        self.emit_event(EngineEvent::Started {
            hostname: self.settings.hostname.clone(),
            identity: identity.to_string(),
        });

        let mut events = self.poller.start(poll_token, self.settings.hostname.clone());

        let result = loop {
            let Some(event) = events.next().await else {
                if token.is_cancelled() {
                    info!("Shutdown signal received");
                    break Ok(EngineExit::Cancelled);
                }
                break Err(Error::Other("poll loop terminated unexpectedly".to_string()));
            };

            match event {
                PollEvent::Observed(observation) => {
                    self.emit_event(EngineEvent::AddressObserved {
                        ip: observation.ip,
                        ttl: observation.ttl,
                    });

                    match self.reconciler.reconcile_identity(identity, observation.ip).await {
                        Ok(outcome) => {
                            debug!(ip = %observation.ip, outcome = outcome.kind(), "Reconciled");
                            self.emit_event(EngineEvent::Reconciled {
                                ip: observation.ip,
                                outcome: outcome.kind(),
                            });

                            if !self.settings.polling {
                                break Ok(EngineExit::Completed);
                            }
                        }
                        Err(e) => {
                            error!(ip = %observation.ip, identity = %identity, error = %e, "Failed to reconcile spectrum application");
                            self.emit_event(EngineEvent::ReconcileFailed {
                                ip: observation.ip,
                                error: e.to_string(),
                            });
                            break Err(e);
                        }
                    }
                }
                PollEvent::Failed(e) => {
                    self.emit_event(EngineEvent::ResolutionFailed {
                        error: e.to_string(),
                    });

                    match self.settings.resolution_failure_policy {
                        ResolutionFailurePolicy::Abort => {
                            error!(hostname = %self.settings.hostname, error = %e, "Failed to resolve hostname");
                            break Err(e);
                        }
                        ResolutionFailurePolicy::Tolerate => {
                            warn!(hostname = %self.settings.hostname, error = %e, "Failed to resolve hostname, waiting for next poll");
                        }
                    }
                }
            }
        };

        let reason = match &result {
            Ok(EngineExit::Completed) => "completed".to_string(),
            Ok(EngineExit::Cancelled) => "shutdown signal".to_string(),
            Err(e) => e.to_string(),
        };
        info!(reason = %reason, "Engine stopped");
        self.emit_event(EngineEvent::Stopped { reason });

        result
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Never awaits; a full channel drops the event
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
