// # spectrumd - Spectrum DDNS Daemon
//
// Thin integration layer: reads configuration, wires the resolver, the
// Cloudflare client and the engine together, then runs until one-shot
// completion, a fatal error or a shutdown signal.
//
// ## Configuration
//
// Every setting is a flag or an environment variable:
//
// - `CLOUDFLARE_API_KEY`, `CLOUDFLARE_API_EMAIL`: account credentials
// - `CLOUDFLARE_ZONE_NAME`: zone holding the application
// - `SPECTRUM_APP_DOMAIN`, `SPECTRUM_APP_PROTOCOL`: application identity
// - `DDNS_HOSTNAME`: dynamic DNS hostname to follow
// - `DNS_SERVER`: DNS server queried for the hostname
// - `SPECTRUM_DDNS_MODE=dry-run`: never write to Cloudflare
//
// `RUST_LOG` overrides the log filter chosen by `--debug`.
//
// ## Example
//
// ```bash
// export CLOUDFLARE_API_KEY=...
// export CLOUDFLARE_API_EMAIL=ops@example.com
// export CLOUDFLARE_ZONE_NAME=example.com
// export SPECTRUM_APP_DOMAIN=ssh.example.com
// export SPECTRUM_APP_PROTOCOL=ssh
// export DDNS_HOSTNAME=home.example.net
// export DNS_SERVER=1.1.1.1
//
// spectrumd --poll
// ```

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use spectrum_ddns_cloudflare::CloudflareSpectrumClient;
use spectrum_ddns_core::{
    EngineEvent, EngineExit, EngineSettings, IpPoller, SpectrumDdnsConfig, SpectrumEngine,
    SpectrumReconciler,
};
use spectrum_ddns_dns::DnsResolver;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown or one-shot completion
/// - 1: Configuration or startup error
/// - 2: Runtime error
#[derive(Debug, Clone, Copy)]
enum SpectrumExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<SpectrumExitCode> for ExitCode {
    fn from(code: SpectrumExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return SpectrumExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return SpectrumExitCode::ConfigError.into();
    }

    let default_filter = if config.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SpectrumExitCode::ConfigError.into();
    }

    info!("Starting spectrumd");
    debug!(config = ?config.redacted(), "Configuration loaded");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SpectrumExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        let (engine, events) = match setup(&config).await {
            Ok(parts) => parts,
            Err(e) => {
                error!("Startup failed: {:#}", e);
                return SpectrumExitCode::ConfigError;
            }
        };

        match run_daemon(engine, events).await {
            Ok(exit) => {
                info!(?exit, "spectrumd stopped");
                SpectrumExitCode::CleanShutdown
            }
            Err(e) => {
                error!("Daemon error: {:#}", e);
                SpectrumExitCode::RuntimeError
            }
        }
    });

    code.into()
}

/// Build the engine from a validated configuration
///
/// Resolves the Cloudflare zone id up front so a bad zone or bad
/// credentials fail at startup.
async fn setup(config: &SpectrumDdnsConfig) -> Result<(SpectrumEngine, mpsc::Receiver<EngineEvent>)> {
    let resolver = DnsResolver::from_config(&config.resolver).context("invalid DNS server")?;
    info!(server = %resolver.server(), "DNS resolver ready");

    let client = CloudflareSpectrumClient::from_config(&config.cloudflare)
        .context("failed to create Cloudflare client")?;
    let zone_id = client
        .zone_id_by_name(&config.cloudflare.zone_name)
        .await
        .with_context(|| format!("failed to look up zone {}", config.cloudflare.zone_name))?;
    info!(zone = %config.cloudflare.zone_name, %zone_id, "Cloudflare zone found");

    let reconciler = Arc::new(SpectrumReconciler::new(Arc::new(client), zone_id));
    let poller = IpPoller::from_config(Arc::new(resolver), &config.poller);
    let settings = EngineSettings::from_config(config)?;

    Ok(SpectrumEngine::new(poller, reconciler, settings))
}

/// Run the engine until it finishes or a shutdown signal arrives
async fn run_daemon(
    engine: SpectrumEngine,
    mut events: mpsc::Receiver<EngineEvent>,
) -> Result<EngineExit> {
    let token = CancellationToken::new();

    let signal_token = token.clone();
    let signals = tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => {
                info!("Received shutdown signal: {}", signal);
                signal_token.cancel();
            }
            Err(e) => warn!("Signal handling unavailable: {}", e),
        }
    });

    let logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    let result = engine.run(&token).await;

    signals.abort();
    drop(engine);
    join_event_logger(logger).await;

    Ok(result?)
}

/// Wait for the event logger to drain; returns whether it ended cleanly
async fn join_event_logger(logger: JoinHandle<()>) -> bool {
    match logger.await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Event logger task failed");
            false
        }
    }
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::Started { hostname, identity } => {
            info!(%hostname, %identity, "Engine started")
        }
        EngineEvent::AddressObserved { ip, ttl } => debug!(%ip, ttl, "Address observed"),
        EngineEvent::ResolutionFailed { error } => warn!(%error, "Resolution failed"),
        EngineEvent::Reconciled { ip, outcome } => info!(%ip, outcome, "Application reconciled"),
        EngineEvent::ReconcileFailed { ip, error } => error!(%ip, %error, "Reconcile failed"),
        EngineEvent::Stopped { reason } => info!(%reason, "Engine stopped"),
    }
}

/// Wait for SIGTERM or SIGINT
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate()).context("failed to set up SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to set up SIGINT handler")?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for CTRL-C
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for CTRL-C")?;
    Ok("SIGINT")
}
