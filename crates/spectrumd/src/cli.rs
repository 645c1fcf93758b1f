// Command line and environment surface of spectrumd
//
// Every value can come from a flag or from its environment variable; the
// flag wins. Values are collected as plain strings so that a missing one is
// reported by configuration validation, naming the environment variable.

use clap::Parser;
use spectrum_ddns_core::config::{
    AppConfig, CloudflareConfig, EngineConfig, PollerConfig, ResolverConfig, SpectrumDdnsConfig, env,
};
use spectrum_ddns_core::{Result, SpectrumProtocol};

/// Value of `SPECTRUM_DDNS_MODE` that enables dry-run
const DRY_RUN_MODE: &str = "dry-run";

/// Keep a Cloudflare Spectrum application's origin pointed at a dynamic DNS hostname
#[derive(Debug, Parser)]
#[command(name = "spectrumd", version, about)]
pub struct Cli {
    /// Cloudflare global API key
    #[arg(long, env = env::CLOUDFLARE_API_KEY, default_value = "", hide_env_values = true, hide_default_value = true)]
    pub api_key: String,

    /// Email of the Cloudflare account owning the API key
    #[arg(long, env = env::CLOUDFLARE_API_EMAIL, default_value = "", hide_env_values = true, hide_default_value = true)]
    pub api_email: String,

    /// Cloudflare zone holding the Spectrum application
    #[arg(long, env = env::CLOUDFLARE_ZONE_NAME, default_value = "", hide_default_value = true)]
    pub zone_name: String,

    /// DNS name of the Spectrum application
    #[arg(long, env = env::SPECTRUM_APP_DOMAIN, default_value = "", hide_default_value = true)]
    pub app_domain: String,

    /// Protocol proxied by the application (ssh, minecraft)
    #[arg(long, env = env::SPECTRUM_APP_PROTOCOL, default_value = "", hide_default_value = true)]
    pub app_protocol: String,

    /// Dynamic DNS hostname to follow
    #[arg(long, env = env::DDNS_HOSTNAME, default_value = "", hide_default_value = true)]
    pub ddns_hostname: String,

    /// DNS server used to resolve the hostname (host or host:port)
    #[arg(long, env = env::DNS_SERVER, default_value = "", hide_default_value = true)]
    pub dns_server: String,

    /// Keep polling the hostname instead of exiting after the first update
    #[arg(long)]
    pub poll: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Read from Cloudflare but never create or update applications
    #[arg(long)]
    pub dry_run: bool,

    /// Run mode; `dry-run` is the same as --dry-run
    #[arg(long, env = "SPECTRUM_DDNS_MODE", hide = true)]
    pub mode: Option<String>,

    /// Log resolution failures and keep polling instead of exiting
    #[arg(long)]
    pub tolerate_resolution_errors: bool,
}

impl Cli {
    fn dry_run(&self) -> bool {
        self.dry_run
            || self
                .mode
                .as_deref()
                .is_some_and(|mode| mode.trim().eq_ignore_ascii_case(DRY_RUN_MODE))
    }

    /// Build the configuration
    ///
    /// An empty protocol stays unset for validation to report; an unknown one
    /// is an error here.
    pub fn into_config(self) -> Result<SpectrumDdnsConfig> {
        let protocol = match self.app_protocol.trim() {
            "" => None,
            name => Some(name.parse::<SpectrumProtocol>()?),
        };
        let dry_run = self.dry_run();

        Ok(SpectrumDdnsConfig {
            cloudflare: CloudflareConfig {
                api_key: self.api_key,
                api_email: self.api_email,
                zone_name: self.zone_name,
                dry_run,
            },
            app: AppConfig {
                domain: self.app_domain,
                protocol,
            },
            resolver: ResolverConfig::new(self.ddns_hostname, self.dns_server),
            poller: PollerConfig::default(),
            engine: EngineConfig {
                polling: self.poll,
                tolerate_resolution_errors: self.tolerate_resolution_errors,
                ..EngineConfig::default()
            },
            debug: self.debug,
        })
    }
}
