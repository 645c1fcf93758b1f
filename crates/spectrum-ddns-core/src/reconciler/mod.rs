//! Idempotent reconciliation of a Spectrum application
//!
//! The [`SpectrumReconciler`] makes the registry's application for a domain
//! point at a target address using as few remote calls as possible:
//!
//! 1. List the zone's applications and pick the one whose DNS name matches
//! 2. None found → create it
//! 3. Found with exactly the wanted origin → nothing to write
//! 4. Found with a different origin → update it
//!
//! ## Event Flow
//!
//! ```text
//! reconcile(protocol, domain, ip)
//!        │
//!        ▼
//!  app_by_domain ── RecordNotFound ──► create_app ──► Created
//!        │
//!        ▼
//!  update_app_ip ── origin matches ──► Unchanged (no write)
//!        │
//!        └──────── origin differs ──► update_app ──► Updated
//! ```
//!
//! Registry failures are never retried here and never mistaken for an absent
//! application.

use crate::error::{Error, Result};
use crate::protocol::{ApplicationIdentity, SpectrumProtocol};
use crate::traits::{SpectrumApplication, SpectrumRegistry};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a reconciliation
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// No application existed, one was created
    Created(SpectrumApplication),

    /// The application's origin was replaced
    Updated {
        /// Origins before the update
        previous_origins: Vec<String>,
        /// The application as returned by the registry
        app: SpectrumApplication,
    },

    /// The application already pointed at the address (no-op)
    Unchanged(SpectrumApplication),
}

impl ReconcileOutcome {
    /// The application after reconciliation
    pub fn app(&self) -> &SpectrumApplication {
        match self {
            ReconcileOutcome::Created(app)
            | ReconcileOutcome::Updated { app, .. }
            | ReconcileOutcome::Unchanged(app) => app,
        }
    }

    /// Consume the outcome, keeping the application
    pub fn into_app(self) -> SpectrumApplication {
        match self {
            ReconcileOutcome::Created(app)
            | ReconcileOutcome::Updated { app, .. }
            | ReconcileOutcome::Unchanged(app) => app,
        }
    }

    /// Whether the registry was written to
    pub fn wrote(&self) -> bool {
        !matches!(self, ReconcileOutcome::Unchanged(_))
    }

    /// Short label for logs and events
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileOutcome::Created(_) => "created",
            ReconcileOutcome::Updated { .. } => "updated",
            ReconcileOutcome::Unchanged(_) => "unchanged",
        }
    }
}

/// Keeps one zone's Spectrum applications pointed at the right origin
///
/// Holds no mutable state; concurrent reconciles for different domains are
/// fine, concurrent reconciles for the same domain are the caller's concern.
pub struct SpectrumReconciler {
    registry: Arc<dyn SpectrumRegistry>,
    zone_id: String,
}

impl SpectrumReconciler {
    pub fn new(registry: Arc<dyn SpectrumRegistry>, zone_id: impl Into<String>) -> Self {
        Self {
            registry,
            zone_id: zone_id.into(),
        }
    }

    /// Zone the reconciler works in
    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    /// Find the application whose DNS name equals `domain`
    ///
    /// The first match in listing order wins.
    ///
    /// # Returns
    ///
    /// - `Ok(SpectrumApplication)`: The matching application
    /// - `Err(Error::RecordNotFound)`: No application matches
    /// - `Err(Error::RegistryLookup)`: Listing the applications failed
    pub async fn app_by_domain(&self, domain: &str) -> Result<SpectrumApplication> {
        debug!(domain, zone_id = %self.zone_id, "Looking up spectrum application by DNS name");

        let apps = self
            .registry
            .list_apps(&self.zone_id)
            .await
            .map_err(|e| Error::registry_lookup(domain, e))?;

        let mut matches = apps.into_iter().filter(|app| app.dns.name == domain);
        let found = matches.next();

        let extra = matches.count();
        if extra > 0 {
            warn!(domain, duplicates = extra, "Several spectrum applications share this DNS name, using the first");
        }

        found.ok_or_else(|| {
            debug!(domain, "No spectrum application with matching domain");
            Error::RecordNotFound(domain.to_string())
        })
    }

    /// Make the application for `domain` forward `protocol` traffic to `ip`
    pub async fn reconcile(
        &self,
        protocol: SpectrumProtocol,
        domain: &str,
        ip: IpAddr,
    ) -> Result<ReconcileOutcome> {
        debug!(domain, protocol = %protocol, ip = %ip, "Reconciling spectrum application");

        match self.app_by_domain(domain).await {
            Ok(existing) => self.update_app_ip(existing, protocol, ip).await,
            Err(Error::RecordNotFound(_)) => {
                debug!(domain, "No existing spectrum application detected");
                self.create_app(protocol, domain, ip)
                    .await
                    .map(ReconcileOutcome::Created)
            }
            Err(e) => Err(e),
        }
    }

    /// [`reconcile`](Self::reconcile) for an application identity
    pub async fn reconcile_identity(
        &self,
        identity: &ApplicationIdentity,
        ip: IpAddr,
    ) -> Result<ReconcileOutcome> {
        self.reconcile(identity.protocol, &identity.domain, ip).await
    }

    /// Create a new application for `domain` pointing at `ip`
    pub async fn create_app(
        &self,
        protocol: SpectrumProtocol,
        domain: &str,
        ip: IpAddr,
    ) -> Result<SpectrumApplication> {
        let app = SpectrumApplication::new_for(protocol, domain, ip);

        info!(domain, protocol = %protocol, ip = %ip, "Creating new spectrum application");
        let created = self
            .registry
            .create_app(&self.zone_id, &app)
            .await
            .map_err(|e| Error::registry_create(domain, e))?;

        info!(domain, app_id = created.id.as_deref().unwrap_or("<none>"), "Spectrum application created");
        Ok(created)
    }

    /// Point an existing application at `ip`, writing only if it changed
    pub async fn update_app_ip(
        &self,
        app: SpectrumApplication,
        protocol: SpectrumProtocol,
        ip: IpAddr,
    ) -> Result<ReconcileOutcome> {
        let origin = protocol.origin(ip);
        let app_id = app.id.clone().unwrap_or_default();

        if app.has_sole_origin(&origin) {
            info!(app_id = %app_id, origin = %origin, "Spectrum application ip is already up-to-date, nothing to change");
            return Ok(ReconcileOutcome::Unchanged(app));
        }

        if app_id.is_empty() {
            return Err(Error::registry_update(
                "<none>",
                Error::provider(
                    self.registry.registry_name(),
                    format!("application for {} has no identifier", app.dns.name),
                ),
            ));
        }

        let update = app.with_sole_origin(&origin);

        info!(
            app_id = %app_id,
            previous = ?app.origin_direct,
            origin = %origin,
            "IP change detected, updating spectrum application"
        );
        let updated = self
            .registry
            .update_app(&self.zone_id, &app_id, &update)
            .await
            .map_err(|e| Error::registry_update(app_id.clone(), e))?;

        info!(app_id = %app_id, origin = %origin, "Spectrum application origin updated");
        Ok(ReconcileOutcome::Updated {
            previous_origins: app.origin_direct,
            app: updated,
        })
    }
}
