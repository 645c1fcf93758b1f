// # Cloudflare Spectrum Registry
//
// This crate implements `SpectrumRegistry` on top of the Cloudflare API v4.
//
// ## Behaviour
//
// - One HTTP request per registry call
// - Errors are propagated as-is; reconciliation decides what they mean
// - HTTP timeout of 30 seconds
// - Specific errors for HTTP status codes (401/403, 404, 409, 429, 5xx)
// - Dry-run mode: reads go out, writes are only logged
// - No retries, no caching, no background tasks
//
// ## Security Requirements
//
// - API key and email NEVER appear in logs or Debug output
// - Construction fails fast if either is empty
//
// ## API Reference
//
// - List Zones: GET `/zones?name=...`
// - List Spectrum applications: GET `/zones/:zone_id/spectrum/apps?page=N&per_page=M`
//   (every page is fetched)
// - Create Spectrum application: POST `/zones/:zone_id/spectrum/apps`
// - Update Spectrum application: PUT `/zones/:zone_id/spectrum/apps/:app_id`

pub mod api;

use api::{Envelope, PROVIDER, ResultInfo, Zone, status_error};
use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use spectrum_ddns_core::config::CloudflareConfig;
use spectrum_ddns_core::{Error, Result, SpectrumApplication, SpectrumRegistry};
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Applications requested per page when listing (the API maximum)
const APPS_PER_PAGE: u32 = 100;

/// Client for Cloudflare Spectrum applications
///
/// Authenticates with the global API key (`X-Auth-Key` / `X-Auth-Email`).
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the client will:
/// - Perform all GET requests (zone lookup, application listing)
/// - Log the intended POST/PUT payload
/// - **NOT** actually create or modify applications
pub struct CloudflareSpectrumClient {
    /// ⚠️ NEVER log this value
    api_key: String,

    /// ⚠️ NEVER log this value
    api_email: String,

    base_url: String,

    client: reqwest::Client,

    dry_run: bool,
}

impl std::fmt::Debug for CloudflareSpectrumClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareSpectrumClient")
            .field("api_key", &"<REDACTED>")
            .field("api_email", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareSpectrumClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the key or email is empty
    /// - `Error::Http` if the HTTP client cannot be built
    pub fn new(
        api_key: impl Into<String>,
        api_email: impl Into<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let api_key = api_key.into();
        let api_email = api_email.into();

        if api_key.is_empty() {
            return Err(Error::config("Cloudflare API key cannot be empty"));
        }
        if api_email.is_empty() {
            return Err(Error::config("Cloudflare API email cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("failed to build HTTP client: {}", e)))?;

        if dry_run {
            tracing::warn!("Cloudflare client running in DRY-RUN mode - no changes will be made");
        }

        Ok(Self {
            api_key,
            api_email,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Create a client from configuration
    pub fn from_config(config: &CloudflareConfig) -> Result<Self> {
        Self::new(config.api_key.clone(), config.api_email.clone(), config.dry_run)
    }

    /// Point the client at another API root (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Find the identifier of the zone called `name`
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// X-Auth-Key: <key>
    /// X-Auth-Email: <email>
    /// ```
    pub async fn zone_id_by_name(&self, name: &str) -> Result<String> {
        tracing::debug!(zone = name, "Looking up zone ID");

        let request = self
            .request(Method::GET, "/zones")
            .query(&[("name", name)]);
        let zones: Vec<Zone> = self.send(request, "lookup zone").await?;

        let zone = zones
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("Zone not found: {}", name)))?;

        tracing::debug!(zone = name, zone_id = %zone.id, "Found zone ID");
        Ok(zone.id)
    }

    fn apps_path(zone_id: &str) -> String {
        format!("/zones/{}/spectrum/apps", zone_id)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("X-Auth-Key", &self.api_key)
            .header("X-Auth-Email", &self.api_email)
    }

    /// Send a request and unwrap the response envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T> {
        self.send_envelope(request, context).await?.into_result(context)
    }

    /// Send a list request and unwrap one page of results
    async fn send_page<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<(T, Option<ResultInfo>)> {
        self.send_envelope(request, context).await?.into_page(context)
    }

    async fn send_envelope<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<Envelope<T>> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("{}: HTTP request failed: {}", context, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("{}: failed to read response: {}", context, e)))?;

        if !status.is_success() {
            return Err(status_error(status, context, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            Error::provider(PROVIDER, format!("{}: failed to parse response: {}", context, e))
        })
    }
}

#[async_trait]
impl SpectrumRegistry for CloudflareSpectrumClient {
    async fn list_apps(&self, zone_id: &str) -> Result<Vec<SpectrumApplication>> {
        let path = Self::apps_path(zone_id);
        let mut apps = Vec::new();
        let mut page = 1u32;

        loop {
            let request = self
                .request(Method::GET, &path)
                .query(&[("page", page), ("per_page", APPS_PER_PAGE)]);
            let (batch, info): (Vec<SpectrumApplication>, _) =
                self.send_page(request, "list spectrum apps").await?;

            let fetched = batch.len();
            apps.extend(batch);

            // No paging details means everything came back at once
            let total_pages = info.map_or(page, |info| info.total_pages);
            if fetched == 0 || page >= total_pages {
                break;
            }
            page += 1;
        }

        tracing::debug!(zone_id, count = apps.len(), pages = page, "Listed spectrum applications");
        Ok(apps)
    }

    async fn create_app(&self, zone_id: &str, app: &SpectrumApplication) -> Result<SpectrumApplication> {
        if self.dry_run {
            tracing::info!(
                domain = %app.dns.name,
                "[DRY-RUN] Would send POST request to {} with payload: {}",
                Self::apps_path(zone_id),
                serde_json::to_string(app)?
            );
            return Ok(app.clone());
        }

        let request = self
            .request(Method::POST, &Self::apps_path(zone_id))
            .json(app);
        let created: SpectrumApplication = self.send(request, "create spectrum app").await?;

        tracing::info!(domain = %created.dns.name, app_id = created.id.as_deref().unwrap_or(""), "Spectrum application created");
        Ok(created)
    }

    async fn update_app(
        &self,
        zone_id: &str,
        app_id: &str,
        app: &SpectrumApplication,
    ) -> Result<SpectrumApplication> {
        let path = format!("{}/{}", Self::apps_path(zone_id), app_id);

        if self.dry_run {
            tracing::info!(
                app_id,
                "[DRY-RUN] Would send PUT request to {} with payload: {}",
                path,
                serde_json::to_string(app)?
            );
            let mut accepted = app.clone();
            accepted.id = Some(app_id.to_string());
            return Ok(accepted);
        }

        let request = self.request(Method::PUT, &path).json(app);
        let updated: SpectrumApplication = self.send(request, "update spectrum app").await?;

        tracing::info!(app_id, origins = ?updated.origin_direct, "Spectrum application updated");
        Ok(updated)
    }

    fn registry_name(&self) -> &'static str {
        PROVIDER
    }
}
