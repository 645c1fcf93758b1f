//! Test doubles and common utilities for contract tests
//!
//! The doubles record what was asked of them so tests can assert on call
//! counts, payloads and timing without any network.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use spectrum_ddns_core::error::{Error, Result};
use spectrum_ddns_core::traits::{AddressObservation, HostResolver, SpectrumApplication, SpectrumRegistry};
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::Instant;

/// One scripted resolver answer
#[derive(Debug, Clone)]
pub enum Step {
    /// Resolve to this address with this TTL
    Answer(IpAddr, u32),
    /// Reply without any A record
    NoRecords,
    /// The query itself fails
    LookupFailed(&'static str),
}

/// A resolver that plays back a script, then stalls forever
///
/// Every call records the (virtual) instant it started at.
pub struct ScriptedResolver {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedResolver {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Number of resolve calls so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Gaps between successive resolve calls
    pub fn gaps(&self) -> Vec<std::time::Duration> {
        let calls = self.calls.lock().unwrap();
        calls.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

#[async_trait]
impl HostResolver for ScriptedResolver {
    async fn resolve(&self, hostname: &str) -> Result<AddressObservation> {
        self.calls.lock().unwrap().push(Instant::now());

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Answer(ip, ttl)) => Ok(AddressObservation::new(ip, ttl)),
            Some(Step::NoRecords) => Err(Error::no_records(hostname)),
            Some(Step::LookupFailed(reason)) => Err(Error::lookup_failed(hostname, reason)),
            None => std::future::pending().await,
        }
    }

    fn resolver_name(&self) -> &'static str {
        "scripted"
    }
}

/// An in-memory Spectrum registry with call counters and failure switches
#[derive(Default)]
pub struct InMemoryRegistry {
    apps: Mutex<Vec<SpectrumApplication>>,
    next_id: AtomicUsize,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
    last_update_payload: Mutex<Option<SpectrumApplication>>,
    fail_list: AtomicBool,
    fail_create: AtomicBool,
    fail_update: AtomicBool,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with `apps`
    pub fn with_apps(apps: Vec<SpectrumApplication>) -> Self {
        let registry = Self::new();
        *registry.apps.lock().unwrap() = apps;
        registry
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Creates plus updates
    pub fn writes(&self) -> usize {
        self.create_calls() + self.update_calls()
    }

    pub fn apps(&self) -> Vec<SpectrumApplication> {
        self.apps.lock().unwrap().clone()
    }

    pub fn last_update_payload(&self) -> Option<SpectrumApplication> {
        self.last_update_payload.lock().unwrap().clone()
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_update(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SpectrumRegistry for InMemoryRegistry {
    async fn list_apps(&self, _zone_id: &str) -> Result<Vec<SpectrumApplication>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Error::http("list failed"));
        }
        Ok(self.apps())
    }

    async fn create_app(&self, _zone_id: &str, app: &SpectrumApplication) -> Result<SpectrumApplication> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::rate_limited("create throttled"));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut stored = app.clone();
        stored.id = Some(format!("app-{n}"));
        stored.created_on = Some(Utc::now());
        stored.modified_on = stored.created_on;

        self.apps.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn update_app(
        &self,
        _zone_id: &str,
        app_id: &str,
        app: &SpectrumApplication,
    ) -> Result<SpectrumApplication> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_update_payload.lock().unwrap() = Some(app.clone());
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(Error::auth("token revoked"));
        }

        let mut apps = self.apps.lock().unwrap();
        let slot = apps
            .iter_mut()
            .find(|a| a.id.as_deref() == Some(app_id))
            .ok_or_else(|| Error::not_found(app_id.to_string()))?;

        let mut stored = app.clone();
        stored.id = Some(app_id.to_string());
        stored.created_on = slot.created_on;
        stored.modified_on = Some(Utc::now());
        *slot = stored.clone();
        Ok(stored)
    }

    fn registry_name(&self) -> &'static str {
        "in-memory"
    }
}

/// An existing application as the registry would list it
pub fn existing_app(id: &str, domain: &str, origins: &[&str]) -> SpectrumApplication {
    let mut app: SpectrumApplication = serde_json::from_value(serde_json::json!({
        "id": id,
        "protocol": "tcp/22",
        "dns": { "type": "CNAME", "name": domain },
        "origin_direct": origins,
        "ip_firewall": true,
        "created_on": "2024-01-02T02:20:00Z",
        "modified_on": "2024-01-02T02:20:00Z"
    }))
    .expect("valid application json");
    app.origin_direct = origins.iter().map(|o| o.to_string()).collect();
    app
}

pub fn ip(octets: [u8; 4]) -> IpAddr {
    IpAddr::from(octets)
}
