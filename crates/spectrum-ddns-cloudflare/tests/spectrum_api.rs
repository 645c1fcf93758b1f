//! Cloudflare client tests against a local stand-in of the API
//!
//! An `axum` server mimics the zone and Spectrum endpoints, checks the
//! authentication headers and records every request it receives.

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::routing::get;
use serde_json::{Value, json};
use spectrum_ddns_cloudflare::CloudflareSpectrumClient;
use spectrum_ddns_core::{Error, SpectrumProtocol, SpectrumReconciler, SpectrumRegistry};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use tokio_test::{assert_err, assert_ok};

const API_KEY: &str = "test-api-key";
const API_EMAIL: &str = "ops@example.com";
const ZONE_ID: &str = "023e105f4ecef8ad9ca31a8372d0c353";

#[derive(Debug, Clone)]
struct Seen {
    method: Method,
    path: String,
    body: Option<Value>,
}

#[derive(Default)]
struct MockApi {
    apps: Vec<Value>,
    seen: Vec<Seen>,
    /// Status and body returned instead of the normal answer
    failure: Option<(StatusCode, Value)>,
    next_id: usize,
    /// Page size enforced by the server, overriding `per_page`
    page_size: Option<usize>,
    /// `page` of every list request
    pages: Vec<usize>,
}

type Shared = Arc<Mutex<MockApi>>;
type Reply = (StatusCode, Json<Value>);

fn ok(result: Value) -> Reply {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "errors": [], "messages": [], "result": result })),
    )
}

/// Record the request and vet credentials; `Some` short-circuits the handler
fn check(state: &Shared, headers: &HeaderMap, method: Method, path: String, body: Option<Value>) -> Option<Reply> {
    let mut api = state.lock().unwrap();
    api.seen.push(Seen { method, path, body });

    let key = headers.get("x-auth-key").and_then(|v| v.to_str().ok());
    let email = headers.get("x-auth-email").and_then(|v| v.to_str().ok());
    if key != Some(API_KEY) || email != Some(API_EMAIL) {
        return Some((
            StatusCode::FORBIDDEN,
            Json(json!({
                "success": false,
                "errors": [{ "code": 9103, "message": "Unknown X-Auth-Key or X-Auth-Email" }],
                "result": null
            })),
        ));
    }

    api.failure.clone().map(|(status, body)| (status, Json(body)))
}

async fn list_zones(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    if let Some(reply) = check(&state, &headers, Method::GET, "/zones".to_string(), None) {
        return reply;
    }

    match query.get("name").map(String::as_str) {
        Some("example.com") => ok(json!([{ "id": ZONE_ID, "name": "example.com" }])),
        _ => ok(json!([])),
    }
}

async fn list_apps(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(zone): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    let path = format!("/zones/{}/spectrum/apps", zone);
    if let Some(reply) = check(&state, &headers, Method::GET, path, None) {
        return reply;
    }

    let param = |name: &str| query.get(name).and_then(|v| v.parse::<usize>().ok());
    let mut api = state.lock().unwrap();
    let page = param("page").unwrap_or(1).max(1);
    let per_page = api.page_size.or_else(|| param("per_page")).unwrap_or(20).max(1);
    api.pages.push(page);

    let total_count = api.apps.len();
    let items: Vec<Value> = api
        .apps
        .iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .cloned()
        .collect();

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "errors": [],
            "messages": [],
            "result_info": {
                "page": page,
                "per_page": per_page,
                "count": items.len(),
                "total_pages": total_count.div_ceil(per_page).max(1),
                "total_count": total_count
            },
            "result": items
        })),
    )
}

async fn create_app(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(zone): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    let path = format!("/zones/{}/spectrum/apps", zone);
    if let Some(reply) = check(&state, &headers, Method::POST, path, Some(body.clone())) {
        return reply;
    }

    let mut api = state.lock().unwrap();
    api.next_id += 1;
    let mut stored = body;
    stored["id"] = json!(format!("app-{}", api.next_id));
    stored["created_on"] = json!("2024-05-01T10:00:00Z");
    stored["modified_on"] = json!("2024-05-01T10:00:00Z");
    api.apps.push(stored.clone());
    ok(stored)
}

async fn update_app(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((zone, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Reply {
    let path = format!("/zones/{}/spectrum/apps/{}", zone, id);
    if let Some(reply) = check(&state, &headers, Method::PUT, path, Some(body.clone())) {
        return reply;
    }

    let mut api = state.lock().unwrap();
    let Some(slot) = api.apps.iter_mut().find(|a| a["id"] == json!(id)) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "errors": [{ "code": 10006, "message": "app not found" }] })),
        );
    };

    let mut stored = body;
    stored["id"] = json!(id);
    stored["modified_on"] = json!("2024-05-02T10:00:00Z");
    *slot = stored.clone();
    ok(stored)
}

async fn start(api: MockApi) -> (String, Shared) {
    let state: Shared = Arc::new(Mutex::new(api));

    let app = Router::new()
        .route("/client/v4/zones", get(list_zones))
        .route(
            "/client/v4/zones/{zone}/spectrum/apps",
            get(list_apps).post(create_app),
        )
        .route(
            "/client/v4/zones/{zone}/spectrum/apps/{id}",
            axum::routing::put(update_app),
        )
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/client/v4", addr), state)
}

fn client(base_url: &str, dry_run: bool) -> CloudflareSpectrumClient {
    CloudflareSpectrumClient::new(API_KEY, API_EMAIL, dry_run)
        .unwrap()
        .with_base_url(base_url)
}

fn ssh_app(id: &str, domain: &str, origin: &str) -> Value {
    json!({
        "id": id,
        "protocol": "tcp/22",
        "dns": { "type": "CNAME", "name": domain },
        "origin_direct": [origin],
        "ip_firewall": false,
        "proxy_protocol": "off",
        "tls": "off",
        "created_on": "2024-01-02T02:20:00Z",
        "modified_on": "2024-01-02T02:20:00Z"
    })
}

fn writes(state: &Shared) -> Vec<Seen> {
    state
        .lock()
        .unwrap()
        .seen
        .iter()
        .filter(|s| s.method != Method::GET)
        .cloned()
        .collect()
}

#[tokio::test]
async fn zone_is_found_by_name() {
    let (base_url, state) = start(MockApi::default()).await;

    let zone_id = assert_ok!(client(&base_url, false).zone_id_by_name("example.com").await);
    assert_eq!(zone_id, ZONE_ID);

    let seen = state.lock().unwrap().seen.clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, "/zones");
}

#[tokio::test]
async fn unknown_zone_is_not_found() {
    let (base_url, _state) = start(MockApi::default()).await;

    let err = assert_err!(client(&base_url, false).zone_id_by_name("nope.example").await);
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn wrong_credentials_are_an_authentication_error() {
    let (base_url, _state) = start(MockApi::default()).await;

    let client = CloudflareSpectrumClient::new("wrong", API_EMAIL, false)
        .unwrap()
        .with_base_url(&base_url);

    let err = assert_err!(client.list_apps(ZONE_ID).await);
    assert!(matches!(err, Error::Authentication(_)));
    assert!(!err.to_string().contains("wrong"));
}

#[tokio::test]
async fn applications_are_listed_with_unknown_fields() {
    let (base_url, _state) = start(MockApi {
        apps: vec![ssh_app("abc", "ssh.example.com", "tcp://192.0.2.1:22")],
        ..MockApi::default()
    })
    .await;

    let apps = assert_ok!(client(&base_url, false).list_apps(ZONE_ID).await);

    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].id.as_deref(), Some("abc"));
    assert_eq!(apps[0].dns.name, "ssh.example.com");
    assert_eq!(apps[0].origin_direct, vec!["tcp://192.0.2.1:22".to_string()]);
    assert_eq!(apps[0].extra.get("proxy_protocol"), Some(&json!("off")));
    assert!(apps[0].created_on.is_some());
}

#[tokio::test]
async fn unsuccessful_envelope_is_an_error() {
    let (base_url, _state) = start(MockApi {
        failure: Some((
            StatusCode::OK,
            json!({ "success": false, "errors": [{ "code": 10000, "message": "spectrum not enabled" }] }),
        )),
        ..MockApi::default()
    })
    .await;

    let err = assert_err!(client(&base_url, false).list_apps(ZONE_ID).await);
    assert!(matches!(err, Error::Provider { .. }));
    assert!(err.to_string().contains("spectrum not enabled"));
}

#[tokio::test]
async fn status_codes_map_to_errors() {
    let cases = [
        (StatusCode::TOO_MANY_REQUESTS, "rate"),
        (StatusCode::SERVICE_UNAVAILABLE, "transient"),
        (StatusCode::CONFLICT, "conflict"),
    ];

    for (status, needle) in cases {
        let (base_url, _state) = start(MockApi {
            failure: Some((status, json!({ "success": false, "errors": [] }))),
            ..MockApi::default()
        })
        .await;

        let err = assert_err!(client(&base_url, false).list_apps(ZONE_ID).await);
        assert!(
            err.to_string().to_lowercase().contains(needle),
            "{} should mention {:?}: {}",
            status,
            needle,
            err
        );
    }
}

#[tokio::test]
async fn reconcile_over_http_creates_then_skips_then_updates() {
    let (base_url, state) = start(MockApi::default()).await;
    let registry = Arc::new(client(&base_url, false));
    let reconciler = SpectrumReconciler::new(registry, ZONE_ID);
    let domain = "ssh.example.com";

    let created = assert_ok!(
        reconciler
            .reconcile(SpectrumProtocol::Ssh, domain, IpAddr::from([1, 2, 3, 4]))
            .await
    );
    assert_eq!(created.kind(), "created");
    assert_eq!(created.app().id.as_deref(), Some("app-1"));

    let unchanged = assert_ok!(
        reconciler
            .reconcile(SpectrumProtocol::Ssh, domain, IpAddr::from([1, 2, 3, 4]))
            .await
    );
    assert_eq!(unchanged.kind(), "unchanged");

    let updated = assert_ok!(
        reconciler
            .reconcile(SpectrumProtocol::Ssh, domain, IpAddr::from([5, 6, 7, 8]))
            .await
    );
    assert_eq!(updated.kind(), "updated");
    assert_eq!(updated.app().origin_direct, vec!["tcp://5.6.7.8:22".to_string()]);

    let writes = writes(&state);
    assert_eq!(writes.len(), 2);

    assert_eq!(writes[0].method, Method::POST);
    let create_body = writes[0].body.clone().unwrap();
    assert_eq!(create_body["protocol"], "tcp/22");
    assert_eq!(create_body["dns"], json!({ "type": "CNAME", "name": domain }));
    assert_eq!(create_body["origin_direct"], json!(["tcp://1.2.3.4:22"]));
    assert!(create_body.get("id").is_none());

    assert_eq!(writes[1].method, Method::PUT);
    assert_eq!(writes[1].path, format!("/zones/{}/spectrum/apps/app-1", ZONE_ID));
    let update_body = writes[1].body.clone().unwrap();
    assert!(update_body.get("id").is_none());
    assert!(update_body.get("created_on").is_none());
    assert!(update_body.get("modified_on").is_none());
    assert_eq!(update_body["origin_direct"], json!(["tcp://5.6.7.8:22"]));
}

#[tokio::test]
async fn dry_run_reads_but_never_writes() {
    let (base_url, state) = start(MockApi {
        apps: vec![ssh_app("abc", "ssh.example.com", "tcp://9.9.9.9:22")],
        ..MockApi::default()
    })
    .await;
    let registry = Arc::new(client(&base_url, true));
    let reconciler = SpectrumReconciler::new(registry.clone(), ZONE_ID);

    let updated = assert_ok!(
        reconciler
            .reconcile(SpectrumProtocol::Ssh, "ssh.example.com", IpAddr::from([1, 2, 3, 4]))
            .await
    );
    assert_eq!(updated.kind(), "updated");
    assert_eq!(updated.app().id.as_deref(), Some("abc"));

    let created = assert_ok!(
        reconciler
            .reconcile(SpectrumProtocol::Minecraft, "mc.example.com", IpAddr::from([1, 2, 3, 4]))
            .await
    );
    assert_eq!(created.kind(), "created");

    assert!(writes(&state).is_empty());
    assert_eq!(state.lock().unwrap().seen.len(), 2);
    assert_eq!(
        state.lock().unwrap().apps[0]["origin_direct"],
        json!(["tcp://9.9.9.9:22"])
    );
}

#[tokio::test]
async fn listing_walks_every_page() {
    let (base_url, state) = start(MockApi {
        apps: vec![
            ssh_app("a1", "one.example.com", "tcp://192.0.2.1:22"),
            ssh_app("a2", "two.example.com", "tcp://192.0.2.2:22"),
            ssh_app("a3", "three.example.com", "tcp://192.0.2.3:22"),
        ],
        page_size: Some(2),
        ..MockApi::default()
    })
    .await;

    let apps = assert_ok!(client(&base_url, false).list_apps(ZONE_ID).await);

    let ids: Vec<_> = apps.iter().filter_map(|a| a.id.as_deref()).collect();
    assert_eq!(ids, vec!["a1", "a2", "a3"]);
    assert_eq!(state.lock().unwrap().pages, vec![1, 2]);
}

#[tokio::test]
async fn application_on_a_later_page_is_not_recreated() {
    let (base_url, state) = start(MockApi {
        apps: vec![
            ssh_app("a1", "one.example.com", "tcp://192.0.2.1:22"),
            ssh_app("a2", "ssh.example.com", "tcp://1.2.3.4:22"),
        ],
        page_size: Some(1),
        ..MockApi::default()
    })
    .await;
    let reconciler = SpectrumReconciler::new(Arc::new(client(&base_url, false)), ZONE_ID);

    let outcome = assert_ok!(
        reconciler
            .reconcile(SpectrumProtocol::Ssh, "ssh.example.com", IpAddr::from([1, 2, 3, 4]))
            .await
    );

    assert_eq!(outcome.kind(), "unchanged");
    assert_eq!(outcome.app().id.as_deref(), Some("a2"));
    assert!(writes(&state).is_empty());
    assert_eq!(state.lock().unwrap().pages, vec![1, 2]);
}
