//! Test Harness Module
//!
//! Provides infrastructure for the application tests:
//! - In-process fake Elasticsearch (ping, info, create index, bulk, refresh, count)
//! - No-op application controller
//! - Config helpers pointing the suite at the fake

#![allow(dead_code)]

use app_tests::{AppController, ControllerError, ElasticConfig, TestScope};
use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct IndexState {
    /// Written but not yet refreshed
    pub pending: u64,
    /// Visible to count
    pub visible: u64,
}

/// Knobs and observations for the fake cluster.
#[derive(Debug, Default)]
pub struct FakeElasticsearch {
    /// Answer this many pings with 503 before going green
    pub failing_pings: usize,
    /// Reject every n-th document of a bulk request (1-based)
    pub reject_every: Option<usize>,
    /// Documents that vanish on refresh
    pub lost_on_refresh: u64,

    pub pings: AtomicUsize,
    pub bulk_requests: AtomicUsize,
    pub indices: Mutex<HashMap<String, IndexState>>,
}

impl FakeElasticsearch {
    pub fn index_names(&self) -> Vec<String> {
        self.indices.lock().unwrap().keys().cloned().collect()
    }
}

type Shared = Arc<FakeElasticsearch>;

/// Serve the fake on an ephemeral localhost port.
pub async fn spawn_fake_elasticsearch(fake: Shared) -> SocketAddr {
    let app = Router::new()
        .route("/", get(info).head(ping))
        .route("/:index", put(create_index))
        .route("/:index/_bulk", post(bulk))
        .route("/:index/_refresh", post(refresh).get(refresh))
        .route("/:index/_count", get(count).post(count))
        .layer(middleware::map_response(product_header))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake elasticsearch");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake elasticsearch");
    });

    addr
}

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind probe");
    listener.local_addr().expect("local addr")
}

pub fn elastic_config(addr: SocketAddr) -> ElasticConfig {
    ElasticConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        start_wait: Duration::from_millis(100),
        connect_attempts: 3,
        connect_delay: Duration::from_millis(10),
        request_timeout: Duration::from_secs(5),
        ..ElasticConfig::default()
    }
}

pub fn scope(dir: &std::path::Path) -> TestScope {
    TestScope {
        test_name: app_tests::elastic::TEST_NAME.to_string(),
        scope_path: dir.to_path_buf(),
        logs_path: dir.join("logs"),
    }
}

/// Controller for tests where the service is already up.
pub struct NoopController;

#[async_trait]
impl AppController for NoopController {
    fn name(&self) -> &str {
        "noop"
    }

    async fn start(&self) -> Result<(), ControllerError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), ControllerError> {
        Ok(())
    }
}

// ============================================
// Handlers
// ============================================

async fn product_header(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert("x-elastic-product", HeaderValue::from_static("Elasticsearch"));
    response
}

async fn ping(State(fake): State<Shared>) -> StatusCode {
    let seen = fake.pings.fetch_add(1, Ordering::SeqCst) + 1;
    if seen <= fake.failing_pings {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

async fn info() -> Json<Value> {
    Json(json!({
        "name": "fake-node",
        "cluster_name": "app-tests",
        "version": { "number": "8.13.0" },
        "tagline": "You Know, for Search"
    }))
}

fn index_not_found(index: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": { "type": "index_not_found_exception", "reason": format!("no such index [{index}]") },
            "status": 404
        })),
    )
        .into_response()
}

async fn create_index(State(fake): State<Shared>, Path(index): Path<String>) -> Response {
    let mut indices = fake.indices.lock().unwrap();
    if indices.contains_key(&index) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": { "type": "resource_already_exists_exception", "reason": format!("index [{index}] already exists") },
                "status": 400
            })),
        )
            .into_response();
    }
    indices.insert(index.clone(), IndexState::default());
    Json(json!({ "acknowledged": true, "shards_acknowledged": true, "index": index })).into_response()
}

async fn bulk(State(fake): State<Shared>, Path(index): Path<String>, body: String) -> Response {
    fake.bulk_requests.fetch_add(1, Ordering::SeqCst);

    let mut indices = fake.indices.lock().unwrap();
    let Some(state) = indices.get_mut(&index) else {
        return index_not_found(&index);
    };

    let lines: Vec<&str> = body.lines().filter(|l| !l.trim().is_empty()).collect();
    let mut items = Vec::new();
    let mut errors = false;

    for (n, pair) in lines.chunks(2).enumerate() {
        let id = format!("{}", state.pending + state.visible + n as u64 + 1);
        let parsed: Option<Value> = pair.get(1).and_then(|doc| serde_json::from_str(doc).ok());
        let rejected = fake.reject_every.is_some_and(|every| (n + 1) % every == 0);

        if parsed.is_none() || rejected {
            errors = true;
            items.push(json!({ "index": {
                "_index": index, "_id": id, "status": 400,
                "error": { "type": "mapper_parsing_exception", "reason": "failed to parse" }
            }}));
        } else {
            items.push(json!({ "index": {
                "_index": index, "_id": id, "status": 201, "result": "created"
            }}));
        }
    }

    let created = items.iter().filter(|i| i["index"]["status"] == 201).count() as u64;
    state.pending += created;

    Json(json!({ "took": 1, "errors": errors, "items": items })).into_response()
}

async fn refresh(State(fake): State<Shared>, Path(index): Path<String>) -> Response {
    let mut indices = fake.indices.lock().unwrap();
    let Some(state) = indices.get_mut(&index) else {
        return index_not_found(&index);
    };
    let lost = fake.lost_on_refresh.min(state.pending);
    state.visible += state.pending - lost;
    state.pending = 0;
    Json(json!({ "_shards": { "total": 1, "successful": 1, "failed": 0 } })).into_response()
}

async fn count(State(fake): State<Shared>, Path(index): Path<String>) -> Response {
    let indices = fake.indices.lock().unwrap();
    match indices.get(&index) {
        Some(state) => Json(json!({
            "count": state.visible,
            "_shards": { "total": 1, "successful": 1, "skipped": 0, "failed": 0 }
        }))
        .into_response(),
        None => index_not_found(&index),
    }
}
