use axum::{
    body::{self, Body},
    http::{self, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sitefilter::{
    config::AppConfig,
    query::FilterEngine,
    schema,
    server::Server,
    state::AppState,
    store::MemoryStore,
};
use std::{
    future::Future,
    net::SocketAddr,
    sync::{Arc, Once},
    time::Duration,
};
use tower::ServiceExt;

pub const API_KEY: &str = "test-api-key";

static TRACING_INIT: Once = Once::new();

/// Runs a test closure against the real router backed by a seeded in-memory
/// property store.
pub async fn with_harness<F, Fut>(test: F)
where
    F: FnOnce(TestHarness) -> Fut,
    Fut: Future<Output = ()>,
{
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt::try_init();
    });

    let config = Arc::new(test_config());
    let store = Arc::new(seeded_store());
    let engine = FilterEngine::new(store, Arc::clone(&config));
    let server = Server::from_state(AppState::new(config, engine));

    let harness = TestHarness {
        router: server.router(),
        api_key: API_KEY.to_string(),
    };

    test(harness).await;
}

fn test_config() -> AppConfig {
    AppConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        database_url: "postgres://unused/db".to_string(),
        property_table: "property_listings".to_string(),
        max_pool_size: 1,
        pg_ssl_root_cert: None,
        pg_ssl_cert: None,
        pg_ssl_key: None,
        api_key: Some(API_KEY.to_string()),
        allowed_origins: None,
        page_size: 50,
        request_timeout: Duration::from_secs(30),
    }
}

/// 200 listings: odd ids are for-sale, even ids for-lease, asking prices
/// 101_000..=300_000 in 1_000 steps, every 10th row carrying the 0.0
/// distance sentinel.
fn seeded_store() -> MemoryStore {
    let rows = (1..=200i64)
        .map(|i| {
            json!({
                "id": i,
                "asking_price": 100_000.0 + (i as f64) * 1_000.0,
                "category": if i % 2 == 1 { "for-sale" } else { "for-lease" },
                "zones": match i % 3 {
                    0 => json!(["Z1"]),
                    1 => json!(["Z2", "Z3"]),
                    _ => json!(["Z4"]),
                },
                "address": format!("{i} George St"),
                "distance_to_train": if i % 10 == 0 { 0.0 } else { (i as f64) * 10.0 },
            })
        })
        .collect();

    MemoryStore::with_columns(rows, schema::RESULT_COLUMNS.iter().copied())
}

pub struct TestHarness {
    router: Router,
    api_key: String,
}

impl TestHarness {
    pub async fn properties(&self, body: Value) -> http::Response<Body> {
        self.request("/api/properties", body, true).await
    }

    pub async fn properties_without_api_key(&self, body: Value) -> http::Response<Body> {
        self.request("/api/properties", body, false).await
    }

    pub async fn health(&self) -> http::Response<Body> {
        let request = Request::builder()
            .method("GET")
            .uri("/healthz")
            .body(Body::empty())
            .expect("failed to build harness request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should handle harness request")
    }

    async fn request(&self, path: &str, payload: Value, include_api_key: bool) -> http::Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(http::header::CONTENT_TYPE, "application/json");

        if include_api_key {
            builder = builder.header("x-api-key", &self.api_key);
        }

        let body = serde_json::to_vec(&payload).expect("request payload should serialize");
        let request = builder
            .body(Body::from(body))
            .expect("failed to build harness request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should handle harness request")
    }
}

pub async fn read_json(response: http::Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("response body should deserialize");
    let value =
        serde_json::from_slice::<Value>(&bytes).expect("response body should be valid JSON");
    (status, value)
}
