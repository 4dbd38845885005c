use crate::{
    config::AppConfig,
    db,
    error::{Result, ServiceError},
    query::{FilterEngine, PropertyQueryRequest, ResultEnvelope},
    state::AppState,
    store::PgStore,
};
use axum::{
    extract::State,
    http::{
        header::{HeaderName, CONTENT_TYPE},
        HeaderMap, HeaderValue, Method,
    },
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

pub struct Server {
    state: AppState,
}

impl Server {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect_pool(&config).await?;
        let config = Arc::new(config);
        let store = Arc::new(PgStore::new(pool, config.property_table.clone()));
        let engine = FilterEngine::new(store, Arc::clone(&config));
        let state = AppState::new(Arc::clone(&config), engine);

        Ok(Self::from_state(state))
    }

    /// Builds a server around an already-assembled state, e.g. with an
    /// in-memory store for tests or tooling.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .route("/healthz", get(Self::health))
            .route("/api/properties", post(Self::properties))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(self.state.config.request_timeout));

        if let Some(cors) = cors_layer(&self.state.config) {
            router = router.layer(cors);
        }

        router
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.state.config.listen_addr;
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "sitefilter listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    async fn health() -> Json<serde_json::Value> {
        Json(json!({ "status": "ok" }))
    }

    async fn properties(
        State(state): State<AppState>,
        headers: HeaderMap,
        Json(request): Json<PropertyQueryRequest>,
    ) -> Result<Json<ResultEnvelope>> {
        enforce_api_key(&headers, &state.config)?;
        let envelope = state.engine.execute(request).await?;
        Ok(Json(envelope))
    }
}

fn cors_layer(config: &AppConfig) -> Option<CorsLayer> {
    let origins = config.allowed_origins.as_ref()?;
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring unparseable allowed origin");
                None
            }
        })
        .collect();
    if parsed.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(parsed)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::PATCH,
                Method::OPTIONS,
            ])
            .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-api-key")])
            .allow_credentials(true),
    )
}

fn enforce_api_key(headers: &HeaderMap, config: &AppConfig) -> Result<()> {
    if let Some(expected) = &config.api_key {
        let provided = headers
            .get("x-api-key")
            .and_then(|value| value.to_str().ok());

        if provided != Some(expected.as_str()) {
            return Err(ServiceError::Auth);
        }
    }

    Ok(())
}
