//! HTTP endpoint layer for research-agent
//!
//! `POST /research` runs the bounded executor, `GET /health` reports liveness
//! and credential presence, `/` and `/static/*` serve the front-end.

use axum::{
    Json, Router,
    body::HttpBody,
    extract::{DefaultBodyLimit, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::clients::ResearchPipeline;
use crate::config::Config;
use crate::error::Result;
use crate::research::ResearchExecutor;
use crate::schemas::{ApiKeysConfigured, HealthStatus, ResearchRequest, ResearchResponse};
use crate::server::Lifecycle;

/// Shared state for HTTP server
#[derive(Clone)]
pub struct HttpState {
    pub config: Arc<Config>,
    pub executor: Arc<ResearchExecutor>,
    pub lifecycle: Arc<Lifecycle>,
}

impl HttpState {
    pub fn new(config: Config, pipeline: Arc<dyn ResearchPipeline>) -> Self {
        let executor = ResearchExecutor::new(
            pipeline,
            config.credentials.clone(),
            config.executor.clone(),
        );
        let lifecycle = Lifecycle::new(config.server.max_requests);
        Self {
            config: Arc::new(config),
            executor: Arc::new(executor),
            lifecycle,
        }
    }
}

/// Conduct research and return the sanitized report with its metadata
pub async fn research_handler(
    State(state): State<HttpState>,
    Json(request): Json<ResearchRequest>,
) -> Result<Json<ResearchResponse>> {
    state.executor.run(&request).await.map(Json)
}

/// Health check endpoint. Reports presence of credentials, not validity.
pub async fn health_handler(State(state): State<HttpState>) -> Json<HealthStatus> {
    let credentials = &state.config.credentials;
    Json(HealthStatus {
        status: "healthy".to_string(),
        api_keys_configured: ApiKeysConfigured {
            openai: credentials.openai_configured(),
            tavily: credentials.tavily_configured(),
        },
    })
}

/// Replace responses whose body is larger than the configured limit.
async fn cap_response_size(State(limit): State<usize>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    let too_large = response
        .body()
        .size_hint()
        .upper()
        .is_some_and(|len| len > limit as u64);
    if too_large {
        tracing::error!(
            limit_bytes = limit,
            "Response body exceeds the transport limit, replacing with an error"
        );
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "Response too large" })),
        )
            .into_response();
    }
    response
}

async fn count_requests(
    State(lifecycle): State<Arc<Lifecycle>>,
    req: Request,
    next: Next,
) -> Response {
    lifecycle.record_request();
    next.run(req).await
}

/// Build the application router with all transport limits applied
pub fn build_router(state: HttpState) -> Router {
    let config = Arc::clone(&state.config);
    let server = &config.server;
    let index = server.static_dir.join("index.html");

    Router::new()
        .route("/research", post(research_handler))
        .route("/health", get(health_handler))
        .route_service("/", ServeFile::new(index))
        .nest_service("/static", ServeDir::new(&server.static_dir))
        .layer(DefaultBodyLimit::max(server.max_body_bytes))
        .layer(middleware::from_fn_with_state(
            server.max_body_bytes,
            cap_response_size,
        ))
        .layer(GlobalConcurrencyLimitLayer::new(server.max_concurrency))
        .layer(middleware::from_fn_with_state(
            state.lifecycle.clone(),
            count_requests,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
