//! HTTP surface for the resource service.
//!
//! Routing and request parsing live here, at the edge; the mutation
//! pipeline itself only ever sees validated intents and an already-resolved
//! [`Actor`](crate::model::Actor).

mod auth;
mod handlers;
mod websocket;

pub use auth::{AuthedActor, Claims};

use axum::{
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::pipeline::MutationPipeline;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: MutationPipeline,
    pub jwt_secret: Arc<String>,
    pub metrics: Option<PrometheusHandle>,
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        .route("/ws", get(websocket::ws_handler))
        .route(
            "/api/v1/resources",
            get(handlers::list_resources).post(handlers::create_resource),
        )
        .route(
            "/api/v1/resources/:id",
            get(handlers::get_resource)
                .put(handlers::update_resource)
                .delete(handlers::delete_resource),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// API response wrapper.
#[derive(serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
        }
    }
}
