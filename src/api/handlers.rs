//! API request handlers.
//!
//! All handlers return `Result<impl IntoResponse, ResmanError>` so that
//! errors are converted to appropriate HTTP status codes via the
//! `IntoResponse` implementation on `ResmanError`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::{ApiResponse, AppState, AuthedActor};
use crate::error::ResmanError;
use crate::model::{ResourceChanges, ResourceDraft};

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

pub async fn list_resources(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ResmanError> {
    let resources = state.pipeline.list().await?;
    Ok(Json(ApiResponse::success(resources)))
}

pub async fn get_resource(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ResmanError> {
    let resource = state.pipeline.get(id).await?;
    Ok(Json(ApiResponse::success(resource)))
}

pub async fn create_resource(
    State(state): State<AppState>,
    AuthedActor(actor): AuthedActor,
    Json(draft): Json<ResourceDraft>,
) -> Result<impl IntoResponse, ResmanError> {
    let resource = state.pipeline.create(draft, actor).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(resource))))
}

pub async fn update_resource(
    State(state): State<AppState>,
    AuthedActor(actor): AuthedActor,
    Path(id): Path<Uuid>,
    Json(changes): Json<ResourceChanges>,
) -> Result<impl IntoResponse, ResmanError> {
    let resource = state.pipeline.update(id, changes, actor).await?;
    Ok(Json(ApiResponse::success(resource)))
}

pub async fn delete_resource(
    State(state): State<AppState>,
    AuthedActor(actor): AuthedActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ResmanError> {
    // Capability check belongs to the calling layer, not the pipeline.
    if !actor.is_admin() {
        return Err(ResmanError::forbidden(
            "Only administrators may delete resources",
        ));
    }

    state.pipeline.delete(id, actor).await?;
    Ok(StatusCode::NO_CONTENT)
}
