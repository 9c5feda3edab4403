use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    /// Free bytes on the storage volume, when it could be queried
    pub available_bytes: Option<u64>,
    /// Bytes promised to uploads still in flight
    pub reserved_bytes: u64,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let available = state
        .probe
        .available_space(&state.config.upload_dir)
        .await;

    let (storage_status, available_bytes) = match available {
        Ok(bytes) => ("available", Some(bytes)),
        Err(e) => {
            tracing::warn!("Storage root is not reachable: {}", e);
            ("unavailable", None)
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        storage: storage_status.to_string(),
        available_bytes,
        reserved_bytes: state.ingest.promised_bytes(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
