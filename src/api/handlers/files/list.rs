use crate::api::error::AppError;
use axum::{Json, extract::State};

use super::types::*;

#[utoipa::path(
    get,
    path = "/api/list",
    responses(
        (status = 200, description = "Stored files sorted by name", body = ListResponse)
    ),
    tag = "files"
)]
pub async fn list_files(
    State(state): State<crate::AppState>,
) -> Result<Json<ListResponse>, AppError> {
    let entries = state.catalog.list().await?;
    Ok(Json(ListResponse {
        files: entries.into_iter().map(FileEntry::from).collect(),
    }))
}
