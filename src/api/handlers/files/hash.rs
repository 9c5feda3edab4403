use crate::api::error::AppError;
use axum::{
    Json,
    extract::{Path, State},
};

use super::types::*;

#[utoipa::path(
    get,
    path = "/api/hash/{name}",
    params(
        ("name" = String, Path, description = "Stored file name")
    ),
    responses(
        (status = 200, description = "SHA-256 of the stored file", body = HashResponse),
        (status = 404, description = "File not found")
    ),
    tag = "files"
)]
pub async fn file_hash(
    State(state): State<crate::AppState>,
    Path(name): Path<String>,
) -> Result<Json<HashResponse>, AppError> {
    let (name, sha256) = state.catalog.hash_of(&name).await?;
    Ok(Json(HashResponse { name, sha256 }))
}
