use crate::api::error::AppError;
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderMap, header},
};
use futures::TryStreamExt;
use std::time::Duration;
use tokio_util::io::StreamReader;

use super::types::*;

/// Optional declared size of the file part of a multipart upload.
pub const FILE_SIZE_HEADER: &str = "x-file-size";

/// Bytes read past a rejection so the client sees the error instead of a reset.
const MAX_DRAIN_BYTES: u64 = 16 * 1024 * 1024;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, PartialEq, Eq)]
enum Drain {
    Complete,
    Capped,
    TimedOut,
}

/// Discards what is left of a rejected form, giving up after `max_bytes` or
/// `timeout`, whichever comes first.
async fn drain_remaining(multipart: &mut Multipart, max_bytes: u64, timeout: Duration) -> Drain {
    let mut drained: u64 = 0;
    let consume = async {
        while let Ok(Some(mut field)) = multipart.next_field().await {
            while let Ok(Some(chunk)) = field.chunk().await {
                drained += chunk.len() as u64;
                if drained > max_bytes {
                    return Drain::Capped;
                }
            }
        }
        Drain::Complete
    };
    let outcome = tokio::time::timeout(timeout, consume)
        .await
        .unwrap_or(Drain::TimedOut);

    if outcome != Drain::Complete {
        tracing::debug!(
            "Stopped draining rejected upload after {} bytes ({:?})",
            drained,
            outcome
        );
    }
    outcome
}

fn header_u64(headers: &HeaderMap, name: impl header::AsHeaderName) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content = Multipart, description = "File upload"),
    params(
        ("x-file-size" = Option<u64>, Header, description = "Declared size of the file in bytes")
    ),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file provided or malformed form"),
        (status = 413, description = "File exceeds the configured size limit"),
        (status = 507, description = "Not enough free space on the storage volume")
    ),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<crate::AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let declared_size = header_u64(&headers, FILE_SIZE_HEADER);

    let result: Result<Json<UploadResponse>, AppError> = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            if field.name() != Some("file") {
                continue;
            }

            let filename = field.file_name().unwrap_or_default().to_string();
            let reader = StreamReader::new(field.map_err(std::io::Error::other));

            let stored = state
                .ingest
                .ingest(&filename, declared_size, reader)
                .await?;
            return Ok(Json(stored.into()));
        }

        Err(AppError::BadRequest("No file provided".to_string()))
    }
    .await;

    match result {
        Ok(res) => Ok(res),
        Err(e) => {
            // Consume the remaining multipart stream to avoid a TCP reset on the client
            tracing::warn!("Upload failed: {}. Consuming remaining stream...", e);
            drain_remaining(&mut multipart, MAX_DRAIN_BYTES, DRAIN_TIMEOUT).await;
            Err(e)
        }
    }
}

#[utoipa::path(
    put,
    path = "/api/upload/{name}",
    params(
        ("name" = String, Path, description = "Requested file name")
    ),
    request_body(content = Vec<u8>, description = "Raw file bytes", content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 413, description = "File exceeds the configured size limit"),
        (status = 507, description = "Not enough free space on the storage volume")
    ),
    tag = "files"
)]
pub async fn upload_raw(
    State(state): State<crate::AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<UploadResponse>, AppError> {
    let declared_size = header_u64(&headers, header::CONTENT_LENGTH);
    let reader = StreamReader::new(body.into_data_stream().map_err(std::io::Error::other));

    let stored = state.ingest.ingest(&name, declared_size, reader).await?;
    Ok(Json(stored.into()))
}
