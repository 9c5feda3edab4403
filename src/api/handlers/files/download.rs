use crate::api::error::AppError;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use tokio_util::io::ReaderStream;

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name.
pub fn content_disposition(filename: &str) -> String {
    let ascii_filename = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .collect::<String>();
    let fallback_filename = if ascii_filename.is_empty() {
        "file"
    } else {
        &ascii_filename
    };

    let encoded_filename = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback_filename, encoded_filename
    )
}

#[utoipa::path(
    get,
    path = "/api/download/{name}",
    params(
        ("name" = String, Path, description = "Stored file name")
    ),
    responses(
        (status = 200, description = "File content stream", body = Vec<u8>, content_type = "application/octet-stream"),
        (status = 404, description = "File not found")
    ),
    tag = "files"
)]
pub async fn download_file(
    State(state): State<crate::AppState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let found = state.catalog.retrieve(&name).await?;
    tracing::info!("📤 Serving '{}' ({} bytes)", found.name, found.size_bytes);

    let body = Body::from_stream(ReaderStream::with_capacity(
        found.file,
        state.config.chunk_size(),
    ));

    let mut response = (
        [
            (
                header::CONTENT_TYPE,
                mime::APPLICATION_OCTET_STREAM.to_string(),
            ),
            (header::CONTENT_DISPOSITION, content_disposition(&found.name)),
        ],
        body,
    )
        .into_response();

    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, HeaderValue::from(found.size_bytes));

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("note (1).txt"),
            "attachment; filename=\"note (1).txt\"; filename*=UTF-8''note%20%281%29%2Etxt"
        );
    }

    #[test]
    fn test_content_disposition_unicode_fallback() {
        let cd = content_disposition("ñ.pdf");
        assert!(cd.starts_with("attachment; filename=\".pdf\""));
        assert!(cd.ends_with("filename*=UTF-8''%C3%B1%2Epdf"));

        let cd = content_disposition("日本");
        assert!(cd.starts_with("attachment; filename=\"file\""));
    }
}
