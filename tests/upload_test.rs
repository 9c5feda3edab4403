use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use filedrop::config::StorageConfig;
use filedrop::services::space::FixedSpaceProbe;
use filedrop::utils::hash::calculate_hash;
use filedrop::{AppState, create_app};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "---------------------------123456789012345678901234567";

fn setup_app(limit: u64) -> (TempDir, Router) {
    let _ = tracing_subscriber::fmt::try_init();
    let dir = TempDir::new().unwrap();
    let state = AppState::new(StorageConfig::with_root(dir.path(), limit));
    (dir, create_app(state))
}

fn multipart_request(filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
        Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
        Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn stored_names(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_upload_flow_end_to_end() {
    let (dir, app) = setup_app(10);

    // 1. First upload keeps its name
    let (status, json) = send(&app, multipart_request("note.txt", b"hello")).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["filename"], "note.txt");
    assert_eq!(json["bytes"], 5);
    assert_eq!(json["size_human"], "5.00 B");
    assert_eq!(json["sha256"], calculate_hash(b"hello"));

    // 2. Same name gets a disambiguator
    let (status, json) = send(&app, multipart_request("note.txt", b"world")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["filename"], "note (1).txt");

    // 3. Over the ceiling: rejected, nothing left behind
    let (status, json) = send(&app, multipart_request("big.bin", b"01234567890")).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(json["error"].as_str().unwrap().contains("10 bytes"));

    // 4. Listing shows the two committed files
    let (status, json) = send(
        &app,
        Request::builder()
            .uri("/api/list")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let files = json["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["name"], "note (1).txt");
    assert_eq!(files[1]["name"], "note.txt");
    assert!(files.iter().all(|f| f["bytes"] == 5));

    assert_eq!(stored_names(&dir), vec!["note (1).txt", "note.txt"]);
}

#[tokio::test]
async fn test_hash_endpoint_matches_upload_digest() {
    let (_dir, app) = setup_app(0);
    let content: Vec<u8> = (0..200 * 1024).map(|i| (i % 253) as u8).collect();

    for _ in 0..2 {
        let (status, uploaded) = send(&app, multipart_request("scan.pdf", &content)).await;
        assert_eq!(status, StatusCode::OK, "{uploaded}");
        let name = uploaded["filename"].as_str().unwrap();

        let (status, hashed) = send(
            &app,
            Request::builder()
                .uri(format!("/api/hash/{}", name.replace(' ', "%20")))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{hashed}");
        assert_eq!(hashed["name"], uploaded["filename"]);
        assert_eq!(hashed["sha256"], uploaded["sha256"]);

        let (_, listing) = send(
            &app,
            Request::builder()
                .uri("/api/list")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        let entry = listing["files"]
            .as_array()
            .unwrap()
            .iter()
            .find(|f| f["name"] == uploaded["filename"])
            .unwrap();
        assert_eq!(entry["bytes"], uploaded["bytes"]);
    }
}

#[tokio::test]
async fn test_exact_limit_is_accepted() {
    let (_dir, app) = setup_app(10);
    let (status, json) = send(&app, multipart_request("ten.bin", b"0123456789")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["bytes"], 10);
}

#[tokio::test]
async fn test_third_upload_gets_second_suffix() {
    let (_dir, app) = setup_app(0);
    for expected in ["a.tar.gz", "a.tar (1).gz", "a.tar (2).gz"] {
        let (status, json) = send(&app, multipart_request("a.tar.gz", b"x")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["filename"], expected);
    }
}

#[tokio::test]
async fn test_declared_size_header_rejects_early() {
    let (dir, app) = setup_app(10);
    let mut request = multipart_request("small.txt", b"tiny");
    request
        .headers_mut()
        .insert("x-file-size", "1000".parse().unwrap());

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(stored_names(&dir).is_empty());
}

#[tokio::test]
async fn test_missing_file_field() {
    let (_dir, app) = setup_app(0);
    let body = format!(
        "--{BOUNDARY}\r\n\
        Content-Disposition: form-data; name=\"comment\"\r\n\r\n\
        no file here\r\n\
        --{BOUNDARY}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No file provided");
}

#[tokio::test]
async fn test_insufficient_space_is_distinct_from_too_large() {
    let _ = tracing_subscriber::fmt::try_init();
    let dir = TempDir::new().unwrap();
    let mut config = StorageConfig::with_root(dir.path(), 0);
    config.safety_margin = 4096;
    let state = AppState::with_probe(config, Arc::new(FixedSpaceProbe(1024)));
    let app = create_app(state);

    let (status, json) = send(&app, multipart_request("a.bin", b"abc")).await;
    assert_eq!(status, StatusCode::INSUFFICIENT_STORAGE);
    assert!(json["error"].as_str().unwrap().contains("Insufficient storage"));
    assert!(stored_names(&dir).is_empty());
}

#[tokio::test]
async fn test_raw_put_upload_uses_content_length() {
    let (dir, app) = setup_app(10);

    let request = Request::builder()
        .method("PUT")
        .uri("/api/upload/raw.bin")
        .header("Content-Length", "4")
        .body(Body::from(&b"data"[..]))
        .unwrap();
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["filename"], "raw.bin");
    assert_eq!(json["sha256"], calculate_hash(b"data"));

    let request = Request::builder()
        .method("PUT")
        .uri("/api/upload/huge.bin")
        .header("Content-Length", "20")
        .body(Body::from(vec![0u8; 20]))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    assert_eq!(stored_names(&dir), vec!["raw.bin"]);
}

#[tokio::test]
async fn test_large_upload_spans_many_chunks() {
    let (_dir, app) = setup_app(0);
    let data: Vec<u8> = (0..3 * 1024 * 1024u32).map(|i| (i % 253) as u8).collect();

    let (status, json) = send(&app, multipart_request("large.bin", &data)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["bytes"], data.len());
    assert_eq!(json["size_human"], "3.00 MB");
    assert_eq!(json["sha256"], calculate_hash(&data));
}
