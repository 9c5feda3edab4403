use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use filedrop::config::StorageConfig;
use filedrop::utils::hash::calculate_hash;
use filedrop::{AppState, create_app};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

fn setup_app() -> (TempDir, Router) {
    let _ = tracing_subscriber::fmt::try_init();
    let dir = TempDir::new().unwrap();
    let state = AppState::new(StorageConfig::with_root(dir.path(), 0));
    (dir, create_app(state))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body.to_vec())
}

#[tokio::test]
async fn test_download_streams_stored_bytes() {
    let (dir, app) = setup_app();
    std::fs::write(dir.path().join("report.pdf"), b"%PDF-1.7 fake").unwrap();

    let (status, headers, body) = get(&app, "/api/download/report.pdf").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"%PDF-1.7 fake");
    assert_eq!(headers[header::CONTENT_TYPE], "application/octet-stream");
    assert_eq!(headers[header::CONTENT_LENGTH], "13");
    assert!(
        headers[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment; filename=\"report.pdf\"")
    );
}

#[tokio::test]
async fn test_download_accepts_echoed_quoted_name() {
    let (dir, app) = setup_app();
    std::fs::write(dir.path().join("note (1).txt"), b"hi").unwrap();

    // %22 = '"', %20 = ' '
    let (status, _, body) = get(&app, "/api/download/%22note%20(1).txt%22").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"hi");
}

#[tokio::test]
async fn test_download_missing_file() {
    let (_dir, app) = setup_app();
    let (status, _, body) = get(&app, "/api/download/nope.txt").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "File 'nope.txt' not found");
}

#[tokio::test]
async fn test_hash_matches_and_is_repeatable() {
    let (dir, app) = setup_app();
    std::fs::write(dir.path().join("data.bin"), b"payload").unwrap();

    let (status, _, first) = get(&app, "/api/hash/data.bin").await;
    assert_eq!(status, StatusCode::OK);
    let (_, _, second) = get(&app, "/api/hash/data.bin").await;
    assert_eq!(first, second);

    let json: Value = serde_json::from_slice(&first).unwrap();
    assert_eq!(json["name"], "data.bin");
    assert_eq!(json["sha256"], calculate_hash(b"payload"));
}

#[tokio::test]
async fn test_list_is_stable_without_writes() {
    let (dir, app) = setup_app();
    std::fs::write(dir.path().join("b"), b"22").unwrap();
    std::fs::write(dir.path().join("a"), b"1").unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();

    let (_, _, first) = get(&app, "/api/list").await;
    let (_, _, second) = get(&app, "/api/list").await;
    assert_eq!(first, second);

    let json: Value = serde_json::from_slice(&first).unwrap();
    let names: Vec<&str> = json["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[tokio::test]
async fn test_health_reports_storage() {
    let (_dir, app) = setup_app();
    let (status, headers, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key("x-request-id"));

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["storage"], "available");
    assert!(json["available_bytes"].as_u64().unwrap() > 0);
    assert_eq!(json["reserved_bytes"], 0);
}
