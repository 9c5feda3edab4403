pub mod api;
pub mod config;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::StorageConfig;
use crate::services::catalog::CatalogService;
use crate::services::ingest::IngestService;
use crate::services::space::{SpaceProbe, VolumeSpaceProbe};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::files::upload::upload_file,
        api::handlers::files::upload::upload_raw,
        api::handlers::files::list::list_files,
        api::handlers::files::download::download_file,
        api::handlers::files::hash::file_hash,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::files::UploadResponse,
            api::handlers::files::FileEntry,
            api::handlers::files::ListResponse,
            api::handlers::files::HashResponse,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "files", description = "File upload, listing, download and integrity endpoints"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<IngestService>,
    pub catalog: Arc<CatalogService>,
    pub probe: Arc<dyn SpaceProbe>,
    pub config: StorageConfig,
}

impl AppState {
    /// Builds both services over one config, probing the real volume.
    pub fn new(config: StorageConfig) -> Self {
        Self::with_probe(config, Arc::new(VolumeSpaceProbe))
    }

    pub fn with_probe(config: StorageConfig, probe: Arc<dyn SpaceProbe>) -> Self {
        Self {
            ingest: Arc::new(IngestService::new(config.clone(), probe.clone())),
            catalog: Arc::new(CatalogService::new(config.clone())),
            probe,
            config,
        }
    }
}

/// CORS policy for the configured origins. Credentials are allowed unless the
/// list contains `*`, in which case any origin is accepted without them.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/api/upload", post(api::handlers::files::upload_file))
        .route(
            "/api/upload/:name",
            axum::routing::put(api::handlers::files::upload_raw),
        )
        .route("/api/list", get(api::handlers::files::list_files))
        .route(
            "/api/download/:name",
            get(api::handlers::files::download_file),
        )
        .route("/api/hash/:name", get(api::handlers::files::file_hash))
        // Size limits are enforced by the ingestion pipeline while streaming
        .layer(DefaultBodyLimit::disable())
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors)
        .with_state(state)
}
