pub mod api;
pub mod config;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::conversion::ConversionService;
use crate::services::converter::ConversionDispatcher;
use crate::services::download::DownloadService;
use crate::services::lifecycle::LifecycleManager;
use crate::services::staging::StagingArea;
use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::convert::convert_file,
        api::handlers::download::download_file,
        api::handlers::test_upload::test_upload,
        api::handlers::formats::list_formats,
        api::handlers::formats::classify_format,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::convert::ConvertForm,
            api::handlers::convert::ConvertResponse,
            api::handlers::test_upload::FileInfo,
            api::handlers::test_upload::TestUploadResponse,
            api::handlers::formats::FormatResponse,
            api::handlers::formats::IconResponse,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "conversion", description = "Upload, convert and download endpoints"),
        (name = "formats", description = "Supported file types"),
        (name = "diagnostics", description = "Development helpers"),
        (name = "system", description = "Health checks")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub staging: Arc<StagingArea>,
    pub lifecycle: Arc<LifecycleManager>,
    pub conversion: Arc<ConversionService>,
    pub downloads: Arc<DownloadService>,
}

impl AppState {
    /// State backed by the stub converters
    pub fn new(config: AppConfig) -> Self {
        let dispatcher = ConversionDispatcher::stubs(config.delays);
        Self::with_dispatcher(config, dispatcher)
    }

    pub fn with_dispatcher(config: AppConfig, dispatcher: ConversionDispatcher) -> Self {
        let staging = Arc::new(StagingArea::new(
            config.staging.clone(),
            config.max_file_size,
        ));
        let lifecycle = LifecycleManager::new(config.staging.retention);
        let conversion = Arc::new(ConversionService::new(
            staging.clone(),
            dispatcher,
            lifecycle.clone(),
        ));
        let downloads = Arc::new(DownloadService::new(staging.clone(), lifecycle.clone()));

        Self {
            config,
            staging,
            lifecycle,
            conversion,
            downloads,
        }
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origin = if config.allows_any_origin() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any)
}

pub fn create_app(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/api/formats", get(api::handlers::formats::list_formats))
        .route(
            "/api/formats/classify",
            get(api::handlers::formats::classify_format),
        )
        .route("/api/convert", post(api::handlers::convert::convert_file))
        .route(
            "/api/download/:filename",
            get(api::handlers::download::download_file),
        );

    if state.config.enable_test_upload {
        router = router.route(
            "/api/test-upload",
            post(api::handlers::test_upload::test_upload),
        );
    }

    router
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config))
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_file_size + 10 * 1024 * 1024, // Add 10MB buffer for multipart overhead
        ))
        .with_state(state)
}
