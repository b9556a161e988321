//! Relief Service Library
//!
//! HTTP handlers, routing and configuration helpers for the terrain analysis
//! service. Used by both the relief-service binary and integration tests.

pub mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};
use relief::{BoundingBox, RegionLoader};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across handlers.
pub struct AppState {
    /// Region loader over the served tileset.
    pub loader: RegionLoader,
}

/// OpenAPI documentation for the relief service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Relief Terrain Service",
        version = "0.1.0",
        description = "REST API for statistics, isolation and openness over tiled height data.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        handlers::get_statistics,
        handlers::get_isolation,
        handlers::get_openness,
        handlers::get_survey,
        handlers::health_check,
        handlers::get_cache,
    ),
    components(
        schemas(
            handlers::PointResponse,
            handlers::StatisticsResponse,
            handlers::IsolationResponse,
            handlers::OpennessResponse,
            handlers::RingResponse,
            handlers::SurveyResponse,
            handlers::ErrorResponse,
            handlers::HealthResponse,
            handlers::CacheResponse,
        )
    ),
    tags(
        (name = "analysis", description = "Terrain analysis endpoints"),
        (name = "system", description = "System and health endpoints")
    )
)]
pub struct ApiDoc;

/// Build the application router without middleware layers.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/statistics", get(handlers::get_statistics))
        .route("/isolation", get(handlers::get_isolation))
        .route("/openness", get(handlers::get_openness))
        .route("/survey", get(handlers::get_survey))
        .route("/health", get(handlers::health_check))
        .route("/cache", get(handlers::get_cache))
        .with_state(state)
}

/// Parse the `RELIEF_PRELOAD` environment variable value into bounding boxes.
///
/// Supported formats:
/// - `true`, `all`, `1`: preload all tiles (returns `None`)
/// - `min_x,min_y,max_x,max_y`: single bounding box
/// - `min_x,min_y,max_x,max_y;min_x,min_y,max_x,max_y`: multiple bounding boxes
pub fn parse_preload_bounds(value: &str) -> Option<Vec<BoundingBox>> {
    let trimmed = value.trim();

    if matches!(trimmed.to_lowercase().as_str(), "true" | "all" | "1") {
        return None;
    }

    let boxes: Vec<BoundingBox> = trimmed
        .split(';')
        .filter_map(|bbox_str| {
            let parts: Vec<f64> = bbox_str
                .split(',')
                .filter_map(|s| s.trim().parse::<f64>().ok())
                .collect();
            if let &[min_x, min_y, max_x, max_y] = parts.as_slice() {
                Some(BoundingBox::new(min_x, min_y, max_x, max_y))
            } else {
                tracing::warn!(
                    bbox = bbox_str,
                    "Invalid bounding box format, expected min_x,min_y,max_x,max_y"
                );
                None
            }
        })
        .collect();

    if boxes.is_empty() {
        tracing::warn!(
            value = trimmed,
            "Could not parse RELIEF_PRELOAD value, preloading all tiles"
        );
        None
    } else {
        Some(boxes)
    }
}

// Re-export commonly used types for convenience
pub use handlers::{
    CacheResponse, ErrorResponse, HealthResponse, IsolationResponse, OpennessResponse,
    StatisticsResponse, SurveyResponse,
};
