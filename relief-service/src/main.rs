//! Relief Service - HTTP microservice for tiled terrain analysis.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RELIEF_TILESET` | Tileset descriptor file | Required |
//! | `RELIEF_CACHE_SIZE` | Maximum decoded tiles in cache | 64 |
//! | `RELIEF_PORT` | HTTP server port | 8080 |
//! | `RELIEF_PRELOAD` | `all` or `min_x,min_y,max_x,max_y[;...]` | None |
//! | `RUST_LOG` | Log level (e.g., "info", "debug") | "info" |
//!
//! ## Endpoints
//!
//! - `GET /statistics?x=X&y=Y&radius=R` - Height statistics within a radius
//! - `GET /isolation?x=X&y=Y` - Distance to the nearest higher ground
//! - `GET /openness?x=X&y=Y&radius=R` - Openness score
//! - `GET /survey?x=X&y=Y&radii=100,1000` - Multi-radius survey
//! - `GET /health` - Health check
//! - `GET /cache` - Tile cache statistics
//! - `GET /docs` - OpenAPI documentation (Swagger UI)

use std::net::SocketAddr;
use std::sync::Arc;

use relief::RegionLoaderBuilder;
use relief_service::{parse_preload_bounds, router, AppState};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relief=info,relief_service=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port: u16 = std::env::var("RELIEF_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    // RELIEF_TILESET and RELIEF_CACHE_SIZE are read by the library
    let loader = RegionLoaderBuilder::from_env()?.build()?;

    tracing::info!(
        tiles_folder = %loader.descriptor().tiles_folder.display(),
        cache_capacity = loader.cache_capacity(),
        port = port,
        "Starting relief service"
    );

    if let Ok(preload_val) = std::env::var("RELIEF_PRELOAD") {
        let bounds = parse_preload_bounds(&preload_val);
        let bounds_ref = bounds.as_deref();
        tracing::info!(
            bounds = ?bounds_ref.map(|b| b.len()),
            "Preloading tiles into cache"
        );
        let stats = loader.preload(bounds_ref, [1, 1]);
        tracing::info!(
            tiles_loaded = stats.tiles_loaded,
            tiles_already_cached = stats.tiles_already_cached,
            tiles_failed = stats.tiles_failed,
            tiles_matched = stats.tiles_matched,
            elapsed_ms = stats.elapsed_ms,
            "Preload complete"
        );
    }

    let state = Arc::new(AppState { loader });

    let app = router(state).layer(
        ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        ),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
