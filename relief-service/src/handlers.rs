//! HTTP request handlers for the terrain analysis service.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use relief::{GridPoint, HeightGrid, IsolationParams, RegionLoader, ReliefError, SurveyParams};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::AppState;

/// Largest region a single request may load.
pub const MAX_REGION_CELLS: usize = 64_000_000;

/// Default half-size of the region searched for higher ground.
pub const DEFAULT_ISOLATION_EXTENT: f64 = 10_000.0;

fn default_radius() -> f64 {
    1000.0
}

fn default_extent() -> f64 {
    DEFAULT_ISOLATION_EXTENT
}

fn default_reference_radius() -> f64 {
    100.0
}

/// Query parameters for the statistics and openness endpoints.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RadiusQuery {
    /// X coordinate in tileset units.
    pub x: f64,
    /// Y coordinate in tileset units.
    pub y: f64,
    /// Disk radius (default 1000).
    #[serde(default = "default_radius")]
    pub radius: f64,
    /// Grid resolution (defaults to the tileset resolution).
    pub resolution: Option<f64>,
}

/// Query parameters for the isolation endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IsolationQuery {
    /// X coordinate in tileset units.
    pub x: f64,
    /// Y coordinate in tileset units.
    pub y: f64,
    /// Half-size of the region searched (default 10000).
    #[serde(default = "default_extent")]
    pub extent: f64,
    /// Higher ground closer than this is ignored.
    #[serde(default)]
    pub min_distance: f64,
    /// Area of higher ground required to stop the search.
    #[serde(default)]
    pub clear_area: f64,
    /// Offset added to the point height.
    #[serde(default)]
    pub height_offset: f32,
    /// Grid resolution (defaults to the tileset resolution).
    pub resolution: Option<f64>,
}

/// Query parameters for the survey endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SurveyQuery {
    /// X coordinate in tileset units.
    pub x: f64,
    /// Y coordinate in tileset units.
    pub y: f64,
    /// Radius searched for the reference summit (default 100).
    #[serde(default = "default_reference_radius")]
    pub reference_radius: f64,
    /// Comma separated statistics radii (default 100,200,1000,5000,25000).
    pub radii: Option<String>,
}

/// A grid sample.
#[derive(Debug, Serialize, ToSchema)]
pub struct PointResponse {
    pub x: f64,
    pub y: f64,
    pub height: f32,
}

impl From<GridPoint> for PointResponse {
    fn from(p: GridPoint) -> Self {
        Self {
            x: p.x,
            y: p.y,
            height: p.height,
        }
    }
}

/// Height statistics within a disk.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatisticsResponse {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    /// Number of valid samples in the disk.
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: PointResponse,
    pub max: PointResponse,
}

/// Isolation of a point.
#[derive(Debug, Serialize, ToSchema)]
pub struct IsolationResponse {
    pub x: f64,
    pub y: f64,
    /// Height of the query cell.
    pub height: f32,
    /// Distance to the higher ground, absent when none was found.
    pub distance: Option<f64>,
    /// The higher ground that ended the search.
    pub point: Option<PointResponse>,
}

/// Openness score of a point.
#[derive(Debug, Serialize, ToSchema)]
pub struct OpennessResponse {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    /// 0 on flat ground, growing with the exposure of the point.
    pub openness: f64,
}

/// Statistics around the reference summit at one radius.
#[derive(Debug, Serialize, ToSchema)]
pub struct RingResponse {
    pub radius: f64,
    /// Absent when the ring holds no data.
    pub mean: Option<f64>,
    pub min: Option<f32>,
    pub max: Option<f32>,
}

/// Multi-radius survey of a point.
#[derive(Debug, Serialize, ToSchema)]
pub struct SurveyResponse {
    pub x: f64,
    pub y: f64,
    /// Highest sample within the reference radius.
    pub reference: PointResponse,
    pub rings: Vec<RingResponse>,
    /// Isolation of the reference summit.
    pub isolation: Option<f64>,
}

/// Error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

/// Tile cache statistics response.
#[derive(Debug, Serialize, ToSchema)]
pub struct CacheResponse {
    /// Number of decoded tiles in cache.
    pub cached_tiles: u64,
    /// Maximum number of cached tiles.
    pub capacity: u64,
    /// Cache hit count.
    pub cache_hits: u64,
    /// Cache miss count.
    pub cache_misses: u64,
    /// Lookups of tiles absent from disk.
    pub missing_tiles: u64,
    /// Cache hit rate (0.0 to 1.0).
    pub hit_rate: f64,
}

/// Load the square `(x, y) ± extent` with the far edge included.
fn load_around(
    loader: &RegionLoader,
    x: f64,
    y: f64,
    extent: f64,
    resolution: Option<f64>,
) -> relief::Result<HeightGrid> {
    let res = match resolution {
        Some(r) => [r, r],
        None => loader.descriptor().tile_resolution,
    };

    let cells = ((2.0 * extent / res[0]).ceil() + 1.0) * ((2.0 * extent / res[1]).ceil() + 1.0);
    if !cells.is_finite() || cells > MAX_REGION_CELLS as f64 {
        return Err(ReliefError::InvalidRegion {
            reason: format!("more than {} cells requested", MAX_REGION_CELLS),
        });
    }

    loader.load_region(
        [x - extent, y - extent],
        [x + extent + res[0], y + extent + res[1]],
        res,
    )
}

fn parse_radii(radii: Option<&str>) -> Result<Vec<f64>, String> {
    match radii {
        None => Ok(SurveyParams::default().radii),
        Some(list) => list
            .split(',')
            .map(|r| {
                r.trim()
                    .parse::<f64>()
                    .map_err(|_| format!("invalid radius '{}'", r.trim()))
            })
            .collect(),
    }
}

/// Create an error response for analysis queries.
fn error_response(x: f64, y: f64, e: ReliefError) -> Response {
    let status = match &e {
        ReliefError::OutOfBounds { .. } | ReliefError::InvalidRegion { .. } => {
            StatusCode::BAD_REQUEST
        }
        ReliefError::NoDataAtPoint { .. } | ReliefError::NoDataInRadius { .. } => {
            StatusCode::NOT_FOUND
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    tracing::warn!(x = x, y = y, error = %e, "Terrain query failed");

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

/// Run a terrain job on the blocking thread pool, mapping failures to error
/// responses.
async fn run_blocking<T, F>(state: &Arc<AppState>, x: f64, y: f64, job: F) -> Result<T, Response>
where
    F: FnOnce(&RegionLoader) -> relief::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    match tokio::task::spawn_blocking(move || job(&state.loader)).await {
        Ok(result) => result.map_err(|e| error_response(x, y, e)),
        Err(e) => {
            tracing::error!(x = x, y = y, error = %e, "Terrain task failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("terrain task failed: {}", e),
                }),
            )
                .into_response())
        }
    }
}

/// Height statistics within a radius of a point.
#[utoipa::path(
    get,
    path = "/statistics",
    params(RadiusQuery),
    responses(
        (status = 200, description = "Statistics computed", body = StatisticsResponse),
        (status = 400, description = "Invalid point or region", body = ErrorResponse),
        (status = 404, description = "No data in the disk", body = ErrorResponse)
    ),
    tag = "analysis"
)]
pub async fn get_statistics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RadiusQuery>,
) -> Response {
    let RadiusQuery {
        x,
        y,
        radius,
        resolution,
    } = query;
    tracing::debug!(x = x, y = y, radius = radius, "Statistics query");

    let job = move |loader: &RegionLoader| {
        load_around(loader, x, y, radius, resolution)?.radial_statistics(x, y, radius)
    };
    let stats = match run_blocking(&state, x, y, job).await {
        Ok(stats) => stats,
        Err(response) => return response,
    };

    (
        StatusCode::OK,
        Json(StatisticsResponse {
            x,
            y,
            radius,
            count: stats.count,
            mean: stats.mean,
            std_dev: stats.std_dev,
            min: stats.min_point.into(),
            max: stats.max_point.into(),
        }),
    )
        .into_response()
}

/// Distance from a point to the nearest higher ground.
#[utoipa::path(
    get,
    path = "/isolation",
    params(IsolationQuery),
    responses(
        (status = 200, description = "Isolation computed", body = IsolationResponse),
        (status = 400, description = "Invalid point or region", body = ErrorResponse),
        (status = 404, description = "No data at the point", body = ErrorResponse)
    ),
    tag = "analysis"
)]
pub async fn get_isolation(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IsolationQuery>,
) -> Response {
    let (x, y, extent, resolution) = (query.x, query.y, query.extent, query.resolution);
    tracing::debug!(x = x, y = y, extent = extent, "Isolation query");

    let params = IsolationParams {
        min_distance: query.min_distance,
        min_clear_area: query.clear_area,
        height_offset: query.height_offset,
    };
    let job = move |loader: &RegionLoader| -> relief::Result<_> {
        let grid = load_around(loader, x, y, extent, resolution)?;
        let height = grid.valid_height_at(x, y)?;
        let isolation = grid.isolation_at(x, y, &params)?;
        Ok((height, isolation))
    };
    let (height, isolation) = match run_blocking(&state, x, y, job).await {
        Ok(found) => found,
        Err(response) => return response,
    };

    (
        StatusCode::OK,
        Json(IsolationResponse {
            x,
            y,
            height,
            distance: isolation.map(|iso| iso.distance),
            point: isolation.map(|iso| iso.point.into()),
        }),
    )
        .into_response()
}

/// Openness score of a point.
#[utoipa::path(
    get,
    path = "/openness",
    params(RadiusQuery),
    responses(
        (status = 200, description = "Openness computed", body = OpennessResponse),
        (status = 400, description = "Invalid point or region", body = ErrorResponse),
        (status = 404, description = "No data at the point", body = ErrorResponse)
    ),
    tag = "analysis"
)]
pub async fn get_openness(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RadiusQuery>,
) -> Response {
    let RadiusQuery {
        x,
        y,
        radius,
        resolution,
    } = query;
    tracing::debug!(x = x, y = y, radius = radius, "Openness query");

    let job = move |loader: &RegionLoader| {
        load_around(loader, x, y, radius, resolution)?.openness_score(x, y, radius)
    };
    let openness = match run_blocking(&state, x, y, job).await {
        Ok(openness) => openness,
        Err(response) => return response,
    };

    (
        StatusCode::OK,
        Json(OpennessResponse {
            x,
            y,
            radius,
            openness,
        }),
    )
        .into_response()
}

/// Multi-radius survey around the summit nearest to a point.
#[utoipa::path(
    get,
    path = "/survey",
    params(SurveyQuery),
    responses(
        (status = 200, description = "Point surveyed", body = SurveyResponse),
        (status = 400, description = "Invalid parameters", body = ErrorResponse),
        (status = 404, description = "No data near the point", body = ErrorResponse)
    ),
    tag = "analysis"
)]
pub async fn get_survey(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SurveyQuery>,
) -> Response {
    tracing::debug!(x = query.x, y = query.y, "Survey query");

    let radii = match parse_radii(query.radii.as_deref()) {
        Ok(radii) => radii,
        Err(error) => {
            return (StatusCode::BAD_REQUEST, Json(ErrorResponse { error })).into_response()
        }
    };
    let params = SurveyParams {
        reference_radius: query.reference_radius,
        radii,
    };

    let res = state.loader.descriptor().tile_resolution;
    let extent = params.extent();
    let cells = (2.0 * extent / res[0]).ceil() * (2.0 * extent / res[1]).ceil();
    if !cells.is_finite() || cells > MAX_REGION_CELLS as f64 {
        return error_response(
            query.x,
            query.y,
            ReliefError::InvalidRegion {
                reason: format!("more than {} cells requested", MAX_REGION_CELLS),
            },
        );
    }

    let (x, y) = (query.x, query.y);
    let job = move |loader: &RegionLoader| {
        relief::survey_point(loader, x, y, &params).map(|survey| (survey, params.radii))
    };
    let (survey, radii) = match run_blocking(&state, x, y, job).await {
        Ok(surveyed) => surveyed,
        Err(response) => return response,
    };

    let rings = radii
        .iter()
        .zip(&survey.rings)
        .map(|(&radius, ring)| RingResponse {
            radius,
            mean: ring.map(|r| r.mean),
            min: ring.map(|r| r.min),
            max: ring.map(|r| r.max),
        })
        .collect();

    (
        StatusCode::OK,
        Json(SurveyResponse {
            x: survey.x,
            y: survey.y,
            reference: survey.reference.into(),
            rings,
            isolation: survey.isolation.map(|iso| iso.distance),
        }),
    )
        .into_response()
}

/// Health check endpoint.
///
/// Returns service status and version.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse)),
    tag = "system"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get tile cache statistics.
#[utoipa::path(
    get,
    path = "/cache",
    responses((status = 200, description = "Cache statistics", body = CacheResponse)),
    tag = "system"
)]
pub async fn get_cache(State(state): State<Arc<AppState>>) -> Json<CacheResponse> {
    let stats = state.loader.cache_stats();

    Json(CacheResponse {
        cached_tiles: stats.entry_count,
        capacity: state.loader.cache_capacity(),
        cache_hits: stats.hit_count,
        cache_misses: stats.miss_count,
        missing_tiles: stats.missing_count,
        hit_rate: stats.hit_rate(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radius_query_defaults() {
        let query: RadiusQuery = serde_json::from_str(r#"{"x": 440000.5, "y": 4480000}"#).unwrap();
        assert_eq!(query.x, 440000.5);
        assert_eq!(query.radius, 1000.0);
        assert!(query.resolution.is_none());
    }

    #[test]
    fn test_isolation_query_defaults() {
        let query: IsolationQuery = serde_json::from_str(r#"{"x": 1, "y": 2}"#).unwrap();
        assert_eq!(query.extent, DEFAULT_ISOLATION_EXTENT);
        assert_eq!(query.min_distance, 0.0);
        assert_eq!(query.height_offset, 0.0);
    }

    #[test]
    fn test_parse_radii() {
        assert_eq!(parse_radii(None).unwrap(), SurveyParams::default().radii);
        assert_eq!(parse_radii(Some("50, 500")).unwrap(), vec![50.0, 500.0]);
        assert!(parse_radii(Some("50,wide")).is_err());
    }

    fn empty_state() -> Arc<AppState> {
        let descriptor = relief::TilesetDescriptor {
            tiles_folder: std::env::temp_dir().join("relief-no-tiles"),
            min: [0.0, 0.0],
            max: [10.0, 10.0],
            tile_resolution: [1.0, 1.0],
            points_per_tile: [10, 10],
            no_data: -9999.0,
            sea_value: 0.5,
            sea_level: 0.0,
        };
        Arc::new(AppState {
            loader: RegionLoader::new(descriptor, 1),
        })
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_jobs_run_off_the_runtime_thread() {
        let state = empty_state();
        let caller = std::thread::current().id();

        let worker = run_blocking(&state, 0.0, 0.0, |_| Ok(std::thread::current().id()))
            .await
            .ok()
            .unwrap();
        assert_ne!(worker, caller);
    }

    #[tokio::test]
    async fn test_job_errors_map_to_status() {
        let state = empty_state();

        let response = run_blocking(&state, 1.0, 2.0, |_| -> relief::Result<()> {
            Err(ReliefError::NoDataAtPoint { x: 1.0, y: 2.0 })
        })
        .await
        .err()
        .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = run_blocking(&state, 1.0, 2.0, |_| -> relief::Result<()> {
            panic!("scan aborted")
        })
        .await
        .err()
        .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_isolation_response_serialize() {
        let response = IsolationResponse {
            x: 1.0,
            y: 2.0,
            height: 812.5,
            distance: None,
            point: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("812.5"));
        assert!(json.contains(r#""distance":null"#));
    }
}
