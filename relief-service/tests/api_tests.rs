//! Integration tests for the HTTP API.

use axum::http::StatusCode;
use axum_test::TestServer;
use relief::{RegionLoader, TilesetDescriptor};
use relief_service::{router, AppState};
use serde_json::Value;
use std::fs::File;
use std::sync::Arc;
use tempfile::TempDir;

const POINTS: usize = 40;

/// Create a single 40x40 tile at resolution 1 holding a cone peaking at
/// (10, 10) with height 100 and a higher cone peaking at (30, 30) with
/// height 200.
fn create_tileset(dir: &std::path::Path) -> TilesetDescriptor {
    let descriptor = TilesetDescriptor {
        tiles_folder: dir.to_path_buf(),
        min: [0.0, 0.0],
        max: [POINTS as f64, POINTS as f64],
        tile_resolution: [1.0, 1.0],
        points_per_tile: [POINTS, POINTS],
        no_data: -9999.0,
        sea_value: 0.5,
        sea_level: 0.0,
    };

    let mut samples = Vec::with_capacity(POINTS * POINTS);
    for i in 0..POINTS {
        for j in 0..POINTS {
            let (x, y) = (j as f64, (POINTS - 1 - i) as f64);
            let low = 100.0 - 2.0 * (x - 10.0).hypot(y - 10.0);
            let high = 200.0 - 8.0 * (x - 30.0).hypot(y - 30.0);
            samples.push(low.max(high).max(1.0) as f32);
        }
    }

    let mut file = File::create(descriptor.tile_path(0, 0)).unwrap();
    relief::tile::write_tile(&mut file, POINTS as u32, POINTS as u32, &samples).unwrap();

    descriptor
}

/// Create a test server over the two-cone tileset.
fn create_test_server(temp_dir: &TempDir) -> TestServer {
    let loader = RegionLoader::new(create_tileset(temp_dir.path()), 10);
    let state = Arc::new(AppState { loader });

    TestServer::new(router(state)).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_test_server(&temp_dir);

    let response = server.get("/health").await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].as_str().is_some());
}

#[tokio::test]
async fn test_statistics_endpoint() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_test_server(&temp_dir);

    let response = server.get("/statistics?x=10&y=10&radius=3").await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["max"]["height"], 100.0);
    assert_eq!(json["max"]["x"], 10.0);
    assert_eq!(json["max"]["y"], 10.0);
    assert_eq!(json["min"]["height"], 94.0);
    assert!(json["count"].as_u64().unwrap() > 20);
    assert!(json["mean"].as_f64().unwrap() < 100.0);
}

#[tokio::test]
async fn test_statistics_outside_dataset() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_test_server(&temp_dir);

    let response = server.get("/statistics?x=500&y=500&radius=5").await;

    response.assert_status(StatusCode::NOT_FOUND);
    let json: Value = response.json();
    assert!(json["error"].as_str().unwrap().contains("No data"));
}

#[tokio::test]
async fn test_statistics_invalid_radius() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_test_server(&temp_dir);

    let response = server.get("/statistics?x=10&y=10&radius=-2").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_params() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_test_server(&temp_dir);

    let response = server.get("/statistics?x=10").await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server.get("/isolation").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_isolation_endpoint() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_test_server(&temp_dir);

    let response = server.get("/isolation?x=10&y=10&extent=40").await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["height"], 100.0);
    assert!(json["distance"].as_f64().unwrap() > 0.0);
    assert!(json["point"]["height"].as_f64().unwrap() > 100.0);
}

#[tokio::test]
async fn test_isolation_highest_summit() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_test_server(&temp_dir);

    let response = server.get("/isolation?x=30&y=30&extent=40").await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["height"], 200.0);
    assert!(json["distance"].is_null());
    assert!(json["point"].is_null());
}

#[tokio::test]
async fn test_isolation_region_too_large() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_test_server(&temp_dir);

    // the default extent covers 20001 x 20001 cells at resolution 1
    let response = server.get("/isolation?x=10&y=10").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_openness_endpoint() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_test_server(&temp_dir);

    let response = server.get("/openness?x=30&y=30&radius=5").await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["radius"], 5.0);
    assert!(json["openness"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_survey_endpoint() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_test_server(&temp_dir);

    let response = server
        .get("/survey?x=11&y=9&reference_radius=3&radii=1,25")
        .await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["reference"]["x"], 10.0);
    assert_eq!(json["reference"]["y"], 10.0);
    assert_eq!(json["reference"]["height"], 100.0);

    let rings = json["rings"].as_array().unwrap();
    assert_eq!(rings.len(), 2);
    assert_eq!(rings[0]["radius"], 1.0);
    assert_eq!(rings[0]["max"], 100.0);
    assert_eq!(rings[0]["min"], 98.0);

    assert!(json["isolation"].as_f64().unwrap() > 3.0);
}

#[tokio::test]
async fn test_survey_invalid_radii() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_test_server(&temp_dir);

    let response = server.get("/survey?x=10&y=10&radii=1,far").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert!(json["error"].as_str().unwrap().contains("far"));
}

#[tokio::test]
async fn test_cache_endpoint() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_test_server(&temp_dir);

    let response = server.get("/cache").await;
    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["cached_tiles"], 0);
    assert_eq!(json["capacity"], 10);
    assert_eq!(json["cache_misses"], 0);

    // First query decodes the tile
    server.get("/statistics?x=10&y=10&radius=3").await;

    let response = server.get("/cache").await;
    let json: Value = response.json();
    assert_eq!(json["cached_tiles"], 1);
    assert_eq!(json["cache_misses"], 1);
    assert_eq!(json["missing_tiles"], 0);

    // Second query hits the cache
    server.get("/openness?x=10&y=10&radius=3").await;

    let response = server.get("/cache").await;
    let json: Value = response.json();
    assert_eq!(json["cache_hits"], 1);
    assert_eq!(json["cache_misses"], 1);
}

#[tokio::test]
async fn test_openapi_document() {
    let temp_dir = TempDir::new().unwrap();
    let server = create_test_server(&temp_dir);

    let response = server.get("/api-docs/openapi.json").await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert!(json["paths"]["/survey"].is_object());
    assert!(json["paths"]["/isolation"].is_object());
}
