use anyhow::{Context, Result};
use relief::{GridPoint, IsolationParams};
use serde::Serialize;
use std::path::PathBuf;

use super::{open_loader, resolution_or_native};

pub struct QueryArgs {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub extent: f64,
    pub resolution: Option<f64>,
    pub min_distance: f64,
    pub clear_area: f64,
    pub height_offset: f32,
    pub json: bool,
}

#[derive(Serialize)]
struct PointResponse {
    x: f64,
    y: f64,
    height: f32,
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

#[derive(Serialize)]
struct IsolationResponse {
    distance: f64,
    point: PointResponse,
}

#[derive(Serialize)]
struct QueryResponse {
    x: f64,
    y: f64,
    height: f32,
    radius: f64,
    mean: f64,
    std_dev: f64,
    count: usize,
    min: PointResponse,
    max: PointResponse,
    isolation: Option<IsolationResponse>,
    openness: f64,
}

pub fn run(tileset: Option<PathBuf>, cache_size: u64, args: QueryArgs) -> Result<()> {
    let loader = open_loader(tileset, cache_size)?;
    let resolution = resolution_or_native(&loader, args.resolution);

    let (x, y) = (args.x, args.y);
    let grid = loader
        .load_region(
            [x - args.extent, y - args.extent],
            [x + args.extent, y + args.extent],
            resolution,
        )
        .context("Failed to load region")?;

    let height = grid
        .valid_height_at(x, y)
        .context("Failed to get height")?;
    let stats = grid
        .radial_statistics(x, y, args.radius)
        .context("Failed to compute statistics")?;
    let isolation = grid
        .isolation_at(
            x,
            y,
            &IsolationParams {
                min_distance: args.min_distance,
                min_clear_area: args.clear_area,
                height_offset: args.height_offset,
            },
        )
        .context("Failed to compute isolation")?;
    let openness = grid
        .openness_score(x, y, args.radius)
        .context("Failed to compute openness")?;

    if args.json {
        let response = QueryResponse {
            x,
            y,
            height,
            radius: args.radius,
            mean: stats.mean,
            std_dev: stats.std_dev,
            count: stats.count,
            min: stats.min_point.into(),
            max: stats.max_point.into(),
            isolation: isolation.map(|iso| IsolationResponse {
                distance: iso.distance,
                point: iso.point.into(),
            }),
            openness,
        };
        println!("{}", serde_json::to_string(&response)?);
        return Ok(());
    }

    println!("Height: {:.2}", height);
    println!();
    println!("Within {}:", args.radius);
    println!("  Samples: {}", stats.count);
    println!("  Mean: {:.2} (std dev {:.2})", stats.mean, stats.std_dev);
    println!(
        "  Min: {:.2} at ({}, {})",
        stats.min_point.height, stats.min_point.x, stats.min_point.y
    );
    println!(
        "  Max: {:.2} at ({}, {})",
        stats.max_point.height, stats.max_point.x, stats.max_point.y
    );
    println!("  Openness: {:.4}", openness);
    println!();
    match isolation {
        Some(iso) => println!(
            "Isolation: {:.1} (higher ground {:.2} at ({}, {}))",
            iso.distance, iso.point.height, iso.point.x, iso.point.y
        ),
        None => println!("Isolation: none (no higher ground within {})", args.extent),
    }

    Ok(())
}
