use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use super::{open_loader, resolution_or_native};
use crate::Region;

pub fn run(
    tileset: Option<PathBuf>,
    cache_size: u64,
    region: Region,
    resolution: Option<f64>,
    radius: f64,
    output: PathBuf,
) -> Result<()> {
    let loader = open_loader(tileset, cache_size)?;
    let resolution = resolution_or_native(&loader, resolution);

    let grid = loader
        .load_region(region.min, region.max, resolution)
        .context("Failed to load region")?;
    let map = grid
        .openness_map(radius)
        .context("Failed to compute openness map")?;

    let file = File::create(&output).context("Failed to create output file")?;
    let mut writer = BufWriter::new(file);
    relief::export::write_matrix(&map, &mut writer)?;
    writer.flush()?;

    if let Some((min, max)) = map.height_range() {
        println!("Openness range: {:.4} - {:.4}", min, max);
    }
    println!("Output written to: {}", output.display());
    Ok(())
}
