use anyhow::Result;
use std::path::PathBuf;

use super::{format_size, open_loader};

pub fn run(tileset: Option<PathBuf>, cache_size: u64, list: bool) -> Result<()> {
    let loader = open_loader(tileset, cache_size)?;
    let d = loader.descriptor();

    let [nx, ny] = d.num_tiles();
    let [ex, ey] = d.extension();
    let [tx, ty] = d.tile_extension();

    println!("Tiles folder: {}", d.tiles_folder.display());
    println!();
    println!(
        "Bounds: ({}, {}) - ({}, {}) [{} x {}]",
        d.min[0], d.min[1], d.max[0], d.max[1], ex, ey
    );
    println!(
        "Resolution: {} x {} ({} x {} points per tile)",
        d.tile_resolution[0], d.tile_resolution[1], d.points_per_tile[0], d.points_per_tile[1]
    );
    println!("Tile size: {} x {}", tx, ty);
    println!("Tile grid: {} x {} ({} expected)", nx, ny, nx as i64 * ny as i64);
    println!(
        "No data: {}  Sea marker: {}  Sea level: {}",
        d.no_data, d.sea_value, d.sea_level
    );

    let files = loader.scan_tile_files();
    let mut total_size = 0u64;
    let mut sizes = Vec::with_capacity(files.len());
    for name in &files {
        let size = std::fs::metadata(d.tiles_folder.join(name))
            .map(|m| m.len())
            .unwrap_or(0);
        total_size += size;
        sizes.push(size);
    }

    println!();
    println!("Tile files: {} ({})", files.len(), format_size(total_size));

    if list {
        for (name, size) in files.iter().zip(&sizes) {
            println!("  {:<20} {:>12}", name, format_size(*size));
        }
    }

    Ok(())
}
