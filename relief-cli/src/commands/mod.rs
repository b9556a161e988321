pub mod batch;
pub mod export;
pub mod info;
pub mod openness;
pub mod query;

use anyhow::{Context, Result};
use relief::{RegionLoader, RegionLoaderBuilder};
use std::path::PathBuf;

/// Open the tileset given on the command line or in `RELIEF_TILESET`.
pub fn open_loader(tileset: Option<PathBuf>, cache_size: u64) -> Result<RegionLoader> {
    let builder = match tileset {
        Some(path) => RegionLoaderBuilder::new(path),
        None => RegionLoaderBuilder::from_env().context(
            "RELIEF_TILESET environment variable not set. Use --tileset or set RELIEF_TILESET",
        )?,
    };

    builder
        .cache_size(cache_size)
        .build()
        .context("Failed to open tileset")
}

/// Requested resolution on both axes, or the tileset's own.
pub fn resolution_or_native(loader: &RegionLoader, resolution: Option<f64>) -> [f64; 2] {
    match resolution {
        Some(r) => [r, r],
        None => loader.descriptor().tile_resolution,
    }
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
