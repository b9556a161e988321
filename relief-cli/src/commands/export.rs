use anyhow::{Context, Result};
use clap::ValueEnum;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use super::{open_loader, resolution_or_native};
use crate::Region;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Binary little-endian PLY surface mesh
    Ply,
    /// Text matrix, north row first
    Data,
    /// WinProm ELV grid
    Elv,
}

pub fn run(
    tileset: Option<PathBuf>,
    cache_size: u64,
    region: Region,
    resolution: Option<f64>,
    format: ExportFormat,
    output: PathBuf,
) -> Result<()> {
    let loader = open_loader(tileset, cache_size)?;
    let resolution = resolution_or_native(&loader, resolution);

    let grid = loader
        .load_region(region.min, region.max, resolution)
        .context("Failed to load region")?;
    let (cols, rows) = grid.size();

    let file = File::create(&output).context("Failed to create output file")?;
    let mut writer = BufWriter::new(file);

    match format {
        ExportFormat::Ply => {
            let mesh = grid
                .build_surface_mesh()
                .context("Failed to build surface mesh")?;
            relief::ply::write_ply(&mut writer, &mesh)?;
            println!(
                "Mesh: {} vertices, {} triangles",
                mesh.vertex_count(),
                mesh.triangle_count()
            );
        }
        ExportFormat::Data => relief::export::write_matrix(&grid, &mut writer)?,
        ExportFormat::Elv => relief::export::write_elv(&grid, &mut writer)?,
    }
    writer.flush()?;

    println!("Grid: {} x {} cells", cols, rows);
    println!("Output written to: {}", output.display());
    Ok(())
}
