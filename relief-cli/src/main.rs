use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::export::ExportFormat;

/// Tiled terrain analysis CLI tool
#[derive(Parser)]
#[command(name = "relief")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Tileset descriptor file
    #[arg(short, long, env = "RELIEF_TILESET", global = true)]
    tileset: Option<PathBuf>,

    /// Maximum decoded tiles in cache
    #[arg(
        short,
        long,
        env = "RELIEF_CACHE_SIZE",
        default_value = "64",
        global = true
    )]
    cache_size: u64,

    #[command(subcommand)]
    command: Commands,
}

/// A world-space box given as `min_x,min_y,max_x,max_y`.
#[derive(Debug, Clone, Copy)]
pub struct Region {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl std::str::FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let values: Vec<f64> = s
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| format!("invalid coordinate: {}", e))?;

        match values.as_slice() {
            [min_x, min_y, max_x, max_y] => Ok(Region {
                min: [*min_x, *min_y],
                max: [*max_x, *max_y],
            }),
            _ => Err("expected min_x,min_y,max_x,max_y".to_string()),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Display information about the tileset
    Info {
        /// List every tile file
        #[arg(short, long)]
        list: bool,
    },

    /// Compute statistics, isolation and openness at a point
    Query {
        /// X coordinate
        #[arg(short, long, allow_negative_numbers = true)]
        x: f64,

        /// Y coordinate
        #[arg(short, long, allow_negative_numbers = true)]
        y: f64,

        /// Radius for statistics and openness
        #[arg(short, long, default_value = "1000")]
        radius: f64,

        /// Half-size of the region loaded around the point
        #[arg(long, default_value = "10000")]
        extent: f64,

        /// Grid resolution (defaults to the tileset resolution)
        #[arg(long)]
        resolution: Option<f64>,

        /// Higher ground closer than this is ignored
        #[arg(long, default_value = "0")]
        min_distance: f64,

        /// Area of higher ground required to stop the isolation search
        #[arg(long, default_value = "0")]
        clear_area: f64,

        /// Offset added to the point height for isolation
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        height_offset: f32,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Survey every point listed in a text file (one "x y" pair per line)
    Batch {
        /// Input point list
        input: PathBuf,

        /// Output CSV file (defaults to <input>_survey.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Radius searched for the reference summit
        #[arg(long, default_value = "100")]
        reference_radius: f64,

        /// Statistics radii
        #[arg(long, value_delimiter = ',', default_value = "100,200,1000,5000,25000")]
        radii: Vec<f64>,
    },

    /// Export a region as a mesh or flat file
    Export {
        /// Region as min_x,min_y,max_x,max_y
        #[arg(long, allow_hyphen_values = true)]
        region: Region,

        /// Output resolution (defaults to the tileset resolution)
        #[arg(long)]
        resolution: Option<f64>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "ply")]
        format: ExportFormat,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Compute the openness map of a region
    Openness {
        /// Region as min_x,min_y,max_x,max_y
        #[arg(long, allow_hyphen_values = true)]
        region: Region,

        /// Output resolution (defaults to the tileset resolution)
        #[arg(long)]
        resolution: Option<f64>,

        /// Integration radius
        #[arg(short, long, default_value = "500")]
        radius: f64,

        /// Output matrix file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { list } => commands::info::run(cli.tileset, cli.cache_size, list),
        Commands::Query {
            x,
            y,
            radius,
            extent,
            resolution,
            min_distance,
            clear_area,
            height_offset,
            json,
        } => commands::query::run(
            cli.tileset,
            cli.cache_size,
            commands::query::QueryArgs {
                x,
                y,
                radius,
                extent,
                resolution,
                min_distance,
                clear_area,
                height_offset,
                json,
            },
        ),
        Commands::Batch {
            input,
            output,
            reference_radius,
            radii,
        } => commands::batch::run(
            cli.tileset,
            cli.cache_size,
            input,
            output,
            reference_radius,
            radii,
        ),
        Commands::Export {
            region,
            resolution,
            format,
            output,
        } => commands::export::run(cli.tileset, cli.cache_size, region, resolution, format, output),
        Commands::Openness {
            region,
            resolution,
            radius,
            output,
        } => commands::openness::run(cli.tileset, cli.cache_size, region, resolution, radius, output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_region() {
        let region: Region = "420000,4480000, 430000.5,4490000".parse().unwrap();
        assert_eq!(region.min, [420000.0, 4480000.0]);
        assert_eq!(region.max, [430000.5, 4490000.0]);

        assert!("1,2,3".parse::<Region>().is_err());
        assert!("1,2,3,four".parse::<Region>().is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
