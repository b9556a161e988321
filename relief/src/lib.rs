//! # relief - Tiled Terrain Analysis Library
//!
//! Loads regions of large tiled height datasets at any output resolution and
//! computes geomorphometric measures over them.
//!
//! ## Features
//!
//! - **Out-of-core**: Tiles are memory-mapped and decoded on demand, with an
//!   LRU cache of decoded tiles
//! - **Resampling**: Block-average downsampling with no-data and sea-level
//!   handling, stitched across tile boundaries
//! - **Analysis**: Radial statistics, topographic isolation, openness score
//!   and region-wide openness maps (parallel with rayon)
//! - **Export**: Triangulated surfaces (binary PLY), matrix text and ELV
//!
//! ## Quick Start
//!
//! ```ignore
//! use relief::{IsolationParams, RegionLoaderBuilder};
//!
//! let loader = RegionLoaderBuilder::new("/data/dtm/dataset.tiles").build()?;
//!
//! // 20 km square around a summit at the native resolution
//! let (x, y) = (441250.0, 4512380.0);
//! let res = loader.descriptor().tile_resolution;
//! let grid = loader.load_region([x - 10000.0, y - 10000.0], [x + 10000.0, y + 10000.0], res)?;
//!
//! let stats = grid.radial_statistics(x, y, 1000.0)?;
//! println!("mean {:.1}m, max {:.1}m", stats.mean, stats.max_point.height);
//!
//! if let Some(iso) = grid.isolation_at(x, y, &IsolationParams::default())? {
//!     println!("isolation {:.0}m", iso.distance);
//! }
//! ```
//!
//! ## Tileset Layout
//!
//! A tileset is a text descriptor (see [`descriptor`]) plus a folder of
//! `tile_XX_YY.bin` files. Each tile holds a `u32` width and height followed
//! by little-endian `f32` samples (see [`tile`]).

pub mod analysis;
pub mod descriptor;
pub mod error;
pub mod export;
pub mod filename;
pub mod grid;
pub mod loader;
pub mod mesh;
pub mod ply;
pub mod survey;
pub mod tile;

// Re-export main types at crate root for convenience
pub use analysis::{Isolation, IsolationParams, RadialStatistics};
pub use descriptor::TilesetDescriptor;
pub use error::{ReliefError, Result};
pub use grid::{GridPoint, HeightGrid, DEFAULT_NO_DATA};
pub use loader::{BoundingBox, CacheStats, PreloadStats, RegionLoader, RegionLoaderBuilder};
pub use mesh::SurfaceMesh;
pub use ply::PlyMesh;
pub use survey::{survey_point, PointSurvey, RadiusSummary, SurveyParams};
pub use tile::{Tile, TileStore};
