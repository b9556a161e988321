//! Region assembly with LRU tile caching.
//!
//! This module provides [`RegionLoader`], which stitches decoded tiles into a
//! [`HeightGrid`] covering any world-space box at a chosen resolution.
//!
//! ```ignore
//! use relief::RegionLoaderBuilder;
//!
//! let loader = RegionLoaderBuilder::new("/data/dtm/dataset.tiles")
//!     .cache_size(128)
//!     .build()?;
//!
//! let grid = loader.load_region([430000.0, 4500000.0], [450000.0, 4520000.0], [25.0, 25.0])?;
//! println!("{}x{} cells", grid.cols(), grid.rows());
//! ```

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use moka::sync::Cache;

use crate::descriptor::TilesetDescriptor;
use crate::error::{ReliefError, Result};
use crate::filename::{filename_to_indices, TILE_EXTENSION};
use crate::grid::{region_size, HeightGrid};
use crate::tile::{Tile, TileStore};

/// Default number of decoded tiles kept in memory.
pub const DEFAULT_CACHE_SIZE: u64 = 64;

/// Statistics about cache usage.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of tiles currently in the cache.
    pub entry_count: u64,
    /// Number of cache hits (requests served from cache).
    pub hit_count: u64,
    /// Number of cache misses (tiles read from disk).
    pub miss_count: u64,
    /// Number of misses whose tile file didn't exist.
    pub missing_count: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// A world-space box used to filter tiles during preload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Check if this box overlaps tile `(tx, ty)` of the tileset.
    ///
    /// A tile covers `[origin, origin + tile_extension)`; touching edges don't
    /// count as overlap.
    pub fn overlaps_tile(&self, descriptor: &TilesetDescriptor, tx: i32, ty: i32) -> bool {
        let [x0, y0] = descriptor.tile_origin(tx, ty);
        let [ex, ey] = descriptor.tile_extension();

        self.min_x < x0 + ex && self.max_x > x0 && self.min_y < y0 + ey && self.max_y > y0
    }
}

/// Statistics from a preload operation.
#[derive(Debug, Clone, Default)]
pub struct PreloadStats {
    /// Number of tiles successfully loaded into cache.
    pub tiles_loaded: u64,
    /// Number of tiles that were already in cache.
    pub tiles_already_cached: u64,
    /// Number of tiles that failed to load.
    pub tiles_failed: u64,
    /// Number of tiles that matched the bounding box filter.
    pub tiles_matched: u64,
    /// Total elapsed time in milliseconds.
    pub elapsed_ms: u64,
}

/// Cache key: a tile decoded at one downsampling factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TileKey {
    tx: i32,
    ty: i32,
    factor: [usize; 2],
}

/// Loads regions of a tiled dataset, caching decoded tiles.
///
/// The loader is `Send + Sync` and is meant to be shared (e.g. behind an
/// `Arc`) by every caller that reads the same tileset.
pub struct RegionLoader {
    store: TileStore,
    /// LRU cache of decoded tiles.
    tile_cache: Cache<TileKey, Arc<Tile>>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    missing_count: AtomicU64,
}

impl RegionLoader {
    /// Create a loader for a parsed descriptor.
    ///
    /// # Arguments
    ///
    /// * `descriptor` - The tileset to read
    /// * `cache_size` - Maximum number of decoded tiles to keep in memory
    pub fn new(descriptor: TilesetDescriptor, cache_size: u64) -> Self {
        Self {
            store: TileStore::new(descriptor),
            tile_cache: Cache::builder().max_capacity(cache_size).build(),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            missing_count: AtomicU64::new(0),
        }
    }

    /// Create a builder reading the descriptor at `path`.
    pub fn builder<P: AsRef<Path>>(path: P) -> RegionLoaderBuilder {
        RegionLoaderBuilder::new(path)
    }

    /// The tileset descriptor.
    pub fn descriptor(&self) -> &TilesetDescriptor {
        self.store.descriptor()
    }

    /// Downsampling factor used to serve `resolution`.
    pub fn factor_for(&self, resolution: [f64; 2]) -> [usize; 2] {
        let res = self.descriptor().tile_resolution;
        [
            (resolution[0] / res[0]).round().max(1.0) as usize,
            (resolution[1] / res[1]).round().max(1.0) as usize,
        ]
    }

    /// Load the region `[min, max)` at `resolution`.
    ///
    /// Cells not covered by any tile stay no-data. Missing tile files leave a
    /// hole instead of failing the load.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::InvalidRegion`] for an empty box, a
    /// non-positive resolution or a grid too large to allocate, and
    /// propagates tile read errors.
    pub fn load_region(&self, min: [f64; 2], max: [f64; 2], resolution: [f64; 2]) -> Result<HeightGrid> {
        let start = Instant::now();
        let (cols, rows) = region_size(min, max, resolution)?;
        let no_data = self.descriptor().no_data;
        let factor = self.factor_for(resolution);

        let mut data = Vec::new();
        data.try_reserve_exact(cols * rows)
            .map_err(|_| ReliefError::InvalidRegion {
                reason: format!("{}x{} cells cannot be allocated", cols, rows),
            })?;
        data.resize(cols * rows, no_data);

        let mut tiles = 0usize;
        if let (Some(tx_range), Some(ty_range)) =
            (self.tile_range(min[0], max[0], 0), self.tile_range(min[1], max[1], 1))
        {
            for tx in tx_range {
                for ty in ty_range.clone() {
                    let tile = self.load_tile(tx, ty, factor)?;
                    let origin = self.descriptor().tile_origin(tx, ty);
                    self.stitch(&tile, origin, min, max, resolution, cols, &mut data);
                    tiles += 1;
                }
            }
        }

        tracing::debug!(
            cols,
            rows,
            tiles,
            fx = factor[0],
            fy = factor[1],
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Region loaded"
        );

        HeightGrid::new(data, cols, rows, min, resolution, no_data)
    }

    /// Copy the samples of one tile that fall inside the box into `data`.
    ///
    /// The tile's first axis runs north to south, so it is mirrored onto y.
    #[allow(clippy::too_many_arguments)]
    fn stitch(
        &self,
        tile: &Tile,
        origin: [f64; 2],
        min: [f64; 2],
        max: [f64; 2],
        resolution: [f64; 2],
        cols: usize,
        data: &mut [f32],
    ) {
        let rows = data.len() / cols.max(1);
        let width = tile.width();

        for i in 0..width {
            let y = origin[1] + (width - 1 - i) as f64 * resolution[1];
            if y < min[1] || y >= max[1] {
                continue;
            }
            let row = (((y - min[1]) / resolution[1]).floor() as usize).min(rows - 1);

            for j in 0..tile.height() {
                let x = origin[0] + j as f64 * resolution[0];
                if x < min[0] || x >= max[0] {
                    continue;
                }
                let col = (((x - min[0]) / resolution[0]).floor() as usize).min(cols - 1);
                data[row * cols + col] = tile.data()[i * tile.height() + j];
            }
        }
    }

    /// Tile indices along `axis` overlapping `[lo, hi]`, clamped to the dataset.
    fn tile_range(&self, lo: f64, hi: f64, axis: usize) -> Option<RangeInclusive<i32>> {
        let d = self.descriptor();
        let extension = d.tile_extension()[axis];
        let count = d.num_tiles()[axis];

        let first = ((lo - d.min[axis]) / extension).floor();
        let last = ((hi - d.min[axis]) / extension).floor();
        if count <= 0 || last < 0.0 || first >= count as f64 {
            return None;
        }

        Some(first.max(0.0) as i32..=(last as i32).min(count - 1))
    }

    /// Load a decoded tile from cache or disk.
    ///
    /// Missing tiles are returned but not cached, so a tile added later is
    /// picked up by the next load.
    pub fn load_tile(&self, tx: i32, ty: i32, factor: [usize; 2]) -> Result<Arc<Tile>> {
        let key = TileKey { tx, ty, factor };

        if let Some(tile) = self.tile_cache.get(&key) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return Ok(tile);
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);

        let tile = Arc::new(self.store.read_tile(tx, ty, factor)?);
        if tile.is_missing() {
            self.missing_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.tile_cache.insert(key, tile.clone());
        }

        Ok(tile)
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.tile_cache.run_pending_tasks();
        CacheStats {
            entry_count: self.tile_cache.entry_count(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            missing_count: self.missing_count.load(Ordering::Relaxed),
        }
    }

    /// Get the maximum cache size.
    pub fn cache_capacity(&self) -> u64 {
        self.tile_cache.policy().max_capacity().unwrap_or(0)
    }

    /// Invalidate every cached decoding of one tile.
    ///
    /// Accepts a tile filename (e.g. `"tile_03_07.bin"`); names that don't
    /// parse are ignored.
    pub fn invalidate_tile(&self, filename: &str) {
        if let Some((tx, ty)) = filename_to_indices(filename) {
            let keys: Vec<TileKey> = self
                .tile_cache
                .iter()
                .filter(|(key, _)| key.tx == tx && key.ty == ty)
                .map(|(key, _)| *key)
                .collect();
            for key in keys {
                self.tile_cache.invalidate(&key);
            }
        }
    }

    /// Clear all tiles from the cache.
    pub fn clear_cache(&self) {
        self.tile_cache.invalidate_all();
    }

    /// Scan the tiles folder for tile files.
    ///
    /// Returns a sorted list of tile filenames (e.g., `["tile_00_00.bin"]`).
    pub fn scan_tile_files(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.descriptor().tiles_folder) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut filenames: Vec<String> = entries
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| {
                Path::new(name)
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(TILE_EXTENSION))
                    && filename_to_indices(name).is_some()
            })
            .collect();

        filenames.sort();
        filenames
    }

    /// Preload tiles into the LRU cache at `factor`.
    ///
    /// Scans the tiles folder and loads every tile, or only those overlapping
    /// at least one of `bounds` when given.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use relief::{BoundingBox, RegionLoader};
    ///
    /// let valley = BoundingBox::new(430000.0, 4500000.0, 450000.0, 4520000.0);
    /// let stats = loader.preload(Some(&[valley]), [1, 1]);
    /// println!("Loaded {} tiles in {}ms", stats.tiles_loaded, stats.elapsed_ms);
    /// ```
    pub fn preload(&self, bounds: Option<&[BoundingBox]>, factor: [usize; 2]) -> PreloadStats {
        let start = Instant::now();
        let mut stats = PreloadStats::default();

        for filename in self.scan_tile_files() {
            let (tx, ty) = match filename_to_indices(&filename) {
                Some(indices) => indices,
                None => continue,
            };

            if let Some(boxes) = bounds {
                if !boxes
                    .iter()
                    .any(|b| b.overlaps_tile(self.descriptor(), tx, ty))
                {
                    continue;
                }
            }

            stats.tiles_matched += 1;

            if self.tile_cache.contains_key(&TileKey { tx, ty, factor }) {
                stats.tiles_already_cached += 1;
                continue;
            }

            match self.load_tile(tx, ty, factor) {
                Ok(_) => stats.tiles_loaded += 1,
                Err(e) => {
                    tracing::warn!(%filename, error = %e, "Failed to preload tile");
                    stats.tiles_failed += 1;
                }
            }
        }

        stats.elapsed_ms = start.elapsed().as_millis() as u64;
        stats
    }
}

/// Builder for creating [`RegionLoader`] with custom configuration.
///
/// # Example
///
/// ```ignore
/// use relief::RegionLoaderBuilder;
///
/// let loader = RegionLoaderBuilder::new("/data/dtm/dataset.tiles")
///     .cache_size(128)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct RegionLoaderBuilder {
    descriptor_path: PathBuf,
    cache_size: u64,
}

impl RegionLoaderBuilder {
    /// Create a new builder for the descriptor at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            descriptor_path: path.as_ref().to_path_buf(),
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `RELIEF_TILESET` | Path of the tileset descriptor | Required |
    /// | `RELIEF_CACHE_SIZE` | Maximum decoded tiles in cache | 64 |
    ///
    /// # Errors
    ///
    /// Returns an error if `RELIEF_TILESET` is not set.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var("RELIEF_TILESET").map_err(|_| {
            ReliefError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "RELIEF_TILESET environment variable not set",
            ))
        })?;

        let cache_size = std::env::var("RELIEF_CACHE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CACHE_SIZE);

        Ok(Self {
            descriptor_path: PathBuf::from(path),
            cache_size,
        })
    }

    /// Set the descriptor path.
    ///
    /// Overrides the path set in the constructor or from environment.
    pub fn descriptor_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.descriptor_path = path.as_ref().to_path_buf();
        self
    }

    /// Set the maximum number of decoded tiles to keep in cache.
    pub fn cache_size(mut self, size: u64) -> Self {
        self.cache_size = size;
        self
    }

    /// Read the descriptor and build the [`RegionLoader`].
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor cannot be read or parsed.
    pub fn build(self) -> Result<RegionLoader> {
        let descriptor = TilesetDescriptor::from_file(&self.descriptor_path)?;
        tracing::info!(
            path = %self.descriptor_path.display(),
            tiles_folder = %descriptor.tiles_folder.display(),
            cache_size = self.cache_size,
            "Tileset opened"
        );
        Ok(RegionLoader::new(descriptor, self.cache_size))
    }
}
