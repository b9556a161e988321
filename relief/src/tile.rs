//! Tile file access and downsampling.
//!
//! This module provides [`TileStore`], which reads one binary tile file at a
//! time according to a [`TilesetDescriptor`], and the [`Tile`] it produces.
//!
//! # Tile Format
//!
//! - Header: `width` and `height` as little-endian `u32`
//! - Body: `width × height` little-endian `f32` samples, indexed `[i][j]` with
//!   `i < width` as the outer loop (sample offset `i * height + j`)
//!
//! Samples at or below the no-data value are missing. Samples at or below the
//! sea value are replaced by the sea level when the tile is decoded.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use memmap2::Mmap;

use crate::descriptor::TilesetDescriptor;
use crate::error::{ReliefError, Result};

/// Size of the tile header in bytes.
const HEADER_SIZE: usize = 8;

/// Size of one sample in bytes.
const SAMPLE_SIZE: usize = 4;

/// A decoded (possibly downsampled) tile.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    /// Samples indexed `i * height + j`
    data: Vec<f32>,
    width: usize,
    height: usize,
    /// The tile file was not found and the tile is all no-data
    missing: bool,
}

impl Tile {
    /// Length of the first axis.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Length of the second axis.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether the tile file was missing.
    pub fn is_missing(&self) -> bool {
        self.missing
    }

    /// Sample at `[i][j]`, or `None` outside the tile.
    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        if i < self.width && j < self.height {
            Some(self.data[i * self.height + j])
        } else {
            None
        }
    }

    /// All samples, indexed `i * height + j`.
    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// A memory-mapped tile file.
struct RawTile {
    /// Memory-mapped file data
    data: Mmap,
    width: usize,
    height: usize,
}

impl RawTile {
    /// Map a tile file, or `None` if it doesn't exist.
    fn open(path: &Path) -> Result<Option<Self>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let size = file.metadata()?.len() as usize;
        if size < HEADER_SIZE {
            return Err(ReliefError::InvalidTileSize {
                path: path.to_path_buf(),
                size,
                expected: HEADER_SIZE,
            });
        }

        // SAFETY: Memory mapping is safe as long as the file is not modified
        // while mapped. We open the file read-only and don't expose the mapping.
        let mmap = unsafe { Mmap::map(&file)? };

        let width = u32::from_le_bytes([mmap[0], mmap[1], mmap[2], mmap[3]]) as usize;
        let height = u32::from_le_bytes([mmap[4], mmap[5], mmap[6], mmap[7]]) as usize;

        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(SAMPLE_SIZE))
            .and_then(|n| n.checked_add(HEADER_SIZE))
            .unwrap_or(usize::MAX);
        if mmap.len() != expected {
            return Err(ReliefError::InvalidTileSize {
                path: path.to_path_buf(),
                size: mmap.len(),
                expected,
            });
        }

        Ok(Some(Self {
            data: mmap,
            width,
            height,
        }))
    }

    /// Raw sample at `[i][j]`.
    #[inline]
    fn sample(&self, i: usize, j: usize) -> f32 {
        let offset = HEADER_SIZE + (i * self.height + j) * SAMPLE_SIZE;
        f32::from_le_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }
}

/// Reads tiles of one tileset.
///
/// The store keeps no per-read state, so one instance can serve concurrent
/// readers.
///
/// # Example
///
/// ```ignore
/// use relief::{TileStore, TilesetDescriptor};
///
/// let store = TileStore::new(TilesetDescriptor::from_file("dataset.tiles")?);
/// let tile = store.read_tile(3, 7, [4, 4])?;
/// println!("{}x{} samples", tile.width(), tile.height());
/// ```
#[derive(Debug, Clone)]
pub struct TileStore {
    descriptor: TilesetDescriptor,
}

impl TileStore {
    /// Create a store for the tileset described by `descriptor`.
    pub fn new(descriptor: TilesetDescriptor) -> Self {
        Self { descriptor }
    }

    /// The tileset descriptor.
    pub fn descriptor(&self) -> &TilesetDescriptor {
        &self.descriptor
    }

    /// Read tile `(tx, ty)`, averaging `factor[0] × factor[1]` blocks.
    ///
    /// Within each block, missing samples are skipped and sea samples count
    /// as the sea level. A block without any valid sample becomes the sea
    /// level.
    ///
    /// A missing tile file is not an error: the result is an all-no-data tile
    /// of the nominal size, flagged by [`Tile::is_missing`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or its length
    /// doesn't match its header.
    pub fn read_tile(&self, tx: i32, ty: i32, factor: [usize; 2]) -> Result<Tile> {
        let [fx, fy] = [factor[0].max(1), factor[1].max(1)];
        let path = self.descriptor.tile_path(tx, ty);

        let raw = match RawTile::open(&path)? {
            Some(raw) => raw,
            None => {
                tracing::warn!(path = %path.display(), tx, ty, "Tile not found, filling with no-data");
                let [px, py] = self.descriptor.points_per_tile;
                let (width, height) = (px / fx, py / fy);
                return Ok(Tile {
                    data: vec![self.descriptor.no_data; width * height],
                    width,
                    height,
                    missing: true,
                });
            }
        };

        let no_data = self.descriptor.no_data;
        let sea_value = self.descriptor.sea_value;
        let sea_level = self.descriptor.sea_level;

        let (width, height) = (raw.width / fx, raw.height / fy);
        let mut data = Vec::with_capacity(width * height);

        for i in 0..width {
            for j in 0..height {
                let mut sum = 0.0f64;
                let mut count = 0u32;

                for ii in i * fx..(i + 1) * fx {
                    for jj in j * fy..(j + 1) * fy {
                        let mut val = raw.sample(ii, jj);
                        // ignore no values
                        if val > no_data {
                            if val <= sea_value {
                                val = sea_level;
                            }
                            sum += val as f64;
                            count += 1;
                        }
                    }
                }

                data.push(if count > 0 {
                    (sum / count as f64) as f32
                } else {
                    sea_level
                });
            }
        }

        tracing::debug!(tx, ty, width, height, fx, fy, "Tile decoded");

        Ok(Tile {
            data,
            width,
            height,
            missing: false,
        })
    }

    /// Read tile `(tx, ty)` exactly as stored, with no substitution.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::Io`] with `NotFound` if the file is missing.
    pub fn read_tile_raw(&self, tx: i32, ty: i32) -> Result<Tile> {
        let path = self.descriptor.tile_path(tx, ty);
        let raw = RawTile::open(&path)?.ok_or_else(|| {
            ReliefError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Tile not found: {}", path.display()),
            ))
        })?;

        let mut data = Vec::with_capacity(raw.width * raw.height);
        for i in 0..raw.width {
            for j in 0..raw.height {
                data.push(raw.sample(i, j));
            }
        }

        Ok(Tile {
            data,
            width: raw.width,
            height: raw.height,
            missing: false,
        })
    }
}

/// Write a tile in the binary tile format.
///
/// `samples` are indexed `i * height + j`.
///
/// # Errors
///
/// Returns an error if `samples.len() != width * height` or writing fails.
pub fn write_tile<W: Write>(writer: &mut W, width: u32, height: u32, samples: &[f32]) -> Result<()> {
    let expected = width as usize * height as usize;
    if samples.len() != expected {
        return Err(ReliefError::InvalidDimensions {
            cols: width as usize,
            rows: height as usize,
            len: samples.len(),
        });
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE + expected * SAMPLE_SIZE);
    buf.extend_from_slice(&width.to_le_bytes());
    buf.extend_from_slice(&height.to_le_bytes());
    for sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }
    writer.write_all(&buf)?;

    Ok(())
}
