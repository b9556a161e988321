//! Tileset descriptor parsing.
//!
//! A tileset is described by a small line-oriented text file:
//!
//! ```text
//! tiles/
//! min 420000 4480000
//! max 540000 4760000
//! resolution 5 5
//! points 2000 2000
//! nodata -9999
//! sea 0.5 0
//! ```
//!
//! The first line is the folder holding the tile files. Relative folders are
//! resolved against the directory containing the descriptor. The six labeled
//! lines follow in fixed order. The values are the last fields of each line;
//! the label before them is free text and may span several words.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ReliefError, Result};
use crate::filename::tile_filename;

/// Parsed tileset descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct TilesetDescriptor {
    /// Folder containing the `tile_XX_YY.bin` files.
    pub tiles_folder: PathBuf,
    /// Minimum corner of the dataset.
    pub min: [f64; 2],
    /// Maximum corner of the dataset.
    pub max: [f64; 2],
    /// Cell size of the raw tile samples.
    pub tile_resolution: [f64; 2],
    /// Samples per tile along each axis.
    pub points_per_tile: [usize; 2],
    /// Samples at or below this value are missing.
    pub no_data: f32,
    /// Samples at or below this value are sea.
    pub sea_value: f32,
    /// Height substituted for sea samples.
    pub sea_level: f32,
}

impl TilesetDescriptor {
    /// Load a descriptor from a file.
    ///
    /// A relative tile folder is resolved against the descriptor's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or any line is malformed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut descriptor: Self = text.parse()?;

        if descriptor.tiles_folder.is_relative() {
            if let Some(parent) = path.parent() {
                descriptor.tiles_folder = parent.join(&descriptor.tiles_folder);
            }
        }

        Ok(descriptor)
    }

    /// Dataset extent along each axis.
    pub fn extension(&self) -> [f64; 2] {
        [self.max[0] - self.min[0], self.max[1] - self.min[1]]
    }

    /// World-space extent covered by one tile.
    pub fn tile_extension(&self) -> [f64; 2] {
        [
            self.points_per_tile[0] as f64 * self.tile_resolution[0],
            self.points_per_tile[1] as f64 * self.tile_resolution[1],
        ]
    }

    /// Number of tiles along each axis.
    pub fn num_tiles(&self) -> [i32; 2] {
        let ext = self.extension();
        let tile_ext = self.tile_extension();
        [
            (ext[0] / tile_ext[0]).ceil() as i32,
            (ext[1] / tile_ext[1]).ceil() as i32,
        ]
    }

    /// Minimum corner of tile `(tx, ty)`.
    pub fn tile_origin(&self, tx: i32, ty: i32) -> [f64; 2] {
        let tile_ext = self.tile_extension();
        [
            self.min[0] + tx as f64 * tile_ext[0],
            self.min[1] + ty as f64 * tile_ext[1],
        ]
    }

    /// Path of the file holding tile `(tx, ty)`.
    pub fn tile_path(&self, tx: i32, ty: i32) -> PathBuf {
        self.tiles_folder.join(tile_filename(tx, ty))
    }
}

/// Line cursor that remembers line numbers for error reporting.
struct Lines<'a> {
    inner: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> Lines<'a> {
    /// Next non-blank line with its 1-based number.
    fn next_line(&mut self, what: &str) -> Result<(usize, &'a str)> {
        for (idx, line) in self.inner.by_ref() {
            if !line.trim().is_empty() {
                return Ok((idx + 1, line));
            }
        }
        Err(ReliefError::InvalidDescriptor {
            line: 0,
            reason: format!("missing {} line", what),
        })
    }

    /// Parse a labeled line `label .. v1 .. vN`, returning its line number and
    /// values. The values are the last `N` fields; everything before them is
    /// the label.
    fn labeled<T: FromStr, const N: usize>(&mut self, what: &str) -> Result<(usize, [T; N])> {
        let (line_no, line) = self.next_line(what)?;
        let fields: Vec<&str> = line.split_whitespace().collect();

        // at least one label word precedes the values
        if fields.len() <= N {
            return Err(ReliefError::InvalidDescriptor {
                line: line_no,
                reason: format!(
                    "{} needs {} values, found {}",
                    what,
                    N,
                    fields.len().saturating_sub(1)
                ),
            });
        }

        let mut values: Vec<T> = Vec::with_capacity(N);
        for field in &fields[fields.len() - N..] {
            let value = field.parse::<T>().map_err(|_| ReliefError::InvalidDescriptor {
                line: line_no,
                reason: format!("invalid {} value '{}'", what, field),
            })?;
            values.push(value);
        }

        let values = values
            .try_into()
            .map_err(|_| ReliefError::InvalidDescriptor {
                line: line_no,
                reason: format!("invalid {} values", what),
            })?;

        Ok((line_no, values))
    }
}

impl FromStr for TilesetDescriptor {
    type Err = ReliefError;

    fn from_str(text: &str) -> Result<Self> {
        let mut lines = Lines {
            inner: text.lines().enumerate(),
        };

        let (_, folder) = lines.next_line("tiles folder")?;
        let (_, min): (_, [f64; 2]) = lines.labeled("min")?;
        let (max_line, max): (_, [f64; 2]) = lines.labeled("max")?;
        let (res_line, tile_resolution): (_, [f64; 2]) = lines.labeled("resolution")?;
        let (points_line, points_per_tile): (_, [usize; 2]) = lines.labeled("points per tile")?;
        let (_, [no_data]): (_, [f32; 1]) = lines.labeled("nodata")?;
        let (_, [sea_value, sea_level]): (_, [f32; 2]) = lines.labeled("sea")?;

        if tile_resolution.iter().any(|r| r.is_nan() || *r <= 0.0) {
            return Err(ReliefError::InvalidDescriptor {
                line: res_line,
                reason: "tile resolution must be positive".to_string(),
            });
        }
        if points_per_tile.contains(&0) {
            return Err(ReliefError::InvalidDescriptor {
                line: points_line,
                reason: "points per tile must be positive".to_string(),
            });
        }
        if max[0] <= min[0] || max[1] <= min[1] {
            return Err(ReliefError::InvalidDescriptor {
                line: max_line,
                reason: "max corner must exceed min corner".to_string(),
            });
        }

        Ok(Self {
            tiles_folder: PathBuf::from(folder.trim()),
            min,
            max,
            tile_resolution,
            points_per_tile,
            no_data,
            sea_value,
            sea_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const SAMPLE: &str = "tiles/\n\
        min 420000 4480000\n\
        max 540000 4760000\n\
        resolution 5 5\n\
        points 2000 2000\n\
        nodata -9999\n\
        sea 0.5 0\n";

    #[test]
    fn test_parse_descriptor() {
        let d: TilesetDescriptor = SAMPLE.parse().unwrap();

        assert_eq!(d.tiles_folder, PathBuf::from("tiles/"));
        assert_eq!(d.min, [420000.0, 4480000.0]);
        assert_eq!(d.max, [540000.0, 4760000.0]);
        assert_eq!(d.tile_resolution, [5.0, 5.0]);
        assert_eq!(d.points_per_tile, [2000, 2000]);
        assert_eq!(d.no_data, -9999.0);
        assert_eq!(d.sea_value, 0.5);
        assert_eq!(d.sea_level, 0.0);
    }

    #[test]
    fn test_derived_geometry() {
        let d: TilesetDescriptor = SAMPLE.parse().unwrap();

        assert_eq!(d.tile_extension(), [10000.0, 10000.0]);
        assert_eq!(d.num_tiles(), [12, 28]);
        assert_eq!(d.tile_origin(2, 3), [440000.0, 4510000.0]);
        assert!(d.tile_path(2, 3).ends_with("tile_02_03.bin"));
    }

    #[test]
    fn test_multi_word_labels() {
        let text = "tiles/\n\
            minimum corner 420000 4480000\n\
            maximum corner 540000 4760000\n\
            tile resolution 5 5\n\
            points per tile 2000 2000\n\
            no data value -9999\n\
            sea value and level 0.5 0\n";
        let d: TilesetDescriptor = text.parse().unwrap();

        assert_eq!(d, SAMPLE.parse::<TilesetDescriptor>().unwrap());
    }

    #[test]
    fn test_label_required() {
        let text = SAMPLE.replace("nodata -9999", "-9999");
        let err = text.parse::<TilesetDescriptor>().unwrap_err();
        match err {
            ReliefError::InvalidDescriptor { line, .. } => assert_eq!(line, 6),
            other => panic!("Expected InvalidDescriptor, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_descriptor() {
        let text = "tiles/\nmin 0 0\nmax 100 100\nresolution 1 1\n";
        let err = text.parse::<TilesetDescriptor>().unwrap_err();
        assert!(matches!(err, ReliefError::InvalidDescriptor { .. }));
        assert!(err.to_string().contains("points per tile"));
    }

    #[test]
    fn test_missing_value() {
        let text = SAMPLE.replace("sea 0.5 0", "sea 0.5");
        let err = text.parse::<TilesetDescriptor>().unwrap_err();
        match err {
            ReliefError::InvalidDescriptor { line, .. } => assert_eq!(line, 7),
            other => panic!("Expected InvalidDescriptor, got {:?}", other),
        }
    }

    #[test]
    fn test_unparsable_value() {
        let text = SAMPLE.replace("points 2000 2000", "points 2000 lots");
        let err = text.parse::<TilesetDescriptor>().unwrap_err();
        match err {
            ReliefError::InvalidDescriptor { line, reason } => {
                assert_eq!(line, 5);
                assert!(reason.contains("lots"));
            }
            other => panic!("Expected InvalidDescriptor, got {:?}", other),
        }
    }

    #[test]
    fn test_non_positive_resolution() {
        let text = SAMPLE.replace("resolution 5 5", "resolution 5 0");
        assert!(text.parse::<TilesetDescriptor>().is_err());
    }

    #[test]
    fn test_inverted_bounds() {
        let text = SAMPLE.replace("max 540000 4760000", "max 400000 4760000");
        assert!(text.parse::<TilesetDescriptor>().is_err());
    }

    #[test]
    fn test_from_file_resolves_relative_folder() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dataset.tiles");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let d = TilesetDescriptor::from_file(&path).unwrap();
        assert_eq!(d.tiles_folder, dir.path().join("tiles/"));
    }

    #[test]
    fn test_from_file_missing() {
        let result = TilesetDescriptor::from_file("/nonexistent/dataset.tiles");
        assert!(matches!(result, Err(ReliefError::Io(_))));
    }
}
