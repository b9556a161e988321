//! Tile filename utilities.
//!
//! This module provides functions for converting between tile indices and
//! tile filenames.
//!
//! # Filename Format
//!
//! Tiles follow the naming convention: `tile_{tx}_{ty}.bin`
//!
//! - Both indices are zero-padded to at least 2 digits (e.g., `tile_03_17.bin`)
//! - Indices wider than 2 digits are written in full (e.g., `tile_104_07.bin`)
//!
//! Tile `(0, 0)` is the tile at the **minimum corner** of the dataset.

/// Extension of tile files.
pub const TILE_EXTENSION: &str = "bin";

/// Convert tile indices to a tile filename.
///
/// # Examples
///
/// ```
/// use relief::filename::tile_filename;
///
/// assert_eq!(tile_filename(3, 17), "tile_03_17.bin");
/// assert_eq!(tile_filename(0, 0), "tile_00_00.bin");
/// assert_eq!(tile_filename(104, 7), "tile_104_07.bin");
/// ```
pub fn tile_filename(tx: i32, ty: i32) -> String {
    format!("tile_{:02}_{:02}.{}", tx, ty, TILE_EXTENSION)
}

/// Parse a tile filename to extract the tile indices.
///
/// # Arguments
///
/// * `filename` - The filename (with or without path, with or without extension)
///
/// # Returns
///
/// The `(tx, ty)` tile indices, or `None` if parsing fails.
///
/// # Examples
///
/// ```
/// use relief::filename::filename_to_indices;
///
/// assert_eq!(filename_to_indices("tile_03_17.bin"), Some((3, 17)));
/// assert_eq!(filename_to_indices("/data/tiles/tile_00_09.bin"), Some((0, 9)));
/// assert_eq!(filename_to_indices("tile_12_04"), Some((12, 4)));
/// assert_eq!(filename_to_indices("dem_35_138.tif"), None);
/// ```
pub fn filename_to_indices(filename: &str) -> Option<(i32, i32)> {
    // Extract just the filename part if a path is provided
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let name = name
        .strip_suffix(".bin")
        .or_else(|| name.strip_suffix(".BIN"))
        .unwrap_or(name);

    let rest = name.strip_prefix("tile_")?;
    let (tx, ty) = rest.split_once('_')?;

    Some((tx.parse().ok()?, ty.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_filename_padding() {
        assert_eq!(tile_filename(1, 2), "tile_01_02.bin");
        assert_eq!(tile_filename(10, 99), "tile_10_99.bin");
    }

    #[test]
    fn test_filename_to_indices_with_path() {
        assert_eq!(
            filename_to_indices("/srv/dtm/tiles/tile_05_11.bin"),
            Some((5, 11))
        );
        assert_eq!(
            filename_to_indices("C:\\dtm\\tile_05_11.bin"),
            Some((5, 11))
        );
    }

    #[test]
    fn test_filename_to_indices_invalid() {
        assert_eq!(filename_to_indices(""), None);
        assert_eq!(filename_to_indices("tile_.bin"), None);
        assert_eq!(filename_to_indices("tile_05.bin"), None);
        assert_eq!(filename_to_indices("tile_aa_01.bin"), None);
        assert_eq!(filename_to_indices("tiles_01_02.bin"), None);
    }
}
