//! Error types for the relief library.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading or analyzing terrain data.
#[derive(Error, Debug)]
pub enum ReliefError {
    /// IO error when reading files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The tileset descriptor could not be parsed.
    #[error("Invalid tileset descriptor (line {line}): {reason}")]
    InvalidDescriptor { line: usize, reason: String },

    /// The tile file length doesn't match the dimensions in its header.
    #[error("Invalid tile file {path}: {size} bytes (expected {expected} for its header)")]
    InvalidTileSize {
        path: PathBuf,
        size: usize,
        expected: usize,
    },

    /// Grid data doesn't match the requested dimensions.
    #[error("Invalid grid dimensions: {cols}x{rows} cells for {len} samples")]
    InvalidDimensions { cols: usize, rows: usize, len: usize },

    /// The requested region is empty or its resolution is not positive.
    #[error("Invalid region: {reason}")]
    InvalidRegion { reason: String },

    /// Coordinates fall outside the grid.
    #[error("Coordinates out of bounds: x={x}, y={y}")]
    OutOfBounds { x: f64, y: f64 },

    /// The cell holding the query point has no data.
    #[error("No data at x={x}, y={y}")]
    NoDataAtPoint { x: f64, y: f64 },

    /// No valid sample lies within the query radius.
    #[error("No data within radius {radius} of x={x}, y={y}")]
    NoDataInRadius { x: f64, y: f64, radius: f64 },

    /// Mesh buffers for the grid could not be allocated.
    #[error("Mesh too large: {cells} cells (retry at a coarser resolution)")]
    MeshTooLarge { cells: usize },

    /// The mesh file is malformed or not a triangle mesh.
    #[error("Invalid mesh: {reason}")]
    InvalidMesh { reason: String },
}

/// Result type alias using [`ReliefError`].
pub type Result<T> = std::result::Result<T, ReliefError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReliefError::InvalidDescriptor {
            line: 4,
            reason: "expected 2 values".to_string(),
        };
        assert!(err.to_string().contains("line 4"));

        let err = ReliefError::OutOfBounds { x: 12.5, y: -3.0 };
        assert!(err.to_string().contains("12.5"));

        let err = ReliefError::InvalidTileSize {
            path: PathBuf::from("tile_01_02.bin"),
            size: 100,
            expected: 4008,
        };
        assert!(err.to_string().contains("tile_01_02.bin"));
        assert!(err.to_string().contains("4008"));

        let err = ReliefError::NoDataInRadius {
            x: 0.0,
            y: 0.0,
            radius: 250.0,
        };
        assert!(err.to_string().contains("250"));
    }
}
