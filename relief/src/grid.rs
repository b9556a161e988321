//! Dense in-memory height grid.
//!
//! This module provides [`HeightGrid`], a rectangular block of height samples
//! with its world-space geometry. Analytical queries live in
//! [`crate::analysis`] and surface extraction in [`crate::mesh`]; both operate
//! on a shared `&HeightGrid`.

use std::sync::OnceLock;

use crate::error::{ReliefError, Result};

/// Default no-data sentinel.
pub const DEFAULT_NO_DATA: f32 = -9999.0;

/// A world-space point carrying a height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    pub x: f64,
    pub y: f64,
    pub height: f32,
}

/// A dense grid of height samples.
///
/// Samples are addressed by `(col, row)` and stored row-major in one flat
/// array, so the grid is rectangular by construction. Cell `(i, j)` sits at
/// world coordinate `origin + (i, j) * resolution`; rows grow along +y.
///
/// Any sample `<= no_data` is missing. The grid never changes after
/// construction, so it can be shared freely between threads.
///
/// # Example
///
/// ```
/// use relief::HeightGrid;
///
/// let grid = HeightGrid::new(
///     vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
///     3,
///     2,
///     [100.0, 200.0],
///     [10.0, 10.0],
///     -9999.0,
/// )?;
///
/// assert_eq!(grid.get(2, 1), Some(6.0));
/// assert_eq!(grid.height_max(), Some(6.0));
/// # Ok::<(), relief::ReliefError>(())
/// ```
#[derive(Debug, Clone)]
pub struct HeightGrid {
    /// Samples, row-major with stride `cols`
    data: Vec<f32>,
    cols: usize,
    rows: usize,
    /// World-space minimum corner
    origin: [f64; 2],
    /// Cell size along x and y
    resolution: [f64; 2],
    no_data: f32,
    /// Memoized (min, max) over valid samples; `None` inside when all are missing
    range: OnceLock<Option<(f32, f32)>>,
}

impl HeightGrid {
    /// Create a grid from row-major samples.
    ///
    /// # Errors
    ///
    /// Returns an error if `data.len() != cols * rows` or the resolution is
    /// not positive.
    pub fn new(
        data: Vec<f32>,
        cols: usize,
        rows: usize,
        origin: [f64; 2],
        resolution: [f64; 2],
        no_data: f32,
    ) -> Result<Self> {
        if cols.checked_mul(rows) != Some(data.len()) {
            return Err(ReliefError::InvalidDimensions {
                cols,
                rows,
                len: data.len(),
            });
        }
        if resolution.iter().any(|r| r.is_nan() || *r <= 0.0) {
            return Err(ReliefError::InvalidRegion {
                reason: format!(
                    "resolution must be positive, got {}x{}",
                    resolution[0], resolution[1]
                ),
            });
        }

        Ok(Self {
            data,
            cols,
            rows,
            origin,
            resolution,
            no_data,
            range: OnceLock::new(),
        })
    }

    /// Create a grid covering `[min, max)` at `resolution`.
    ///
    /// The grid size is `ceil((max - min) / resolution)` along each axis and
    /// must match the number of samples.
    pub fn from_bounds(
        data: Vec<f32>,
        min: [f64; 2],
        max: [f64; 2],
        resolution: [f64; 2],
        no_data: f32,
    ) -> Result<Self> {
        let (cols, rows) = region_size(min, max, resolution)?;
        Self::new(data, cols, rows, min, resolution, no_data)
    }

    /// Create a grid from per-column sample vectors, indexed `[col][row]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the columns have different lengths.
    pub fn from_columns(
        columns: &[Vec<f32>],
        origin: [f64; 2],
        resolution: [f64; 2],
        no_data: f32,
    ) -> Result<Self> {
        let cols = columns.len();
        let rows = columns.first().map_or(0, Vec::len);

        if let Some(bad) = columns.iter().find(|c| c.len() != rows) {
            return Err(ReliefError::InvalidDimensions {
                cols,
                rows,
                len: bad.len(),
            });
        }

        let mut data = vec![no_data; cols * rows];
        for (col, column) in columns.iter().enumerate() {
            for (row, &h) in column.iter().enumerate() {
                data[row * cols + col] = h;
            }
        }

        Self::new(data, cols, rows, origin, resolution, no_data)
    }

    /// Number of columns (x axis).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of rows (y axis).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Grid size as `(cols, rows)`.
    pub fn size(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    /// World-space minimum corner.
    pub fn origin(&self) -> [f64; 2] {
        self.origin
    }

    /// Cell size along x and y.
    pub fn resolution(&self) -> [f64; 2] {
        self.resolution
    }

    /// World-space maximum corner, `origin + size * resolution`.
    pub fn bound_max(&self) -> [f64; 2] {
        [
            self.origin[0] + self.cols as f64 * self.resolution[0],
            self.origin[1] + self.rows as f64 * self.resolution[1],
        ]
    }

    /// World-space extent of the grid.
    pub fn extension(&self) -> [f64; 2] {
        [
            self.cols as f64 * self.resolution[0],
            self.rows as f64 * self.resolution[1],
        ]
    }

    /// Area covered by one cell.
    pub fn cell_area(&self) -> f64 {
        self.resolution[0] * self.resolution[1]
    }

    /// The no-data sentinel.
    pub fn no_data(&self) -> f32 {
        self.no_data
    }

    /// Raw samples, row-major with stride [`Self::cols`].
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Whether `h` is a valid sample for this grid.
    #[inline]
    pub fn is_valid(&self, h: f32) -> bool {
        h > self.no_data
    }

    /// Sample at `(col, row)`, or `None` outside the grid.
    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col < self.cols && row < self.rows {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    /// Sample at `(col, row)`; callers guarantee the indices are in range.
    #[inline]
    pub(crate) fn value(&self, col: usize, row: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    /// World coordinate of cell `(col, row)`.
    #[inline]
    pub fn cell_position(&self, col: usize, row: usize) -> [f64; 2] {
        [
            self.origin[0] + col as f64 * self.resolution[0],
            self.origin[1] + row as f64 * self.resolution[1],
        ]
    }

    /// Cell containing the world point `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::OutOfBounds`] if the point lies outside the grid.
    pub fn cell_of(&self, x: f64, y: f64) -> Result<(usize, usize)> {
        let fx = ((x - self.origin[0]) / self.resolution[0]).floor();
        let fy = ((y - self.origin[1]) / self.resolution[1]).floor();

        if fx >= 0.0 && fy >= 0.0 && fx < self.cols as f64 && fy < self.rows as f64 {
            Ok((fx as usize, fy as usize))
        } else {
            Err(ReliefError::OutOfBounds { x, y })
        }
    }

    /// Sample of the cell containing `(x, y)`, which may be no-data.
    pub fn height_at(&self, x: f64, y: f64) -> Result<f32> {
        let (col, row) = self.cell_of(x, y)?;
        Ok(self.value(col, row))
    }

    /// Valid height of the cell containing `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::NoDataAtPoint`] if that cell is missing.
    pub fn valid_height_at(&self, x: f64, y: f64) -> Result<f32> {
        let h = self.height_at(x, y)?;
        if self.is_valid(h) {
            Ok(h)
        } else {
            Err(ReliefError::NoDataAtPoint { x, y })
        }
    }

    /// Lowest valid height, computed on first use.
    pub fn height_min(&self) -> Option<f32> {
        self.height_range().map(|(min, _)| min)
    }

    /// Highest valid height, computed on first use.
    pub fn height_max(&self) -> Option<f32> {
        self.height_range().map(|(_, max)| max)
    }

    /// `(min, max)` over valid samples, or `None` if every sample is missing.
    pub fn height_range(&self) -> Option<(f32, f32)> {
        *self.range.get_or_init(|| {
            self.data
                .iter()
                .copied()
                .filter(|&h| self.is_valid(h))
                .fold(None, |acc, h| match acc {
                    None => Some((h, h)),
                    Some((lo, hi)) => Some((lo.min(h), hi.max(h))),
                })
        })
    }

    /// Number of valid samples.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&h| self.is_valid(h)).count()
    }
}

/// Cell counts covering `[min, max)` at `resolution`.
pub(crate) fn region_size(
    min: [f64; 2],
    max: [f64; 2],
    resolution: [f64; 2],
) -> Result<(usize, usize)> {
    if resolution.iter().any(|r| r.is_nan() || *r <= 0.0) {
        return Err(ReliefError::InvalidRegion {
            reason: format!(
                "resolution must be positive, got {}x{}",
                resolution[0], resolution[1]
            ),
        });
    }
    if !(max[0] > min[0] && max[1] > min[1]) {
        return Err(ReliefError::InvalidRegion {
            reason: format!(
                "empty box [{}, {}] - [{}, {}]",
                min[0], min[1], max[0], max[1]
            ),
        });
    }

    let cols = ((max[0] - min[0]) / resolution[0]).ceil();
    let rows = ((max[1] - min[1]) / resolution[1]).ceil();
    let too_large = || ReliefError::InvalidRegion {
        reason: format!("{}x{} cells cannot be addressed", cols, rows),
    };

    // the cast saturates, so bound the counts before converting
    if !(cols.is_finite() && rows.is_finite())
        || cols >= usize::MAX as f64
        || rows >= usize::MAX as f64
    {
        return Err(too_large());
    }
    let (cols, rows) = (cols as usize, rows as usize);
    cols.checked_mul(rows).ok_or_else(too_large)?;

    Ok((cols, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_grid() -> HeightGrid {
        // 3 cols x 2 rows, one missing sample
        HeightGrid::new(
            vec![5.0, -9999.0, 7.0, -2.5, 12.0, 3.0],
            3,
            2,
            [100.0, 50.0],
            [10.0, 5.0],
            DEFAULT_NO_DATA,
        )
        .unwrap()
    }

    #[test]
    fn test_grid_geometry() {
        let grid = sample_grid();

        assert_eq!(grid.size(), (3, 2));
        assert_eq!(grid.origin(), [100.0, 50.0]);
        assert_eq!(grid.bound_max(), [130.0, 60.0]);
        assert_eq!(grid.extension(), [30.0, 10.0]);
        assert_eq!(grid.cell_area(), 50.0);
        assert_eq!(grid.cell_position(2, 1), [120.0, 55.0]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = HeightGrid::new(vec![0.0; 5], 3, 2, [0.0, 0.0], [1.0, 1.0], -9999.0);
        match result {
            Err(ReliefError::InvalidDimensions { cols, rows, len }) => {
                assert_eq!((cols, rows, len), (3, 2, 5));
            }
            other => panic!("Expected InvalidDimensions, got {:?}", other),
        }
    }

    #[test]
    fn test_non_positive_resolution() {
        let result = HeightGrid::new(vec![0.0; 4], 2, 2, [0.0, 0.0], [1.0, 0.0], -9999.0);
        assert!(matches!(result, Err(ReliefError::InvalidRegion { .. })));
    }

    #[test]
    fn test_from_bounds_uses_ceil() {
        let grid = HeightGrid::from_bounds(
            vec![1.0; 4 * 3],
            [0.0, 0.0],
            [35.0, 21.0],
            [10.0, 10.0],
            -9999.0,
        )
        .unwrap();
        assert_eq!(grid.size(), (4, 3));

        let wrong = HeightGrid::from_bounds(
            vec![1.0; 3 * 2],
            [0.0, 0.0],
            [35.0, 21.0],
            [10.0, 10.0],
            -9999.0,
        );
        assert!(wrong.is_err());
    }

    #[test]
    fn test_region_size_bounds() {
        assert_eq!(
            region_size([0.0, 0.0], [35.0, 21.0], [10.0, 10.0]).unwrap(),
            (4, 3)
        );

        let overflow = region_size([0.0, 0.0], [1e12, 1e12], [1e-3, 1e-3]);
        assert!(matches!(overflow, Err(ReliefError::InvalidRegion { .. })));

        let saturated = region_size([0.0, 0.0], [1e300, 1.0], [1e-10, 1.0]);
        assert!(matches!(saturated, Err(ReliefError::InvalidRegion { .. })));

        let infinite = region_size([0.0, 0.0], [1.0, f64::INFINITY], [1.0, 1.0]);
        assert!(matches!(infinite, Err(ReliefError::InvalidRegion { .. })));
    }

    #[test]
    fn test_from_columns() {
        let columns = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let grid = HeightGrid::from_columns(&columns, [0.0, 0.0], [1.0, 1.0], -9999.0).unwrap();

        assert_eq!(grid.size(), (3, 2));
        assert_eq!(grid.get(0, 1), Some(2.0));
        assert_eq!(grid.get(2, 0), Some(5.0));
        assert_eq!(grid.get(3, 0), None);
    }

    #[test]
    fn test_from_columns_jagged() {
        let columns = vec![vec![1.0, 2.0], vec![3.0]];
        let result = HeightGrid::from_columns(&columns, [0.0, 0.0], [1.0, 1.0], -9999.0);
        assert!(matches!(result, Err(ReliefError::InvalidDimensions { .. })));
    }

    #[test]
    fn test_height_range_skips_no_data() {
        let grid = sample_grid();

        // Negative heights are valid samples
        assert_eq!(grid.height_min(), Some(-2.5));
        assert_eq!(grid.height_max(), Some(12.0));
        assert_eq!(grid.valid_count(), 5);
    }

    #[test]
    fn test_height_range_all_missing() {
        let grid = HeightGrid::new(vec![-9999.0; 4], 2, 2, [0.0, 0.0], [1.0, 1.0], -9999.0).unwrap();
        assert_eq!(grid.height_min(), None);
        assert_eq!(grid.height_max(), None);
    }

    #[test]
    fn test_cell_of() {
        let grid = sample_grid();

        assert_eq!(grid.cell_of(100.0, 50.0).unwrap(), (0, 0));
        assert_eq!(grid.cell_of(129.9, 59.9).unwrap(), (2, 1));
        assert_eq!(grid.cell_of(115.0, 56.0).unwrap(), (1, 1));

        assert!(matches!(
            grid.cell_of(130.0, 55.0),
            Err(ReliefError::OutOfBounds { .. })
        ));
        assert!(grid.cell_of(99.9, 55.0).is_err());
        assert!(grid.cell_of(f64::NAN, 55.0).is_err());
    }

    #[test]
    fn test_valid_height_at() {
        let grid = sample_grid();

        assert_eq!(grid.valid_height_at(121.0, 51.0).unwrap(), 7.0);
        assert!(matches!(
            grid.valid_height_at(111.0, 51.0),
            Err(ReliefError::NoDataAtPoint { .. })
        ));
        assert!(matches!(
            grid.valid_height_at(0.0, 0.0),
            Err(ReliefError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_grid_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HeightGrid>();
    }
}
