//! Geomorphometric queries over a [`HeightGrid`].
//!
//! - [`HeightGrid::radial_statistics`]: min/max/mean/deviation within a disk
//! - [`HeightGrid::isolation`]: distance to higher ground, net of small bumps
//! - [`HeightGrid::openness_score`]: angular-integral openness of the terrain
//!   below a point
//! - [`HeightGrid::openness_map`]: the openness score of every cell
//!
//! All queries take `&self` and keep their scratch state local, so a shared
//! grid can serve queries from several threads at once.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f64::consts::{PI, SQRT_2};
use std::ops::RangeInclusive;

use rayon::prelude::*;

use crate::error::{ReliefError, Result};
use crate::grid::{GridPoint, HeightGrid};

/// 8-connected neighbor offsets with their step cost in cells.
const NEIGHBORS: [(isize, isize, f64); 8] = [
    (-1, -1, SQRT_2),
    (-1, 0, 1.0),
    (-1, 1, SQRT_2),
    (0, -1, 1.0),
    (0, 1, 1.0),
    (1, -1, SQRT_2),
    (1, 0, 1.0),
    (1, 1, SQRT_2),
];

/// Height statistics within a disk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialStatistics {
    /// Lowest sample (first found on ties).
    pub min_point: GridPoint,
    /// Highest sample (first found on ties).
    pub max_point: GridPoint,
    /// Mean height.
    pub mean: f64,
    /// Sample standard deviation (N - 1 denominator), 0 for a single sample.
    pub std_dev: f64,
    /// Number of samples inside the disk.
    pub count: usize,
}

/// Parameters for [`HeightGrid::isolation`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsolationParams {
    /// Higher ground closer than this is ignored.
    pub min_distance: f64,
    /// Area of higher ground that must be found before the search stops.
    /// With 0 the search stops at the first qualifying cell.
    pub min_clear_area: f64,
    /// Added to the reference height before comparing.
    pub height_offset: f32,
}

impl Default for IsolationParams {
    fn default() -> Self {
        Self {
            min_distance: 0.0,
            min_clear_area: 0.0,
            height_offset: 0.0,
        }
    }
}

/// Result of an isolation search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Isolation {
    /// World distance from the query point to `point`.
    pub distance: f64,
    /// The higher ground that ended the search.
    pub point: GridPoint,
}

/// A frontier cell in the isolation search, ordered as a min-heap on
/// `approx_distance`.
#[derive(Debug, Clone, Copy)]
struct SearchNode {
    /// Octile path length from the start cell, in cells
    approx_distance: f64,
    col: usize,
    row: usize,
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchNode {}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so that BinaryHeap pops the nearest node first
        other
            .approx_distance
            .total_cmp(&self.approx_distance)
            .then_with(|| other.col.cmp(&self.col))
            .then_with(|| other.row.cmp(&self.row))
    }
}

/// Slope normalization kernel of the openness integral.
///
/// `f(u) = (4/π³)·(2u·atan(u) − ln(u²+1) − atan(u)²)`, with `f(0) = 0`.
#[inline]
fn slope_normalization(u: f64) -> f64 {
    let atan_u = u.atan();
    (4.0 / PI.powi(3)) * (2.0 * u * atan_u - (u * u).ln_1p() - atan_u * atan_u)
}

impl HeightGrid {
    /// Column and row ranges of the box of half-size `radius` around a cell,
    /// clamped to the grid.
    fn window(
        &self,
        col: usize,
        row: usize,
        radius: f64,
    ) -> (RangeInclusive<usize>, RangeInclusive<usize>) {
        let res = self.resolution();
        let off_x = (radius / res[0]).ceil().max(0.0) as usize;
        let off_y = (radius / res[1]).ceil().max(0.0) as usize;

        (
            col.saturating_sub(off_x)..=col.saturating_add(off_x).min(self.cols() - 1),
            row.saturating_sub(off_y)..=row.saturating_add(off_y).min(self.rows() - 1),
        )
    }

    /// Statistics of the valid samples within `radius` of `(x, y)`.
    ///
    /// Cells are scanned column by column; the first sample found wins ties
    /// for the minimum and maximum.
    ///
    /// # Errors
    ///
    /// - [`ReliefError::OutOfBounds`] if `(x, y)` lies outside the grid
    /// - [`ReliefError::NoDataInRadius`] if no valid sample is in the disk
    ///
    /// # Example
    ///
    /// ```
    /// use relief::HeightGrid;
    ///
    /// let grid = HeightGrid::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2, [0.0, 0.0], [1.0, 1.0], -9999.0)?;
    /// let stats = grid.radial_statistics(0.0, 0.0, 5.0)?;
    /// assert_eq!(stats.mean, 2.5);
    /// assert_eq!(stats.max_point.height, 4.0);
    /// # Ok::<(), relief::ReliefError>(())
    /// ```
    pub fn radial_statistics(&self, x: f64, y: f64, radius: f64) -> Result<RadialStatistics> {
        let (col, row) = self.cell_of(x, y)?;
        let (cols, rows) = self.window(col, row, radius);

        let mut min_point: Option<GridPoint> = None;
        let mut max_point: Option<GridPoint> = None;
        let mut count = 0usize;
        let mut mean = 0.0f64;
        let mut m2 = 0.0f64;

        for i in cols {
            for j in rows.clone() {
                let h = self.value(i, j);
                if !self.is_valid(h) {
                    continue;
                }
                let [px, py] = self.cell_position(i, j);
                if (px - x).hypot(py - y) > radius {
                    continue;
                }

                let point = GridPoint {
                    x: px,
                    y: py,
                    height: h,
                };
                if min_point.map_or(true, |p| h < p.height) {
                    min_point = Some(point);
                }
                if max_point.map_or(true, |p| h > p.height) {
                    max_point = Some(point);
                }

                // Welford's online update
                count += 1;
                let h = h as f64;
                let delta = h - mean;
                mean += delta / count as f64;
                m2 += delta * (h - mean);
            }
        }

        match (min_point, max_point) {
            (Some(min_point), Some(max_point)) => Ok(RadialStatistics {
                min_point,
                max_point,
                mean,
                std_dev: if count > 1 {
                    (m2 / (count - 1) as f64).sqrt()
                } else {
                    0.0
                },
                count,
            }),
            _ => Err(ReliefError::NoDataInRadius { x, y, radius }),
        }
    }

    /// Topographic isolation of `(x, y)` at reference height `ref_height`.
    ///
    /// Cells are visited outward from the point's cell in order of their
    /// 8-connected path length. A visited cell qualifies when it is higher
    /// than `ref_height + height_offset` and at least `min_distance` away;
    /// each qualifying cell adds its area to the found area. The search stops
    /// as soon as the found area exceeds `min_clear_area`, or when the whole
    /// grid has been visited.
    ///
    /// The reported point is the last qualifying cell visited: the one whose
    /// area met the clearance requirement, or the farthest one found if the
    /// grid ran out first. With `min_clear_area = 0` this is the first
    /// qualifying cell.
    ///
    /// Returns `Ok(None)` if no qualifying cell lies strictly farther than
    /// `min_distance`.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::OutOfBounds`] if `(x, y)` lies outside the grid.
    pub fn isolation(
        &self,
        x: f64,
        y: f64,
        ref_height: f32,
        params: &IsolationParams,
    ) -> Result<Option<Isolation>> {
        let (start_col, start_row) = self.cell_of(x, y)?;
        let (n_cols, n_rows) = self.size();
        let threshold = ref_height + params.height_offset;
        let cell_area = self.cell_area();

        let mut visited = vec![false; n_cols * n_rows];
        let mut frontier = BinaryHeap::new();
        frontier.push(SearchNode {
            approx_distance: 0.0,
            col: start_col,
            row: start_row,
        });

        let mut found_area = 0.0;
        let mut candidate: Option<Isolation> = None;

        while let Some(node) = frontier.pop() {
            let idx = node.row * n_cols + node.col;
            if visited[idx] {
                continue;
            }
            visited[idx] = true;

            let h = self.value(node.col, node.row);
            if self.is_valid(h) && h > threshold {
                let [px, py] = self.cell_position(node.col, node.row);
                let distance = (px - x).hypot(py - y);

                if distance >= params.min_distance {
                    candidate = Some(Isolation {
                        distance,
                        point: GridPoint {
                            x: px,
                            y: py,
                            height: h,
                        },
                    });
                    found_area += cell_area;
                    if found_area > params.min_clear_area {
                        break;
                    }
                }
            }

            for (dc, dr, cost) in NEIGHBORS {
                let (Some(col), Some(row)) = (
                    node.col.checked_add_signed(dc),
                    node.row.checked_add_signed(dr),
                ) else {
                    continue;
                };
                if col < n_cols && row < n_rows && !visited[row * n_cols + col] {
                    frontier.push(SearchNode {
                        approx_distance: node.approx_distance + cost,
                        col,
                        row,
                    });
                }
            }
        }

        Ok(candidate.filter(|c| c.distance > params.min_distance))
    }

    /// Isolation of `(x, y)` using the height of its own cell as reference.
    ///
    /// # Errors
    ///
    /// - [`ReliefError::OutOfBounds`] if `(x, y)` lies outside the grid
    /// - [`ReliefError::NoDataAtPoint`] if its cell has no data
    pub fn isolation_at(&self, x: f64, y: f64, params: &IsolationParams) -> Result<Option<Isolation>> {
        let ref_height = self.valid_height_at(x, y)?;
        self.isolation(x, y, ref_height, params)
    }

    /// Openness score of `(x, y)` within `radius`, using the height of its
    /// own cell.
    ///
    /// # Errors
    ///
    /// - [`ReliefError::OutOfBounds`] if `(x, y)` lies outside the grid
    /// - [`ReliefError::NoDataAtPoint`] if its cell has no data
    /// - [`ReliefError::NoDataInRadius`] if no valid sample is in the disk
    pub fn openness_score(&self, x: f64, y: f64, radius: f64) -> Result<f64> {
        let h0 = self.valid_height_at(x, y)?;
        self.openness_score_with_height(x, y, h0 as f64, radius)
    }

    /// Openness score of `(x, y)` seen from height `h0`.
    ///
    /// Every valid cell in the disk adds its area to the sampled area. Cells
    /// no higher than `h0` also add `f(u)` times their area, where
    /// `u = (h0 - h) / distance` and `f` is the slope normalization kernel.
    /// The score is `sqrt(integral / area / 2π)`; flat surroundings score 0.
    pub fn openness_score_with_height(&self, x: f64, y: f64, h0: f64, radius: f64) -> Result<f64> {
        let (col, row) = self.cell_of(x, y)?;
        self.openness_around(col, row, x, y, h0, radius)
            .ok_or(ReliefError::NoDataInRadius { x, y, radius })
    }

    fn openness_around(
        &self,
        col: usize,
        row: usize,
        x: f64,
        y: f64,
        h0: f64,
        radius: f64,
    ) -> Option<f64> {
        let (cols, rows) = self.window(col, row, radius);
        let cell_area = self.cell_area();

        let mut integral = 0.0;
        let mut area = 0.0;

        for i in cols {
            for j in rows.clone() {
                let h = self.value(i, j);
                if !self.is_valid(h) {
                    continue;
                }
                let [px, py] = self.cell_position(i, j);
                let distance = (px - x).hypot(py - y);
                if distance > radius {
                    continue;
                }

                area += cell_area;

                // higher ground does not contribute
                let h = h as f64;
                if h <= h0 && distance > 0.0 {
                    integral += slope_normalization((h0 - h) / distance) * cell_area;
                }
            }
        }

        if area > 0.0 {
            Some((integral / area / (2.0 * PI)).max(0.0).sqrt())
        } else {
            None
        }
    }

    /// Openness score of every cell, as a grid with the same geometry.
    ///
    /// Cells without data stay no-data. Rows are computed in parallel.
    pub fn openness_map(&self, radius: f64) -> Result<HeightGrid> {
        let (n_cols, n_rows) = self.size();

        let data: Vec<f32> = (0..n_rows)
            .into_par_iter()
            .flat_map_iter(|row| {
                (0..n_cols).map(move |col| {
                    let h0 = self.value(col, row);
                    if !self.is_valid(h0) {
                        return self.no_data();
                    }
                    let [x, y] = self.cell_position(col, row);
                    self.openness_around(col, row, x, y, h0 as f64, radius)
                        .map_or(self.no_data(), |score| score as f32)
                })
            })
            .collect();

        HeightGrid::new(
            data,
            n_cols,
            n_rows,
            self.origin(),
            self.resolution(),
            self.no_data(),
        )
    }
}
