//! Triangulated surface extraction.

use crate::error::{ReliefError, Result};
use crate::grid::HeightGrid;

/// Marker for cells without a vertex.
const NO_VERTEX: u32 = u32::MAX;

/// A triangulated height surface.
///
/// Vertices are `(x, y, height)` in world units; triangles index into
/// `vertices`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceMesh {
    pub vertices: Vec<[f32; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

impl SurfaceMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

impl HeightGrid {
    /// Triangulate the valid cells of the grid.
    ///
    /// One vertex is emitted per valid cell, columns outer and rows inner.
    /// Each 2×2 block with four valid corners gives two triangles split along
    /// the `(i+1, j)`–`(i, j+1)` diagonal; a block with three valid corners
    /// gives the one triangle they form, wound the same way.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::MeshTooLarge`] if the buffers cannot be
    /// allocated; retry with a coarser grid.
    ///
    /// # Example
    ///
    /// ```
    /// use relief::HeightGrid;
    ///
    /// let grid = HeightGrid::new(vec![1.0; 9], 3, 3, [0.0, 0.0], [1.0, 1.0], -9999.0)?;
    /// let mesh = grid.build_surface_mesh()?;
    ///
    /// assert_eq!(mesh.vertex_count(), 9);
    /// assert_eq!(mesh.triangle_count(), 8);
    /// # Ok::<(), relief::ReliefError>(())
    /// ```
    pub fn build_surface_mesh(&self) -> Result<SurfaceMesh> {
        let (cols, rows) = self.size();
        let cells = cols * rows;
        let too_large = |_| ReliefError::MeshTooLarge { cells };

        let valid = self.valid_count();
        if valid >= NO_VERTEX as usize {
            return Err(ReliefError::MeshTooLarge { cells });
        }

        // vertex id per cell, indexed like the samples
        let mut ids: Vec<u32> = Vec::new();
        ids.try_reserve_exact(cells).map_err(too_large)?;
        ids.resize(cells, NO_VERTEX);

        let mut vertices: Vec<[f32; 3]> = Vec::new();
        vertices.try_reserve_exact(valid).map_err(too_large)?;

        for col in 0..cols {
            for row in 0..rows {
                let h = self.value(col, row);
                if self.is_valid(h) {
                    let [x, y] = self.cell_position(col, row);
                    ids[row * cols + col] = vertices.len() as u32;
                    vertices.push([x as f32, y as f32, h]);
                }
            }
        }

        let blocks = cols.saturating_sub(1) * rows.saturating_sub(1);
        let mut triangles: Vec<[u32; 3]> = Vec::new();
        triangles
            .try_reserve(blocks.min(valid).saturating_mul(2))
            .map_err(too_large)?;

        let id = |col: usize, row: usize| Some(ids[row * cols + col]).filter(|&v| v != NO_VERTEX);

        for col in 0..cols.saturating_sub(1) {
            for row in 0..rows.saturating_sub(1) {
                let v00 = id(col, row);
                let v01 = id(col, row + 1);
                let v10 = id(col + 1, row);
                let v11 = id(col + 1, row + 1);

                match (v00, v01, v10, v11) {
                    (Some(v00), Some(v01), Some(v10), Some(v11)) => {
                        triangles.push([v00, v10, v01]);
                        triangles.push([v01, v10, v11]);
                    }
                    (Some(v00), None, Some(v10), Some(v11)) => triangles.push([v00, v10, v11]),
                    (Some(v00), Some(v01), None, Some(v11)) => triangles.push([v00, v11, v01]),
                    (Some(v00), Some(v01), Some(v10), None) => triangles.push([v00, v10, v01]),
                    (None, Some(v01), Some(v10), Some(v11)) => triangles.push([v01, v10, v11]),
                    _ => {}
                }
            }
        }

        tracing::debug!(
            vertices = vertices.len(),
            triangles = triangles.len(),
            "Surface mesh built"
        );

        Ok(SurfaceMesh {
            vertices,
            triangles,
        })
    }
}
