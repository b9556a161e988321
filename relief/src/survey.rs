//! Multi-radius survey of a point.
//!
//! A survey snaps the query point to the highest sample near it (the
//! reference summit), then reports the height statistics around that summit
//! at several radii and its isolation.

use crate::analysis::{Isolation, IsolationParams};
use crate::error::{ReliefError, Result};
use crate::grid::GridPoint;
use crate::loader::RegionLoader;

/// Default survey radii in world units.
pub const DEFAULT_RADII: [f64; 5] = [100.0, 200.0, 1000.0, 5000.0, 25000.0];

/// Parameters for [`survey_point`].
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyParams {
    /// Radius searched for the reference summit, also the minimum isolation
    /// distance.
    pub reference_radius: f64,
    /// Radii of the statistics rings.
    pub radii: Vec<f64>,
}

impl Default for SurveyParams {
    fn default() -> Self {
        Self {
            reference_radius: 100.0,
            radii: DEFAULT_RADII.to_vec(),
        }
    }
}

impl SurveyParams {
    /// Half-size of the region loaded for a survey.
    pub fn extent(&self) -> f64 {
        self.radii
            .iter()
            .copied()
            .fold(self.reference_radius, f64::max)
    }
}

/// Height summary within one radius of the reference summit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusSummary {
    pub radius: f64,
    pub mean: f64,
    pub min: f32,
    pub max: f32,
}

/// Result of a point survey.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSurvey {
    /// The query point.
    pub x: f64,
    pub y: f64,
    /// Highest sample within the reference radius.
    pub reference: GridPoint,
    /// One entry per radius, `None` where the ring holds no data.
    pub rings: Vec<Option<RadiusSummary>>,
    /// Isolation of the reference summit.
    pub isolation: Option<Isolation>,
}

/// Survey the terrain around `(x, y)`.
///
/// The region `(x, y) ± extent` is loaded at the tileset's native
/// resolution.
///
/// # Errors
///
/// Returns [`ReliefError::NoDataInRadius`] if nothing valid lies within the
/// reference radius, and propagates region loading errors.
pub fn survey_point(loader: &RegionLoader, x: f64, y: f64, params: &SurveyParams) -> Result<PointSurvey> {
    let extent = params.extent();
    let resolution = loader.descriptor().tile_resolution;
    let grid = loader.load_region(
        [x - extent, y - extent],
        [x + extent, y + extent],
        resolution,
    )?;

    let reference = grid
        .radial_statistics(x, y, params.reference_radius)?
        .max_point;

    let mut rings = Vec::with_capacity(params.radii.len());
    for &radius in &params.radii {
        match grid.radial_statistics(reference.x, reference.y, radius) {
            Ok(stats) => rings.push(Some(RadiusSummary {
                radius,
                mean: stats.mean,
                min: stats.min_point.height,
                max: stats.max_point.height,
            })),
            Err(ReliefError::NoDataInRadius { .. }) => rings.push(None),
            Err(e) => return Err(e),
        }
    }

    let isolation = grid.isolation(
        reference.x,
        reference.y,
        reference.height,
        &IsolationParams {
            min_distance: params.reference_radius,
            ..Default::default()
        },
    )?;

    tracing::debug!(
        x,
        y,
        ref_x = reference.x,
        ref_y = reference.y,
        isolation = isolation.map(|i| i.distance),
        "Point surveyed"
    );

    Ok(PointSurvey {
        x,
        y,
        reference,
        rings,
        isolation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::TilesetDescriptor;
    use crate::tile::tests::create_tile;
    use tempfile::TempDir;

    /// One 40x40 tile at resolution 1: a cone peaking at (10, 10) and a
    /// higher cone peaking at (30, 30).
    fn create_dataset(dir: &std::path::Path) -> TilesetDescriptor {
        let d = TilesetDescriptor {
            tiles_folder: dir.to_path_buf(),
            min: [0.0, 0.0],
            max: [40.0, 40.0],
            tile_resolution: [1.0, 1.0],
            points_per_tile: [40, 40],
            no_data: -9999.0,
            sea_value: 0.5,
            sea_level: 0.0,
        };
        create_tile(&d, 0, 0, |i, j| {
            let (x, y) = (j as f64, (39 - i) as f64);
            let low = 100.0 - 2.0 * ((x - 10.0).hypot(y - 10.0));
            let high = 200.0 - 8.0 * ((x - 30.0).hypot(y - 30.0));
            low.max(high).max(1.0) as f32
        });
        d
    }

    #[test]
    fn test_survey_snaps_to_summit() {
        let dir = TempDir::new().unwrap();
        let loader = RegionLoader::new(create_dataset(dir.path()), 4);

        let params = SurveyParams {
            reference_radius: 3.0,
            radii: vec![1.0, 25.0],
        };
        let survey = survey_point(&loader, 11.0, 9.0, &params).unwrap();

        assert_eq!((survey.reference.x, survey.reference.y), (10.0, 10.0));
        assert_eq!(survey.reference.height, 100.0);

        assert_eq!(survey.rings.len(), 2);
        let inner = survey.rings[0].unwrap();
        assert_eq!(inner.max, 100.0);
        assert_eq!(inner.min, 98.0);

        // the nearest higher ground is on the slope of the second cone
        let isolation = survey.isolation.unwrap();
        assert!(isolation.distance > params.reference_radius);
        assert!(isolation.point.height > 100.0);
    }

    #[test]
    fn test_highest_summit_has_no_isolation() {
        let dir = TempDir::new().unwrap();
        let loader = RegionLoader::new(create_dataset(dir.path()), 4);

        let params = SurveyParams {
            reference_radius: 2.0,
            radii: vec![3.0],
        };
        let survey = survey_point(&loader, 30.0, 30.0, &params).unwrap();

        assert_eq!(survey.reference.height, 200.0);
        assert!(survey.isolation.is_none());
    }

    #[test]
    fn test_survey_without_data() {
        let dir = TempDir::new().unwrap();
        let loader = RegionLoader::new(create_dataset(dir.path()), 4);

        // entirely outside the dataset
        let params = SurveyParams {
            reference_radius: 2.0,
            radii: vec![5.0],
        };
        let result = survey_point(&loader, 500.0, 500.0, &params);
        assert!(matches!(result, Err(ReliefError::NoDataInRadius { .. })));
    }

    #[test]
    fn test_extent() {
        assert_eq!(SurveyParams::default().extent(), 25000.0);

        let params = SurveyParams {
            reference_radius: 50.0,
            radii: vec![10.0, 20.0],
        };
        assert_eq!(params.extent(), 50.0);
    }
}
