use aerocal_core::CalibrationGrid;
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Board-to-image correspondences of one accepted frame.
///
/// Object points lie on the `z = 0` plane in units of one checkerboard square.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanarView {
    pub object_points: Vec<Point3<f64>>,
    pub image_points: Vec<Point2<f64>>,
}

impl PlanarView {
    /// One correspondence per grid cell, `(col, row, 0) ↔ center`.
    pub fn from_grid(grid: &CalibrationGrid) -> Self {
        let (object_points, image_points) = grid
            .sorted()
            .into_iter()
            .map(|(gc, p)| {
                (
                    Point3::new(gc.col as f64, gc.row as f64, 0.0),
                    Point2::new(p.x as f64, p.y as f64),
                )
            })
            .unzip();
        Self {
            object_points,
            image_points,
        }
    }

    pub fn len(&self) -> usize {
        self.object_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_points.is_empty()
    }

    pub(crate) fn board_points(&self) -> Vec<Point2<f64>> {
        self.object_points.iter().map(|p| Point2::new(p.x, p.y)).collect()
    }
}
