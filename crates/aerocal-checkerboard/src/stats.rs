//! Quality statistics of an enumerated grid.

use std::collections::BTreeMap;

use aerocal_core::{CalibrationGrid, GridCoords};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

const COVERAGE_BINS: usize = 10;

/// Fraction of a 10×10 partition of the image that holds at least one corner.
pub fn coverage(grid: &CalibrationGrid, image_size: (usize, usize)) -> f32 {
    let (w, h) = image_size;
    if grid.is_empty() || w == 0 || h == 0 {
        return 0.0;
    }
    let bin_w = w as f32 / COVERAGE_BINS as f32;
    let bin_h = h as f32 / COVERAGE_BINS as f32;
    let last = (COVERAGE_BINS - 1) as f32;

    let mut hit = [[false; COVERAGE_BINS]; COVERAGE_BINS];
    for (_, p) in grid.iter() {
        let bx = (p.x / bin_w).floor().clamp(0.0, last) as usize;
        let by = (p.y / bin_h).floor().clamp(0.0, last) as usize;
        hit[by][bx] = true;
    }
    let filled = hit.iter().flatten().filter(|&&v| v).count();
    filled as f32 / (COVERAGE_BINS * COVERAGE_BINS) as f32
}

/// Straightness of one family of grid lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LineStats {
    /// Number of points on lines long enough to be fitted (more than 2 points).
    pub count: usize,
    /// Mean perpendicular distance (pixels) of those points to their fitted line.
    pub mean_deviation: f32,
}

/// Line straightness, horizontal family first, then vertical.
///
/// Which grid index runs along image rows depends on how the seed basis was
/// picked, so it is decided from the `(0,0) → (0,1)` step.
pub fn straightness(grid: &CalibrationGrid) -> [LineStats; 2] {
    let mut by_col: BTreeMap<i32, Vec<Point2<f32>>> = BTreeMap::new();
    let mut by_row: BTreeMap<i32, Vec<Point2<f32>>> = BTreeMap::new();
    for (gc, p) in grid.sorted() {
        by_col.entry(gc.col).or_default().push(p);
        by_row.entry(gc.row).or_default().push(p);
    }

    let cols_are_horizontal = match (
        grid.get(GridCoords::new(0, 0)),
        grid.get(GridCoords::new(0, 1)),
    ) {
        (Some(a), Some(b)) => (b.x - a.x).abs() > (b.y - a.y).abs(),
        _ => false,
    };

    let (horizontal, vertical) = if cols_are_horizontal {
        (by_col, by_row)
    } else {
        (by_row, by_col)
    };

    [
        family_stats(horizontal.values(), false),
        family_stats(vertical.values(), true),
    ]
}

fn family_stats<'a>(lines: impl Iterator<Item = &'a Vec<Point2<f32>>>, swap_xy: bool) -> LineStats {
    let mut count = 0usize;
    let mut sum = 0.0f64;
    for line in lines.filter(|l| l.len() > 2) {
        let pts: Vec<(f64, f64)> = line
            .iter()
            .map(|p| {
                if swap_xy {
                    (p.y as f64, p.x as f64)
                } else {
                    (p.x as f64, p.y as f64)
                }
            })
            .collect();
        let Some((intercept, slope)) = fit_line(&pts) else {
            continue;
        };
        let norm = (slope * slope + 1.0).sqrt();
        for &(x, y) in &pts {
            sum += (slope * x - y + intercept).abs() / norm;
            count += 1;
        }
    }
    LineStats {
        count,
        mean_deviation: if count == 0 { 0.0 } else { (sum / count as f64) as f32 },
    }
}

/// Least-squares `y = intercept + slope·x`.
fn fit_line(pts: &[(f64, f64)]) -> Option<(f64, f64)> {
    let n = pts.len() as f64;
    let (sx, sy) = pts.iter().fold((0.0, 0.0), |(a, b), &(x, y)| (a + x, b + y));
    let (mx, my) = (sx / n, sy / n);
    let (mut sxx, mut sxy) = (0.0, 0.0);
    for &(x, y) in pts {
        sxx += (x - mx) * (x - mx);
        sxy += (x - mx) * (y - my);
    }
    if sxx <= f64::EPSILON {
        return None;
    }
    let slope = sxy / sxx;
    Some((my - slope * mx, slope))
}
