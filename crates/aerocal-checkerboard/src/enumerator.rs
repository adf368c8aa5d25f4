//! Lattice enumeration of checkerboard corner centers.
//!
//! Starting from the center nearest the centroid, three seed cells are fixed
//! from nearest-neighbour geometry and the central square is closed by
//! parallelogram completion. The lattice then grows square by square: the four
//! known corners of a square (plus any known cells right around it, see
//! [`SquareModel`]) define a local model from the unit square, which predicts
//! the eight cells bordering it. Each prediction is snapped to the nearest
//! detected center when close enough relative to the square's diagonal. Local
//! models let the lattice follow perspective and lens distortion that no
//! single global model would fit.
//!
//! Every new cell reschedules the squares whose support it joins, so a
//! prediction rejected early is retried once more of the lattice is known.

use std::collections::{HashSet, VecDeque};

use aerocal_core::{
    estimate_homography, homography_from_4pt, CalibrationGrid, GridCoords, Homography,
};
use kiddo::{KdTree, SquaredEuclidean};
use log::debug;
use nalgebra::{Matrix3, Point2, Vector3};

use crate::error::EnumerateError;
use crate::params::{EnumeratorParams, SquareModel};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Cells bordering the square anchored at `(c, r)`, relative to `(c, r)`.
const EXPANSION_OFFSETS: [(i32, i32); 8] = [
    (0, 2),
    (1, 2),
    (2, 1),
    (2, 0),
    (1, -1),
    (0, -1),
    (-1, 0),
    (-1, 1),
];

const UNIT_SQUARE: [Point2<f32>; 4] = [
    Point2::new(0.0, 0.0),
    Point2::new(0.0, 1.0),
    Point2::new(1.0, 0.0),
    Point2::new(1.0, 1.0),
];

/// Nearest-neighbour lookups must not exclude anything.
const NO_SELF_EXCLUSION: f32 = -1.0;

pub struct GridEnumerator {
    centers: Vec<Point2<f32>>,
    tree: KdTree<f32, 2>,
    params: EnumeratorParams,
}

impl GridEnumerator {
    pub fn new(centers: Vec<Point2<f32>>, params: EnumeratorParams) -> Result<Self, EnumerateError> {
        if centers.len() < 3 {
            return Err(EnumerateError::TooFewCenters {
                found: centers.len(),
            });
        }
        let coords = centers.iter().map(|p| [p.x, p.y]).collect::<Vec<_>>();
        let tree: KdTree<f32, 2> = (&coords).into();
        Ok(Self {
            centers,
            tree,
            params,
        })
    }

    pub fn centers(&self) -> &[Point2<f32>] {
        &self.centers
    }

    /// The detected center closest to the centroid of all centers.
    pub fn central_peak(&self) -> Point2<f32> {
        let n = self.centers.len() as f32;
        let sum = self
            .centers
            .iter()
            .fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords);
        let mean = Point2::from(sum / n);
        self.nearest(mean, NO_SELF_EXCLUSION).0
    }

    /// Nearest center to `query` and its distance.
    ///
    /// When the closest hit lies within `min_self_distance` it is treated as
    /// the query point itself and the second closest is returned instead.
    pub fn nearest(&self, query: Point2<f32>, min_self_distance: f32) -> (Point2<f32>, f32) {
        let hits = self
            .tree
            .nearest_n::<SquaredEuclidean>(&[query.x, query.y], 2);
        let first = &hits[0];
        let pick = if first.distance.sqrt() <= min_self_distance && hits.len() > 1 {
            &hits[1]
        } else {
            first
        };
        (self.centers[pick.item as usize], pick.distance.sqrt())
    }

    /// Grow the lattice from the central peak until no further cell can be added.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self), fields(centers = self.centers.len()))
    )]
    pub fn enumerate(&self) -> Result<CalibrationGrid, EnumerateError> {
        let mut grid = self.seed_basis()?;
        self.close_central_square(&mut grid)?;

        // Square anchors waiting to be expanded; `pending` mirrors the queue.
        let mut queue = VecDeque::new();
        let mut pending = HashSet::new();
        for (cell, _) in grid.sorted() {
            schedule_squares_around(cell, &mut queue, &mut pending);
        }
        while let Some(at) = queue.pop_front() {
            pending.remove(&at);
            for added in self.expand_square(&mut grid, at)? {
                schedule_squares_around(added, &mut queue, &mut pending);
            }
        }

        debug!(
            "enumerated {} of {} centers into lattice",
            grid.len(),
            self.centers.len()
        );
        Ok(grid)
    }

    /// Cells (0,0), (1,0) and (0,1).
    fn seed_basis(&self) -> Result<CalibrationGrid, EnumerateError> {
        let anchor = self.central_peak();
        let (neighbour, _) = self.nearest(anchor, 0.0);
        let d = anchor - neighbour;
        // Row vector times [[0, 1], [-1, 0]].
        let hat = nalgebra::Vector2::new(-d.y, d.x);

        let mut ratio = 1.0_f32;
        let second = loop {
            let (candidate, _) = self.nearest(anchor + hat * ratio, NO_SELF_EXCLUSION);
            if (candidate - anchor).norm() >= 1.0 {
                break candidate;
            }
            ratio += self.params.basis_ratio_step;
            if ratio > self.params.basis_ratio_max {
                return Err(EnumerateError::SquareLocatorFailed);
            }
        };

        let mut grid = CalibrationGrid::new();
        grid.insert(GridCoords::new(0, 0), anchor);
        grid.insert(GridCoords::new(1, 0), neighbour);
        grid.insert(GridCoords::new(0, 1), second);
        Ok(grid)
    }

    fn close_central_square(&self, grid: &mut CalibrationGrid) -> Result<(), EnumerateError> {
        let (Some(p00), Some(p01), Some(p10)) = (
            grid.get(GridCoords::new(0, 0)),
            grid.get(GridCoords::new(0, 1)),
            grid.get(GridCoords::new(1, 0)),
        ) else {
            return Err(EnumerateError::SquareLocatorFailed);
        };
        let reference = (p01 - p00).norm();
        let predicted = p01 + (p10 - p00);
        let (p11, distance) = self.nearest(predicted, NO_SELF_EXCLUSION);

        let ratio = distance / reference;
        if ratio < self.params.central_square_ratio {
            grid.insert(GridCoords::new(1, 1), p11);
            Ok(())
        } else {
            Err(EnumerateError::CentralSquareFailed { ratio })
        }
    }

    /// Local model for the square at `at`: unit-square coords -> image.
    ///
    /// With [`SquareModel::Supported`], known cells of the surrounding 4×4
    /// block join the four corners as support. Perspective terms are only
    /// fitted with at least `min_projective_support` correspondences; a bare
    /// noisy square extrapolates badly, so it gets an affine fit instead.
    fn local_model(
        &self,
        grid: &CalibrationGrid,
        at: GridCoords,
        square: &[Point2<f32>; 4],
    ) -> Option<Homography> {
        if self.params.square_model == SquareModel::UnitSquare {
            return homography_from_4pt(&UNIT_SQUARE, square);
        }

        let mut src: Vec<Point2<f64>> = UNIT_SQUARE.iter().map(|p| p.cast::<f64>()).collect();
        let mut dst: Vec<Point2<f64>> = square.iter().map(|p| p.cast::<f64>()).collect();
        for dc in -1..=2 {
            for dr in -1..=2 {
                if (0..=1).contains(&dc) && (0..=1).contains(&dr) {
                    continue;
                }
                if let Some(p) = grid.get(at.offset(dc, dr)) {
                    src.push(Point2::new(dc as f64, dr as f64));
                    dst.push(p.cast::<f64>());
                }
            }
        }

        if src.len() < self.params.min_projective_support {
            fit_affine(&src, &dst)
        } else {
            estimate_homography(&src, &dst)
        }
    }

    /// Try every cell bordering the square at `at`; returns newly filled cells.
    fn expand_square(
        &self,
        grid: &mut CalibrationGrid,
        at: GridCoords,
    ) -> Result<Vec<GridCoords>, EnumerateError> {
        let Some(square) = grid.square(at) else {
            return Ok(Vec::new());
        };
        let h = self
            .local_model(grid, at, &square)
            .ok_or(EnumerateError::DegenerateSquare {
                col: at.col,
                row: at.row,
            })?;
        let reference = (square[3] - square[0]).norm();

        let mut added = Vec::new();
        for (dc, dr) in EXPANSION_OFFSETS {
            let target = at.offset(dc, dr);
            if grid.contains(target) {
                continue;
            }
            let predicted = h.apply(Point2::new(dc as f32, dr as f32));
            let (location, distance) = self.nearest(predicted, NO_SELF_EXCLUSION);
            if distance / reference < self.params.distance_threshold && grid.insert(target, location)
            {
                added.push(target);
            }
        }
        Ok(added)
    }
}

/// Queue every square whose 4×4 support block contains `cell`.
fn schedule_squares_around(
    cell: GridCoords,
    queue: &mut VecDeque<GridCoords>,
    pending: &mut HashSet<GridCoords>,
) {
    for dc in -2..=1 {
        for dr in -2..=1 {
            let anchor = cell.offset(dc, dr);
            if pending.insert(anchor) {
                queue.push_back(anchor);
            }
        }
    }
}

/// Least-squares affine map `dst ≈ A * src`, as a homography with last row `[0 0 1]`.
fn fit_affine(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    let mut ata = Matrix3::<f64>::zeros();
    let mut atu = Vector3::<f64>::zeros();
    let mut atv = Vector3::<f64>::zeros();
    for (s, d) in src.iter().zip(dst) {
        let row = Vector3::new(s.x, s.y, 1.0);
        ata += row * row.transpose();
        atu += row * d.x;
        atv += row * d.y;
    }
    let inv = ata.try_inverse()?;
    let a = inv * atu;
    let b = inv * atv;
    let h = Matrix3::new(a[0], a[1], a[2], b[0], b[1], b[2], 0.0, 0.0, 1.0);
    if h.determinant().abs() < 1e-9 {
        return None;
    }
    Some(Homography::new(h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix2, Vector2};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn lattice(n: i32, spacing: f32, angle: f32, origin: Vector2<f32>) -> Vec<Point2<f32>> {
        let rot = Matrix2::new(angle.cos(), -angle.sin(), angle.sin(), angle.cos());
        (0..n)
            .flat_map(|r| (0..n).map(move |c| (c, r)))
            .map(|(c, r)| {
                let v = rot * Vector2::new(c as f32 * spacing, r as f32 * spacing);
                Point2::from(v + origin)
            })
            .collect()
    }

    fn gaussian(rng: &mut StdRng, sigma: f32) -> f32 {
        // Box-Muller
        let u1: f32 = rng.random::<f32>().max(1e-7);
        let u2: f32 = rng.random::<f32>();
        sigma * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
    }

    fn assert_lattice_consistent(grid: &CalibrationGrid, spacing: f32, tol: f32) {
        for (at, p) in grid.iter() {
            for (dc, dr) in [(1, 0), (0, 1)] {
                if let Some(q) = grid.get(at.offset(dc, dr)) {
                    let d = (q - p).norm();
                    assert!(
                        (d - spacing).abs() < tol,
                        "cells {:?} and +({dc},{dr}) are {d:.2}px apart",
                        at
                    );
                }
            }
        }
    }

    #[test]
    fn recovers_full_rotated_lattice() {
        let centers = lattice(9, 30.0, 0.3, Vector2::new(200.0, 80.0));
        let grid = GridEnumerator::new(centers, EnumeratorParams::default())
            .unwrap()
            .enumerate()
            .unwrap();
        assert_eq!(grid.len(), 81);
        assert_lattice_consistent(&grid, 30.0, 0.5);
    }

    /// True lattice index of every enumerated cell must be an axis-aligned
    /// relabelling of its grid coordinates.
    fn assert_indices_consistent(grid: &CalibrationGrid, truth: &[(u32, u32, (i32, i32))]) {
        let index_of = |p: Point2<f32>| {
            truth
                .iter()
                .find(|(x, y, _)| *x == p.x.to_bits() && *y == p.y.to_bits())
                .map(|(_, _, ij)| Vector2::new(ij.0, ij.1))
                .unwrap()
        };
        let origin = index_of(grid.get(GridCoords::new(0, 0)).unwrap());
        let along_col = index_of(grid.get(GridCoords::new(1, 0)).unwrap()) - origin;
        let along_row = index_of(grid.get(GridCoords::new(0, 1)).unwrap()) - origin;
        assert_eq!(along_col.abs().sum(), 1);
        assert_eq!(along_row.abs().sum(), 1);
        for (at, p) in grid.iter() {
            assert_eq!(
                index_of(p),
                origin + along_col * at.col + along_row * at.row,
                "cell {at:?} holds the wrong corner"
            );
        }
    }

    #[test]
    fn recovers_most_of_noisy_lattice() {
        // 7×7 lattice, per-axis noise of 5% of the spacing, default tolerances.
        let spacing = 40.0;
        let clean = lattice(7, spacing, 0.0, Vector2::new(100.0, 100.0));
        for seed in 0..10u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let centers: Vec<Point2<f32>> = clean
                .iter()
                .map(|p| {
                    let dx = gaussian(&mut rng, 0.05 * spacing);
                    let dy = gaussian(&mut rng, 0.05 * spacing);
                    Point2::new(p.x + dx, p.y + dy)
                })
                .collect();
            let truth: Vec<_> = centers
                .iter()
                .enumerate()
                .map(|(k, p)| (p.x.to_bits(), p.y.to_bits(), ((k % 7) as i32, (k / 7) as i32)))
                .collect();

            let grid = GridEnumerator::new(centers, EnumeratorParams::default())
                .unwrap()
                .enumerate()
                .unwrap();
            assert!(grid.len() >= 45, "seed {seed}: only {} of 49 corners enumerated", grid.len());
            assert_indices_consistent(&grid, &truth);

            let mut used: Vec<_> = grid.iter().map(|(_, p)| (p.x.to_bits(), p.y.to_bits())).collect();
            used.sort_unstable();
            used.dedup();
            assert_eq!(used.len(), grid.len(), "seed {seed}: a center was assigned twice");
        }
    }

    #[test]
    fn unit_square_model_ignores_surrounding_cells() {
        let centers = lattice(4, 10.0, 0.0, Vector2::new(0.0, 0.0));
        let params = EnumeratorParams {
            square_model: SquareModel::UnitSquare,
            ..EnumeratorParams::default()
        };
        let e = GridEnumerator::new(centers, params).unwrap();

        let square = [
            Point2::new(10.0, 10.0),
            Point2::new(10.0, 20.0),
            Point2::new(20.0, 10.0),
            Point2::new(21.0, 22.0),
        ];
        let mut grid = CalibrationGrid::new();
        let at = GridCoords::new(0, 0);
        for (cell, p) in [(0, 0), (0, 1), (1, 0), (1, 1)].into_iter().zip(square) {
            grid.insert(cell.into(), p);
        }
        // Off-lattice support that a fitted model would be pulled by.
        grid.insert(GridCoords::new(-1, 0), Point2::new(-5.0, 13.0));
        grid.insert(GridCoords::new(2, 2), Point2::new(40.0, 29.0));

        let exact = homography_from_4pt(&UNIT_SQUARE, &square).unwrap();
        let local = e.local_model(&grid, at, &square).unwrap();
        for (dc, dr) in EXPANSION_OFFSETS {
            let q = Point2::new(dc as f32, dr as f32);
            assert!((local.apply(q) - exact.apply(q)).norm() < 1e-3);
        }
        for (q, p) in UNIT_SQUARE.iter().zip(square) {
            assert!((local.apply(*q) - p).norm() < 1e-3);
        }
    }

    #[test]
    fn unit_square_model_follows_perspective() {
        let warp = Homography::new(Matrix3::new(
            30.0, 5.0, 100.0, 2.0, 28.0, 80.0, 0.004, 0.002, 1.0,
        ));
        let centers: Vec<Point2<f32>> = (0..9)
            .flat_map(|r| (0..9).map(move |c| (c, r)))
            .map(|(c, r)| warp.apply(Point2::new(c as f32, r as f32)))
            .collect();
        for square_model in [SquareModel::UnitSquare, SquareModel::Supported] {
            let params = EnumeratorParams {
                square_model,
                ..EnumeratorParams::default()
            };
            let grid = GridEnumerator::new(centers.clone(), params)
                .unwrap()
                .enumerate()
                .unwrap();
            assert_eq!(grid.len(), 81, "{square_model:?}");
        }
    }

    #[test]
    fn holes_and_spurious_points_do_not_break_growth() {
        let mut centers = lattice(8, 25.0, -0.15, Vector2::new(50.0, 60.0));
        centers.remove(10);
        centers.remove(40);
        // A few outliers between lattice sites.
        centers.push(Point2::new(1000.0, 1000.0));
        centers.push(Point2::new(-400.0, 30.0));
        let grid = GridEnumerator::new(centers, EnumeratorParams::default())
            .unwrap()
            .enumerate()
            .unwrap();
        assert!(grid.len() >= 55, "enumerated {}", grid.len());
        assert!(grid.iter().all(|(_, p)| p.x < 900.0 && p.x > -300.0));
        assert_lattice_consistent(&grid, 25.0, 0.5);
    }

    #[test]
    fn too_few_centers_is_an_error() {
        let err = GridEnumerator::new(
            vec![Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)],
            EnumeratorParams::default(),
        )
        .err();
        assert_eq!(err, Some(EnumerateError::TooFewCenters { found: 2 }));
    }

    #[test]
    fn collinear_centers_fail_square_locator() {
        let centers = vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(20.0, 0.0),
        ];
        let err = GridEnumerator::new(centers, EnumeratorParams::default())
            .unwrap()
            .enumerate()
            .unwrap_err();
        assert_eq!(err, EnumerateError::SquareLocatorFailed);
    }

    #[test]
    fn missing_fourth_corner_fails_central_square() {
        let centers = vec![
            Point2::new(0.0, 0.0),
            Point2::new(9.0, 0.0),
            Point2::new(0.0, -10.0),
            Point2::new(-30.0, 30.0),
        ];
        let err = GridEnumerator::new(centers, EnumeratorParams::default())
            .unwrap()
            .enumerate()
            .unwrap_err();
        assert!(matches!(err, EnumerateError::CentralSquareFailed { ratio } if ratio > 0.4));
    }

    #[test]
    fn nearest_skips_coincident_query_point() {
        let centers = vec![
            Point2::new(0.0, 0.0),
            Point2::new(3.0, 4.0),
            Point2::new(10.0, 0.0),
        ];
        let e = GridEnumerator::new(centers, EnumeratorParams::default()).unwrap();
        let (p, d) = e.nearest(Point2::new(0.0, 0.0), 0.0);
        assert_eq!(p, Point2::new(3.0, 4.0));
        assert!((d - 5.0).abs() < 1e-5);
        let (p, d) = e.nearest(Point2::new(0.0, 0.0), NO_SELF_EXCLUSION);
        assert_eq!(p, Point2::new(0.0, 0.0));
        assert_eq!(d, 0.0);
    }
}
