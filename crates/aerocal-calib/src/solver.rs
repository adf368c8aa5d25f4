//! Multi-view planar calibration: homographies, closed-form init, then a
//! joint refinement of intrinsics, distortion and every board pose.

use aerocal_core::{estimate_homography, Homography};
use log::{debug, info};
use nalgebra::{DMatrix, DVector, Point3, Rotation3, Vector3};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::camera::{Distortion, Intrinsics};
use crate::error::CalibrateError;
use crate::init::{focal_only_intrinsics, pose_from_homography, zhang_intrinsics, Pose};
use crate::lm::{levenberg_marquardt, step_size, LeastSquaresProblem};
use crate::params::LmParams;
use crate::view::PlanarView;

const N_INTRINSIC: usize = 9;
const POSE_DOF: usize = 6;

/// Refined camera and per-view board poses.
#[derive(Clone, Debug)]
pub struct CalibrationSolution {
    pub intrinsics: Intrinsics,
    pub distortion: Distortion,
    pub poses: Vec<Pose>,
    /// Root-mean-square reprojection error in pixels.
    pub rms: f64,
    pub iterations: usize,
}

/// Intrinsics laid out as `[fx, fy, cx, cy, k1, k2, p1, p2, k3]`.
fn pack_intrinsics(k: &Intrinsics, d: &Distortion) -> [f64; N_INTRINSIC] {
    [k.fx, k.fy, k.cx, k.cy, d.k1, d.k2, d.p1, d.p2, d.k3]
}

fn unpack_intrinsics(v: &[f64; N_INTRINSIC]) -> (Intrinsics, Distortion) {
    (
        Intrinsics {
            fx: v[0],
            fy: v[1],
            cx: v[2],
            cy: v[3],
        },
        Distortion::from_array([v[4], v[5], v[6], v[7], v[8]]),
    )
}

struct BundleProblem<'a> {
    views: &'a [PlanarView],
    fixed: [f64; N_INTRINSIC],
    /// Indices into the 9 intrinsics that are optimized, in parameter order.
    free: Vec<usize>,
    row_offsets: Vec<usize>,
    n_rows: usize,
}

impl<'a> BundleProblem<'a> {
    fn new(views: &'a [PlanarView], fixed: [f64; N_INTRINSIC], free_principal_point: bool) -> Self {
        let free = (0..N_INTRINSIC)
            .filter(|&i| free_principal_point || !(i == 2 || i == 3))
            .collect();
        let mut row_offsets = Vec::with_capacity(views.len());
        let mut n_rows = 0;
        for v in views {
            row_offsets.push(n_rows);
            n_rows += 2 * v.len();
        }
        Self {
            views,
            fixed,
            free,
            row_offsets,
            n_rows,
        }
    }

    fn pack(&self, poses: &[Pose]) -> DVector<f64> {
        let mut x = Vec::with_capacity(self.num_params());
        x.extend(self.free.iter().map(|&i| self.fixed[i]));
        for p in poses {
            x.extend(p.rotation.iter().chain(p.translation.iter()));
        }
        DVector::from_vec(x)
    }

    fn intrinsics(&self, x: &DVector<f64>) -> [f64; N_INTRINSIC] {
        let mut all = self.fixed;
        for (slot, &i) in self.free.iter().enumerate() {
            all[i] = x[slot];
        }
        all
    }

    fn pose_offset(&self, view: usize) -> usize {
        self.free.len() + POSE_DOF * view
    }

    fn pose(&self, x: &DVector<f64>, view: usize) -> Pose {
        let o = self.pose_offset(view);
        Pose {
            rotation: Vector3::new(x[o], x[o + 1], x[o + 2]),
            translation: Vector3::new(x[o + 3], x[o + 4], x[o + 5]),
        }
    }

    fn poses(&self, x: &DVector<f64>) -> Vec<Pose> {
        (0..self.views.len()).map(|v| self.pose(x, v)).collect()
    }

    /// Reprojection residuals of one view, written into `out`.
    fn view_residuals(
        &self,
        intr: &[f64; N_INTRINSIC],
        pose: &Pose,
        view: &PlanarView,
        out: &mut [f64],
    ) {
        let (k, d) = unpack_intrinsics(intr);
        let r = Rotation3::new(pose.rotation);
        for (i, (obj, img)) in view.object_points.iter().zip(&view.image_points).enumerate() {
            let pc = Point3::from(r * obj.coords + pose.translation);
            // Points behind the camera get a large finite penalty.
            let (u, v) = match k.project(&d, &pc) {
                Some(p) => (p.x, p.y),
                None => (img.x + 1e6, img.y + 1e6),
            };
            out[2 * i] = u - img.x;
            out[2 * i + 1] = v - img.y;
        }
    }
}

impl LeastSquaresProblem for BundleProblem<'_> {
    fn num_params(&self) -> usize {
        self.free.len() + POSE_DOF * self.views.len()
    }

    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        let intr = self.intrinsics(x);
        let mut r = DVector::zeros(self.n_rows);
        for (v, view) in self.views.iter().enumerate() {
            let o = self.row_offsets[v];
            let pose = self.pose(x, v);
            self.view_residuals(&intr, &pose, view, &mut r.as_mut_slice()[o..o + 2 * view.len()]);
        }
        r
    }

    /// Block-sparse central differences: a pose column only touches its own view's rows.
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(self.n_rows, self.num_params());
        let mut probe = x.clone();

        for c in 0..self.free.len() {
            let h = step_size(x[c]);
            probe[c] = x[c] + h;
            let plus = self.residuals(&probe);
            probe[c] = x[c] - h;
            let minus = self.residuals(&probe);
            probe[c] = x[c];
            jac.set_column(c, &((plus - minus) / (2.0 * h)));
        }

        let intr = self.intrinsics(x);
        for (v, view) in self.views.iter().enumerate() {
            let rows = 2 * view.len();
            let o = self.row_offsets[v];
            let mut plus = vec![0.0; rows];
            let mut minus = vec![0.0; rows];
            for k in 0..POSE_DOF {
                let c = self.pose_offset(v) + k;
                let h = step_size(x[c]);
                probe[c] = x[c] + h;
                self.view_residuals(&intr, &self.pose(&probe, v), view, &mut plus);
                probe[c] = x[c] - h;
                self.view_residuals(&intr, &self.pose(&probe, v), view, &mut minus);
                probe[c] = x[c];
                for i in 0..rows {
                    jac[(o + i, c)] = (plus[i] - minus[i]) / (2.0 * h);
                }
            }
        }
        jac
    }
}

/// Calibrate a camera from planar board views.
///
/// With at least `params.min_views_for_principal_point` views, Zhang's
/// closed form seeds all four intrinsics and the principal point is refined.
/// Otherwise the principal point stays at the image center.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(views, params), fields(views = views.len()))
)]
pub fn solve_planar_views(
    views: &[PlanarView],
    image_size: (u32, u32),
    params: &LmParams,
) -> Result<CalibrationSolution, CalibrateError> {
    if views.is_empty() {
        return Err(CalibrateError::NoPatternFound { examined: 0 });
    }

    let mut homographies: Vec<Homography> = Vec::with_capacity(views.len());
    for (index, view) in views.iter().enumerate() {
        if view.len() < 4 {
            return Err(CalibrateError::TooFewPoints {
                index,
                points: view.len(),
            });
        }
        let h = estimate_homography(&view.board_points(), &view.image_points)
            .ok_or(CalibrateError::DegenerateView { index })?;
        homographies.push(h);
    }

    let free_principal_point = views.len() >= params.min_views_for_principal_point;
    let init = if free_principal_point {
        zhang_intrinsics(&homographies, image_size)
            .or_else(|| focal_only_intrinsics(&homographies, image_size))
    } else {
        focal_only_intrinsics(&homographies, image_size)
    }
    .ok_or_else(|| CalibrateError::Solver("intrinsic initialization failed".into()))?;
    debug!("initial intrinsics {init:?}");

    let poses = homographies
        .iter()
        .enumerate()
        .map(|(index, h)| pose_from_homography(&init, h).ok_or(CalibrateError::DegenerateView { index }))
        .collect::<Result<Vec<_>, _>>()?;

    let problem = BundleProblem::new(
        views,
        pack_intrinsics(&init, &Distortion::default()),
        free_principal_point,
    );
    let report = levenberg_marquardt(&problem, problem.pack(&poses), params);
    let (intrinsics, distortion) = unpack_intrinsics(&problem.intrinsics(&report.params));

    if ![intrinsics.fx, intrinsics.fy].iter().all(|f| f.is_finite() && *f > 0.0) {
        return Err(CalibrateError::Solver(format!(
            "refinement diverged (fx={}, fy={})",
            intrinsics.fx, intrinsics.fy
        )));
    }

    let n_points: usize = views.iter().map(PlanarView::len).sum();
    let rms = (report.cost / n_points as f64).sqrt();
    info!(
        "calibrated from {} views / {} points: fx={:.1} fy={:.1} cx={:.1} cy={:.1}, rms {:.3}px",
        views.len(),
        n_points,
        intrinsics.fx,
        intrinsics.fy,
        intrinsics.cx,
        intrinsics.cy,
        rms
    );

    Ok(CalibrationSolution {
        intrinsics,
        distortion,
        poses: problem.poses(&report.params),
        rms,
        iterations: report.iterations,
    })
}
