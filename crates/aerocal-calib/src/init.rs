//! Closed-form starting points for the refinement.
//!
//! Each view contributes a board-to-image homography `H = λ K [r1 r2 t]`.
//! Orthonormality of `r1, r2` gives two constraints on `K` per view.

use aerocal_core::Homography;
use log::debug;
use nalgebra::{Matrix2, Matrix3, Matrix6, Rotation3, SymmetricEigen, Vector2, Vector3, Vector6};
use serde::{Deserialize, Serialize};

use crate::camera::Intrinsics;

/// Board pose in camera coordinates; `rotation` is a Rodrigues vector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rotation: Vector3<f64>,
    pub translation: Vector3<f64>,
}

impl Pose {
    pub fn matrix(&self) -> Matrix3<f64> {
        Rotation3::new(self.rotation).into_inner()
    }
}

/// Focal lengths with the principal point pinned to the image center.
///
/// Works from a single tilted view. Fronto-parallel views carry no focal
/// information and make the system singular.
pub fn focal_only_intrinsics(homographies: &[Homography], image_size: (u32, u32)) -> Option<Intrinsics> {
    let cx = image_size.0 as f64 / 2.0;
    let cy = image_size.1 as f64 / 2.0;

    let mut ata = Matrix2::<f64>::zeros();
    let mut atb = Vector2::<f64>::zeros();
    for hom in homographies {
        let mut h = hom.h;
        for j in 0..3 {
            h[(0, j)] -= cx * h[(2, j)];
            h[(1, j)] -= cy * h[(2, j)];
        }
        let c1: Vector3<f64> = h.column(0).into_owned();
        let c2: Vector3<f64> = h.column(1).into_owned();
        let pairs = [(c1, c2), ((c1 + c2) * 0.5, (c1 - c2) * 0.5)];
        for (a, b) in pairs {
            let (na, nb) = (a.norm(), b.norm());
            if na <= f64::EPSILON || nb <= f64::EPSILON {
                return None;
            }
            let (a, b) = (a / na, b / nb);
            let row = Vector2::new(a[0] * b[0], a[1] * b[1]);
            ata += row * row.transpose();
            atb += row * (-a[2] * b[2]);
        }
    }

    let f = ata.try_inverse()? * atb;
    let fx = (1.0 / f[0]).abs().sqrt();
    let fy = (1.0 / f[1]).abs().sqrt();
    if !(fx.is_finite() && fy.is_finite()) {
        return None;
    }
    debug!("focal-only init: fx={fx:.1} fy={fy:.1}");
    Some(Intrinsics { fx, fy, cx, cy })
}

fn zhang_row(h: &Matrix3<f64>, i: usize, j: usize) -> Vector6<f64> {
    let (hi, hj) = (h.column(i), h.column(j));
    Vector6::new(
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    )
}

/// Zhang's closed form for all four intrinsics. Needs at least 3 views.
///
/// Pixels are scaled to roughly unit range around the image center before
/// solving, which keeps `VᵀV` well conditioned.
pub fn zhang_intrinsics(homographies: &[Homography], image_size: (u32, u32)) -> Option<Intrinsics> {
    if homographies.len() < 3 {
        return None;
    }
    let (w, h) = (image_size.0 as f64, image_size.1 as f64);
    let s = w.max(h);
    let n = Matrix3::new(1.0 / s, 0.0, -w / (2.0 * s), 0.0, 1.0 / s, -h / (2.0 * s), 0.0, 0.0, 1.0);

    let mut vtv = Matrix6::<f64>::zeros();
    for hom in homographies {
        let hn = n * hom.h;
        let v12 = zhang_row(&hn, 0, 1);
        let vd = zhang_row(&hn, 0, 0) - zhang_row(&hn, 1, 1);
        vtv += v12 * v12.transpose() + vd * vd.transpose();
    }

    let eig = SymmetricEigen::new(vtv);
    let (idx, _) = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let mut b: Vector6<f64> = eig.eigenvectors.column(idx).into_owned();
    if b[0] < 0.0 {
        b = -b;
    }
    let [b11, b12, b22, b13, b23, b33] = [b[0], b[1], b[2], b[3], b[4], b[5]];

    let den = b11 * b22 - b12 * b12;
    if den <= 0.0 || b11 <= 0.0 {
        return None;
    }
    let v0 = (b12 * b13 - b11 * b23) / den;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    if lambda / b11 <= 0.0 {
        return None;
    }
    let alpha = (lambda / b11).sqrt();
    let beta = (lambda * b11 / den).sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    let intr = Intrinsics {
        fx: alpha * s,
        fy: beta * s,
        cx: u0 * s + w / 2.0,
        cy: v0 * s + h / 2.0,
    };
    let valid = [intr.fx, intr.fy, intr.cx, intr.cy].iter().all(|v| v.is_finite());
    debug!("zhang init: {intr:?}");
    valid.then_some(intr)
}

/// Board pose from its homography and the camera matrix.
///
/// The sign is fixed so that the board lies in front of the camera, and the
/// rotation is projected back onto SO(3).
pub fn pose_from_homography(intr: &Intrinsics, hom: &Homography) -> Option<Pose> {
    let m = intr.matrix().try_inverse()? * hom.h;
    let (h1, h2, h3) = (m.column(0), m.column(1), m.column(2));
    let norm = h1.norm();
    if norm <= f64::EPSILON {
        return None;
    }
    let mut scale = 1.0 / norm;
    if h3[2] * scale < 0.0 {
        scale = -scale;
    }
    let r1: Vector3<f64> = h1 * scale;
    let r2: Vector3<f64> = h2 * scale;
    let r3 = r1.cross(&r2);
    let translation: Vector3<f64> = h3 * scale;

    let r = Matrix3::from_columns(&[r1, r2, r3]);
    let rotation = Rotation3::from_matrix(&r).scaled_axis();
    Some(Pose {
        rotation,
        translation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Distortion;
    use aerocal_core::estimate_homography;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Point2, Point3};

    fn board_homography(intr: &Intrinsics, pose: &Pose) -> Homography {
        let board: Vec<Point2<f64>> = (0..9)
            .flat_map(|c| (0..7).map(move |r| Point2::new(c as f64, r as f64)))
            .collect();
        let r = pose.matrix();
        let image: Vec<Point2<f64>> = board
            .iter()
            .map(|p| {
                let pc = Point3::from(r * Vector3::new(p.x, p.y, 0.0) + pose.translation);
                intr.project(&Distortion::default(), &pc).unwrap()
            })
            .collect();
        estimate_homography(&board, &image).unwrap()
    }

    fn truth() -> Intrinsics {
        Intrinsics {
            fx: 1000.0,
            fy: 980.0,
            cx: 650.0,
            cy: 350.0,
        }
    }

    fn poses() -> Vec<Pose> {
        [
            ([0.4, 0.25, 0.05], [-4.0, -3.0, 14.0]),
            ([-0.3, 0.35, -0.1], [-5.0, -2.0, 13.0]),
            ([0.1, -0.4, 0.2], [-3.0, -4.0, 12.0]),
            ([0.2, 0.1, 1.2], [-1.0, -6.0, 15.0]),
        ]
        .into_iter()
        .map(|(r, t)| Pose {
            rotation: Vector3::from(r),
            translation: Vector3::from(t),
        })
        .collect()
    }

    #[test]
    fn zhang_recovers_intrinsics_from_exact_views() {
        let homs: Vec<_> = poses().iter().map(|p| board_homography(&truth(), p)).collect();
        let k = zhang_intrinsics(&homs, (1280, 720)).expect("zhang");
        assert_abs_diff_eq!(k.fx, 1000.0, epsilon = 0.5);
        assert_abs_diff_eq!(k.fy, 980.0, epsilon = 0.5);
        assert_abs_diff_eq!(k.cx, 650.0, epsilon = 0.5);
        assert_abs_diff_eq!(k.cy, 350.0, epsilon = 0.5);
    }

    #[test]
    fn zhang_needs_three_views() {
        let homs: Vec<_> = poses()[..2].iter().map(|p| board_homography(&truth(), p)).collect();
        assert!(zhang_intrinsics(&homs, (1280, 720)).is_none());
    }

    #[test]
    fn focal_only_from_single_tilted_view() {
        let centered = Intrinsics {
            cx: 640.0,
            cy: 360.0,
            ..truth()
        };
        let hom = board_homography(&centered, &poses()[0]);
        let k = focal_only_intrinsics(&[hom], (1280, 720)).expect("focal init");
        assert_abs_diff_eq!(k.fx, 1000.0, epsilon = 1e-3);
        assert_abs_diff_eq!(k.fy, 980.0, epsilon = 1e-3);
        assert_eq!((k.cx, k.cy), (640.0, 360.0));
    }

    #[test]
    fn pose_round_trips_through_homography() {
        let pose = poses()[1];
        let hom = board_homography(&truth(), &pose);
        let est = pose_from_homography(&truth(), &hom).unwrap();
        assert_abs_diff_eq!(est.rotation, pose.rotation, epsilon = 1e-6);
        assert_abs_diff_eq!(est.translation, pose.translation, epsilon = 1e-6);
    }
}
