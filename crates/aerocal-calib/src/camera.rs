//! Pinhole camera with Brown–Conrady distortion.
//!
//! Distortion acts on normalized image coordinates `(x, y) = (X/Z, Y/Z)`:
//!
//! ```text
//! r² = x² + y²
//! x' = x(1 + k1 r² + k2 r⁴ + k3 r⁶) + 2 p1 x y + p2 (r² + 2x²)
//! y' = y(1 + k1 r² + k2 r⁴ + k3 r⁶) + p1 (r² + 2y²) + 2 p2 x y
//! ```

use nalgebra::{Matrix3, Point2, Point3};
use serde::{Deserialize, Serialize};

/// Radial (`k1, k2, k3`) and tangential (`p1, p2`) coefficients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    /// Coefficients in the conventional `[k1, k2, p1, p2, k3]` order.
    pub fn from_array(c: [f64; 5]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
        }
    }

    pub fn to_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn is_zero(&self) -> bool {
        self.to_array().iter().all(|&c| c == 0.0)
    }

    fn tangential(&self, x: f64, y: f64, r2: f64) -> (f64, f64) {
        (
            2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x),
            self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y,
        )
    }

    pub fn distort_normalized(&self, p: Point2<f64>) -> Point2<f64> {
        let r2 = p.x * p.x + p.y * p.y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let (dx, dy) = self.tangential(p.x, p.y, r2);
        Point2::new(p.x * radial + dx, p.y * radial + dy)
    }

    /// Fixed-point inversion of [`Distortion::distort_normalized`].
    ///
    /// Runs `max_iterations` rounds or stops early once the update is below
    /// `epsilon` (normalized units; `0` disables the early exit).
    pub fn undistort_normalized(&self, p: Point2<f64>, params: &UndistortParams) -> Point2<f64> {
        let (x0, y0) = (p.x, p.y);
        let (mut x, mut y) = (x0, y0);
        for _ in 0..params.max_iterations {
            let r2 = x * x + y * y;
            let icdist = 1.0 / (1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3)));
            let (dx, dy) = self.tangential(x, y, r2);
            let nx = (x0 - dx) * icdist;
            let ny = (y0 - dy) * icdist;
            let step = (nx - x).hypot(ny - y);
            x = nx;
            y = ny;
            if step < params.epsilon {
                break;
            }
        }
        Point2::new(x, y)
    }

    /// Undistort a pixel and re-project it through the same camera matrix.
    pub fn undistort_pixel(
        &self,
        k: &Matrix3<f64>,
        p: Point2<f64>,
        params: &UndistortParams,
    ) -> Point2<f64> {
        let n = Point2::new((p.x - k[(0, 2)]) / k[(0, 0)], (p.y - k[(1, 2)]) / k[(1, 1)]);
        let u = self.undistort_normalized(n, params);
        Point2::new(u.x * k[(0, 0)] + k[(0, 2)], u.y * k[(1, 1)] + k[(1, 2)])
    }

    /// Inverse of [`Distortion::undistort_pixel`].
    pub fn distort_pixel(&self, k: &Matrix3<f64>, p: Point2<f64>) -> Point2<f64> {
        let n = Point2::new((p.x - k[(0, 2)]) / k[(0, 0)], (p.y - k[(1, 2)]) / k[(1, 1)]);
        let d = self.distort_normalized(n);
        Point2::new(d.x * k[(0, 0)] + k[(0, 2)], d.y * k[(1, 1)] + k[(1, 2)])
    }
}

/// Iteration control for point undistortion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UndistortParams {
    pub max_iterations: usize,
    pub epsilon: f64,
}

impl Default for UndistortParams {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            epsilon: 0.0,
        }
    }
}

/// Focal lengths and principal point in pixels; zero skew.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }

    /// Project a point given in camera coordinates. `None` at or behind the camera.
    pub fn project(&self, distortion: &Distortion, pc: &Point3<f64>) -> Option<Point2<f64>> {
        if pc.z <= f64::EPSILON {
            return None;
        }
        let d = distortion.distort_normalized(Point2::new(pc.x / pc.z, pc.y / pc.z));
        Some(Point2::new(self.fx * d.x + self.cx, self.fy * d.y + self.cy))
    }
}

/// Horizontal and vertical field of view in degrees for a camera matrix.
pub fn field_of_view_deg(k: &Matrix3<f64>, image_size: (u32, u32)) -> (f64, f64) {
    let (w, h) = (image_size.0 as f64, image_size.1 as f64);
    let Intrinsics { fx, fy, cx, cy } = Intrinsics::from_matrix(k);
    let fov_x = cx.atan2(fx) + (w - cx).atan2(fx);
    let fov_y = cy.atan2(fy) + (h - cy).atan2(fy);
    (fov_x.to_degrees(), fov_y.to_degrees())
}

/// Result of a calibration run; this is the blob persisted per camera.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    pub camera_matrix: Matrix3<f64>,
    pub distortion: Distortion,
    pub fov_x_deg: f64,
    pub fov_y_deg: f64,
    pub image_size: (u32, u32),
    /// Number of images or frames whose views entered the solve.
    pub n_images: usize,
    /// Root-mean-square reprojection error in pixels.
    pub rms_reprojection_error: f64,
}

impl CameraModel {
    /// Build a model and derive its field of view from `camera_matrix`.
    pub fn new(
        camera_matrix: Matrix3<f64>,
        distortion: Distortion,
        image_size: (u32, u32),
        n_images: usize,
        rms_reprojection_error: f64,
    ) -> Self {
        let (fov_x_deg, fov_y_deg) = field_of_view_deg(&camera_matrix, image_size);
        Self {
            camera_matrix,
            distortion,
            fov_x_deg,
            fov_y_deg,
            image_size,
            n_images,
            rms_reprojection_error,
        }
    }

    pub fn intrinsics(&self) -> Intrinsics {
        Intrinsics::from_matrix(&self.camera_matrix)
    }

    pub fn fov_rad(&self) -> (f64, f64) {
        (self.fov_x_deg.to_radians(), self.fov_y_deg.to_radians())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn drone_camera() -> (Matrix3<f64>, Distortion) {
        let k = Matrix3::new(
            1.83427403e03,
            0.0,
            9.87014485e02,
            0.0,
            1.83308269e03,
            5.78589467e02,
            0.0,
            0.0,
            1.0,
        );
        let d = Distortion::from_array([6.489003e-02, -6.948572e-01, -3.838770e-04, 8.868022e-04, 2.579142]);
        (k, d)
    }

    #[test]
    fn fov_of_reference_camera() {
        let (k, _) = drone_camera();
        let (fx, fy) = field_of_view_deg(&k, (2048, 1080));
        assert_abs_diff_eq!(fx, 58.330549, epsilon = 1e-4);
        assert_abs_diff_eq!(fy, 32.815780, epsilon = 1e-4);
    }

    #[test]
    fn undistort_inverts_distort_near_center() {
        let (k, d) = drone_camera();
        let params = UndistortParams {
            max_iterations: 50,
            epsilon: 1e-14,
        };
        for p in [Point2::new(1000.0, 500.0), Point2::new(700.0, 300.0), Point2::new(1300.0, 800.0)] {
            let und = d.undistort_pixel(&k, p, &params);
            let back = d.distort_pixel(&k, und);
            assert_abs_diff_eq!(back.x, p.x, epsilon = 1e-6);
            assert_abs_diff_eq!(back.y, p.y, epsilon = 1e-6);
        }
    }

    #[test]
    fn zero_distortion_is_identity() {
        let (k, _) = drone_camera();
        let d = Distortion::default();
        assert!(d.is_zero());
        let p = Point2::new(123.5, 987.25);
        let q = d.undistort_pixel(&k, p, &UndistortParams::default());
        assert_abs_diff_eq!(q.x, p.x, epsilon = 1e-9);
        assert_abs_diff_eq!(q.y, p.y, epsilon = 1e-9);
    }

    #[test]
    fn projection_rejects_points_behind_camera() {
        let intr = Intrinsics {
            fx: 800.0,
            fy: 800.0,
            cx: 320.0,
            cy: 240.0,
        };
        let d = Distortion::default();
        assert!(intr.project(&d, &Point3::new(0.0, 0.0, -1.0)).is_none());
        let p = intr.project(&d, &Point3::new(0.5, -0.25, 2.0)).unwrap();
        assert_abs_diff_eq!(p.x, 520.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, 140.0, epsilon = 1e-12);
    }

    #[test]
    fn model_serializes_round_trip() {
        let (k, d) = drone_camera();
        let model = CameraModel::new(k, d, (2048, 1080), 1, 0.4);
        let json = serde_json::to_string(&model).unwrap();
        let back: CameraModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back.image_size, model.image_size);
        assert_eq!(back.n_images, 1);
        assert_abs_diff_eq!(back.camera_matrix, model.camera_matrix, epsilon = 1e-9);
        assert_abs_diff_eq!(back.distortion.k3, model.distortion.k3, epsilon = 1e-12);
        assert_abs_diff_eq!(back.fov_x_deg, model.fov_x_deg, epsilon = 1e-9);
    }
}
