//! Flat-ground projection between image pixels and UTM coordinates.
//!
//! Camera frame: `x` right, `y` forward along the optical axis, `z` up.
//! World frame: east, north, up, with the drone at the origin of the
//! horizontal axes and the ground at `z = -height`.

use aerocal_calib::{CameraModel, Distortion, UndistortParams};
use log::debug;
use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::error::GeoError;
use crate::utm::{from_latlon, to_latlon, GeoPosition, WorldPoint};

/// Gimbal attitude in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct YawPitchRoll {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl YawPitchRoll {
    pub fn new(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self { yaw, pitch, roll }
    }

    pub fn from_degrees(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self::new(yaw.to_radians(), pitch.to_radians(), roll.to_radians())
    }

    /// Camera-to-world rotation. Log yaw is clockwise, the model's is
    /// counter-clockwise, hence the sign flip.
    pub fn attitude(&self) -> Matrix3<f64> {
        rotation(-self.yaw, self.pitch, self.roll)
    }
}

/// Rotation about the forward axis.
pub fn roll_matrix(roll: f64) -> Matrix3<f64> {
    let (s, c) = roll.sin_cos();
    Matrix3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c)
}

/// Rotation about the right axis.
pub fn pitch_matrix(pitch: f64) -> Matrix3<f64> {
    let (s, c) = pitch.sin_cos();
    Matrix3::new(1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c)
}

/// Rotation about the up axis.
pub fn yaw_matrix(yaw: f64) -> Matrix3<f64> {
    let (s, c) = yaw.sin_cos();
    Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
}

/// `R_yaw · R_pitch · R_roll`.
pub fn rotation(yaw: f64, pitch: f64, roll: f64) -> Matrix3<f64> {
    yaw_matrix(yaw) * pitch_matrix(pitch) * roll_matrix(roll)
}

#[derive(Clone, Debug, PartialEq)]
struct Lens {
    camera_matrix: Matrix3<f64>,
    distortion: Distortion,
}

/// Maps pixels of one camera to ground coordinates and back.
#[derive(Clone, Debug, PartialEq)]
pub struct Projector {
    image_size: (f64, f64),
    fov_x: f64,
    fov_y: f64,
    lens: Option<Lens>,
    undistort: UndistortParams,
}

impl Projector {
    /// Ideal pinhole from the image size and the field of view in radians.
    pub fn new(image_size: (u32, u32), fov_x: f64, fov_y: f64) -> Self {
        Self {
            image_size: (image_size.0 as f64, image_size.1 as f64),
            fov_x,
            fov_y,
            lens: None,
            undistort: UndistortParams::default(),
        }
    }

    /// Undistort pixels through this camera before projecting them.
    pub fn with_camera(mut self, camera_matrix: Matrix3<f64>, distortion: Distortion) -> Self {
        self.lens = Some(Lens {
            camera_matrix,
            distortion,
        });
        self
    }

    pub fn from_camera_model(model: &CameraModel) -> Self {
        let (fov_x, fov_y) = model.fov_rad();
        Self::new(model.image_size, fov_x, fov_y).with_camera(model.camera_matrix, model.distortion)
    }

    /// Frames of the video being annotated may differ in size from the
    /// calibration images.
    pub fn with_image_size(mut self, image_size: (u32, u32)) -> Self {
        self.image_size = (image_size.0 as f64, image_size.1 as f64);
        self
    }

    pub fn with_undistort_params(mut self, params: UndistortParams) -> Self {
        self.undistort = params;
        self
    }

    #[inline]
    pub fn image_size(&self) -> (f64, f64) {
        self.image_size
    }

    /// Horizontal and vertical field of view in radians.
    #[inline]
    pub fn fov(&self) -> (f64, f64) {
        (self.fov_x, self.fov_y)
    }

    pub fn has_camera(&self) -> bool {
        self.lens.is_some()
    }

    /// Size of the image plane at unit distance.
    fn plane_extent(&self) -> (f64, f64) {
        (2.0 * (self.fov_x / 2.0).tan(), 2.0 * (self.fov_y / 2.0).tan())
    }

    /// The calibrated camera matrix, or the one implied by the field of view.
    pub fn camera_matrix(&self) -> Matrix3<f64> {
        match &self.lens {
            Some(lens) => lens.camera_matrix,
            None => {
                let (w, h) = self.image_size;
                let (pw, ph) = self.plane_extent();
                Matrix3::new(w / pw, 0.0, w / 2.0, 0.0, h / ph, h / 2.0, 0.0, 0.0, 1.0)
            }
        }
    }

    /// Viewing ray of a pixel in camera coordinates, scaled to unit depth.
    pub fn unit_ray(&self, pixel: Point2<f64>) -> Vector3<f64> {
        let p = match &self.lens {
            Some(lens) => lens
                .distortion
                .undistort_pixel(&lens.camera_matrix, pixel, &self.undistort),
            None => pixel,
        };
        let (w, h) = self.image_size;
        let (pw, ph) = self.plane_extent();
        Vector3::new((p.x - w / 2.0) / w * pw, 1.0, -(p.y - h / 2.0) / h * ph)
    }

    /// Ground offset from the drone, east/north in meters.
    fn ground_offset(&self, pixel: Point2<f64>, height: f64, ypr: &YawPitchRoll) -> Vector3<f64> {
        let rotated = ypr.attitude() * self.unit_ray(pixel);
        rotated / rotated.z * -height
    }

    /// Intersect the ray through `pixel` with flat ground `height` meters below the drone.
    ///
    /// Rays above the horizon meet the ground plane behind the camera; the
    /// returned point is then on the opposite side of the drone.
    pub fn world_point(
        &self,
        pixel: Point2<f64>,
        height: f64,
        ypr: &YawPitchRoll,
        position: &GeoPosition,
    ) -> Result<WorldPoint, GeoError> {
        let drone = from_latlon(position.lat, position.lon)?;
        let g = self.ground_offset(pixel, height, ypr);
        Ok(WorldPoint {
            easting: drone.easting + g.x,
            northing: drone.northing + g.y,
            zone: drone.zone,
        })
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, pixels, ypr, position), fields(n = pixels.len()))
    )]
    pub fn world_points(
        &self,
        pixels: &[Point2<f64>],
        height: f64,
        ypr: &YawPitchRoll,
        position: &GeoPosition,
    ) -> Result<Vec<WorldPoint>, GeoError> {
        let drone = from_latlon(position.lat, position.lon)?;
        Ok(pixels
            .iter()
            .map(|&p| {
                let g = self.ground_offset(p, height, ypr);
                WorldPoint {
                    easting: drone.easting + g.x,
                    northing: drone.northing + g.y,
                    zone: drone.zone,
                }
            })
            .collect())
    }

    /// Latitude and longitude of the ground point under `pixel`.
    pub fn gps_point(
        &self,
        pixel: Point2<f64>,
        height: f64,
        ypr: &YawPitchRoll,
        position: &GeoPosition,
    ) -> Result<GeoPosition, GeoError> {
        let wp = self.world_point(pixel, height, ypr, position)?;
        to_latlon(wp.easting, wp.northing, wp.zone)
    }

    /// Pixel showing a ground point, `None` when it is behind the camera.
    ///
    /// `world` must be expressed in the drone's UTM zone.
    pub fn image_point(
        &self,
        world: &WorldPoint,
        height: f64,
        ypr: &YawPitchRoll,
        position: &GeoPosition,
    ) -> Result<Option<Point2<f64>>, GeoError> {
        let drone = from_latlon(position.lat, position.lon)?;
        if drone.zone != world.zone {
            debug!("projecting {:?} from drone zone {:?}", world.zone, drone.zone);
        }
        let g = Vector3::new(world.easting - drone.easting, world.northing - drone.northing, -height);
        let v = ypr.attitude().transpose() * g;
        if v.y <= 0.0 {
            return Ok(None);
        }
        let v = v / v.y;
        let (w, h) = self.image_size;
        let (pw, ph) = self.plane_extent();
        let ideal = Point2::new(v.x / pw * w + w / 2.0, -v.z / ph * h + h / 2.0);
        Ok(Some(match &self.lens {
            Some(lens) => lens.distortion.distort_pixel(&lens.camera_matrix, ideal),
            None => ideal,
        }))
    }
}
