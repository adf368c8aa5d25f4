//! Pinhole camera calibration from checkerboard views.
//!
//! ## Quickstart
//!
//! ```no_run
//! use aerocal_calib::{CalibrationParams, CameraCalibrator};
//! use aerocal_core::GrayImage;
//!
//! let frames: Vec<GrayImage> = Vec::new(); // decoded elsewhere
//! let views: Vec<_> = frames.iter().map(|f| f.view()).collect();
//! let calibrator = CameraCalibrator::new(CalibrationParams::default());
//! match calibrator.calibrate_images(&views) {
//!     Ok(model) => println!("fx={:.1} rms={:.3}", model.camera_matrix[(0, 0)], model.rms_reprojection_error),
//!     Err(err) => eprintln!("calibration failed: {err}"),
//! }
//! ```
//!
//! ## Pipeline
//!
//! 1. Every frame goes through [`aerocal_checkerboard::CornerDetector`];
//!    frames whose grid covers less than `min_coverage` of the image are skipped.
//! 2. Accepted grids become [`PlanarView`]s, one board point per lattice index.
//! 3. Closed-form intrinsics from the view homographies seed a joint
//!    Levenberg–Marquardt refinement of intrinsics, distortion and poses.
//!
//! Videos are scanned with [`StrideSampler`], which tightens its stride every
//! time a frame is rejected.

mod calibrator;
mod camera;
mod error;
mod init;
mod io;
mod lm;
mod params;
mod sampling;
mod solver;
mod view;

pub use calibrator::{media_kind, CalibrationRun, CameraCalibrator, FrameSource, MediaKind};
pub use camera::{field_of_view_deg, CameraModel, Distortion, Intrinsics, UndistortParams};
pub use error::{CalibIoError, CalibrateError};
pub use init::{focal_only_intrinsics, pose_from_homography, zhang_intrinsics, Pose};
pub use lm::{levenberg_marquardt, numeric_jacobian, LeastSquaresProblem, LmReport};
pub use params::{CalibrationParams, LmParams, SamplingParams};
pub use sampling::{SampleState, StrideSampler};
pub use solver::{solve_planar_views, CalibrationSolution};
pub use view::PlanarView;
