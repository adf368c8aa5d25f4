//! High-level facade crate for the `aerocal-*` workspace.
//!
//! This crate provides:
//! - re-exports of the underlying crates: checkerboard detection, camera
//!   calibration, georeferencing and flight-log alignment
//! - frame annotations projected onto the ground, with CSV export
//! - a JSON [`io::PipelineConfig`] bundling every tunable
//! - (feature `image`) helpers that decode image files and run detection or
//!   calibration on them.
//!
//! ## Quickstart
//!
//! ```no_run
//! use aerocal::annotations::{project_annotation, AnnotationPrimitive};
//! use aerocal::io::PipelineConfig;
//! use aerocal::telemetry::{DroneLog, FlightAlignment, VideoMetadata};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = PipelineConfig::load_json("session.json")?;
//! let camera = cfg.load_camera_model()?.ok_or("no camera model configured")?;
//!
//! let log = DroneLog::parse(&std::fs::read("flight.csv")?)?;
//! let video = VideoMetadata::new(62.5, 1875, 3840, 2160);
//! let projector = cfg.build_projector(&camera, (video.width, video.height));
//! let mut alignment = FlightAlignment::new(log, video);
//! alignment.set_takeoff_altitude(cfg.takeoff_altitude_m);
//! alignment.match_log_and_video()?;
//!
//! let post = AnnotationPrimitive::FramePoint {
//!     name: "post".into(),
//!     frame: 900,
//!     left: 1820.0,
//!     top: 1200.0,
//! };
//! let record = project_annotation(&alignment, &projector, &post)?;
//! println!("{} at {:?}", record.name, record.position);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `aerocal::core`: images, sparse grids, homographies, logging setup.
//! - `aerocal::checkerboard`: symmetry detector, corner extraction, grid enumeration.
//! - `aerocal::calib`: camera calibration from images or sampled video frames.
//! - `aerocal::geo`: pixel to ground projection, UTM, horizon overlay.
//! - `aerocal::telemetry`: drone logs and video-to-log alignment.
//! - `aerocal::detect` (feature `image`): end-to-end helpers from image files.

pub use aerocal_calib as calib;
pub use aerocal_checkerboard as checkerboard;
pub use aerocal_core as core;
pub use aerocal_geo as geo;
pub use aerocal_telemetry as telemetry;

pub use aerocal_calib::{CalibrationParams, CameraCalibrator, CameraModel};
pub use aerocal_checkerboard::{CornerDetection, CornerDetector, DetectorParams, EnumeratorParams};
pub use aerocal_geo::{GeoPosition, Projector, WorldPoint, YawPitchRoll};
pub use aerocal_telemetry::{DroneLog, FlightAlignment, VideoMetadata};

pub mod annotations;
mod error;
pub mod io;

#[cfg(feature = "image")]
pub mod detect;

pub use error::AerocalError;

/// Install a `tracing` subscriber that also receives `log` records.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    aerocal_core::init_tracing(json);
    // Ignore errors if a logger was already installed.
    let _ = tracing_log::LogTracer::init();
}
