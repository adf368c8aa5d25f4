use aerocal_calib::{CalibIoError, CalibrateError};
use aerocal_checkerboard::DetectError;
use aerocal_core::ImageError;
use aerocal_geo::GeoError;
use aerocal_telemetry::TelemetryError;

/// Errors produced by the high-level facade helpers.
#[derive(thiserror::Error, Debug)]
pub enum AerocalError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error(transparent)]
    Calibrate(#[from] CalibrateError),

    #[error(transparent)]
    CameraModel(#[from] CalibIoError),

    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "image")]
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
}
