//! JSON configuration for a calibration and georeferencing session.

use std::{fs, path::Path};

use aerocal_calib::{CalibrationParams, CameraCalibrator, CameraModel, UndistortParams};
use aerocal_checkerboard::CornerDetector;
use aerocal_geo::Projector;
use serde::{Deserialize, Serialize};

use crate::AerocalError;

/// Every tunable of a session, persisted as one JSON file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Detector, enumerator, coverage gate, sampling and solver settings.
    pub calibration: CalibrationParams,
    pub undistort: UndistortParams,
    /// Takeoff point height above the annotated ground, in meters.
    pub takeoff_altitude_m: f64,
    /// Where the calibrated camera model is stored.
    pub camera_model_path: Option<String>,
    /// Written into the annotation export.
    pub project: Option<String>,
}

impl PipelineConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, AerocalError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), AerocalError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn build_detector(&self) -> CornerDetector {
        CornerDetector::new(
            self.calibration.detector.clone(),
            self.calibration.enumerator.clone(),
        )
    }

    pub fn build_calibrator(&self) -> CameraCalibrator {
        CameraCalibrator::new(self.calibration.clone())
    }

    /// Projector for frames of `image_size` taken with `model`'s camera.
    pub fn build_projector(&self, model: &CameraModel, image_size: (u32, u32)) -> Projector {
        Projector::from_camera_model(model)
            .with_image_size(image_size)
            .with_undistort_params(self.undistort.clone())
    }

    /// Load the camera model named by `camera_model_path`.
    pub fn load_camera_model(&self) -> Result<Option<CameraModel>, AerocalError> {
        match &self.camera_model_path {
            Some(path) => Ok(Some(CameraModel::load_json(path)?)),
            None => Ok(None),
        }
    }
}
