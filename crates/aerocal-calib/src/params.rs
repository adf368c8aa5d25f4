use aerocal_checkerboard::{DetectorParams, EnumeratorParams};
use serde::{Deserialize, Serialize};

/// Everything a calibration run can be tuned with.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CalibrationParams {
    pub detector: DetectorParams,
    pub enumerator: EnumeratorParams,
    /// A frame is accepted only when its grid coverage (fraction of the
    /// 10×10 image bins) is strictly above this.
    pub min_coverage: f32,
    pub sampling: SamplingParams,
    pub lm: LmParams,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            detector: DetectorParams::default(),
            enumerator: EnumeratorParams::default(),
            min_coverage: 0.15,
            sampling: SamplingParams::default(),
            lm: LmParams::default(),
        }
    }
}

/// Adaptive stride over video frames.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplingParams {
    /// Target number of frames examined per video.
    pub initial_samples: usize,
    /// The target grows by one per rejected frame, up to this.
    pub max_samples: usize,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            initial_samples: 15,
            max_samples: 30,
        }
    }
}

/// Levenberg–Marquardt settings for the intrinsic/extrinsic refinement.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LmParams {
    pub max_iterations: usize,
    pub lambda_init: f64,
    pub lambda_mul: f64,
    /// Stop once the relative decrease of the squared error falls below this.
    pub cost_tolerance: f64,
    /// Stop once `|δ| / |x|` falls below this.
    pub step_tolerance: f64,
    /// With fewer views than this the principal point stays at the image center.
    pub min_views_for_principal_point: usize,
}

impl Default for LmParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            lambda_init: 1e-3,
            lambda_mul: 10.0,
            cost_tolerance: 1e-14,
            step_tolerance: 1e-12,
            min_views_for_principal_point: 3,
        }
    }
}
