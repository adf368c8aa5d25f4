/// Failures of a calibration run.
#[derive(thiserror::Error, Debug)]
pub enum CalibrateError {
    #[error("no images or video frames to calibrate from")]
    NoMediaFound,

    #[error("no checkerboard with sufficient coverage in {examined} examined frames")]
    NoPatternFound { examined: usize },

    #[error("view {index} has {points} correspondences, at least 4 are required")]
    TooFewPoints { index: usize, points: usize },

    #[error("view {index}: board-to-image homography is degenerate")]
    DegenerateView { index: usize },

    #[error("frames of different sizes in one run: {first:?} vs {other:?}")]
    MixedImageSizes {
        first: (u32, u32),
        other: (u32, u32),
    },

    #[error("calibration solver failed: {0}")]
    Solver(String),
}

/// Failures reading or writing a persisted camera model.
#[derive(thiserror::Error, Debug)]
pub enum CalibIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
