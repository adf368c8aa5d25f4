use aerocal_core::ImageError;

/// Failures while growing a lattice from detected centers.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EnumerateError {
    #[error("at least 3 corner centers are required, found {found}")]
    TooFewCenters { found: usize },

    #[error("square locator failed: no second basis corner found")]
    SquareLocatorFailed,

    #[error("central square closure failed (distance ratio {ratio:.3})")]
    CentralSquareFailed { ratio: f32 },

    #[error("degenerate square at ({col}, {row}); homography undefined")]
    DegenerateSquare { col: i32, row: i32 },
}

/// Failures of the image-to-lattice detection pipeline.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DetectError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("too few corner peaks in response map: {found}")]
    TooFewCorners { found: usize },

    #[error(transparent)]
    Enumerate(#[from] EnumerateError),
}
