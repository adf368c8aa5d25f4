//! Checkerboard corner detector built on top of `aerocal-core`.
//!
//! ## Quickstart
//!
//! ```
//! use aerocal_checkerboard::{CornerDetector, DetectorParams, EnumeratorParams};
//! use aerocal_core::GrayImage;
//!
//! let detector = CornerDetector::new(DetectorParams::default(), EnumeratorParams::default());
//! let frame = GrayImage::new(64, 64);
//! let result = detector.detect(&frame.view());
//! println!("detected: {}", result.is_ok());
//! ```
//!
//! Pipeline:
//! 1. Correlate the frame with a complex order-2 rotational symmetry kernel;
//!    the response is the squared magnitude.
//! 2. Normalize the response against its local min/max.
//! 3. Threshold, trace the outer boundary of each blob and take the polygon
//!    centroid as the corner center.
//! 4. Seed a lattice at the center nearest the centroid of all centers and
//!    grow it square by square, predicting neighbours through a local
//!    projective model.
//! 5. Report coverage of the image and straightness of the grid lines.

mod detector;
mod enumerator;
mod error;
mod normalize;
mod params;
mod peaks;
mod stats;
mod symmetry;

pub use detector::{CornerDetection, CornerDetector};
pub use enumerator::GridEnumerator;
pub use error::{DetectError, EnumerateError};
pub use normalize::{local_extremum, normalize_locally, Extremum};
pub use params::{DetectorParams, EnumeratorParams, SquareModel};
pub use peaks::{find_peaks, locate_peak_centers, BinaryMask, Peak};
pub use stats::{coverage, straightness, LineStats};
pub use symmetry::{symmetry_kernel, SymmetryDetector, SymmetryKernel};
