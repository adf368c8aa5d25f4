use crate::enumerator::GridEnumerator;
use crate::error::DetectError;
use crate::normalize::normalize_locally;
use crate::params::{DetectorParams, EnumeratorParams};
use crate::peaks::{locate_peak_centers, BinaryMask};
use crate::stats::{coverage, straightness, LineStats};
use crate::symmetry::SymmetryDetector;
use aerocal_core::{CalibrationGrid, GrayImageView};
use log::debug;
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Output of a single-frame detection.
#[derive(Clone, Debug)]
pub struct CornerDetection {
    /// Enumerated corners keyed by lattice index.
    pub grid: CalibrationGrid,
    /// Fraction of the 10×10 image partition touched by the grid.
    pub coverage: f32,
    /// Horizontal then vertical line straightness.
    pub straightness: [LineStats; 2],
    /// Every peak center found in the response map, enumerated or not.
    pub centers: Vec<Point2<f32>>,
    /// The seed corner at grid index `(0, 0)`.
    pub anchor: Point2<f32>,
}

/// Symmetry-filter checkerboard detector.
pub struct CornerDetector {
    params: DetectorParams,
    enumerator: EnumeratorParams,
    symmetry: SymmetryDetector,
}

impl CornerDetector {
    pub fn new(params: DetectorParams, enumerator: EnumeratorParams) -> Self {
        let symmetry = SymmetryDetector::new(params.order, params.kernel_size, params.scale_factor);
        Self {
            params,
            enumerator,
            symmetry,
        }
    }

    #[inline]
    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    #[inline]
    pub fn enumerator_params(&self) -> &EnumeratorParams {
        &self.enumerator
    }

    /// Sub-pixel centers of corner-like peaks, before any enumeration.
    pub fn locate_corners(&self, image: &GrayImageView<'_>) -> Vec<Point2<f32>> {
        let response = self.symmetry.compute_response(image);
        let normalized = normalize_locally(&response, self.params.neighbourhood_size);
        let mask = BinaryMask::threshold(&normalized, self.params.relative_threshold);
        let centers = locate_peak_centers(&mask, self.params.min_roundness);
        debug!(
            "{} pixels above {:.2}, {} peak centers",
            mask.count(),
            self.params.relative_threshold,
            centers.len()
        );
        centers
    }

    /// Detect and enumerate checkerboard corners in one grayscale frame.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, image),
            fields(width = image.width, height = image.height)
        )
    )]
    pub fn detect(&self, image: &GrayImageView<'_>) -> Result<CornerDetection, DetectError> {
        let centers = self.locate_corners(image);
        if centers.len() < 3 {
            return Err(DetectError::TooFewCorners {
                found: centers.len(),
            });
        }

        let enumerator = GridEnumerator::new(centers, self.enumerator.clone())?;
        let grid = enumerator.enumerate()?;
        let coverage = coverage(&grid, (image.width, image.height));
        let straightness = straightness(&grid);
        debug!(
            "enumerated {} of {} corners, coverage {:.2}",
            grid.len(),
            enumerator.centers().len(),
            coverage
        );

        Ok(CornerDetection {
            anchor: enumerator.central_peak(),
            centers: enumerator.centers().to_vec(),
            grid,
            coverage,
            straightness,
        })
    }

    /// Same as [`CornerDetector::detect`] for a raw row-major buffer.
    pub fn detect_raw(
        &self,
        width: usize,
        height: usize,
        data: &[u8],
    ) -> Result<CornerDetection, DetectError> {
        let view = GrayImageView::from_slice(width, height, data)?;
        self.detect(&view)
    }
}

impl Default for CornerDetector {
    fn default() -> Self {
        Self::new(DetectorParams::default(), EnumeratorParams::default())
    }
}
