use std::path::{Path, PathBuf};

use aerocal_calib::{CalibrationParams, CameraCalibrator, CameraModel, FrameSource};
use aerocal_checkerboard::{CornerDetection, CornerDetector, DetectError, DetectorParams, EnumeratorParams};
use aerocal_core::{GrayImage, GrayImageView};
use image::ImageReader;
use log::warn;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::AerocalError;

/// Convert an `image::GrayImage` into the lightweight `aerocal-core` view type.
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Decode any supported image file to 8-bit grayscale.
pub fn load_gray(path: impl AsRef<Path>) -> Result<::image::GrayImage, AerocalError> {
    let path = path.as_ref();
    let decode = |source| AerocalError::Decode {
        path: path.display().to_string(),
        source,
    };
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    Ok(reader.decode().map_err(decode)?.to_luma8())
}

/// Run the checkerboard detector end-to-end on an `image::GrayImage`.
pub fn detect_checkerboard(
    img: &::image::GrayImage,
    params: DetectorParams,
    enumerator: EnumeratorParams,
) -> Result<CornerDetection, DetectError> {
    CornerDetector::new(params, enumerator).detect(&gray_view(img))
}

/// Calibrate from still images on disk.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip(paths, params), fields(n = paths.len())))]
pub fn calibrate_image_files<P: AsRef<Path>>(
    paths: &[P],
    params: CalibrationParams,
) -> Result<CameraModel, AerocalError> {
    let images = paths.iter().map(load_gray).collect::<Result<Vec<_>, _>>()?;
    let views: Vec<GrayImageView<'_>> = images.iter().map(gray_view).collect();
    Ok(CameraCalibrator::new(params).calibrate_images(&views)?)
}

/// A video already split into numbered frame files, decoded on demand.
#[derive(Clone, Debug)]
pub struct ImageFrames {
    paths: Vec<PathBuf>,
}

impl ImageFrames {
    /// Frames in the given order.
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// Image files of `dir`, sorted by name.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, AerocalError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if aerocal_calib::media_kind(&path) == Some(aerocal_calib::MediaKind::Image) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(Self { paths })
    }
}

impl FrameSource for ImageFrames {
    fn frame_count(&self) -> usize {
        self.paths.len()
    }

    fn read_frame(&mut self, index: usize) -> Option<GrayImage> {
        let path = self.paths.get(index)?;
        match load_gray(path) {
            Ok(img) => Some(GrayImage {
                width: img.width() as usize,
                height: img.height() as usize,
                data: img.into_raw(),
            }),
            Err(err) => {
                warn!("stopping at frame {index}: {err}");
                None
            }
        }
    }
}
