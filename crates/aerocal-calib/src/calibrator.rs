use std::path::{Path, PathBuf};

use aerocal_checkerboard::CornerDetector;
use aerocal_core::{GrayImage, GrayImageView};
use log::{debug, info};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::camera::CameraModel;
use crate::error::CalibrateError;
use crate::params::CalibrationParams;
use crate::sampling::StrideSampler;
use crate::solver::solve_planar_views;
use crate::view::PlanarView;

/// Random access to the decoded frames of one video.
///
/// Decoding lives with the caller; returning `None` from
/// [`FrameSource::read_frame`] ends the scan of that video early.
pub trait FrameSource {
    fn frame_count(&self) -> usize;

    fn read_frame(&mut self, index: usize) -> Option<GrayImage>;
}

impl FrameSource for Vec<GrayImage> {
    fn frame_count(&self) -> usize {
        self.len()
    }

    fn read_frame(&mut self, index: usize) -> Option<GrayImage> {
        self.get(index).cloned()
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "jpe", "bmp", "dib", "png", "tiff", "tif"];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "m4a", "m4v", "f4v", "f4a", "m4b", "m4r", "f4b", "mov", "wmv", "wma", "webm",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// Media kind from the file extension, case-insensitive.
pub fn media_kind(path: &Path) -> Option<MediaKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// The media a calibration folder provides. Still images win over videos.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CalibrationRun {
    Images(Vec<PathBuf>),
    Videos(Vec<PathBuf>),
}

impl CalibrationRun {
    pub fn classify<I, P>(paths: I) -> Result<Self, CalibrateError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut images = Vec::new();
        let mut videos = Vec::new();
        for p in paths {
            let p = p.as_ref();
            match media_kind(p) {
                Some(MediaKind::Image) => images.push(p.to_path_buf()),
                Some(MediaKind::Video) => videos.push(p.to_path_buf()),
                None => debug!("ignoring {}", p.display()),
            }
        }
        if !images.is_empty() {
            Ok(Self::Images(images))
        } else if !videos.is_empty() {
            Ok(Self::Videos(videos))
        } else {
            Err(CalibrateError::NoMediaFound)
        }
    }
}

fn size_of(view: &GrayImageView<'_>) -> (u32, u32) {
    (view.width as u32, view.height as u32)
}

/// Checkerboard camera calibration over still images or sampled video frames.
pub struct CameraCalibrator {
    params: CalibrationParams,
    detector: CornerDetector,
}

impl CameraCalibrator {
    pub fn new(params: CalibrationParams) -> Self {
        let detector = CornerDetector::new(params.detector.clone(), params.enumerator.clone());
        Self { params, detector }
    }

    #[inline]
    pub fn params(&self) -> &CalibrationParams {
        &self.params
    }

    /// Correspondences of one frame, or `None` when the frame is unusable.
    pub fn examine(&self, image: &GrayImageView<'_>) -> Option<PlanarView> {
        match self.detector.detect(image) {
            Ok(det) if det.coverage > self.params.min_coverage => {
                debug!("accepted frame: {} corners, coverage {:.2}", det.grid.len(), det.coverage);
                Some(PlanarView::from_grid(&det.grid))
            }
            Ok(det) => {
                debug!(
                    "coverage {:.2} below minimum {:.2}",
                    det.coverage, self.params.min_coverage
                );
                None
            }
            Err(err) => {
                debug!("frame skipped: {err}");
                None
            }
        }
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, images), fields(images = images.len()))
    )]
    pub fn calibrate_images(&self, images: &[GrayImageView<'_>]) -> Result<CameraModel, CalibrateError> {
        let first = images.first().ok_or(CalibrateError::NoMediaFound)?;
        let image_size = size_of(first);

        let mut views = Vec::new();
        for image in images {
            if size_of(image) != image_size {
                return Err(CalibrateError::MixedImageSizes {
                    first: image_size,
                    other: size_of(image),
                });
            }
            views.extend(self.examine(image));
        }
        info!("{} of {} images usable for calibration", views.len(), images.len());
        if views.is_empty() {
            return Err(CalibrateError::NoPatternFound {
                examined: images.len(),
            });
        }
        self.calibrate_views(&views, image_size)
    }

    pub fn calibrate_video<S: FrameSource>(&self, source: &mut S) -> Result<CameraModel, CalibrateError> {
        self.calibrate_videos(std::slice::from_mut(source))
    }

    /// Scan every video with an adaptive stride and calibrate from all accepted frames.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, sources), fields(videos = sources.len()))
    )]
    pub fn calibrate_videos<S: FrameSource>(&self, sources: &mut [S]) -> Result<CameraModel, CalibrateError> {
        let mut views = Vec::new();
        let mut image_size = None;
        let mut examined = 0;

        for source in sources.iter_mut() {
            let sampler = StrideSampler::new(source.frame_count(), self.params.sampling.clone());
            debug!("scanning video with {} frames", source.frame_count());
            let mut state = sampler.start();
            while let Some(s) = state {
                let Some(frame) = source.read_frame(s.frame) else {
                    debug!("frame {} unavailable, stopping this video", s.frame);
                    break;
                };
                examined += 1;
                let view = frame.view();
                let size = size_of(&view);
                match image_size {
                    None => image_size = Some(size),
                    Some(first) if first != size => {
                        return Err(CalibrateError::MixedImageSizes { first, other: size })
                    }
                    Some(_) => {}
                }
                debug!("examining frame {} (target {})", s.frame, s.target);
                let accepted = match self.examine(&view) {
                    Some(v) => {
                        views.push(v);
                        true
                    }
                    None => false,
                };
                state = sampler.step(s, accepted);
            }
        }

        let Some(image_size) = image_size else {
            return Err(CalibrateError::NoMediaFound);
        };
        info!("{} of {} sampled frames usable for calibration", views.len(), examined);
        if views.is_empty() {
            return Err(CalibrateError::NoPatternFound { examined });
        }
        self.calibrate_views(&views, image_size)
    }

    /// Solve from already extracted correspondences.
    pub fn calibrate_views(
        &self,
        views: &[PlanarView],
        image_size: (u32, u32),
    ) -> Result<CameraModel, CalibrateError> {
        let sol = solve_planar_views(views, image_size, &self.params.lm)?;
        Ok(CameraModel::new(
            sol.intrinsics.matrix(),
            sol.distortion,
            image_size,
            views.len(),
            sol.rms,
        ))
    }
}

impl Default for CameraCalibrator {
    fn default() -> Self {
        Self::new(CalibrationParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_take_precedence_over_videos() {
        let run = CalibrationRun::classify(["a.MP4", "b.JPG", "notes.txt", "c.tif"]).unwrap();
        assert_eq!(
            run,
            CalibrationRun::Images(vec![PathBuf::from("b.JPG"), PathBuf::from("c.tif")])
        );
    }

    #[test]
    fn videos_when_no_images() {
        let run = CalibrationRun::classify(["flight.mov", "x.webm", "readme"]).unwrap();
        assert!(matches!(run, CalibrationRun::Videos(v) if v.len() == 2));
    }

    #[test]
    fn nothing_usable_is_no_media() {
        assert!(matches!(
            CalibrationRun::classify(["a.txt", "b"]),
            Err(CalibrateError::NoMediaFound)
        ));
        let empty: [&str; 0] = [];
        assert!(matches!(CalibrationRun::classify(empty), Err(CalibrateError::NoMediaFound)));
    }

    #[test]
    fn no_images_is_no_media() {
        let calib = CameraCalibrator::default();
        assert!(matches!(calib.calibrate_images(&[]), Err(CalibrateError::NoMediaFound)));
        let mut empty: Vec<GrayImage> = Vec::new();
        assert!(matches!(calib.calibrate_video(&mut empty), Err(CalibrateError::NoMediaFound)));
    }

    #[test]
    fn blank_frames_are_no_pattern() {
        let calib = CameraCalibrator::default();
        let mut frames = vec![GrayImage::new(32, 32); 4];
        match calib.calibrate_video(&mut frames) {
            Err(CalibrateError::NoPatternFound { examined }) => assert_eq!(examined, 4),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
