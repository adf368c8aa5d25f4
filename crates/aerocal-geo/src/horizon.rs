//! Artificial horizon and compass lines drawn over a video frame.
//!
//! Each [`DirectionSet`] is a closed curve of world directions (east, north,
//! up) around the drone. Projected through the current attitude they give
//! the horizon, lines of constant depression and the compass axes.

use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::projector::{pitch_matrix, Projector, YawPitchRoll};

/// Samples per direction set.
pub const DIRECTION_SAMPLES: usize = 100;

/// Projected points further than this outside the frame are dropped.
pub const OVERLAY_MARGIN: i64 = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "NS")]
    NorthSouth,
    #[serde(rename = "EW")]
    EastWest,
    #[serde(rename = "NESW")]
    NortheastSouthwest,
    #[serde(rename = "NWSE")]
    NorthwestSoutheast,
    /// The horizon itself.
    #[serde(rename = "pitch0")]
    Pitch0,
    /// 22.5° below the horizon.
    #[serde(rename = "pitch22")]
    Pitch22,
    /// 45° below the horizon.
    #[serde(rename = "pitch45")]
    Pitch45,
}

impl Direction {
    pub const ALL: [Direction; 7] = [
        Direction::NorthSouth,
        Direction::EastWest,
        Direction::NortheastSouthwest,
        Direction::NorthwestSoutheast,
        Direction::Pitch0,
        Direction::Pitch22,
        Direction::Pitch45,
    ];

    fn sample(self, t: f64) -> Vector3<f64> {
        let (s, c) = t.sin_cos();
        let ring = |pitch_deg: f64| {
            let (ps, pc) = pitch_deg.to_radians().sin_cos();
            Vector3::new(c * pc, s * pc, ps)
        };
        match self {
            Direction::NorthSouth => Vector3::new(0.0, c, s),
            Direction::EastWest => Vector3::new(c, 0.0, s),
            Direction::NortheastSouthwest => Vector3::new(c, c, s),
            Direction::NorthwestSoutheast => Vector3::new(c, -c, s),
            Direction::Pitch0 => ring(0.0),
            Direction::Pitch22 => ring(-22.5),
            Direction::Pitch45 => ring(-45.0),
        }
    }
}

/// World directions tracing one overlay curve.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectionSet {
    pub direction: Direction,
    pub points: Vec<Vector3<f64>>,
}

/// `n` evenly spaced values over `[start, stop]`, both ends included.
fn linspace(start: f64, stop: f64, n: usize) -> impl Iterator<Item = f64> {
    let step = (stop - start) / (n.max(2) - 1) as f64;
    (0..n).map(move |i| if i + 1 == n { stop } else { start + i as f64 * step })
}

/// Compass lines and pitch rings, [`DIRECTION_SAMPLES`] points each.
pub fn default_direction_sets() -> Vec<DirectionSet> {
    Direction::ALL
        .iter()
        .map(|&direction| DirectionSet {
            direction,
            points: linspace(-PI, PI, DIRECTION_SAMPLES)
                .map(|t| direction.sample(t))
                .collect(),
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayPoint {
    pub x: i64,
    pub y: i64,
}

/// Where the curve's bounding box sits in the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayOffset {
    pub top: i64,
    pub left: i64,
}

/// One projected curve, relative to its bounding box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayLine {
    pub direction: Direction,
    pub points: Vec<OverlayPoint>,
    pub offset: OverlayOffset,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HorizonOverlay {
    pub lines: Vec<OverlayLine>,
}

impl HorizonOverlay {
    pub fn line(&self, direction: Direction) -> Option<&OverlayLine> {
        self.lines.iter().find(|l| l.direction == direction)
    }
}

impl Projector {
    /// Project every direction set into the frame for the given attitude.
    ///
    /// Only directions in front of the camera are kept. Each curve starts
    /// at its right-most point (the last one on ties) so that open arcs are
    /// drawn without a wrap-around segment.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, sets), fields(sets = sets.len()))
    )]
    pub fn horizon_and_world_corners(&self, sets: &[DirectionSet], ypr: &YawPitchRoll) -> HorizonOverlay {
        let world_to_camera = ypr.attitude().transpose();
        let to_image = self.camera_matrix() * pitch_matrix(FRAC_PI_2);
        let (w, h) = self.image_size();
        let (w, h) = (w as i64, h as i64);

        let lines = sets
            .iter()
            .map(|set| {
                let mut pts: Vec<OverlayPoint> = set
                    .points
                    .iter()
                    .filter_map(|p| {
                        let v = world_to_camera * p;
                        if !(v.y >= 0.0) {
                            return None;
                        }
                        let q = to_image * v;
                        let (x, y) = (q.x / q.z, q.y / q.z);
                        if !(x.is_finite() && y.is_finite()) {
                            return None;
                        }
                        let (x, y) = (x as i64, y as i64);
                        let inside = (-OVERLAY_MARGIN..=w + OVERLAY_MARGIN).contains(&x)
                            && (-OVERLAY_MARGIN..=h + OVERLAY_MARGIN).contains(&y);
                        inside.then_some(OverlayPoint { x, y })
                    })
                    .collect();

                if let Some(max_x) = pts.iter().map(|p| p.x).max() {
                    if let Some(start) = pts.iter().rposition(|p| p.x == max_x) {
                        pts.rotate_left(start);
                    }
                }
                let offset = OverlayOffset {
                    top: pts.iter().map(|p| p.y).min().unwrap_or(0),
                    left: pts.iter().map(|p| p.x).min().unwrap_or(0),
                };
                for p in &mut pts {
                    p.x -= offset.left;
                    p.y -= offset.top;
                }
                OverlayLine {
                    direction: set.direction,
                    points: pts,
                    offset,
                }
            })
            .collect();

        HorizonOverlay { lines }
    }
}
