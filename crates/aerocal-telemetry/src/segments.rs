use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::flight_log::PoseSample;

/// A stretch of the log during which the camera was recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSegment {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Sample index of the rising edge.
    pub start_index: usize,
}

impl VideoSegment {
    pub fn duration_s(&self) -> f64 {
        (self.end - self.start).as_seconds_f64()
    }
}

/// Recording segments between rising and falling edges of the recording flag.
///
/// A segment still open at the end of the log closes at the last sample.
pub fn video_segments(samples: &[PoseSample]) -> Vec<VideoSegment> {
    let mut segments = Vec::new();
    let mut open: Option<(usize, NaiveDateTime)> = None;
    for (i, s) in samples.iter().enumerate() {
        match (open, s.is_recording) {
            (None, true) => open = Some((i, s.timestamp)),
            (Some((start_index, start)), false) => {
                segments.push(VideoSegment {
                    start,
                    end: s.timestamp,
                    start_index,
                });
                open = None;
            }
            _ => {}
        }
    }
    if let (Some((start_index, start)), Some(last)) = (open, samples.last()) {
        segments.push(VideoSegment {
            start,
            end: last.timestamp,
            start_index,
        });
    }
    segments
}
