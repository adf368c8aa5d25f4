//! Matching a video to the part of the flight log it was recorded in.

use std::fmt;
use std::str::FromStr;

use aerocal_geo::{from_latlon, GeoPosition, YawPitchRoll};
use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::error::TelemetryError;
use crate::flight_log::DroneLog;
use crate::segments::{video_segments, VideoSegment};
use crate::video::VideoMetadata;

/// Distance in meters above which a geotag match is reported.
pub const POSITION_TOLERANCE_M: f64 = 1.0;

/// Duration difference in seconds above which a duration match is reported.
pub const DURATION_TOLERANCE_S: f64 = 5.0;

/// Advisory attached to an otherwise successful match.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum AlignmentWarning {
    /// The log never recorded; the start falls back to the first sample.
    NoRecordingSegments,
    PositionMismatch { meters: f64 },
    DurationMismatch { seconds: f64 },
}

impl fmt::Display for AlignmentWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignmentWarning::NoRecordingSegments => {
                write!(f, "No video segments found in the drone log; using the start of the log.")
            }
            AlignmentWarning::PositionMismatch { meters } => {
                write!(f, "Video position and Drone Log position differs by {meters:.2} meter.")
            }
            AlignmentWarning::DurationMismatch { seconds } => {
                write!(f, "Video duration and Drone Log video segment differs by {seconds:.2} seconds.")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlignmentOutcome {
    pub start: NaiveDateTime,
    pub warning: Option<AlignmentWarning>,
}

/// A user-supplied start time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartTime {
    /// `"1"`: forget the current start and match again.
    Automatic,
    /// `"0"`: the first timestamp of the log.
    LogBegin,
    /// `HH:MM:SS[.ffffff]` on the date of the current start.
    TimeOfDay(NaiveTime),
}

impl FromStr for StartTime {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(StartTime::Automatic),
            "0" => Ok(StartTime::LogBegin),
            t => NaiveTime::parse_from_str(t, "%H:%M:%S%.f")
                .map(StartTime::TimeOfDay)
                .map_err(|_| TelemetryError::InvalidStartTime(s.to_string())),
        }
    }
}

/// Drone state at a video frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FramePose {
    /// Timestamp of the log sample used.
    pub timestamp: NaiveDateTime,
    /// Height above ground: log height plus takeoff altitude.
    pub height_m: f64,
    pub attitude: YawPitchRoll,
    pub position: GeoPosition,
    pub sample_index: usize,
}

/// A flight log paired with one video, plus the alignment between them.
#[derive(Clone, Debug)]
pub struct FlightAlignment {
    log: DroneLog,
    video: VideoMetadata,
    start: Option<NaiveDateTime>,
    takeoff_altitude_m: f64,
}

impl FlightAlignment {
    pub fn new(log: DroneLog, video: VideoMetadata) -> Self {
        Self {
            log,
            video,
            start: None,
            takeoff_altitude_m: 0.0,
        }
    }

    pub fn log(&self) -> &DroneLog {
        &self.log
    }

    pub fn video(&self) -> &VideoMetadata {
        &self.video
    }

    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.start
    }

    pub fn takeoff_altitude(&self) -> f64 {
        self.takeoff_altitude_m
    }

    /// Height of the takeoff point above the ground being annotated.
    pub fn set_takeoff_altitude(&mut self, meters: f64) {
        self.takeoff_altitude_m = meters;
    }

    pub fn segments(&self) -> Vec<VideoSegment> {
        video_segments(self.log.samples())
    }

    /// Find the video start time in the log, reusing a previous match.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn match_log_and_video(&mut self) -> Result<AlignmentOutcome, TelemetryError> {
        if let Some(start) = self.start {
            return Ok(AlignmentOutcome { start, warning: None });
        }
        let first = self.log.first_timestamp().ok_or(TelemetryError::NoSamples)?;
        let segments = self.segments();

        let (start, warning) = if segments.is_empty() {
            (first, Some(AlignmentWarning::NoRecordingSegments))
        } else if let Some(pos) = self.video.position {
            let (segment, meters) = self.closest_by_position(&segments, pos)?;
            let warning = (meters > POSITION_TOLERANCE_M)
                .then_some(AlignmentWarning::PositionMismatch { meters });
            (segment.start, warning)
        } else {
            let (segment, seconds) = self.closest_by_duration(&segments);
            let warning = (seconds > DURATION_TOLERANCE_S)
                .then_some(AlignmentWarning::DurationMismatch { seconds });
            (segment.start, warning)
        };

        if let Some(w) = &warning {
            warn!("{w}");
        }
        info!("video aligned to log at {start} ({} segments)", segments.len());
        self.start = Some(start);
        Ok(AlignmentOutcome { start, warning })
    }

    fn closest_by_position(
        &self,
        segments: &[VideoSegment],
        pos: GeoPosition,
    ) -> Result<(VideoSegment, f64), TelemetryError> {
        let video = from_latlon(pos.lat, pos.lon)?;
        let samples = self.log.samples();
        let mut best: Option<(VideoSegment, f64)> = None;
        for seg in segments {
            let s = &samples[seg.start_index];
            let wp = from_latlon(s.lat, s.lon)?;
            let d = (wp.easting - video.easting).hypot(wp.northing - video.northing);
            debug!("segment at {}: {d:.2} m from video geotag", seg.start);
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((*seg, d));
            }
        }
        best.ok_or(TelemetryError::NoSamples)
    }

    fn closest_by_duration(&self, segments: &[VideoSegment]) -> (VideoSegment, f64) {
        let target = self.video.duration_s;
        let mut best = (segments[0], f64::INFINITY);
        for seg in segments {
            let diff = (seg.duration_s() - target).abs();
            if diff < best.1 {
                best = (*seg, diff);
            }
        }
        best
    }

    pub fn set_start_time(&mut self, start: NaiveDateTime) {
        self.start = Some(start);
    }

    pub fn reset_start_time(&mut self) {
        self.start = None;
    }

    /// Align the video to the first log sample.
    pub fn start_at_log_begin(&mut self) -> Result<NaiveDateTime, TelemetryError> {
        let first = self.log.first_timestamp().ok_or(TelemetryError::NoSamples)?;
        self.start = Some(first);
        Ok(first)
    }

    /// Apply a start time typed by the user.
    pub fn apply_start_time(&mut self, value: &str) -> Result<AlignmentOutcome, TelemetryError> {
        let start = match value.parse()? {
            StartTime::Automatic => {
                self.reset_start_time();
                return self.match_log_and_video();
            }
            StartTime::LogBegin => self.start_at_log_begin()?,
            StartTime::TimeOfDay(time) => {
                let date = match self.start.or_else(|| self.log.first_timestamp()) {
                    Some(t) => t.date(),
                    None => return Err(TelemetryError::NoSamples),
                };
                let start = date.and_time(time);
                self.set_start_time(start);
                start
            }
        };
        Ok(AlignmentOutcome { start, warning: None })
    }

    /// Drone pose at `frame`, from the log sample nearest the frame's time.
    pub fn pose_at_frame(&self, frame: usize) -> Result<FramePose, TelemetryError> {
        let start = self.start.ok_or(TelemetryError::NotAligned)?;
        let elapsed = frame as f64 / self.video.frame_count.max(1) as f64 * self.video.duration_s;
        let t = start + TimeDelta::microseconds((elapsed * 1e6).round() as i64);
        let index = self.log.nearest_index(t).ok_or(TelemetryError::NoSamples)?;
        let sample = &self.log.samples()[index];
        Ok(FramePose {
            timestamp: sample.timestamp,
            height_m: sample.height_m + self.takeoff_altitude_m,
            attitude: sample.attitude(),
            position: sample.position(),
            sample_index: index,
        })
    }
}
