//! Flight logs exported from DJI `.txt` records.
//!
//! Two CSV exports are understood: the `TXTlogToCSVtool` layout with
//! `CUSTOM.*`/`GIMBAL.*`/`OSD.*` columns, and the airdata.com layout with
//! a start datetime plus millisecond offsets. Both store angles in degrees;
//! samples keep them in radians.

use aerocal_geo::{GeoPosition, YawPitchRoll};
use chrono::{NaiveDateTime, TimeDelta};
use csv::{ReaderBuilder, StringRecord};
use log::{debug, info};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::error::TelemetryError;

const TXT_LOG_COLUMNS: &[&str] = &[
    "CUSTOM.updateTime",
    "GIMBAL.yaw",
    "GIMBAL.pitch",
    "GIMBAL.roll",
    "OSD.height [m]",
    "CUSTOM.isVideo",
    "OSD.latitude",
    "OSD.longitude",
];

const AIRDATA_COLUMNS: &[&str] = &[
    "time(millisecond)",
    "datetime(utc)",
    "latitude",
    "longitude",
    "height_above_takeoff(meters)",
    "altitude_above_seaLevel(meters)",
    "height_sonar(meters)",
    "isPhoto",
    "isVideo",
    "gimbal_heading(degrees)",
    "gimbal_pitch(degrees)",
    "gimbal_roll(degrees)",
    "altitude(meters)",
];

const TXT_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.f";
const AIRDATA_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    /// Output of `TXTlogToCSVtool.exe`.
    TxtLogToCsv,
    /// CSV download from airdata.com.
    AirData,
}

impl LogFormat {
    fn required_columns(self) -> &'static [&'static str] {
        match self {
            LogFormat::TxtLogToCsv => TXT_LOG_COLUMNS,
            LogFormat::AirData => AIRDATA_COLUMNS,
        }
    }
}

/// Latin-1 decoding with NUL bytes removed.
pub fn decode_log_bytes(bytes: &[u8]) -> String {
    bytes.iter().filter(|&&b| b != 0).map(|&b| b as char).collect()
}

fn header_of(text: &str) -> Option<StringRecord> {
    ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes())
        .headers()
        .ok()
        .cloned()
}

fn has_columns(header: &StringRecord, format: LogFormat) -> bool {
    format
        .required_columns()
        .iter()
        .all(|c| header.iter().any(|h| h == *c))
}

/// Format whose columns are all present in the header line.
pub fn detect_format(text: &str) -> Option<LogFormat> {
    let header = header_of(text)?;
    [LogFormat::TxtLogToCsv, LogFormat::AirData]
        .into_iter()
        .find(|&f| has_columns(&header, f))
}

/// One telemetry row. Angles in radians.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseSample {
    pub timestamp: NaiveDateTime,
    /// Height above the takeoff point.
    pub height_m: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub lat: f64,
    pub lon: f64,
    pub is_recording: bool,
}

impl PoseSample {
    pub fn attitude(&self) -> YawPitchRoll {
        YawPitchRoll::new(self.yaw, self.pitch, self.roll)
    }

    pub fn position(&self) -> GeoPosition {
        GeoPosition::new(self.lat, self.lon)
    }
}

struct Columns {
    time: usize,
    offset_ms: Option<usize>,
    yaw: usize,
    pitch: usize,
    roll: usize,
    height: usize,
    recording: usize,
    lat: usize,
    lon: usize,
}

impl Columns {
    fn locate(header: &StringRecord, format: LogFormat) -> Option<Self> {
        if !has_columns(header, format) {
            return None;
        }
        let idx = |name: &str| header.iter().position(|h| h == name);
        Some(match format {
            LogFormat::TxtLogToCsv => Self {
                time: idx("CUSTOM.updateTime")?,
                offset_ms: None,
                yaw: idx("GIMBAL.yaw")?,
                pitch: idx("GIMBAL.pitch")?,
                roll: idx("GIMBAL.roll")?,
                height: idx("OSD.height [m]")?,
                recording: idx("CUSTOM.isVideo")?,
                lat: idx("OSD.latitude")?,
                lon: idx("OSD.longitude")?,
            },
            LogFormat::AirData => Self {
                time: idx("datetime(utc)")?,
                offset_ms: Some(idx("time(millisecond)")?),
                yaw: idx("gimbal_heading(degrees)")?,
                pitch: idx("gimbal_pitch(degrees)")?,
                roll: idx("gimbal_roll(degrees)")?,
                height: idx("height_above_takeoff(meters)")?,
                recording: idx("isVideo")?,
                lat: idx("latitude")?,
                lon: idx("longitude")?,
            },
        })
    }
}

fn field<'r>(rec: &'r StringRecord, i: usize) -> &'r str {
    rec.get(i).unwrap_or("")
}

fn float(rec: &StringRecord, i: usize) -> Result<f64, std::num::ParseFloatError> {
    field(rec, i).trim().parse()
}

struct RowValues {
    offset: TimeDelta,
    height_m: f64,
    angles_deg: [f64; 3],
    lat: f64,
    lon: f64,
}

fn row_values(rec: &StringRecord, cols: &Columns) -> Result<RowValues, std::num::ParseFloatError> {
    let offset = match cols.offset_ms {
        Some(i) => TimeDelta::microseconds((float(rec, i)? * 1000.0).round() as i64),
        None => TimeDelta::zero(),
    };
    Ok(RowValues {
        offset,
        height_m: float(rec, cols.height)?,
        angles_deg: [float(rec, cols.yaw)?, float(rec, cols.pitch)?, float(rec, cols.roll)?],
        lat: float(rec, cols.lat)?,
        lon: float(rec, cols.lon)?,
    })
}

fn parse_samples(text: &str, format: LogFormat) -> Result<Vec<PoseSample>, TelemetryError> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(text.as_bytes());
    let header = rdr.headers()?.clone();
    let cols = Columns::locate(&header, format).ok_or(TelemetryError::UnrecognizedFormat)?;

    let mut epoch: Option<NaiveDateTime> = None;
    let mut samples = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let line = rec.position().map_or(0, |p| p.line());
        let time = field(&rec, cols.time);
        if time.is_empty() {
            continue;
        }
        let invalid_time = || TelemetryError::InvalidTimestamp {
            line,
            value: time.to_string(),
        };

        let base = match format {
            LogFormat::TxtLogToCsv => {
                NaiveDateTime::parse_from_str(time, TXT_TIME_FORMAT).map_err(|_| invalid_time())?
            }
            // Only the first row's datetime counts; later rows are offsets from it.
            LogFormat::AirData => match epoch {
                Some(t) => t,
                None => {
                    let t = NaiveDateTime::parse_from_str(time, AIRDATA_TIME_FORMAT)
                        .map_err(|_| invalid_time())?;
                    *epoch.insert(t)
                }
            },
        };

        let values = match row_values(&rec, &cols) {
            Ok(v) => v,
            Err(err) => {
                debug!("line {line}: row skipped ({err})");
                continue;
            }
        };
        let recording = field(&rec, cols.recording);
        let [yaw, pitch, roll] = values.angles_deg.map(f64::to_radians);
        samples.push(PoseSample {
            timestamp: base + values.offset,
            height_m: values.height_m,
            yaw,
            pitch,
            roll,
            lat: values.lat,
            lon: values.lon,
            is_recording: match format {
                LogFormat::TxtLogToCsv => !recording.is_empty(),
                LogFormat::AirData => recording == "1",
            },
        });
    }
    Ok(samples)
}

/// Degree-valued columns for plotting consumers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LogSeries {
    pub timestamps: Vec<NaiveDateTime>,
    pub height_m: Vec<f64>,
    pub yaw_deg: Vec<f64>,
    pub pitch_deg: Vec<f64>,
    pub roll_deg: Vec<f64>,
    pub is_recording: Vec<bool>,
}

/// Parsed flight log, samples in file order.
#[derive(Clone, Debug, PartialEq)]
pub struct DroneLog {
    format: Option<LogFormat>,
    samples: Vec<PoseSample>,
}

impl DroneLog {
    /// Parse a raw log export, trying the `TXTlogToCSVtool` layout first.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(bytes), fields(len = bytes.len())))]
    pub fn parse(bytes: &[u8]) -> Result<Self, TelemetryError> {
        let text = decode_log_bytes(bytes);
        let first = match Self::parse_as(&text, LogFormat::TxtLogToCsv) {
            Ok(log) => return Ok(log),
            Err(err) => {
                debug!("not a TXTlogToCSVtool export: {err}");
                err
            }
        };
        match Self::parse_as(&text, LogFormat::AirData) {
            Ok(log) => Ok(log),
            // Report the failure of the layout whose header actually matched.
            Err(TelemetryError::UnrecognizedFormat) => Err(first),
            Err(err) => Err(err),
        }
    }

    pub fn parse_as(text: &str, format: LogFormat) -> Result<Self, TelemetryError> {
        let samples = parse_samples(text, format)?;
        if samples.is_empty() {
            return Err(TelemetryError::NoSamples);
        }
        info!("parsed {} samples from {:?} log", samples.len(), format);
        Ok(Self {
            format: Some(format),
            samples,
        })
    }

    /// A log assembled by the caller.
    pub fn from_samples(samples: Vec<PoseSample>) -> Self {
        Self {
            format: None,
            samples,
        }
    }

    pub fn format(&self) -> Option<LogFormat> {
        self.format
    }

    pub fn samples(&self) -> &[PoseSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Earliest timestamp in the log.
    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.samples.iter().map(|s| s.timestamp).min()
    }

    /// The flight path, one position per sample.
    pub fn positions(&self) -> Vec<GeoPosition> {
        self.samples.iter().map(PoseSample::position).collect()
    }

    pub fn log_series(&self) -> LogSeries {
        let mut series = LogSeries::default();
        for s in &self.samples {
            series.timestamps.push(s.timestamp);
            series.height_m.push(s.height_m);
            series.yaw_deg.push(s.yaw.to_degrees());
            series.pitch_deg.push(s.pitch.to_degrees());
            series.roll_deg.push(s.roll.to_degrees());
            series.is_recording.push(s.is_recording);
        }
        series
    }

    /// Index of the sample closest in time to `t`; the first one on ties.
    pub fn nearest_index(&self, t: NaiveDateTime) -> Option<usize> {
        self.samples
            .iter()
            .enumerate()
            .min_by_key(|(i, s)| ((s.timestamp - t).abs(), *i))
            .map(|(i, _)| i)
    }
}
