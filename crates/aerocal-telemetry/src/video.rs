use std::io::Read;

use aerocal_geo::GeoPosition;
use csv::{ReaderBuilder, StringRecord};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::TelemetryError;

/// What the alignment needs to know about a video file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub duration_s: f64,
    pub frame_count: usize,
    pub width: u32,
    pub height: u32,
    /// Geotag recorded by the camera, if any.
    #[serde(default)]
    pub position: Option<GeoPosition>,
}

impl VideoMetadata {
    pub fn new(duration_s: f64, frame_count: usize, width: u32, height: u32) -> Self {
        Self {
            duration_s,
            frame_count,
            width,
            height,
            position: None,
        }
    }

    pub fn with_position(mut self, position: GeoPosition) -> Self {
        self.position = Some(position);
        self
    }

    pub fn fps(&self) -> f64 {
        if self.duration_s > 0.0 {
            self.frame_count as f64 / self.duration_s
        } else {
            0.0
        }
    }

    /// Read a `duration,nb_frames,width,height,lat,long` CSV; the last row wins.
    ///
    /// An empty `lat` or `long` leaves the position unset.
    pub fn from_data_file<R: Read>(reader: R) -> Result<Self, TelemetryError> {
        let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let header = rdr.headers()?.clone();
        let mut last: Option<StringRecord> = None;
        for rec in rdr.records() {
            last = Some(rec?);
        }
        let rec = last.ok_or(TelemetryError::EmptyVideoData)?;
        let get = |field: &'static str| -> &str {
            header
                .iter()
                .position(|h| h == field)
                .and_then(|i| rec.get(i))
                .unwrap_or("")
        };

        let duration_s = parse_field::<f64>("duration", get("duration"))?;
        let frame_count = parse_field::<usize>("nb_frames", get("nb_frames"))?;
        let width = parse_field::<u32>("width", get("width"))?;
        let height = parse_field::<u32>("height", get("height"))?;
        let position = match (get("lat"), get("long")) {
            ("", _) | (_, "") => None,
            (lat, lon) => Some(GeoPosition::new(
                parse_field("lat", lat)?,
                parse_field("long", lon)?,
            )),
        };
        debug!("video data: {duration_s} s, {frame_count} frames, {width}x{height}, position {position:?}");
        Ok(Self {
            duration_s,
            frame_count,
            width,
            height,
            position,
        })
    }
}

fn parse_field<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, TelemetryError> {
    value.parse().map_err(|_| TelemetryError::InvalidVideoData {
        field,
        value: value.to_string(),
    })
}

fn signed_numbers(tag: &str) -> Vec<f64> {
    let bytes = tag.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if !matches!(bytes[i], b'+' | b'-') {
            i += 1;
            continue;
        }
        let start = i;
        i += 1;
        while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
            i += 1;
        }
        if let Ok(v) = tag[start..i].parse() {
            out.push(v);
        }
    }
    out
}

/// Position from an ISO 6709 location tag such as `+55.1234+010.5678+012.000/`.
///
/// Latitude and longitude are required, altitude is ignored.
pub fn parse_location_tag(tag: &str) -> Option<GeoPosition> {
    match signed_numbers(tag).as_slice() {
        [lat, lon, ..] => Some(GeoPosition::new(*lat, *lon)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn location_tag_with_altitude() {
        let pos = parse_location_tag("+55.1234+010.5678+012.000/").unwrap();
        assert_abs_diff_eq!(pos.lat, 55.1234);
        assert_abs_diff_eq!(pos.lon, 10.5678);
    }

    #[test]
    fn location_tag_southern_western() {
        let pos = parse_location_tag("-33.8688-070.6693/").unwrap();
        assert_abs_diff_eq!(pos.lat, -33.8688);
        assert_abs_diff_eq!(pos.lon, -70.6693);
        assert_eq!(parse_location_tag("+55.1/"), None);
        assert_eq!(parse_location_tag(""), None);
    }

    #[test]
    fn data_file_last_row_wins() {
        let csv = "duration,nb_frames,width,height,lat,long\n\
                   10.0,300,1920,1080,,\n\
                   62.5,1875,3840,2160,55.25,10.5\n";
        let meta = VideoMetadata::from_data_file(csv.as_bytes()).unwrap();
        assert_eq!(meta.frame_count, 1875);
        assert_eq!((meta.width, meta.height), (3840, 2160));
        assert_abs_diff_eq!(meta.fps(), 30.0);
        assert_eq!(meta.position, Some(GeoPosition::new(55.25, 10.5)));
    }

    #[test]
    fn data_file_without_geotag() {
        let csv = "duration,nb_frames,width,height,lat,long\n12.0,360,1280,720,,\n";
        let meta = VideoMetadata::from_data_file(csv.as_bytes()).unwrap();
        assert_eq!(meta.position, None);
    }

    #[test]
    fn data_file_errors() {
        let header_only = "duration,nb_frames,width,height,lat,long\n";
        assert!(matches!(
            VideoMetadata::from_data_file(header_only.as_bytes()),
            Err(TelemetryError::EmptyVideoData)
        ));
        let bad = "duration,nb_frames,width,height,lat,long\nlong,300,1920,1080,,\n";
        assert!(matches!(
            VideoMetadata::from_data_file(bad.as_bytes()),
            Err(TelemetryError::InvalidVideoData { field: "duration", .. })
        ));
    }
}
