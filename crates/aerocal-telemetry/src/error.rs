use aerocal_geo::GeoError;

#[derive(thiserror::Error, Debug)]
pub enum TelemetryError {
    #[error("flight log header matches no supported format")]
    UnrecognizedFormat,

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("line {line}: unparseable timestamp {value:?}")]
    InvalidTimestamp { line: u64, value: String },

    #[error("flight log contains no usable samples")]
    NoSamples,

    #[error("video is not aligned with the flight log")]
    NotAligned,

    #[error("invalid start time {0:?}; expected HH:MM:SS[.ffffff], \"0\" or \"1\"")]
    InvalidStartTime(String),

    #[error("video data file has no rows")]
    EmptyVideoData,

    #[error("video data field {field}: cannot parse {value:?}")]
    InvalidVideoData { field: &'static str, value: String },

    #[error(transparent)]
    Geo(#[from] GeoError),
}
