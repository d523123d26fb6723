use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Grid response is empty")]
    EmptyBody,

    #[error("Grid response contains no numeric tokens")]
    NoNumericTokens,

    #[error(
        "Grid value count mismatch: parsed={parsed}, expected={expected}, after_strip={after_strip}, header={header:?}"
    )]
    CountMismatch {
        expected: usize,
        parsed: usize,
        after_strip: usize,
        header: Option<(u64, u64)>,
    },

    #[error("Expected grid count must be positive")]
    ZeroExpectedCount,
}

#[derive(Debug, Error)]
pub enum GridDefinitionError {
    #[error("Failed to read grid definition '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode grid definition '{0}'")]
    Decode(PathBuf, #[source] serde_json::Error),

    #[error("Grid definition axes have mismatched lengths: lat={lat}, lon={lon}")]
    AxisLengthMismatch { lat: usize, lon: usize },

    #[error("Grid definition describes an empty grid")]
    Empty,
}
