use thiserror::Error;

/// All failure modes of the crate.
///
/// Every variant is a deterministic, local-input validation failure: nothing here is
/// transient or retried internally. Degenerate-but-valid inputs (empty subset, empty
/// other collection, single-record track) are normal cases and do not produce errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StormtrackError {
    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("grid {axis} bounds must be in strictly ascending order")]
    Grid { axis: &'static str },

    #[error("'{label}' is not among categories: {known}")]
    Select { label: String, known: String },

    #[error("track run is not categorised")]
    NotCategorised,

    #[error("cannot concatenate track runs: {0}")]
    Concatenation(String),

    #[error("a track must contain at least one record")]
    EmptyTrack,

    #[error("track record times must be strictly increasing")]
    NonMonotonicTimes,
}
