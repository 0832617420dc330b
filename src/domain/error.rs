use thiserror::Error;

/// Domain-level errors for invalid tailing configuration values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error(
        "Unknown iterator type: {0}. Choose from TRIM_HORIZON, AT_SEQUENCE_NUMBER, AT_TIMESTAMP or LATEST"
    )]
    UnknownIteratorType(String),

    #[error("Invalid start time {input:?}, expected RFC3339 (e.g. 2016-04-20T12:00:00+09:00): {reason}")]
    InvalidStartTime { input: String, reason: String },

    #[error("AT_SEQUENCE_NUMBER requires a starting sequence number")]
    MissingSequenceNumber,

    #[error("Batch limit must be between 1 and {max}, got {got}")]
    InvalidBatchLimit { got: u32, max: u32 },

    #[error("Sink capacity must be greater than zero")]
    ZeroSinkCapacity,
}
