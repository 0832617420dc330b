use thiserror::Error;

/// Failures reported by the backing stream service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    #[error("Shard not found: {0}")]
    ShardNotFound(String),

    #[error("Shard iterator expired")]
    ExpiredCursor,

    #[error("Throughput exceeded: {0}")]
    Throttled(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Malformed response: missing {0}")]
    MalformedResponse(&'static str),
}

impl ServiceError {
    /// Whether repeating the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Throttled(_) | Self::Transport(_))
    }
}
