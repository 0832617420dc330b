use thiserror::Error;

use crate::domain::ShardId;
use crate::service::ServiceError;

/// Engine-level errors for discovering, resolving and polling shards
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Cannot describe stream {stream}. Please verify your stream is accessible: {source}")]
    Discovery {
        stream: String,
        #[source]
        source: ServiceError,
    },

    #[error("Stream {0} has no shards")]
    NoShards(String),

    #[error("Could not get iterator for shard {shard}: {source}")]
    Cursor {
        shard: ShardId,
        #[source]
        source: ServiceError,
    },

    #[error("Failed reading from shard {shard}: {source}")]
    Fetch {
        shard: ShardId,
        #[source]
        source: ServiceError,
    },

    #[error("Shard {0} has been closed")]
    ShardClosed(ShardId),

    #[error("No shard is being polled any more")]
    NoActiveShards,

    #[error("Shard poller panicked: {0}")]
    PollerPanicked(String),
}

impl EngineError {
    /// Whether retrying the failed operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Cursor { source, .. } | Self::Fetch { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// The shard this error belongs to, if any
    pub fn shard(&self) -> Option<&ShardId> {
        match self {
            Self::Cursor { shard, .. } | Self::Fetch { shard, .. } | Self::ShardClosed(shard) => {
                Some(shard)
            }
            _ => None,
        }
    }
}
