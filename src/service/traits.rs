use std::sync::Arc;

use async_trait::async_trait;

use super::error::ServiceError;
use crate::domain::{Cursor, RecordBatch, Shard, ShardId, StartPosition};

/// The three operations the tailer needs from a partitioned log service
#[async_trait]
pub trait StreamService: Send + Sync {
    /// List the shards of a stream
    async fn describe_stream(&self, stream: &str) -> Result<Vec<Shard>, ServiceError>;

    /// Obtain an initial cursor for a shard
    async fn get_shard_iterator(
        &self,
        stream: &str,
        shard: &ShardId,
        position: &StartPosition,
    ) -> Result<Cursor, ServiceError>;

    /// Fetch the records at a cursor, together with the cursor to use next
    async fn get_records(
        &self,
        cursor: &Cursor,
        limit: Option<u32>,
    ) -> Result<RecordBatch, ServiceError>;
}

// Lets pollers on separate tasks share one client
#[async_trait]
impl<S: StreamService + ?Sized> StreamService for Arc<S> {
    async fn describe_stream(&self, stream: &str) -> Result<Vec<Shard>, ServiceError> {
        (**self).describe_stream(stream).await
    }

    async fn get_shard_iterator(
        &self,
        stream: &str,
        shard: &ShardId,
        position: &StartPosition,
    ) -> Result<Cursor, ServiceError> {
        (**self).get_shard_iterator(stream, shard, position).await
    }

    async fn get_records(
        &self,
        cursor: &Cursor,
        limit: Option<u32>,
    ) -> Result<RecordBatch, ServiceError> {
        (**self).get_records(cursor, limit).await
    }
}
