use std::sync::Arc;

use tracing::debug;

use super::error::EngineError;
use crate::domain::{Cursor, Shard, StartPosition};
use crate::service::StreamService;

/// Obtains the initial cursor of a shard for a fixed stream and start position
pub struct CursorResolver<S: StreamService + ?Sized> {
    service: Arc<S>,
    stream: String,
    position: StartPosition,
}

impl<S: StreamService + ?Sized> CursorResolver<S> {
    pub fn new(service: Arc<S>, stream: impl Into<String>, position: StartPosition) -> Self {
        Self {
            service,
            stream: stream.into(),
            position,
        }
    }

    pub fn position(&self) -> &StartPosition {
        &self.position
    }

    /// Request a cursor for `shard` at the configured start position
    pub async fn resolve(&self, shard: &Shard) -> Result<Cursor, EngineError> {
        let cursor = self
            .service
            .get_shard_iterator(&self.stream, shard.id(), &self.position)
            .await
            .map_err(|source| EngineError::Cursor {
                shard: shard.id().clone(),
                source,
            })?;

        debug!(
            shard_id = %shard.id(),
            iterator_type = %self.position.policy(),
            ?cursor,
            "Resolved shard cursor"
        );
        Ok(cursor)
    }
}
