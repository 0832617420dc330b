use tracing::{debug, info};

use super::error::EngineError;
use crate::domain::Shard;
use crate::service::StreamService;

/// List the shards of `stream`, once, at startup
///
/// Any service failure is a discovery error. A stream without shards is
/// rejected as well, since there would be nothing to tail.
pub async fn discover<S>(service: &S, stream: &str) -> Result<Vec<Shard>, EngineError>
where
    S: StreamService + ?Sized,
{
    debug!(stream, "Describing stream");

    let shards = service
        .describe_stream(stream)
        .await
        .map_err(|source| EngineError::Discovery {
            stream: stream.to_string(),
            source,
        })?;

    if shards.is_empty() {
        return Err(EngineError::NoShards(stream.to_string()));
    }

    info!(stream, shards = shards.len(), "Discovered shards");
    Ok(shards)
}
