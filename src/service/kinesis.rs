use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_kinesis::Client;
use aws_sdk_kinesis::config::Region;
use aws_sdk_kinesis::error::{DisplayErrorContext, SdkError};
use aws_sdk_kinesis::primitives::DateTime as AwsDateTime;
use aws_sdk_kinesis::types::ShardIteratorType;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::error::ServiceError;
use super::traits::StreamService;
use crate::domain::{Cursor, Record, RecordBatch, Shard, ShardId, StartPosition};

/// Stream service backed by Amazon Kinesis Data Streams
pub struct KinesisStreamService {
    client: Client,
}

impl KinesisStreamService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default credential chain for `region`
    ///
    /// `endpoint_url` overrides the service endpoint, e.g. for a local emulator.
    pub async fn connect(region: &str, endpoint_url: Option<&str>) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
        if let Some(url) = endpoint_url {
            loader = loader.endpoint_url(url);
        }
        let sdk_config = loader.load().await;
        debug!(region, ?endpoint_url, "Kinesis client configured");

        Self::new(Client::new(&sdk_config))
    }
}

fn iterator_type(position: &StartPosition) -> ShardIteratorType {
    match position {
        StartPosition::TrimHorizon => ShardIteratorType::TrimHorizon,
        StartPosition::AtSequenceNumber(_) => ShardIteratorType::AtSequenceNumber,
        StartPosition::AtTimestamp(_) => ShardIteratorType::AtTimestamp,
        StartPosition::Latest => ShardIteratorType::Latest,
    }
}

fn to_aws_timestamp(ts: DateTime<Utc>) -> AwsDateTime {
    AwsDateTime::from_millis(ts.timestamp_millis())
}

fn from_aws_timestamp(ts: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos())
}

/// Map SDK failures that are not service-modelled exceptions
fn transport_or_rejected<E, R>(err: &SdkError<E, R>) -> ServiceError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(err).to_string();
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ServiceError::Transport(message)
        }
        _ => ServiceError::Rejected(message),
    }
}

/// One page of a stream description
#[derive(Debug)]
struct ShardPage {
    shards: Vec<Shard>,
    has_more: bool,
}

/// Follow `exclusive_start_shard_id` until the service reports no more shards
async fn collect_shard_pages<F, Fut>(mut fetch: F) -> Result<Vec<Shard>, ServiceError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<ShardPage, ServiceError>>,
{
    let mut shards: Vec<Shard> = Vec::new();
    let mut start = None;

    loop {
        let page = fetch(start.take()).await?;
        debug!(page_shards = page.shards.len(), has_more = page.has_more, "Described stream page");

        if !page.has_more {
            shards.extend(page.shards);
            return Ok(shards);
        }

        // A page claiming more shards must name one to continue after
        let Some(last) = page.shards.last() else {
            return Err(ServiceError::MalformedResponse("shards"));
        };
        start = Some(last.id().as_str().to_string());
        shards.extend(page.shards);
    }
}

#[async_trait]
impl StreamService for KinesisStreamService {
    async fn describe_stream(&self, stream: &str) -> Result<Vec<Shard>, ServiceError> {
        collect_shard_pages(|start| {
            let request = self
                .client
                .describe_stream()
                .stream_name(stream)
                .set_exclusive_start_shard_id(start);
            async move {
                let output = request.send().await.map_err(|err| match err.as_service_error() {
                    Some(e) if e.is_resource_not_found_exception() => {
                        ServiceError::StreamNotFound(stream.to_string())
                    }
                    Some(e) if e.is_limit_exceeded_exception() => {
                        ServiceError::Throttled(DisplayErrorContext(&err).to_string())
                    }
                    _ => transport_or_rejected(&err),
                })?;

                let description = output
                    .stream_description()
                    .ok_or(ServiceError::MalformedResponse("stream description"))?;

                Ok(ShardPage {
                    shards: description
                        .shards()
                        .iter()
                        .map(|shard| Shard::new(shard.shard_id()))
                        .collect(),
                    has_more: description.has_more_shards(),
                })
            }
        })
        .await
    }

    async fn get_shard_iterator(
        &self,
        stream: &str,
        shard: &ShardId,
        position: &StartPosition,
    ) -> Result<Cursor, ServiceError> {
        let mut request = self
            .client
            .get_shard_iterator()
            .stream_name(stream)
            .shard_id(shard.as_str())
            .shard_iterator_type(iterator_type(position));

        if let Some(ts) = position.timestamp() {
            request = request.timestamp(to_aws_timestamp(ts));
        }
        if let Some(seq) = position.sequence_number() {
            request = request.starting_sequence_number(seq);
        }

        let output = request.send().await.map_err(|err| match err.as_service_error() {
            Some(e) if e.is_resource_not_found_exception() => {
                ServiceError::ShardNotFound(shard.to_string())
            }
            Some(e) if e.is_provisioned_throughput_exceeded_exception() => {
                ServiceError::Throttled(DisplayErrorContext(&err).to_string())
            }
            _ => transport_or_rejected(&err),
        })?;

        output
            .shard_iterator()
            .map(Cursor::new)
            .ok_or(ServiceError::MalformedResponse("shard iterator"))
    }

    async fn get_records(
        &self,
        cursor: &Cursor,
        limit: Option<u32>,
    ) -> Result<RecordBatch, ServiceError> {
        let output = self
            .client
            .get_records()
            .shard_iterator(cursor.as_str())
            .set_limit(limit.map(|l| l as i32))
            .send()
            .await
            .map_err(|err| match err.as_service_error() {
                Some(e) if e.is_expired_iterator_exception() => ServiceError::ExpiredCursor,
                Some(e)
                    if e.is_provisioned_throughput_exceeded_exception()
                        || e.is_kms_throttling_exception() =>
                {
                    ServiceError::Throttled(DisplayErrorContext(&err).to_string())
                }
                _ => transport_or_rejected(&err),
            })?;

        // The iterator does not name its shard; the poller stamps provenance.
        let records = output
            .records()
            .iter()
            .map(|record| Record {
                shard_id: ShardId::new(""),
                sequence_number: record.sequence_number().to_string(),
                partition_key: record.partition_key().to_string(),
                approximate_arrival: record
                    .approximate_arrival_timestamp()
                    .and_then(from_aws_timestamp),
                data: record.data().as_ref().to_vec(),
            })
            .collect();

        Ok(RecordBatch {
            records,
            next_cursor: output.next_shard_iterator().map(Cursor::new),
            millis_behind_latest: output.millis_behind_latest(),
        })
    }
}
