use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::error::ServiceError;
use super::traits::StreamService;
use crate::domain::{Cursor, Record, RecordBatch, Shard, ShardId, StartPosition};

/// Maximum records returned by a single fetch when no limit is given
const DEFAULT_FETCH_LIMIT: usize = 10_000;

/// Append-only log of one in-memory shard
#[derive(Debug, Default)]
struct ShardLog {
    position: usize,
    records: Vec<Record>,
    closed: bool,
}

/// In-memory stream service using DashMap
///
/// Cursors are `"<shard id>/<offset>"` strings. Failures can be scripted per
/// shard, and every call is counted so callers can assert how the tailer
/// drove the service.
pub struct InMemoryStreamService {
    stream: String,
    shards: DashMap<ShardId, ShardLog>,
    fetch_failures: DashMap<ShardId, VecDeque<ServiceError>>,
    iterator_failures: DashMap<ShardId, VecDeque<ServiceError>>,
    describe_failure: Mutex<Option<ServiceError>>,
    describe_calls: AtomicUsize,
    iterator_requests: DashMap<ShardId, Vec<StartPosition>>,
    fetch_calls: DashMap<ShardId, usize>,
}

impl InMemoryStreamService {
    /// Create an empty stream with the given name
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            shards: DashMap::new(),
            fetch_failures: DashMap::new(),
            iterator_failures: DashMap::new(),
            describe_failure: Mutex::new(None),
            describe_calls: AtomicUsize::new(0),
            iterator_requests: DashMap::new(),
            fetch_calls: DashMap::new(),
        }
    }

    /// Create a stream with empty shards named by `shard_ids`
    pub fn with_shards(stream: impl Into<String>, shard_ids: &[&str]) -> Self {
        let service = Self::new(stream);
        for id in shard_ids {
            service.add_shard(*id);
        }
        service
    }

    pub fn add_shard(&self, id: impl Into<ShardId>) {
        let position = self.shards.len();
        self.shards.entry(id.into()).or_insert_with(|| ShardLog {
            position,
            ..ShardLog::default()
        });
    }

    /// Append a record arriving now; returns its sequence number
    pub fn append(&self, shard: &str, data: impl Into<Vec<u8>>) -> String {
        self.append_at(shard, data, Utc::now())
    }

    /// Append a record with an explicit arrival instant
    ///
    /// Appending to an unknown shard creates it.
    pub fn append_at(
        &self,
        shard: &str,
        data: impl Into<Vec<u8>>,
        arrival: DateTime<Utc>,
    ) -> String {
        let shard_id = ShardId::new(shard);
        let position = self.shards.len();
        let mut log = self
            .shards
            .entry(shard_id.clone())
            .or_insert_with(|| ShardLog {
                position,
                ..ShardLog::default()
            });

        let index = log.records.len();
        let sequence_number = format!("{:020}", index);
        log.records.push(Record {
            partition_key: format!("{}-{}", shard_id, index),
            shard_id,
            sequence_number: sequence_number.clone(),
            approximate_arrival: Some(arrival),
            data: data.into(),
        });
        sequence_number
    }

    /// Mark a shard closed; once read to the end its fetches return no next cursor
    pub fn close_shard(&self, shard: &str) {
        if let Some(mut log) = self.shards.get_mut(&ShardId::new(shard)) {
            log.closed = true;
        }
    }

    /// Queue an error for the next fetch on `shard`
    pub fn fail_next_fetch(&self, shard: &str, error: ServiceError) {
        self.fetch_failures
            .entry(ShardId::new(shard))
            .or_default()
            .push_back(error);
    }

    /// Queue an error for the next iterator request on `shard`
    pub fn fail_next_iterator(&self, shard: &str, error: ServiceError) {
        self.iterator_failures
            .entry(ShardId::new(shard))
            .or_default()
            .push_back(error);
    }

    /// Make every describe call fail with `error`
    pub fn fail_describe(&self, error: ServiceError) {
        *self.describe_failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }

    /// Start positions requested for `shard`, in request order
    pub fn iterator_requests(&self, shard: &str) -> Vec<StartPosition> {
        self.iterator_requests
            .get(&ShardId::new(shard))
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    pub fn fetch_calls(&self, shard: &str) -> usize {
        self.fetch_calls
            .get(&ShardId::new(shard))
            .map(|r| *r.value())
            .unwrap_or(0)
    }

    fn decode_cursor(cursor: &Cursor) -> Result<(ShardId, usize), ServiceError> {
        let (shard, offset) = cursor
            .as_str()
            .rsplit_once('/')
            .ok_or_else(|| ServiceError::Rejected("invalid shard iterator".to_string()))?;
        let offset = offset
            .parse()
            .map_err(|_| ServiceError::Rejected("invalid shard iterator".to_string()))?;
        Ok((ShardId::new(shard), offset))
    }

    fn encode_cursor(shard: &ShardId, offset: usize) -> Cursor {
        Cursor::new(format!("{}/{}", shard, offset))
    }

    fn check_stream(&self, stream: &str) -> Result<(), ServiceError> {
        if stream == self.stream {
            Ok(())
        } else {
            Err(ServiceError::StreamNotFound(stream.to_string()))
        }
    }
}

#[async_trait]
impl StreamService for InMemoryStreamService {
    async fn describe_stream(&self, stream: &str) -> Result<Vec<Shard>, ServiceError> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self
            .describe_failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Err(error);
        }
        self.check_stream(stream)?;

        let mut shards: Vec<_> = self
            .shards
            .iter()
            .map(|entry| (entry.value().position, entry.key().clone()))
            .collect();
        shards.sort();

        Ok(shards.into_iter().map(|(_, id)| Shard::new(id)).collect())
    }

    async fn get_shard_iterator(
        &self,
        stream: &str,
        shard: &ShardId,
        position: &StartPosition,
    ) -> Result<Cursor, ServiceError> {
        self.iterator_requests
            .entry(shard.clone())
            .or_default()
            .push(position.clone());

        if let Some(error) = self
            .iterator_failures
            .get_mut(shard)
            .and_then(|mut queue| queue.pop_front())
        {
            return Err(error);
        }
        self.check_stream(stream)?;

        let log = self
            .shards
            .get(shard)
            .ok_or_else(|| ServiceError::ShardNotFound(shard.to_string()))?;

        let offset = match position {
            StartPosition::TrimHorizon => 0,
            StartPosition::Latest => log.records.len(),
            StartPosition::AtSequenceNumber(seq) => log
                .records
                .iter()
                .position(|r| &r.sequence_number == seq)
                .ok_or_else(|| {
                    ServiceError::Rejected(format!("sequence number {} not found", seq))
                })?,
            StartPosition::AtTimestamp(ts) => log
                .records
                .iter()
                .position(|r| r.approximate_arrival.is_some_and(|arrival| arrival >= *ts))
                .unwrap_or(log.records.len()),
        };

        Ok(Self::encode_cursor(shard, offset))
    }

    async fn get_records(
        &self,
        cursor: &Cursor,
        limit: Option<u32>,
    ) -> Result<RecordBatch, ServiceError> {
        let (shard, offset) = Self::decode_cursor(cursor)?;
        *self.fetch_calls.entry(shard.clone()).or_insert(0) += 1;

        if let Some(error) = self
            .fetch_failures
            .get_mut(&shard)
            .and_then(|mut queue| queue.pop_front())
        {
            return Err(error);
        }

        let log = self
            .shards
            .get(&shard)
            .ok_or_else(|| ServiceError::ShardNotFound(shard.to_string()))?;

        let limit = limit.map_or(DEFAULT_FETCH_LIMIT, |l| l as usize);
        let start = offset.min(log.records.len());
        let end = (start + limit).min(log.records.len());
        let records = log.records[start..end].to_vec();

        let at_end = end == log.records.len();
        let next_cursor = if at_end && log.closed {
            None
        } else {
            Some(Self::encode_cursor(&shard, end))
        };

        Ok(RecordBatch {
            records,
            next_cursor,
            millis_behind_latest: Some(if at_end { 0 } else { 1 }),
        })
    }
}
