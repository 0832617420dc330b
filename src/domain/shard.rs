use std::fmt;

use chrono::{DateTime, Utc};

/// Identifier of one shard within a stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId(String);

impl ShardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShardId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ShardId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One partition of a stream, as returned by discovery
///
/// Parent/child relationships from splits and merges are not tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    id: ShardId,
}

impl Shard {
    pub fn new(id: impl Into<ShardId>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &ShardId {
        &self.id
    }
}

/// Opaque, service-issued read position within one shard
///
/// Owned by exactly one poller and replaced after every successful fetch.
#[derive(Clone, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Iterator tokens are long and meaningless to humans; keep logs readable.
impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(12).collect();
        if prefix.len() < self.0.len() {
            write!(f, "Cursor({prefix}...)")
        } else {
            write!(f, "Cursor({prefix})")
        }
    }
}

/// A single record read from a shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub shard_id: ShardId,
    pub sequence_number: String,
    pub partition_key: String,
    pub approximate_arrival: Option<DateTime<Utc>>,
    pub data: Vec<u8>,
}

impl Record {
    /// Payload decoded as text, replacing invalid UTF-8 sequences
    pub fn payload_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// Result of one fetch against a shard cursor
#[derive(Debug, Clone, Default)]
pub struct RecordBatch {
    pub records: Vec<Record>,
    /// `None` once the shard has been closed and fully read
    pub next_cursor: Option<Cursor>,
    pub millis_behind_latest: Option<i64>,
}
