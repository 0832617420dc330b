use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::error::DomainError;

/// Rule for choosing the initial cursor position, applied to every shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IteratorPolicy {
    /// Oldest record still retained by the shard
    TrimHorizon,
    /// The record with a given sequence number
    AtSequenceNumber,
    /// The first record at or after an instant
    AtTimestamp,
    /// Only records appended after the cursor is issued
    Latest,
}

impl IteratorPolicy {
    pub const ALL: [IteratorPolicy; 4] = [
        Self::TrimHorizon,
        Self::AtSequenceNumber,
        Self::AtTimestamp,
        Self::Latest,
    ];

    /// Wire name as understood by the stream service
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrimHorizon => "TRIM_HORIZON",
            Self::AtSequenceNumber => "AT_SEQUENCE_NUMBER",
            Self::AtTimestamp => "AT_TIMESTAMP",
            Self::Latest => "LATEST",
        }
    }
}

impl fmt::Display for IteratorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IteratorPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|policy| policy.as_str() == s)
            .ok_or_else(|| DomainError::UnknownIteratorType(s.to_string()))
    }
}

/// An iterator policy together with the argument it needs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StartPosition {
    TrimHorizon,
    AtSequenceNumber(String),
    AtTimestamp(DateTime<Utc>),
    #[default]
    Latest,
}

impl StartPosition {
    /// Build a start position from raw option values
    ///
    /// `start_time` is only parsed for `AT_TIMESTAMP`; an empty or missing
    /// value there falls back to the Unix epoch. `sequence_number` is only
    /// read for `AT_SEQUENCE_NUMBER`, where it is required.
    pub fn resolve(
        policy: IteratorPolicy,
        start_time: Option<&str>,
        sequence_number: Option<&str>,
    ) -> Result<Self, DomainError> {
        match policy {
            IteratorPolicy::TrimHorizon => Ok(Self::TrimHorizon),
            IteratorPolicy::Latest => Ok(Self::Latest),
            IteratorPolicy::AtSequenceNumber => sequence_number
                .filter(|seq| !seq.is_empty())
                .map(|seq| Self::AtSequenceNumber(seq.to_string()))
                .ok_or(DomainError::MissingSequenceNumber),
            IteratorPolicy::AtTimestamp => match start_time.filter(|s| !s.is_empty()) {
                Some(raw) => parse_start_time(raw).map(Self::AtTimestamp),
                None => Ok(Self::AtTimestamp(DateTime::<Utc>::UNIX_EPOCH)),
            },
        }
    }

    pub fn policy(&self) -> IteratorPolicy {
        match self {
            Self::TrimHorizon => IteratorPolicy::TrimHorizon,
            Self::AtSequenceNumber(_) => IteratorPolicy::AtSequenceNumber,
            Self::AtTimestamp(_) => IteratorPolicy::AtTimestamp,
            Self::Latest => IteratorPolicy::Latest,
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::AtTimestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn sequence_number(&self) -> Option<&str> {
        match self {
            Self::AtSequenceNumber(seq) => Some(seq),
            _ => None,
        }
    }
}

/// Parse an RFC3339 instant such as `2016-04-20T12:00:00+09:00`
pub fn parse_start_time(raw: &str) -> Result<DateTime<Utc>, DomainError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DomainError::InvalidStartTime {
            input: raw.to_string(),
            reason: e.to_string(),
        })
}
