use std::num::NonZeroUsize;
use std::time::Duration;

use super::poller::PollSettings;
use super::sink::SinkCapacity;
use crate::domain::{DomainError, StartPosition};

/// Largest `Limit` the service accepts for one fetch
pub const MAX_BATCH_LIMIT: u32 = 10_000;

/// Immutable settings of one tailing session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailerConfig {
    pub stream: String,
    pub start_position: StartPosition,
    pub poll: PollSettings,
    pub sink_capacity: SinkCapacity,
}

impl TailerConfig {
    /// Tail `stream` from `LATEST`, polling every 3s into an unbounded sink
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            start_position: StartPosition::default(),
            poll: PollSettings::default(),
            sink_capacity: SinkCapacity::default(),
        }
    }

    pub fn with_start_position(mut self, position: StartPosition) -> Self {
        self.start_position = position;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.poll.interval = interval;
        self
    }

    /// Cap the records returned by one fetch
    pub fn with_batch_limit(mut self, limit: u32) -> Result<Self, DomainError> {
        if limit == 0 || limit > MAX_BATCH_LIMIT {
            return Err(DomainError::InvalidBatchLimit {
                got: limit,
                max: MAX_BATCH_LIMIT,
            });
        }
        self.poll.batch_limit = Some(limit);
        Ok(self)
    }

    /// Bound the fan-in queue to `capacity` records
    pub fn with_sink_capacity(mut self, capacity: usize) -> Result<Self, DomainError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(DomainError::ZeroSinkCapacity)?;
        self.sink_capacity = SinkCapacity::Bounded(capacity);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_command_line_defaults() {
        let config = TailerConfig::new("your-stream");

        assert_eq!(config.start_position, StartPosition::Latest);
        assert_eq!(config.poll.interval, Duration::from_secs(3));
        assert_eq!(config.poll.batch_limit, None);
        assert_eq!(config.sink_capacity, SinkCapacity::Unbounded);
    }

    #[test]
    fn batch_limit_must_be_in_range() {
        assert_eq!(
            TailerConfig::new("s").with_batch_limit(0),
            Err(DomainError::InvalidBatchLimit { got: 0, max: 10_000 })
        );
        assert!(TailerConfig::new("s").with_batch_limit(10_001).is_err());

        let config = TailerConfig::new("s").with_batch_limit(10_000).unwrap();
        assert_eq!(config.poll.batch_limit, Some(10_000));
    }

    #[test]
    fn zero_sink_capacity_is_rejected() {
        assert_eq!(
            TailerConfig::new("s").with_sink_capacity(0),
            Err(DomainError::ZeroSinkCapacity)
        );
        let config = TailerConfig::new("s").with_sink_capacity(8).unwrap();
        assert_eq!(
            config.sink_capacity,
            SinkCapacity::Bounded(NonZeroUsize::new(8).unwrap())
        );
    }
}
