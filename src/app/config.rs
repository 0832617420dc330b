use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::domain::{DomainError, IteratorPolicy, StartPosition};
use crate::io::OutputFormat;
use crate::streaming::{FailFast, IsolateShard, RetryWithBackoff, SupervisorPolicy, TailerConfig};

/// Long flags that may also be spelled with a single dash
const LONG_FLAGS: &[&str] = &[
    "stream",
    "region",
    "iterator-type",
    "interval",
    "start-time",
    "starting-sequence-number",
    "batch-limit",
    "endpoint-url",
    "sink-capacity",
    "on-error",
    "max-retries",
    "retry-base-delay",
    "retry-max-delay",
    "format",
    "log-filter",
    "help",
    "version",
];

/// What happens when a shard fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ErrorMode {
    /// Stop tailing on the first failure of any shard
    #[default]
    FailFast,
    /// Drop the failing shard and keep tailing the others
    Isolate,
    /// Retry throttling and transport failures with backoff, then stop
    Retry,
}

/// Print the records of every shard of a Kinesis stream as they arrive
#[derive(Debug, Clone, Parser)]
#[command(name = "kinesis-tail", version)]
pub struct TailArgs {
    /// Stream name
    #[arg(long, default_value = "your-stream")]
    pub stream: String,

    /// AWS region of the stream
    #[arg(long, default_value = "ap-northeast-1")]
    pub region: String,

    /// TRIM_HORIZON, AT_SEQUENCE_NUMBER, AT_TIMESTAMP or LATEST
    #[arg(long, default_value = "LATEST")]
    pub iterator_type: IteratorPolicy,

    /// Wait between two fetches of the same shard
    #[arg(long, default_value = "3s", value_parser = humantime::parse_duration)]
    pub interval: Duration,

    /// RFC3339 instant to start from, e.g. 2016-04-20T12:00:00+09:00; only read for AT_TIMESTAMP
    #[arg(long)]
    pub start_time: Option<String>,

    /// Sequence number to start from; required for AT_SEQUENCE_NUMBER
    #[arg(long)]
    pub starting_sequence_number: Option<String>,

    /// Maximum records per fetch (1 to 10000)
    #[arg(long)]
    pub batch_limit: Option<u32>,

    /// Override the service endpoint, e.g. for a local emulator
    #[arg(long)]
    pub endpoint_url: Option<String>,

    /// Bound the number of records waiting to be written
    #[arg(long)]
    pub sink_capacity: Option<usize>,

    #[arg(long, value_enum, default_value_t = ErrorMode::FailFast)]
    pub on_error: ErrorMode,

    /// Retries per failure with --on-error retry
    #[arg(long, default_value_t = 5)]
    pub max_retries: u32,

    #[arg(long, default_value = "200ms", value_parser = humantime::parse_duration)]
    pub retry_base_delay: Duration,

    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
    pub retry_max_delay: Duration,

    #[arg(long, value_enum, default_value_t = OutputFormat::Lines)]
    pub format: OutputFormat,

    /// Tracing filter directive, logs go to stderr
    #[arg(long, env = "KINESIS_TAIL_LOG", default_value = "warn")]
    pub log_filter: String,
}

impl TailArgs {
    /// Parse process arguments, accepting single-dash long flags
    pub fn parse_normalized() -> Self {
        Self::parse_from(normalize_long_flags(std::env::args_os()))
    }

    /// Resolve the core session settings without touching the network
    pub fn tailer_config(&self) -> Result<TailerConfig, DomainError> {
        let position = StartPosition::resolve(
            self.iterator_type,
            self.start_time.as_deref(),
            self.starting_sequence_number.as_deref(),
        )?;

        let mut config = TailerConfig::new(self.stream.clone())
            .with_start_position(position)
            .with_interval(self.interval);
        if let Some(limit) = self.batch_limit {
            config = config.with_batch_limit(limit)?;
        }
        if let Some(capacity) = self.sink_capacity {
            config = config.with_sink_capacity(capacity)?;
        }
        Ok(config)
    }

    pub fn policy(&self) -> Arc<dyn SupervisorPolicy> {
        match self.on_error {
            ErrorMode::FailFast => Arc::new(FailFast),
            ErrorMode::Isolate => Arc::new(IsolateShard),
            ErrorMode::Retry => Arc::new(
                RetryWithBackoff::new(FailFast)
                    .with_max_retries(self.max_retries)
                    .with_delays(self.retry_base_delay, self.retry_max_delay),
            ),
        }
    }
}

/// Rewrite `-stream x` and `-interval=5s` into their double-dash form
///
/// Only known long flags are touched, and nothing after a bare `--`.
pub fn normalize_long_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut passthrough = false;
    args.into_iter()
        .map(|arg| {
            if passthrough {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                passthrough = true;
                return arg;
            }
            match text.strip_prefix('-') {
                Some(rest) if !rest.starts_with('-') => {
                    let name = rest.split_once('=').map_or(rest, |(name, _)| name);
                    if LONG_FLAGS.contains(&name) {
                        OsString::from(format!("-{text}"))
                    } else {
                        arg
                    }
                }
                _ => arg,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::{FailureAction, SinkCapacity};
    use chrono::{TimeZone, Utc};
    use std::num::NonZeroUsize;

    fn parse(args: &[&str]) -> TailArgs {
        let argv = std::iter::once("kinesis-tail")
            .chain(args.iter().copied())
            .map(OsString::from);
        TailArgs::try_parse_from(normalize_long_flags(argv)).unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&[]);

        assert_eq!(args.stream, "your-stream");
        assert_eq!(args.region, "ap-northeast-1");
        assert_eq!(args.iterator_type, IteratorPolicy::Latest);
        assert_eq!(args.interval, Duration::from_secs(3));
        assert_eq!(args.on_error, ErrorMode::FailFast);
        assert_eq!(args.format, OutputFormat::Lines);

        let config = args.tailer_config().unwrap();
        assert_eq!(config.stream, "your-stream");
        assert_eq!(config.start_position, StartPosition::Latest);
        assert_eq!(config.sink_capacity, SinkCapacity::Unbounded);
    }

    #[test]
    fn single_dash_long_flags() {
        let args = parse(&["-stream", "orders", "-interval=500ms", "-iterator-type", "TRIM_HORIZON"]);

        assert_eq!(args.stream, "orders");
        assert_eq!(args.interval, Duration::from_millis(500));
        assert_eq!(args.iterator_type, IteratorPolicy::TrimHorizon);
    }

    #[test]
    fn normalization_leaves_values_and_unknown_flags_alone() {
        let argv = ["kinesis-tail", "-h", "-x", "-5", "--stream", "--", "-stream"].map(OsString::from);

        assert_eq!(
            normalize_long_flags(argv.clone()),
            argv.to_vec(),
        );
    }

    #[test]
    fn unknown_iterator_type_is_a_usage_error() {
        let result = TailArgs::try_parse_from(["kinesis-tail", "--iterator-type", "OLDEST"]);
        assert!(result.is_err());
    }

    #[test]
    fn at_timestamp_uses_start_time() {
        let config = parse(&[
            "--iterator-type",
            "AT_TIMESTAMP",
            "--start-time",
            "2016-04-20T12:00:00+09:00",
        ])
        .tailer_config()
        .unwrap();

        assert_eq!(
            config.start_position,
            StartPosition::AtTimestamp(Utc.with_ymd_and_hms(2016, 4, 20, 3, 0, 0).unwrap())
        );
    }

    #[test]
    fn bad_start_time_fails_only_for_at_timestamp() {
        let ignored = parse(&["--start-time", "yesterday"]).tailer_config();
        assert!(ignored.is_ok());

        let rejected = parse(&["--iterator-type", "AT_TIMESTAMP", "--start-time", "yesterday"])
            .tailer_config();
        assert!(matches!(rejected, Err(DomainError::InvalidStartTime { .. })));
    }

    #[test]
    fn sequence_number_required_for_at_sequence_number() {
        let missing = parse(&["--iterator-type", "AT_SEQUENCE_NUMBER"]).tailer_config();
        assert_eq!(missing, Err(DomainError::MissingSequenceNumber));
    }

    #[test]
    fn limits_are_validated() {
        assert!(parse(&["--batch-limit", "0"]).tailer_config().is_err());
        assert_eq!(
            parse(&["--sink-capacity", "0"]).tailer_config(),
            Err(DomainError::ZeroSinkCapacity)
        );

        let config = parse(&["--batch-limit", "500", "--sink-capacity", "64"])
            .tailer_config()
            .unwrap();
        assert_eq!(config.poll.batch_limit, Some(500));
        assert_eq!(
            config.sink_capacity,
            SinkCapacity::Bounded(NonZeroUsize::new(64).unwrap())
        );
    }

    #[test]
    fn policy_follows_on_error() {
        use crate::domain::ShardId;
        use crate::engine::EngineError;
        use crate::service::ServiceError;

        let throttled = EngineError::Fetch {
            shard: ShardId::new("a"),
            source: ServiceError::Throttled("busy".to_string()),
        };

        let fail_fast = parse(&[]).policy();
        assert_eq!(fail_fast.on_fetch_error(&throttled, 1), FailureAction::Abort);

        let isolate = parse(&["--on-error", "isolate"]).policy();
        assert_eq!(isolate.on_fetch_error(&throttled, 1), FailureAction::Isolate);

        let retry = parse(&["--on-error", "retry", "--max-retries", "1", "--retry-base-delay", "10ms"])
            .policy();
        assert_eq!(
            retry.on_fetch_error(&throttled, 1),
            FailureAction::Retry {
                delay: Duration::from_millis(10)
            }
        );
        assert_eq!(retry.on_fetch_error(&throttled, 2), FailureAction::Abort);
    }
}
