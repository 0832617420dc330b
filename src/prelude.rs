//! Prelude module for convenient imports
//!
//! Import everything you need with: `use kinesis_tail::prelude::*;`

// Domain types
pub use crate::domain::{
    Cursor, DomainError, IteratorPolicy, Record, RecordBatch, Shard, ShardId, StartPosition,
    parse_start_time,
};

// Service types
pub use crate::service::{
    InMemoryStreamService, KinesisStreamService, ServiceError, StreamService,
};

// Engine types
pub use crate::engine::{CursorResolver, EngineError, discover};

// IO types
pub use crate::io::{CsvRecordWriter, IoError, LineWriter, OutputFormat, RecordWriter};

// Streaming types
pub use crate::streaming::{
    FailFast, FailureAction, IsolateShard, PollSettings, RecordSink, RetryWithBackoff,
    SinkCapacity, StreamTailer, SupervisorPolicy, TailError, TailSession, TailerConfig, fan_in,
};

// App types
pub use crate::app::{AppError, CliApp, ErrorMode, TailArgs, init_logging};
