pub mod config;
pub mod error;
pub mod policy;
pub mod poller;
pub mod processor;
pub mod sink;

// Re-export commonly used types
pub use config::{MAX_BATCH_LIMIT, TailerConfig};
pub use error::TailError;
pub use policy::{FailFast, FailureAction, IsolateShard, RetryWithBackoff, SupervisorPolicy};
pub use poller::{PollSettings, PollerExit, PollerState, Resolution, ShardPoller};
pub use processor::{StreamTailer, TailSession};
pub use sink::{RecordSink, SinkCapacity, SinkClosed, SinkReceiver, SinkSender, fan_in};
