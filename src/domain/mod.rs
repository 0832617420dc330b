pub mod error;
pub mod position;
pub mod shard;

// Re-export commonly used types
pub use error::DomainError;
pub use position::{IteratorPolicy, StartPosition, parse_start_time};
pub use shard::{Cursor, Record, RecordBatch, Shard, ShardId};
