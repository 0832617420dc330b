pub mod error;
pub mod kinesis;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use error::ServiceError;
pub use kinesis::KinesisStreamService;
pub use memory::InMemoryStreamService;
pub use traits::StreamService;
