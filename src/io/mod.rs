pub mod csv_writer;
pub mod error;
pub mod writer;

// Re-export commonly used types
pub use csv_writer::CsvRecordWriter;
pub use error::IoError;
pub use writer::{LineWriter, OutputFormat, RecordWriter};
