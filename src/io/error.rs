use std::io;
use thiserror::Error;

/// Errors writing records to the output
#[derive(Error, Debug)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv_async::Error),
}
