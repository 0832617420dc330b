use thiserror::Error;

use crate::engine::EngineError;
use crate::io::IoError;

/// Errors that end a running tail session
#[derive(Error, Debug)]
pub enum TailError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Failed writing record: {0}")]
    Output(#[from] IoError),
}
