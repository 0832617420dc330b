use std::io;
use thiserror::Error;

use crate::domain::DomainError;
use crate::engine::EngineError;
use crate::io::IoError;
use crate::streaming::TailError;

/// Top-level application errors unifying all layer errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] DomainError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Failed writing output: {0}")]
    Output(#[from] IoError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<TailError> for AppError {
    fn from(error: TailError) -> Self {
        match error {
            TailError::Engine(e) => Self::Engine(e),
            TailError::Output(e) => Self::Output(e),
        }
    }
}
