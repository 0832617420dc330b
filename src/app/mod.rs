pub mod cli;
pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use cli::CliApp;
pub use config::{ErrorMode, TailArgs, normalize_long_flags};
pub use error::AppError;
pub use logging::init_logging;
