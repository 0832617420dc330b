pub mod discovery;
pub mod error;
pub mod resolver;

// Re-export commonly used types
pub use discovery::discover;
pub use error::EngineError;
pub use resolver::CursorResolver;
