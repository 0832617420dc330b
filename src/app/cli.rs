use std::future::Future;
use std::io;

use tokio::io::{BufWriter, Stdout};
use tracing::info;

use super::error::AppError;

const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURE: i32 = 1;

/// Reusable CLI application runner that handles:
/// - Signal handling (SIGINT, SIGTERM, SIGHUP)
/// - Stdout buffering
/// - Exit codes (0 = stopped by signal, 1 = error)
pub struct CliApp {
    name: String,
}

impl CliApp {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `main_fn` against a buffered stdout until it fails or a signal arrives
    ///
    /// This function never returns - it calls std::process::exit with the appropriate code
    pub async fn run<F, Fut>(self, main_fn: F) -> !
    where
        F: FnOnce(BufWriter<Stdout>) -> Fut,
        Fut: Future<Output = Result<(), AppError>>,
    {
        let writer = BufWriter::new(tokio::io::stdout());

        let code = tokio::select! {
            result = main_fn(writer) => exit_code(&result),
            signal = wait_for_signal() => match signal {
                Ok(name) => {
                    info!(app = %self.name, signal = name, "Stopping");
                    EXIT_SUCCESS
                }
                Err(e) => exit_code(&Err(AppError::Io(e))),
            },
        };
        std::process::exit(code);
    }
}

/// Report the outcome of the main function and pick the exit code
fn exit_code(result: &Result<(), AppError>) -> i32 {
    match result {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_FAILURE
        }
    }
}

/// Wait for SIGINT, SIGTERM or SIGHUP and return its name
async fn wait_for_signal() -> io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sighup = signal(SignalKind::hangup())?;

        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
            _ = sighup.recv() => "SIGHUP",
        };
        Ok(name)
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("Ctrl+C")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;

    #[test]
    fn cli_app_new() {
        let app = CliApp::new("kinesis-tail");
        assert_eq!(app.name(), "kinesis-tail");
    }

    #[test]
    fn fatal_errors_exit_with_one() {
        let result = Err(AppError::from(EngineError::NoActiveShards));
        assert_eq!(exit_code(&result), 1);
        assert_eq!(exit_code(&Ok(())), 0);
    }
}
