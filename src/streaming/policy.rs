use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::engine::EngineError;

/// What a poller does after a failed cursor request or fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Wait, then repeat the same request
    Retry { delay: Duration },
    /// Stop this shard and keep the others running
    Isolate,
    /// Stop the whole session
    Abort,
}

/// Supervisor strategy for shard failures
///
/// `attempt` counts consecutive failures of the same operation, starting at 1.
/// Discovery failures never reach the policy; they always end the session.
pub trait SupervisorPolicy: Send + Sync {
    fn on_cursor_error(&self, error: &EngineError, attempt: u32) -> FailureAction;

    fn on_fetch_error(&self, error: &EngineError, attempt: u32) -> FailureAction;
}

/// Abort on the first failure of any shard
#[derive(Debug, Clone, Copy, Default)]
pub struct FailFast;

impl SupervisorPolicy for FailFast {
    fn on_cursor_error(&self, _error: &EngineError, _attempt: u32) -> FailureAction {
        FailureAction::Abort
    }

    fn on_fetch_error(&self, _error: &EngineError, _attempt: u32) -> FailureAction {
        FailureAction::Abort
    }
}

/// Stop only the failing shard
#[derive(Debug, Clone, Copy, Default)]
pub struct IsolateShard;

impl SupervisorPolicy for IsolateShard {
    fn on_cursor_error(&self, error: &EngineError, _attempt: u32) -> FailureAction {
        warn!(%error, "Isolating shard after cursor failure");
        FailureAction::Isolate
    }

    fn on_fetch_error(&self, error: &EngineError, _attempt: u32) -> FailureAction {
        warn!(%error, "Isolating shard after fetch failure");
        FailureAction::Isolate
    }
}

/// Retry transient failures with exponential backoff, then defer to `fallback`
#[derive(Debug, Clone, Copy)]
pub struct RetryWithBackoff<F = FailFast> {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    fallback: F,
}

impl<F: SupervisorPolicy> RetryWithBackoff<F> {
    pub const DEFAULT_MAX_RETRIES: u32 = 5;
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(200);
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

    pub fn new(fallback: F) -> Self {
        Self {
            max_retries: Self::DEFAULT_MAX_RETRIES,
            base_delay: Self::DEFAULT_BASE_DELAY,
            max_delay: Self::DEFAULT_MAX_DELAY,
            fallback,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the first delay and the cap the doubling delay never exceeds
    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay.max(base_delay);
        self
    }

    /// Delay before retry number `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn decide(&self, error: &EngineError, attempt: u32) -> Option<FailureAction> {
        if error.is_retryable() && attempt <= self.max_retries {
            let delay = self.delay_for(attempt);
            warn!(%error, attempt, ?delay, "Retrying after transient failure");
            Some(FailureAction::Retry { delay })
        } else {
            None
        }
    }
}

impl Default for RetryWithBackoff<FailFast> {
    fn default() -> Self {
        Self::new(FailFast)
    }
}

impl<F: SupervisorPolicy> SupervisorPolicy for RetryWithBackoff<F> {
    fn on_cursor_error(&self, error: &EngineError, attempt: u32) -> FailureAction {
        self.decide(error, attempt)
            .unwrap_or_else(|| self.fallback.on_cursor_error(error, attempt))
    }

    fn on_fetch_error(&self, error: &EngineError, attempt: u32) -> FailureAction {
        self.decide(error, attempt)
            .unwrap_or_else(|| self.fallback.on_fetch_error(error, attempt))
    }
}

// Lets a policy chosen at runtime be shared by every poller
impl<P: SupervisorPolicy + ?Sized> SupervisorPolicy for Arc<P> {
    fn on_cursor_error(&self, error: &EngineError, attempt: u32) -> FailureAction {
        (**self).on_cursor_error(error, attempt)
    }

    fn on_fetch_error(&self, error: &EngineError, attempt: u32) -> FailureAction {
        (**self).on_fetch_error(error, attempt)
    }
}
