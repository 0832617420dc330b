use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::policy::{FailureAction, SupervisorPolicy};
use super::sink::RecordSink;
use crate::domain::{Cursor, Shard};
use crate::engine::{CursorResolver, EngineError};
use crate::service::StreamService;

/// Lifecycle of a shard poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Resolving,
    Polling,
    Terminated,
}

/// Outcome of cursor resolution that does not end the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Ready,
    /// The policy chose to drop this shard
    Isolated(EngineError),
}

/// How a poller stopped without failing the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerExit {
    Isolated(EngineError),
    /// Nothing left to do: the consumer is gone, or the poller had already terminated
    Stopped,
}

/// Fetch settings shared by every poller of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub batch_limit: Option<u32>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            batch_limit: None,
        }
    }
}

enum Step {
    Emitted,
    SinkClosed,
    Cancelled,
}

/// Owns one shard's cursor and feeds its records into the sink
pub struct ShardPoller<S: StreamService + ?Sized, K, P> {
    shard: Shard,
    resolver: Arc<CursorResolver<S>>,
    service: Arc<S>,
    sink: K,
    policy: P,
    settings: PollSettings,
    cancel: CancellationToken,
    cursor: Option<Cursor>,
    state: PollerState,
}

impl<S, K, P> ShardPoller<S, K, P>
where
    S: StreamService + ?Sized + 'static,
    K: RecordSink + 'static,
    P: SupervisorPolicy + 'static,
{
    /// Create a poller in the `Resolving` state
    pub fn new(
        shard: Shard,
        resolver: Arc<CursorResolver<S>>,
        service: Arc<S>,
        sink: K,
        policy: P,
        settings: PollSettings,
    ) -> Self {
        Self {
            shard,
            resolver,
            service,
            sink,
            policy,
            settings,
            cancel: CancellationToken::new(),
            cursor: None,
            state: PollerState::Resolving,
        }
    }

    /// Share `token` with the other pollers of a session
    ///
    /// The poller cancels it when the policy aborts. Once it is cancelled,
    /// the poller stops without fetching or emitting anything more.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn shard(&self) -> &Shard {
        &self.shard
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    /// Obtain the initial cursor, consulting the policy on failure
    ///
    /// `Err` means the policy aborted the session.
    pub async fn resolve(&mut self) -> Result<Resolution, EngineError> {
        let mut attempt = 0;
        loop {
            match self.resolver.resolve(&self.shard).await {
                Ok(cursor) => {
                    self.cursor = Some(cursor);
                    self.state = PollerState::Polling;
                    return Ok(Resolution::Ready);
                }
                Err(error) => {
                    attempt += 1;
                    match self.policy.on_cursor_error(&error, attempt) {
                        FailureAction::Retry { delay } => tokio::time::sleep(delay).await,
                        FailureAction::Isolate => {
                            self.state = PollerState::Terminated;
                            return Ok(Resolution::Isolated(error));
                        }
                        FailureAction::Abort => return Err(self.abort(error)),
                    }
                }
            }
        }
    }

    /// Poll the shard until the policy stops it or the session is cancelled
    ///
    /// Resolves the cursor first if that has not happened yet. Never returns
    /// while the shard stays healthy.
    pub async fn run(mut self) -> Result<PollerExit, EngineError> {
        match self.state {
            PollerState::Resolving => {
                if let Resolution::Isolated(error) = self.resolve().await? {
                    return Ok(PollerExit::Isolated(error));
                }
            }
            PollerState::Polling => {}
            PollerState::Terminated => return Ok(PollerExit::Stopped),
        }

        info!(shard_id = %self.shard.id(), "Polling shard");

        let cancel = self.cancel.clone();
        let mut attempt = 0;
        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Ok(Step::Cancelled),
                step = self.poll_once() => step,
            };

            let delay = match step {
                Ok(Step::Emitted) => {
                    attempt = 0;
                    self.settings.interval
                }
                Ok(Step::SinkClosed) => {
                    debug!(shard_id = %self.shard.id(), "Sink closed, stopping poller");
                    return Ok(self.stop());
                }
                Ok(Step::Cancelled) => {
                    debug!(shard_id = %self.shard.id(), "Session cancelled, stopping poller");
                    return Ok(self.stop());
                }
                Err(error) => {
                    attempt += 1;
                    match self.policy.on_fetch_error(&error, attempt) {
                        FailureAction::Retry { delay } => delay,
                        FailureAction::Isolate => {
                            self.state = PollerState::Terminated;
                            return Ok(PollerExit::Isolated(error));
                        }
                        FailureAction::Abort => return Err(self.abort(error)),
                    }
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(shard_id = %self.shard.id(), "Session cancelled, stopping poller");
                    return Ok(self.stop());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn stop(&mut self) -> PollerExit {
        self.state = PollerState::Terminated;
        PollerExit::Stopped
    }

    /// Terminate and stop every poller sharing the token
    fn abort(&mut self, error: EngineError) -> EngineError {
        self.state = PollerState::Terminated;
        self.cancel.cancel();
        error
    }

    /// Fetch one batch, emit it in service order, then advance the cursor
    async fn poll_once(&mut self) -> Result<Step, EngineError> {
        let cursor = self
            .cursor
            .as_ref()
            .ok_or_else(|| EngineError::ShardClosed(self.shard.id().clone()))?;

        let batch = self
            .service
            .get_records(cursor, self.settings.batch_limit)
            .await
            .map_err(|source| EngineError::Fetch {
                shard: self.shard.id().clone(),
                source,
            })?;

        let count = batch.records.len();
        for mut record in batch.records {
            // Another shard may have failed while this batch was in flight
            if self.cancel.is_cancelled() {
                return Ok(Step::Cancelled);
            }
            record.shard_id = self.shard.id().clone();
            if self.sink.emit(record).await.is_err() {
                return Ok(Step::SinkClosed);
            }
        }

        debug!(
            shard_id = %self.shard.id(),
            records = count,
            millis_behind_latest = ?batch.millis_behind_latest,
            "Fetched batch"
        );

        self.cursor = batch.next_cursor;
        if self.cursor.is_none() {
            return Err(EngineError::ShardClosed(self.shard.id().clone()));
        }
        Ok(Step::Emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Record, ShardId, StartPosition};
    use crate::service::{InMemoryStreamService, ServiceError};
    use crate::streaming::policy::{FailFast, IsolateShard, RetryWithBackoff};
    use crate::streaming::sink::{SinkCapacity, SinkReceiver, SinkSender, fan_in};

    const TICK: Duration = Duration::from_millis(5);

    fn poller<P: SupervisorPolicy + 'static>(
        service: &Arc<InMemoryStreamService>,
        shard: &str,
        position: StartPosition,
        policy: P,
        batch_limit: Option<u32>,
    ) -> (ShardPoller<InMemoryStreamService, SinkSender, P>, SinkReceiver) {
        let (tx, rx) = fan_in(SinkCapacity::Unbounded);
        let resolver = Arc::new(CursorResolver::new(service.clone(), "s", position));
        let settings = PollSettings {
            interval: TICK,
            batch_limit,
        };
        (
            ShardPoller::new(Shard::new(shard), resolver, service.clone(), tx, policy, settings),
            rx,
        )
    }

    async fn next(rx: &mut SinkReceiver) -> Record {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("record within timeout")
            .expect("sink still open")
    }

    #[tokio::test]
    async fn resolve_moves_to_polling() {
        let service = Arc::new(InMemoryStreamService::with_shards("s", &["a"]));
        let (mut poller, _rx) = poller(&service, "a", StartPosition::Latest, FailFast, None);
        assert_eq!(poller.state(), PollerState::Resolving);

        assert_eq!(poller.resolve().await, Ok(Resolution::Ready));
        assert_eq!(poller.state(), PollerState::Polling);
    }

    #[tokio::test]
    async fn resolve_failure_terminates_under_fail_fast() {
        let service = Arc::new(InMemoryStreamService::with_shards("s", &["a"]));
        service.fail_next_iterator("a", ServiceError::Rejected("denied".to_string()));
        let (mut poller, _rx) = poller(&service, "a", StartPosition::Latest, FailFast, None);

        let err = poller.resolve().await.unwrap_err();

        assert!(matches!(err, EngineError::Cursor { .. }));
        assert_eq!(poller.state(), PollerState::Terminated);
    }

    #[tokio::test]
    async fn resolve_failure_isolates_under_isolate_policy() {
        let service = Arc::new(InMemoryStreamService::with_shards("s", &["a"]));
        service.fail_next_iterator("a", ServiceError::Rejected("denied".to_string()));
        let (mut poller, _rx) = poller(&service, "a", StartPosition::Latest, IsolateShard, None);

        let resolution = poller.resolve().await.unwrap();

        assert!(matches!(resolution, Resolution::Isolated(EngineError::Cursor { .. })));
        assert_eq!(poller.state(), PollerState::Terminated);
    }

    #[tokio::test]
    async fn resolve_retries_transient_failure() {
        let service = Arc::new(InMemoryStreamService::with_shards("s", &["a"]));
        service.fail_next_iterator("a", ServiceError::Throttled("busy".to_string()));
        let policy = RetryWithBackoff::new(FailFast).with_delays(TICK, TICK);
        let (mut poller, _rx) = poller(&service, "a", StartPosition::Latest, policy, None);

        assert_eq!(poller.resolve().await, Ok(Resolution::Ready));
        assert_eq!(service.iterator_requests("a").len(), 2);
    }

    #[tokio::test]
    async fn emits_records_in_shard_order_across_batches() {
        let service = Arc::new(InMemoryStreamService::with_shards("s", &["a"]));
        for data in ["r1", "r2", "r3"] {
            service.append("a", data);
        }
        let (poller, mut rx) = poller(&service, "a", StartPosition::TrimHorizon, FailFast, Some(2));
        let handle = tokio::spawn(poller.run());

        let received = vec![next(&mut rx).await, next(&mut rx).await, next(&mut rx).await];
        handle.abort();

        let payloads: Vec<_> = received.iter().map(|r| r.data.clone()).collect();
        assert_eq!(payloads, vec![b"r1".to_vec(), b"r2".to_vec(), b"r3".to_vec()]);
        assert!(received.iter().all(|r| r.shard_id == ShardId::new("a")));
        assert!(service.fetch_calls("a") >= 2);
    }

    #[tokio::test]
    async fn picks_up_records_appended_while_polling() {
        let service = Arc::new(InMemoryStreamService::with_shards("s", &["a"]));
        let (poller, mut rx) = poller(&service, "a", StartPosition::Latest, FailFast, None);
        let handle = tokio::spawn(poller.run());

        tokio::time::sleep(TICK * 4).await;
        service.append("a", "later");

        assert_eq!(next(&mut rx).await.data, b"later");
        handle.abort();
    }

    #[tokio::test]
    async fn fetch_failure_aborts_under_fail_fast() {
        let service = Arc::new(InMemoryStreamService::with_shards("s", &["a"]));
        service.append("a", "r1");
        let (poller, mut rx) = poller(&service, "a", StartPosition::TrimHorizon, FailFast, None);
        let handle = tokio::spawn(poller.run());

        assert_eq!(next(&mut rx).await.data, b"r1");
        service.fail_next_fetch("a", ServiceError::ExpiredCursor);
        service.append("a", "r2");

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            result,
            Err(EngineError::Fetch {
                shard: ShardId::new("a"),
                source: ServiceError::ExpiredCursor,
            })
        );
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn abort_cancels_shared_token() {
        let service = Arc::new(InMemoryStreamService::with_shards("s", &["a"]));
        service.fail_next_fetch("a", ServiceError::Rejected("denied".to_string()));
        let token = CancellationToken::new();
        let (poller, _rx) = poller(&service, "a", StartPosition::Latest, FailFast, None);

        let result = poller.with_cancellation(token.clone()).run().await;

        assert!(matches!(result, Err(EngineError::Fetch { .. })));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_poller_stops_without_fetching() {
        let service = Arc::new(InMemoryStreamService::with_shards("s", &["a"]));
        service.append("a", "r1");
        let token = CancellationToken::new();
        let (mut poller, mut rx) = poller(&service, "a", StartPosition::TrimHorizon, FailFast, None);
        poller.resolve().await.unwrap();

        token.cancel();
        let result = poller.with_cancellation(token).run().await;

        assert_eq!(result, Ok(PollerExit::Stopped));
        assert_eq!(service.fetch_calls("a"), 0);
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn records_appended_after_cancellation_are_never_emitted() {
        let service = Arc::new(InMemoryStreamService::with_shards("s", &["a"]));
        service.append("a", "r1");
        let token = CancellationToken::new();
        let (poller, mut rx) = poller(&service, "a", StartPosition::TrimHorizon, FailFast, None);
        let handle = tokio::spawn(poller.with_cancellation(token.clone()).run());

        assert_eq!(next(&mut rx).await.data, b"r1");
        token.cancel();
        service.append("a", "r2");

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result, Ok(PollerExit::Stopped));
        tokio::time::sleep(TICK * 4).await;
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn fetch_failure_isolates_under_isolate_policy() {
        let service = Arc::new(InMemoryStreamService::with_shards("s", &["a"]));
        service.fail_next_fetch("a", ServiceError::ExpiredCursor);
        let (poller, _rx) = poller(&service, "a", StartPosition::Latest, IsolateShard, None);

        let result = poller.run().await;

        assert!(matches!(
            result,
            Ok(PollerExit::Isolated(EngineError::Fetch { .. }))
        ));
    }

    #[tokio::test]
    async fn retries_transient_fetch_failure() {
        let service = Arc::new(InMemoryStreamService::with_shards("s", &["a"]));
        service.append("a", "r1");
        service.fail_next_fetch("a", ServiceError::Throttled("busy".to_string()));
        service.fail_next_fetch("a", ServiceError::Transport("reset".to_string()));
        let policy = RetryWithBackoff::new(FailFast).with_delays(TICK, TICK);
        let (poller, mut rx) = poller(&service, "a", StartPosition::TrimHorizon, policy, None);
        let handle = tokio::spawn(poller.run());

        assert_eq!(next(&mut rx).await.data, b"r1");
        assert!(service.fetch_calls("a") >= 3);
        handle.abort();
    }

    #[tokio::test]
    async fn closed_shard_is_reported_after_its_last_records() {
        let service = Arc::new(InMemoryStreamService::with_shards("s", &["a"]));
        service.append("a", "last");
        service.close_shard("a");
        let (poller, mut rx) = poller(&service, "a", StartPosition::TrimHorizon, FailFast, None);

        let result = poller.run().await;

        assert_eq!(result, Err(EngineError::ShardClosed(ShardId::new("a"))));
        assert_eq!(rx.try_recv().unwrap().data, b"last");
    }

    #[tokio::test]
    async fn stops_quietly_when_sink_is_closed() {
        let service = Arc::new(InMemoryStreamService::with_shards("s", &["a"]));
        service.append("a", "r1");
        let (poller, rx) = poller(&service, "a", StartPosition::TrimHorizon, FailFast, None);
        drop(rx);

        assert_eq!(poller.run().await, Ok(PollerExit::Stopped));
    }

    #[tokio::test]
    async fn run_resolves_when_not_yet_resolved() {
        let service = Arc::new(InMemoryStreamService::with_shards("s", &["a"]));
        service.append("a", "r1");
        let (poller, mut rx) = poller(&service, "a", StartPosition::TrimHorizon, FailFast, None);
        let handle = tokio::spawn(poller.run());

        assert_eq!(next(&mut rx).await.data, b"r1");
        assert_eq!(service.iterator_requests("a").len(), 1);
        handle.abort();
    }
}
