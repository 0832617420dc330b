use std::convert::Infallible;
use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::config::TailerConfig;
use super::error::TailError;
use super::policy::SupervisorPolicy;
use super::poller::{PollerExit, Resolution, ShardPoller};
use super::sink::{SinkReceiver, fan_in};
use crate::domain::Record;
use crate::engine::{CursorResolver, EngineError, discover};
use crate::io::RecordWriter;
use crate::service::StreamService;

type PollerResult = Result<PollerExit, EngineError>;

/// Primary API for tailing every shard of a stream
///
/// Discovers the shards once, resolves their cursors one after another and
/// runs one poller task per shard. Records of all shards arrive through a
/// single [`TailSession`].
///
/// # Example
/// ```rust,ignore
/// let service = Arc::new(KinesisStreamService::connect("ap-northeast-1", None).await);
/// let config = TailerConfig::new("orders").with_interval(Duration::from_secs(1));
///
/// let session = StreamTailer::new(service, config, FailFast).start().await?;
/// session.run(&mut LineWriter::new(tokio::io::stdout())).await?;
/// ```
pub struct StreamTailer<S: StreamService + ?Sized, P> {
    service: Arc<S>,
    config: TailerConfig,
    policy: P,
}

impl<S, P> StreamTailer<S, P>
where
    S: StreamService + ?Sized + 'static,
    P: SupervisorPolicy + Clone + 'static,
{
    pub fn new(service: Arc<S>, config: TailerConfig, policy: P) -> Self {
        Self {
            service,
            config,
            policy,
        }
    }

    pub fn config(&self) -> &TailerConfig {
        &self.config
    }

    /// Discover shards, resolve their cursors in order and launch the pollers
    ///
    /// A shard's poller starts as soon as its own cursor is resolved. If the
    /// policy aborts on a cursor error, later shards are never resolved and
    /// pollers already running are aborted. All pollers share one
    /// cancellation token, so a fatal error in any shard stops the others
    /// before they fetch again.
    pub async fn start(self) -> Result<TailSession, EngineError> {
        let shards = discover(self.service.as_ref(), &self.config.stream).await?;

        let (sender, receiver) = fan_in(self.config.sink_capacity);
        let resolver = Arc::new(CursorResolver::new(
            self.service.clone(),
            self.config.stream.clone(),
            self.config.start_position.clone(),
        ));

        let cancel = CancellationToken::new();
        let mut pollers = JoinSet::new();
        let mut isolated = Vec::new();

        for shard in shards {
            let mut poller = ShardPoller::new(
                shard,
                resolver.clone(),
                self.service.clone(),
                sender.clone(),
                self.policy.clone(),
                self.config.poll,
            )
            .with_cancellation(cancel.clone());

            // Dropping `pollers` on error aborts the shards already started
            match poller.resolve().await? {
                Resolution::Ready => {
                    pollers.spawn(poller.run());
                }
                Resolution::Isolated(error) => {
                    warn!(shard_id = %poller.shard().id(), %error, "Shard isolated before polling");
                    isolated.push(error);
                }
            }
        }
        drop(sender);

        if pollers.is_empty() {
            return Err(EngineError::NoActiveShards);
        }

        info!(
            stream = %self.config.stream,
            iterator_type = %self.config.start_position.policy(),
            active = pollers.len(),
            isolated = isolated.len(),
            "Tailing stream"
        );

        Ok(TailSession {
            receiver,
            pollers,
            cancel,
            isolated,
            failure: None,
            emitted: 0,
        })
    }
}

enum Event {
    PollerExited(Result<PollerResult, JoinError>),
    Record(Option<Record>),
}

/// A running set of shard pollers and the queue they feed
///
/// Dropping the session aborts every poller.
pub struct TailSession {
    receiver: SinkReceiver,
    pollers: JoinSet<PollerResult>,
    cancel: CancellationToken,
    isolated: Vec<EngineError>,
    failure: Option<EngineError>,
    emitted: u64,
}

impl TailSession {
    /// Wait for the next record of any shard
    ///
    /// Once a poller fails fatally, every poller is stopped and awaited. The
    /// records queued before the failure are still returned, and only then
    /// the error.
    /// After that the same error is returned on every call.
    pub async fn next_record(&mut self) -> Result<Record, EngineError> {
        loop {
            if let Some(failure) = &self.failure {
                return match self.receiver.try_recv() {
                    Some(record) => Ok(self.count(record)),
                    None => Err(failure.clone()),
                };
            }

            let event = tokio::select! {
                biased;
                Some(joined) = self.pollers.join_next() => Event::PollerExited(joined),
                record = self.receiver.recv() => Event::Record(record),
            };

            match event {
                Event::PollerExited(joined) => {
                    if let Some(error) = self.supervise(joined) {
                        self.fail(error).await;
                    }
                }
                Event::Record(Some(record)) => return Ok(self.count(record)),
                Event::Record(None) => {
                    // Every sender is gone, so every poller has ended
                    while let Some(joined) = self.pollers.join_next().await {
                        if let Some(error) = self.supervise(joined) {
                            self.fail(error).await;
                        }
                    }
                    if self.failure.is_none() {
                        self.failure = Some(EngineError::NoActiveShards);
                    }
                }
            }
        }
    }

    /// Forward every record to `writer` until the session fails
    pub async fn run<W>(mut self, writer: &mut W) -> Result<Infallible, TailError>
    where
        W: RecordWriter + ?Sized,
    {
        loop {
            match self.next_record().await {
                Ok(record) => writer.write_record(&record).await?,
                Err(error) => {
                    writer.flush().await?;
                    return Err(error.into());
                }
            }
        }
    }

    /// Shards whose pollers are still running
    pub fn active_shards(&self) -> usize {
        self.pollers.len()
    }

    /// Errors of the shards the policy has dropped so far
    pub fn isolated(&self) -> &[EngineError] {
        &self.isolated
    }

    /// Records handed to the consumer so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    fn count(&mut self, record: Record) -> Record {
        self.emitted += 1;
        record
    }

    /// Record how a poller ended; returns the error that ends the session, if any
    fn supervise(&mut self, joined: Result<PollerResult, JoinError>) -> Option<EngineError> {
        match joined {
            Ok(Ok(PollerExit::Isolated(error))) => {
                warn!(%error, remaining = self.pollers.len(), "Shard isolated");
                self.isolated.push(error);
                None
            }
            Ok(Ok(PollerExit::Stopped)) => None,
            Ok(Err(error)) => Some(error),
            Err(join_error) if join_error.is_panic() => {
                Some(EngineError::PollerPanicked(join_error.to_string()))
            }
            Err(_) => None,
        }
    }

    async fn fail(&mut self, error: EngineError) {
        if self.failure.is_some() {
            return;
        }
        error!(%error, "Stopping all shard pollers");
        self.cancel.cancel();
        self.pollers.shutdown().await;
        self.failure = Some(error);
    }
}
