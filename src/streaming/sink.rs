use std::num::NonZeroUsize;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::Record;

/// Queue capacity of the fan-in sink
///
/// `Unbounded` never suspends producers and trades memory for it; `Bounded`
/// suspends a producer once that many records are waiting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SinkCapacity {
    #[default]
    Unbounded,
    Bounded(NonZeroUsize),
}

/// The consuming side of the sink has gone away
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Fan-in sink is closed")]
pub struct SinkClosed;

/// Destination shard pollers write records into
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Hand over one record, suspending while the sink is full
    async fn emit(&self, record: Record) -> Result<(), SinkClosed>;
}

#[derive(Clone)]
enum SenderKind {
    Bounded(mpsc::Sender<Record>),
    Unbounded(mpsc::UnboundedSender<Record>),
}

/// Producer handle of the fan-in sink; clone one per poller
#[derive(Clone)]
pub struct SinkSender {
    inner: SenderKind,
}

enum ReceiverKind {
    Bounded(mpsc::Receiver<Record>),
    Unbounded(mpsc::UnboundedReceiver<Record>),
}

/// Single consumer of the fan-in sink
///
/// Yields records in arrival order and ends once every sender is dropped.
pub struct SinkReceiver {
    inner: ReceiverKind,
}

/// Create a multi-producer, single-consumer record queue
pub fn fan_in(capacity: SinkCapacity) -> (SinkSender, SinkReceiver) {
    match capacity {
        SinkCapacity::Unbounded => {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                SinkSender {
                    inner: SenderKind::Unbounded(tx),
                },
                SinkReceiver {
                    inner: ReceiverKind::Unbounded(rx),
                },
            )
        }
        SinkCapacity::Bounded(size) => {
            let (tx, rx) = mpsc::channel(size.get());
            (
                SinkSender {
                    inner: SenderKind::Bounded(tx),
                },
                SinkReceiver {
                    inner: ReceiverKind::Bounded(rx),
                },
            )
        }
    }
}

#[async_trait]
impl RecordSink for SinkSender {
    async fn emit(&self, record: Record) -> Result<(), SinkClosed> {
        match &self.inner {
            SenderKind::Bounded(tx) => tx.send(record).await.map_err(|_| SinkClosed),
            SenderKind::Unbounded(tx) => tx.send(record).map_err(|_| SinkClosed),
        }
    }
}

impl SinkReceiver {
    /// Wait for the next record; `None` once all senders are gone and the queue is empty
    pub async fn recv(&mut self) -> Option<Record> {
        match &mut self.inner {
            ReceiverKind::Bounded(rx) => rx.recv().await,
            ReceiverKind::Unbounded(rx) => rx.recv().await,
        }
    }

    /// Take a record only if one is already queued
    pub fn try_recv(&mut self) -> Option<Record> {
        match &mut self.inner {
            ReceiverKind::Bounded(rx) => rx.try_recv().ok(),
            ReceiverKind::Unbounded(rx) => rx.try_recv().ok(),
        }
    }

    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<Record>> {
        match &mut self.inner {
            ReceiverKind::Bounded(rx) => rx.poll_recv(cx),
            ReceiverKind::Unbounded(rx) => rx.poll_recv(cx),
        }
    }
}

impl Stream for SinkReceiver {
    type Item = Record;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.poll_recv(cx)
    }
}
