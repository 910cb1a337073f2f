//! Stage stream abstraction.
//!
//! A source provider hands out a [`StageReader`] per stage it supports and
//! a destination provider a [`StageWriter`]. The stage runner pulls one
//! record at a time from the reader and awaits the writer before pulling
//! the next, so a slow destination slows the source down.
//!
//! Providers that produce records on a background task can use the
//! channel adapters: a bounded [`tokio::sync::mpsc`] channel gives the
//! producer backpressure for free.

use crate::error::{TransferError, TransferResult};
use async_trait::async_trait;
use datashift_types::Record;
use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;

/// Readable side of a stage.
#[async_trait]
pub trait StageReader: Send {
    /// Pulls the next record. `None` means the stream is exhausted.
    async fn next(&mut self) -> Option<TransferResult<Record>>;

    /// Releases the stream. Waits until the underlying resource is closed.
    async fn close(&mut self) -> TransferResult<()> {
        Ok(())
    }

    /// Whether the stream was already closed.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Writable side of a stage.
#[async_trait]
pub trait StageWriter: Send {
    /// Writes a record. Returns once the destination accepted it.
    async fn write(&mut self, record: Record) -> TransferResult<()>;

    /// Flushes and closes the stream after the last record.
    async fn close(&mut self) -> TransferResult<()> {
        Ok(())
    }

    /// Tears the stream down without committing, after a failure.
    async fn abort(&mut self) {}

    /// Whether the stream was already closed.
    fn is_closed(&self) -> bool {
        false
    }
}

pub type BoxedReader = Box<dyn StageReader>;
pub type BoxedWriter = Box<dyn StageWriter>;

/// Reads records from any [`Stream`].
pub struct StreamReader {
    inner: Option<BoxStream<'static, TransferResult<Record>>>,
}

impl StreamReader {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = TransferResult<Record>> + Send + 'static,
    {
        Self {
            inner: Some(stream.boxed()),
        }
    }

    /// Reads a fixed list of records.
    pub fn from_records(records: Vec<Record>) -> Self {
        Self::new(futures::stream::iter(records.into_iter().map(Ok)))
    }

    pub fn boxed(self) -> BoxedReader {
        Box::new(self)
    }
}

#[async_trait]
impl StageReader for StreamReader {
    async fn next(&mut self) -> Option<TransferResult<Record>> {
        self.inner.as_mut()?.next().await
    }

    async fn close(&mut self) -> TransferResult<()> {
        self.inner = None;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

/// Reads records sent by a producer task over a bounded channel.
pub struct ChannelReader {
    rx: mpsc::Receiver<TransferResult<Record>>,
    closed: bool,
}

impl ChannelReader {
    /// Creates a reader and the sender its producer writes to.
    pub fn channel(capacity: usize) -> (mpsc::Sender<TransferResult<Record>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }

    pub fn new(rx: mpsc::Receiver<TransferResult<Record>>) -> Self {
        Self { rx, closed: false }
    }

    pub fn boxed(self) -> BoxedReader {
        Box::new(self)
    }
}

#[async_trait]
impl StageReader for ChannelReader {
    async fn next(&mut self) -> Option<TransferResult<Record>> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    async fn close(&mut self) -> TransferResult<()> {
        // Producers see their next send fail and stop.
        self.rx.close();
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Writes records into a bounded channel drained by a consumer task.
///
/// Closing the writer drops the sender, which ends the consumer's receive
/// loop.
pub struct ChannelWriter {
    tx: Option<mpsc::Sender<Record>>,
}

impl ChannelWriter {
    /// Creates a writer and the receiver its consumer reads from.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Record>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub fn new(tx: mpsc::Sender<Record>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn boxed(self) -> BoxedWriter {
        Box::new(self)
    }
}

#[async_trait]
impl StageWriter for ChannelWriter {
    async fn write(&mut self, record: Record) -> TransferResult<()> {
        let tx = self.tx.as_ref().ok_or(TransferError::ChannelClosed)?;
        tx.send(record).await.map_err(|_| TransferError::ChannelClosed)
    }

    async fn close(&mut self) -> TransferResult<()> {
        self.tx = None;
        Ok(())
    }

    async fn abort(&mut self) {
        self.tx = None;
    }

    fn is_closed(&self) -> bool {
        self.tx.is_none()
    }
}
