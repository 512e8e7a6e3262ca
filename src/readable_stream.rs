//! Backpressured readable stream with an exclusive reader lock
//!
//! A [`ReadableStream`] is a cloneable handle onto a bounded channel. The
//! producer side is a [`StreamWriter`]: `write` suspends while the buffer is
//! full, so a producer never gets more than `capacity` chunks ahead of the
//! reader. At most one [`StreamReader`] exists at a time; it holds the lock as
//! an owned guard, so the lock is released on every exit path when the
//! reader is dropped. The reader may cancel the stream, which the producer
//! observes through [`StreamWriter::is_cancelled`] and failing writes.

use futures_core::Stream;
use futures_util::{pin_mut, StreamExt};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex, OwnedMutexGuard};

use crate::error::{SeqError, SeqResult};
use crate::stream_configuration::StreamConfig;

type Chunk<T> = SeqResult<T>;

/// Why and how a stream was cancelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancellation {
    pub reason: Option<SeqError>,
}

struct Shared<T> {
    receiver: Arc<Mutex<mpsc::Receiver<Chunk<T>>>>,
    cancel: watch::Sender<Option<Cancellation>>,
}

impl<T> Shared<T> {
    /// Record the first cancellation; later ones are ignored.
    fn cancel(&self, reason: Option<SeqError>) -> bool {
        self.cancel.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(Cancellation { reason: reason.clone() });
            true
        })
    }
}

/// Readable side of a backpressured stream
pub struct ReadableStream<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ReadableStream<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for ReadableStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadableStream")
            .field("locked", &self.is_locked())
            .field("cancelled", &self.cancellation().is_some())
            .finish()
    }
}

impl<T> ReadableStream<T>
where
    T: Send + 'static,
{
    /// Create a stream and the writer that feeds it
    pub fn new(config: StreamConfig) -> (Self, StreamWriter<T>) {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let (cancel, cancel_rx) = watch::channel(None);
        let stream = Self {
            shared: Arc::new(Shared {
                receiver: Arc::new(Mutex::new(receiver)),
                cancel,
            }),
        };
        let writer = StreamWriter {
            sender,
            cancel: cancel_rx,
        };
        (stream, writer)
    }

    /// A stream over the items of an iterator, produced on a spawned task
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_iter<I>(iter: I, config: StreamConfig) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        let (stream, writer) = Self::new(config);
        let iter = iter.into_iter();
        tokio::spawn(async move {
            for item in iter {
                if writer.write(item).await.is_err() {
                    log::debug!("from_iter: stream cancelled, producer stopping");
                    return;
                }
            }
            writer.close();
        });
        stream
    }

    /// A stream fed from a `futures` stream on a spawned task
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_stream<S>(source: S, config: StreamConfig) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        let (stream, writer) = Self::new(config);
        tokio::spawn(async move {
            pin_mut!(source);
            while let Some(item) = source.next().await {
                if writer.write(item).await.is_err() {
                    log::debug!("from_stream: stream cancelled, producer stopping");
                    return;
                }
            }
            writer.close();
        });
        stream
    }

    /// Acquire the exclusive reader lock
    pub fn get_reader(&self) -> SeqResult<StreamReader<T>> {
        let guard = Arc::clone(&self.shared.receiver)
            .try_lock_owned()
            .map_err(|_| SeqError::Locked)?;
        Ok(StreamReader {
            guard,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Cancel the stream; fails if a reader currently holds the lock
    pub fn cancel(&self, reason: Option<SeqError>) -> SeqResult<()> {
        let mut reader = self.get_reader()?;
        reader.cancel(reason);
        Ok(())
    }
}

impl<T> ReadableStream<T> {
    pub fn is_locked(&self) -> bool {
        self.shared.receiver.try_lock().is_err()
    }

    pub fn cancellation(&self) -> Option<Cancellation> {
        self.shared.cancel.borrow().clone()
    }
}

/// The exclusive reader of a stream
///
/// Dropping the reader releases the lock without cancelling the stream.
pub struct StreamReader<T> {
    guard: OwnedMutexGuard<mpsc::Receiver<Chunk<T>>>,
    shared: Arc<Shared<T>>,
}

impl<T> StreamReader<T> {
    /// Wait for the next chunk
    ///
    /// `Ok(None)` once the stream is closed or cancelled. A stream error is
    /// returned once; the stream counts as closed afterwards.
    pub async fn read(&mut self) -> SeqResult<Option<T>> {
        match self.guard.recv().await {
            Some(Ok(item)) => Ok(Some(item)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    /// Tell the producer no more data is wanted and discard anything queued
    pub fn cancel(&mut self, reason: Option<SeqError>) {
        if self.shared.cancel(reason) {
            log::debug!("stream cancelled by reader");
        }
        self.guard.close();
        while self.guard.try_recv().is_ok() {}
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.borrow().is_some()
    }

    /// Give the lock back so another reader can be acquired
    pub fn release_lock(self) {}
}

impl<T> fmt::Debug for StreamReader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamReader")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Producer side of a stream
pub struct StreamWriter<T> {
    sender: mpsc::Sender<Chunk<T>>,
    cancel: watch::Receiver<Option<Cancellation>>,
}

impl<T> StreamWriter<T> {
    /// Enqueue a chunk, suspending while the buffer is full
    ///
    /// Fails with [`SeqError::Cancelled`] once the reader has cancelled or
    /// every handle to the stream is gone.
    pub async fn write(&self, item: T) -> SeqResult<()> {
        if self.is_cancelled() {
            return Err(SeqError::Cancelled);
        }
        self.sender
            .send(Ok(item))
            .await
            .map_err(|_| SeqError::Cancelled)
    }

    /// Close the stream; the reader sees the end once the buffer drains
    pub fn close(self) {}

    /// Error the stream; the reader sees `error` after the buffered chunks
    pub async fn error(self, error: SeqError) {
        if self.sender.send(Err(error)).await.is_err() {
            log::debug!("stream error dropped, reader already gone");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.borrow().is_some() || self.sender.is_closed()
    }

    pub fn cancellation(&self) -> Option<Cancellation> {
        self.cancel.borrow().clone()
    }

    /// Wait until the reader cancels the stream
    ///
    /// Resolves with an empty reason if every stream handle was dropped.
    pub async fn cancelled(&mut self) -> Cancellation {
        loop {
            if let Some(cancellation) = self.cancel.borrow_and_update().clone() {
                return cancellation;
            }
            if self.cancel.changed().await.is_err() {
                return Cancellation { reason: None };
            }
        }
    }
}
