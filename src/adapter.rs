//! Reading a [`ReadableStream`] as an [`AsyncPullSeq`]

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::async_pull::{into_stream, AsyncPullSeq};
use crate::error::{SeqError, SeqResult};
use crate::readable_stream::{ReadableStream, StreamReader};
use crate::stream_configuration::IterateOptions;

/// Async pull sequence holding a stream's reader lock
///
/// The lock is held from construction until the stream ends, errors, or the
/// sequence is finished, aborted or dropped; it is released exactly once.
pub struct StreamIter<T> {
    reader: Option<StreamReader<T>>,
    prevent_cancel: bool,
}

/// Lock `stream` and read it through the pull protocol
///
/// Fails with [`SeqError::Locked`] if the stream already has a reader.
///
/// # Examples
/// ```
/// use seqflow::adapter::iterate_stream;
/// use seqflow::async_pull::to_vec;
/// use seqflow::readable_stream::ReadableStream;
/// use seqflow::stream_configuration::{IterateOptions, StreamConfig};
///
/// # async fn example() {
/// let stream = ReadableStream::from_iter(vec![1, 2, 3], StreamConfig::default());
/// let seq = iterate_stream(&stream, IterateOptions::default()).unwrap();
/// assert_eq!(to_vec(seq).await, Ok(vec![1, 2, 3]));
/// # }
/// ```
pub fn iterate_stream<T>(stream: &ReadableStream<T>, options: IterateOptions) -> SeqResult<StreamIter<T>>
where
    T: Send + 'static,
{
    Ok(StreamIter {
        reader: Some(stream.get_reader()?),
        prevent_cancel: options.prevent_cancel,
    })
}

impl<T> StreamIter<T> {
    fn release(&mut self, reason: Option<SeqError>) {
        let Some(mut reader) = self.reader.take() else {
            return;
        };
        if self.prevent_cancel {
            log::debug!("stream iterator released, cancellation suppressed");
        } else {
            reader.cancel(reason);
        }
        reader.release_lock();
    }

    pub fn is_released(&self) -> bool {
        self.reader.is_none()
    }
}

#[async_trait]
impl<T: Send> AsyncPullSeq for StreamIter<T> {
    type Item = T;

    async fn advance(&mut self) -> SeqResult<Option<T>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        let next = reader.read().await;
        if !matches!(next, Ok(Some(_))) {
            // Ended or errored on its own: let go of the lock, nothing to cancel.
            self.reader = None;
        }
        next
    }

    async fn finish(&mut self) {
        self.release(None);
    }

    async fn abort(&mut self, error: SeqError) -> SeqError {
        self.release(Some(error.clone()));
        error
    }
}

impl<T> ReadableStream<T>
where
    T: Send + 'static,
{
    /// Shorthand for [`iterate_stream`] with default options
    pub fn iter(&self) -> SeqResult<StreamIter<T>> {
        iterate_stream(self, IterateOptions::default())
    }

    /// Lock the stream and expose it as a `futures` stream of results
    pub fn into_stream(self) -> SeqResult<BoxStream<'static, SeqResult<T>>> {
        Ok(into_stream(self.iter()?))
    }
}
