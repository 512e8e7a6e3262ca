//! Asynchronous pull sequences and their termination protocol
//!
//! An [`AsyncPullSeq`] is driven with [`advance`](AsyncPullSeq::advance) and
//! stopped out-of-band with [`finish`](AsyncPullSeq::finish) (the consumer is
//! done early) or [`abort`](AsyncPullSeq::abort) (something failed). Every
//! combinator forwards `finish`/`abort` to the sources it still owns exactly
//! once; a source that already completed, or whose own `advance` failed, is
//! not signalled again.

pub mod combinators;
pub mod consumers;

use async_stream::stream;
use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use std::future::Future;

use crate::error::{SeqError, SeqResult};
use crate::pull::PullSeq;

pub use combinators::{concat, drop, enumerate, filter, map, take, zip};
pub use combinators::{Concat, Drop, Enumerate, Filter, Map, Take, Zip};
pub use consumers::{count, for_each, reduce, to_vec};

/// An asynchronous pull sequence
#[async_trait]
pub trait AsyncPullSeq: Send {
    type Item: Send;

    /// Pull the next value. `Ok(None)` means the sequence is exhausted, and
    /// keeps being returned on every later call.
    async fn advance(&mut self) -> SeqResult<Option<Self::Item>>;

    /// Stop early and release everything the sequence owns.
    ///
    /// Finishing a completed sequence is a no-op.
    async fn finish(&mut self);

    /// Stop because of `error`, releasing everything the sequence owns.
    ///
    /// Returns the error for the caller to re-raise.
    async fn abort(&mut self, error: SeqError) -> SeqError;
}

/// A boxed async pull sequence, for heterogeneous chains
pub type BoxSeq<'a, T> = Box<dyn AsyncPullSeq<Item = T> + 'a>;

#[async_trait]
impl<S> AsyncPullSeq for Box<S>
where
    S: AsyncPullSeq + ?Sized,
{
    type Item = S::Item;

    async fn advance(&mut self) -> SeqResult<Option<Self::Item>> {
        (**self).advance().await
    }

    async fn finish(&mut self) {
        (**self).finish().await
    }

    async fn abort(&mut self, error: SeqError) -> SeqError {
        (**self).abort(error).await
    }
}

/// Abort `source` with a copy of `error`, keeping `error` as the one reported.
pub(crate) async fn forward_abort<S>(source: &mut S, error: &SeqError)
where
    S: AsyncPullSeq + ?Sized,
{
    let returned = source.abort(error.clone()).await;
    if &returned != error {
        log::warn!("upstream reported {} while aborting with {}; keeping the original", returned, error);
    }
}

// ================================
// Sources
// ================================

/// Async pull sequence over a standard iterator
pub struct Iter<I> {
    iter: Option<I>,
}

/// Wrap any iterable as an async pull sequence
pub fn from_iter<I>(iter: I) -> Iter<I::IntoIter>
where
    I: IntoIterator,
    I::IntoIter: Send,
    I::Item: Send,
{
    Iter {
        iter: Some(iter.into_iter()),
    }
}

#[async_trait]
impl<I> AsyncPullSeq for Iter<I>
where
    I: Iterator + Send,
    I::Item: Send,
{
    type Item = I::Item;

    async fn advance(&mut self) -> SeqResult<Option<I::Item>> {
        let Some(iter) = self.iter.as_mut() else {
            return Ok(None);
        };
        let next = iter.next();
        if next.is_none() {
            self.iter = None;
        }
        Ok(next)
    }

    async fn finish(&mut self) {
        self.iter = None;
    }

    async fn abort(&mut self, error: SeqError) -> SeqError {
        self.iter = None;
        error
    }
}

/// Async view of a synchronous pull sequence
pub struct FromPull<S> {
    seq: S,
    done: bool,
}

/// Lift a [`PullSeq`]; `finish` and `abort` both close it
pub fn from_pull<S>(seq: S) -> FromPull<S>
where
    S: PullSeq + Send,
    S::Item: Send,
{
    FromPull { seq, done: false }
}

impl<S: PullSeq> FromPull<S> {
    fn close(&mut self) {
        if !std::mem::replace(&mut self.done, true) {
            self.seq.close();
        }
    }
}

#[async_trait]
impl<S> AsyncPullSeq for FromPull<S>
where
    S: PullSeq + Send,
    S::Item: Send,
{
    type Item = S::Item;

    async fn advance(&mut self) -> SeqResult<Option<S::Item>> {
        if self.done {
            return Ok(None);
        }
        let next = self.seq.advance();
        if next.is_none() {
            self.done = true;
        }
        Ok(next)
    }

    async fn finish(&mut self) {
        self.close();
    }

    async fn abort(&mut self, error: SeqError) -> SeqError {
        self.close();
        error
    }
}

/// Expose a sequence as a `futures` stream of results
///
/// The stream ends after the first error. Dropping the stream before the
/// sequence ends finishes the sequence on a spawned task, so a consumer that
/// stops early still releases upstream.
pub fn into_stream<S>(seq: S) -> BoxStream<'static, SeqResult<S::Item>>
where
    S: AsyncPullSeq + 'static,
{
    let mut guard = FinishOnDrop { seq: Some(seq) };
    stream! {
        while let Some(seq) = guard.seq.as_mut() {
            match seq.advance().await {
                Ok(Some(item)) => yield Ok(item),
                Ok(None) => guard.seq = None,
                Err(e) => {
                    guard.seq = None;
                    yield Err(e);
                }
            }
        }
    }
    .boxed()
}

/// Holds a sequence that is still owed a `finish`
///
/// Cleared once the sequence ends on its own.
struct FinishOnDrop<S: AsyncPullSeq + 'static> {
    seq: Option<S>,
}

impl<S: AsyncPullSeq + 'static> std::ops::Drop for FinishOnDrop<S> {
    fn drop(&mut self) {
        let Some(mut seq) = self.seq.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    seq.finish().await;
                });
            }
            Err(_) => log::warn!("stream view dropped outside a runtime; sequence not finished"),
        }
    }
}

// ================================
// Extension trait
// ================================

/// Combinators and terminal consumers as methods
pub trait AsyncPullSeqExt: AsyncPullSeq + Sized {
    fn map<U, F, Fut>(self, f: F) -> Map<Self, F>
    where
        F: FnMut(Self::Item) -> Fut + Send,
        Fut: Future<Output = SeqResult<U>> + Send + 'static,
        U: Send,
    {
        map(self, f)
    }

    fn filter<F, Fut>(self, predicate: F) -> Filter<Self, F>
    where
        F: FnMut(&Self::Item) -> Fut + Send,
        Fut: Future<Output = SeqResult<bool>> + Send + 'static,
    {
        filter(self, predicate)
    }

    fn take(self, n: usize) -> Take<Self> {
        take(self, n)
    }

    /// Same as [`drop`]
    fn skip(self, n: usize) -> Drop<Self> {
        drop(self, n)
    }

    fn zip<B: AsyncPullSeq>(self, other: B) -> Zip<Self, B> {
        zip(self, other)
    }

    fn chain(self, other: Self) -> Concat<Self> {
        concat([self, other])
    }

    fn enumerate(self) -> Enumerate<Self> {
        enumerate(self)
    }

    fn boxed<'a>(self) -> BoxSeq<'a, Self::Item>
    where
        Self: 'a,
    {
        Box::new(self)
    }

    fn into_stream(self) -> BoxStream<'static, SeqResult<Self::Item>>
    where
        Self: 'static,
    {
        into_stream(self)
    }

    fn to_vec(self) -> impl Future<Output = SeqResult<Vec<Self::Item>>> {
        to_vec(self)
    }

    fn count(self) -> impl Future<Output = SeqResult<usize>> {
        count(self)
    }

    fn reduce<A, F, Fut>(self, f: F, init: A) -> impl Future<Output = SeqResult<A>>
    where
        F: FnMut(A, Self::Item) -> Fut,
        Fut: Future<Output = SeqResult<A>>,
    {
        reduce(self, f, init)
    }

    fn for_each<F, Fut>(self, f: F) -> impl Future<Output = SeqResult<()>>
    where
        F: FnMut(Self::Item) -> Fut,
        Fut: Future<Output = SeqResult<()>>,
    {
        for_each(self, f)
    }
}

impl<S: AsyncPullSeq> AsyncPullSeqExt for S {}
