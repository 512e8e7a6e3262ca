//! Combinators over async pull sequences
//!
//! Each combinator owns its upstream source(s). The `done` flag records that
//! the combinator itself has terminated: after that, `advance` returns
//! `Ok(None)` and `finish`/`abort` no longer reach upstream.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::future::Future;

use super::{forward_abort, AsyncPullSeq};
use crate::error::{SeqError, SeqResult};

pub struct Map<S, F> {
    source: S,
    f: F,
    done: bool,
}

/// Apply an async, fallible `f` to every value
///
/// If `f` fails, the source is aborted with the error and the error is
/// returned from `advance`.
pub fn map<S, U, F, Fut>(source: S, f: F) -> Map<S, F>
where
    S: AsyncPullSeq,
    F: FnMut(S::Item) -> Fut + Send,
    Fut: Future<Output = SeqResult<U>> + Send + 'static,
    U: Send,
{
    Map {
        source,
        f,
        done: false,
    }
}

#[async_trait]
impl<S, U, F, Fut> AsyncPullSeq for Map<S, F>
where
    S: AsyncPullSeq,
    F: FnMut(S::Item) -> Fut + Send,
    Fut: Future<Output = SeqResult<U>> + Send + 'static,
    U: Send,
{
    type Item = U;

    async fn advance(&mut self) -> SeqResult<Option<U>> {
        if self.done {
            return Ok(None);
        }
        let item = match self.source.advance().await {
            Ok(Some(item)) => item,
            other => {
                self.done = true;
                return other.map(|_| None);
            }
        };
        let mapped = (self.f)(item);
        match mapped.await {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                self.done = true;
                forward_abort(&mut self.source, &e).await;
                Err(e)
            }
        }
    }

    async fn finish(&mut self) {
        if !std::mem::replace(&mut self.done, true) {
            self.source.finish().await;
        }
    }

    async fn abort(&mut self, error: SeqError) -> SeqError {
        if !std::mem::replace(&mut self.done, true) {
            forward_abort(&mut self.source, &error).await;
        }
        error
    }
}

pub struct Filter<S, F> {
    source: S,
    predicate: F,
    done: bool,
}

/// Keep values for which the async `predicate` holds
///
/// The predicate runs once per input value, in order, including the values
/// it rejects.
pub fn filter<S, F, Fut>(source: S, predicate: F) -> Filter<S, F>
where
    S: AsyncPullSeq,
    F: FnMut(&S::Item) -> Fut + Send,
    Fut: Future<Output = SeqResult<bool>> + Send + 'static,
{
    Filter {
        source,
        predicate,
        done: false,
    }
}

#[async_trait]
impl<S, F, Fut> AsyncPullSeq for Filter<S, F>
where
    S: AsyncPullSeq,
    F: FnMut(&S::Item) -> Fut + Send,
    Fut: Future<Output = SeqResult<bool>> + Send + 'static,
{
    type Item = S::Item;

    async fn advance(&mut self) -> SeqResult<Option<S::Item>> {
        if self.done {
            return Ok(None);
        }
        loop {
            let item = match self.source.advance().await {
                Ok(Some(item)) => item,
                other => {
                    self.done = true;
                    return other;
                }
            };
            let verdict = (self.predicate)(&item);
            match verdict.await {
                Ok(true) => return Ok(Some(item)),
                Ok(false) => continue,
                Err(e) => {
                    self.done = true;
                    forward_abort(&mut self.source, &e).await;
                    return Err(e);
                }
            }
        }
    }

    async fn finish(&mut self) {
        if !std::mem::replace(&mut self.done, true) {
            self.source.finish().await;
        }
    }

    async fn abort(&mut self, error: SeqError) -> SeqError {
        if !std::mem::replace(&mut self.done, true) {
            forward_abort(&mut self.source, &error).await;
        }
        error
    }
}

pub struct Take<S> {
    source: S,
    remaining: usize,
    done: bool,
}

/// Slice: the first `n` values
///
/// The source is finished as soon as the last value has been pulled (or the
/// source ran out first), without waiting for the consumer to stop.
pub fn take<S: AsyncPullSeq>(source: S, n: usize) -> Take<S> {
    Take {
        source,
        remaining: n,
        done: false,
    }
}

impl<S: AsyncPullSeq> Take<S> {
    async fn stop(&mut self) {
        self.done = true;
        log::debug!("take: limit reached, finishing upstream");
        self.source.finish().await;
    }
}

#[async_trait]
impl<S: AsyncPullSeq> AsyncPullSeq for Take<S> {
    type Item = S::Item;

    async fn advance(&mut self) -> SeqResult<Option<S::Item>> {
        if self.done {
            return Ok(None);
        }
        if self.remaining == 0 {
            self.stop().await;
            return Ok(None);
        }
        match self.source.advance().await {
            Ok(Some(item)) => {
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.stop().await;
                }
                Ok(Some(item))
            }
            Ok(None) => {
                self.stop().await;
                Ok(None)
            }
            Err(e) => {
                self.done = true;
                Err(e)
            }
        }
    }

    async fn finish(&mut self) {
        if !self.done {
            self.stop().await;
        }
    }

    async fn abort(&mut self, error: SeqError) -> SeqError {
        if !std::mem::replace(&mut self.done, true) {
            forward_abort(&mut self.source, &error).await;
        }
        error
    }
}

pub struct Drop<S> {
    source: S,
    remaining: usize,
    done: bool,
}

/// Slice: everything after the first `n` values
pub fn drop<S: AsyncPullSeq>(source: S, n: usize) -> Drop<S> {
    Drop {
        source,
        remaining: n,
        done: false,
    }
}

#[async_trait]
impl<S: AsyncPullSeq> AsyncPullSeq for Drop<S> {
    type Item = S::Item;

    async fn advance(&mut self) -> SeqResult<Option<S::Item>> {
        if self.done {
            return Ok(None);
        }
        while self.remaining > 0 {
            match self.source.advance().await {
                Ok(Some(_)) => self.remaining -= 1,
                other => {
                    self.done = true;
                    return other;
                }
            }
        }
        let next = self.source.advance().await;
        if !matches!(next, Ok(Some(_))) {
            self.done = true;
        }
        next
    }

    async fn finish(&mut self) {
        if !std::mem::replace(&mut self.done, true) {
            self.source.finish().await;
        }
    }

    async fn abort(&mut self, error: SeqError) -> SeqError {
        if !std::mem::replace(&mut self.done, true) {
            forward_abort(&mut self.source, &error).await;
        }
        error
    }
}

pub struct Concat<S> {
    sources: VecDeque<S>,
}

/// Every value of each source, one source after another
///
/// Early termination reaches only the source currently being drained;
/// sources not reached yet are dropped without being driven or signalled.
pub fn concat<S, I>(sources: I) -> Concat<S>
where
    S: AsyncPullSeq,
    I: IntoIterator<Item = S>,
{
    Concat {
        sources: sources.into_iter().collect(),
    }
}

#[async_trait]
impl<S: AsyncPullSeq> AsyncPullSeq for Concat<S> {
    type Item = S::Item;

    async fn advance(&mut self) -> SeqResult<Option<S::Item>> {
        while let Some(current) = self.sources.front_mut() {
            match current.advance().await {
                Ok(Some(item)) => return Ok(Some(item)),
                Ok(None) => {
                    self.sources.pop_front();
                }
                Err(e) => {
                    self.sources.clear();
                    return Err(e);
                }
            }
        }
        Ok(None)
    }

    async fn finish(&mut self) {
        if let Some(mut current) = self.sources.pop_front() {
            log::debug!("concat: finishing in-flight source, {} unread", self.sources.len());
            current.finish().await;
        }
        self.sources.clear();
    }

    async fn abort(&mut self, error: SeqError) -> SeqError {
        if let Some(mut current) = self.sources.pop_front() {
            forward_abort(&mut current, &error).await;
        }
        self.sources.clear();
        error
    }
}

pub struct Zip<A, B> {
    a: A,
    b: B,
    done: bool,
}

/// Pair values positionally, pulling both sides concurrently
///
/// Ends as soon as either side ends; the side still running is finished
/// (or aborted, if the other side failed) before `advance` returns.
pub fn zip<A: AsyncPullSeq, B: AsyncPullSeq>(a: A, b: B) -> Zip<A, B> {
    Zip { a, b, done: false }
}

#[async_trait]
impl<A: AsyncPullSeq, B: AsyncPullSeq> AsyncPullSeq for Zip<A, B> {
    type Item = (A::Item, B::Item);

    async fn advance(&mut self) -> SeqResult<Option<Self::Item>> {
        if self.done {
            return Ok(None);
        }
        let (left, right) = futures::join!(self.a.advance(), self.b.advance());
        self.done = true;
        match (left, right) {
            (Ok(Some(a)), Ok(Some(b))) => {
                self.done = false;
                Ok(Some((a, b)))
            }
            (Ok(None), Ok(None)) => Ok(None),
            (Ok(None), Ok(Some(_))) => {
                log::debug!("zip: left side ended, finishing right side");
                self.b.finish().await;
                Ok(None)
            }
            (Ok(Some(_)), Ok(None)) => {
                log::debug!("zip: right side ended, finishing left side");
                self.a.finish().await;
                Ok(None)
            }
            (Err(e), Ok(Some(_))) => {
                forward_abort(&mut self.b, &e).await;
                Err(e)
            }
            (Ok(Some(_)), Err(e)) => {
                forward_abort(&mut self.a, &e).await;
                Err(e)
            }
            (Err(e), _) | (_, Err(e)) => Err(e),
        }
    }

    async fn finish(&mut self) {
        if !std::mem::replace(&mut self.done, true) {
            self.a.finish().await;
            self.b.finish().await;
        }
    }

    async fn abort(&mut self, error: SeqError) -> SeqError {
        if !std::mem::replace(&mut self.done, true) {
            forward_abort(&mut self.a, &error).await;
            forward_abort(&mut self.b, &error).await;
        }
        error
    }
}

pub struct Enumerate<S> {
    source: S,
    index: usize,
    done: bool,
}

/// Pair each value with its position in this sequence, from 0
pub fn enumerate<S: AsyncPullSeq>(source: S) -> Enumerate<S> {
    Enumerate {
        source,
        index: 0,
        done: false,
    }
}

#[async_trait]
impl<S: AsyncPullSeq> AsyncPullSeq for Enumerate<S> {
    type Item = (usize, S::Item);

    async fn advance(&mut self) -> SeqResult<Option<Self::Item>> {
        if self.done {
            return Ok(None);
        }
        match self.source.advance().await {
            Ok(Some(item)) => {
                let index = self.index;
                self.index += 1;
                Ok(Some((index, item)))
            }
            other => {
                self.done = true;
                other.map(|_| None)
            }
        }
    }

    async fn finish(&mut self) {
        if !std::mem::replace(&mut self.done, true) {
            self.source.finish().await;
        }
    }

    async fn abort(&mut self, error: SeqError) -> SeqError {
        if !std::mem::replace(&mut self.done, true) {
            forward_abort(&mut self.source, &error).await;
        }
        error
    }
}
