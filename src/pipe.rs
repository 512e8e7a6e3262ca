use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::SeqResult;
use crate::rate;
use crate::readable_stream::ReadableStream;
use crate::stream_ops::{self, Transformer};

/// Reusable recipe that turns a `ReadableStream<I>` into a `ReadableStream<O>`
///
/// Applying a pipe locks the input it is given and builds fresh stage state,
/// so one pipe can be applied to many streams without them interfering.
pub struct Pipe<I, O> {
    f: Arc<dyn Fn(&ReadableStream<I>) -> SeqResult<ReadableStream<O>> + Send + Sync + 'static>,
}

impl<I, O> Clone for Pipe<I, O> {
    fn clone(&self) -> Self {
        Pipe {
            f: Arc::clone(&self.f),
        }
    }
}

impl<I, O> Pipe<I, O> {
    /// Wrap a function that locks its input and returns the transformed stream
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ReadableStream<I>) -> SeqResult<ReadableStream<O>> + Send + Sync + 'static,
    {
        Pipe { f: Arc::new(f) }
    }

    /// Run the pipe on `input`, failing with `Locked` if another reader holds it
    pub fn apply(&self, input: &ReadableStream<I>) -> SeqResult<ReadableStream<O>> {
        (self.f)(input)
    }
}

impl<I, O> Pipe<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Create a pipe that runs a fresh stage from `factory` on each application
    pub fn from_stage<X, M>(factory: M) -> Self
    where
        X: Transformer<I, O> + 'static,
        M: Fn() -> X + Send + Sync + 'static,
    {
        Pipe::new(move |input: &ReadableStream<I>| input.pipe_through(factory()))
    }
}

/// Pipe form of [`stream_ops::map`]
pub fn map<I, O, F, Fut>(f: F) -> Pipe<I, O>
where
    F: FnMut(I) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = SeqResult<O>> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    Pipe::from_stage(move || stream_ops::map(f.clone()))
}

/// Pipe form of [`stream_ops::filter`]
pub fn filter<I, F, Fut>(predicate: F) -> Pipe<I, I>
where
    F: FnMut(&I) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = SeqResult<bool>> + Send + 'static,
    I: Send + 'static,
{
    Pipe::from_stage(move || stream_ops::filter(predicate.clone()))
}

pub fn take<I: Send + 'static>(n: usize) -> Pipe<I, I> {
    Pipe::from_stage(move || stream_ops::take(n))
}

pub fn drop<I: Send + 'static>(n: usize) -> Pipe<I, I> {
    Pipe::from_stage(move || stream_ops::drop(n))
}

pub fn debounce<I: Send + 'static>(duration: Duration) -> Pipe<I, I> {
    Pipe::from_stage(move || rate::debounce(duration))
}

pub fn throttle<I: Send + 'static>(duration: Duration) -> Pipe<I, I> {
    Pipe::from_stage(move || rate::throttle(duration))
}

/// Run `p1`, then feed its output stream to `p2`
///
/// Only `p1` touches the caller's input. If `p1` cannot lock it, `p2` is
/// never applied.
pub fn compose<I, M, O>(p1: Pipe<I, M>, p2: Pipe<M, O>) -> Pipe<I, O>
where
    I: Send + 'static,
    M: Send + 'static,
    O: Send + 'static,
{
    Pipe::new(move |input| {
        let middle = p1.apply(input)?;
        p2.apply(&middle)
    })
}

/// Pipe that returns another handle to its input without locking it
pub fn identity<I>() -> Pipe<I, I>
where
    I: Send + 'static,
{
    Pipe::new(|input: &ReadableStream<I>| Ok(input.clone()))
}

/// Method-style chaining, `a.compose(b)` for [`compose`]`(a, b)`
pub trait PipeExt<I, O> {
    fn compose<P>(self, other: Pipe<O, P>) -> Pipe<I, P>
    where
        P: Send + 'static;
}

impl<I, O> PipeExt<I, O> for Pipe<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn compose<P>(self, other: Pipe<O, P>) -> Pipe<I, P>
    where
        P: Send + 'static,
    {
        compose(self, other)
    }
}
