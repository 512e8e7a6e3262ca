//! Combinators that work directly on [`ReadableStream`]s
//!
//! Per-item combinators are [`Transformer`] stages run by
//! [`pipe_through`] on a spawned task: the task holds the input's reader lock
//! and the output's writer, so a stalled consumer stalls the stage, which
//! stops reading, which stalls the producer. Nothing is buffered beyond the
//! configured stream capacities.
//!
//! Exit paths of a stage task:
//! - input closes: `flush`, then the output closes
//! - stage returns [`Flow::Stop`]: the input is cancelled, `flush`, output closes
//! - output is cancelled: the input is cancelled with the same reason
//! - input errors: the output errors with the same error
//! - the stage fails: the input is cancelled with the error, the output errors
//!
//! In every case the input's reader lock is released when the task ends.

use async_trait::async_trait;
use futures_util::future;
use std::future::Future;

use crate::error::{SeqError, SeqResult};
use crate::readable_stream::{ReadableStream, StreamReader, StreamWriter};
use crate::stream_configuration::StreamConfig;

/// What a stage wants after handling an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Output handle given to a stage
pub struct Emitter<O> {
    writer: StreamWriter<O>,
}

impl<O> Emitter<O> {
    /// Forward an item downstream, suspending while the output is full
    pub async fn enqueue(&mut self, item: O) -> SeqResult<()> {
        self.writer.write(item).await
    }
}

/// A per-item stream transformation
#[async_trait]
pub trait Transformer<I: Send + 'static, O: Send + 'static>: Send {
    /// Called once before the first item is read
    async fn start(&mut self, _out: &mut Emitter<O>) -> SeqResult<Flow> {
        Ok(Flow::Continue)
    }

    async fn transform(&mut self, item: I, out: &mut Emitter<O>) -> SeqResult<Flow>;

    /// Called once when no more items will be transformed
    async fn flush(&mut self, _out: &mut Emitter<O>) -> SeqResult<()> {
        Ok(())
    }
}

/// Run `stage` over `input`, returning the stage's output stream
///
/// Locks `input` for the lifetime of the stage. Must be called from within a
/// tokio runtime.
pub fn pipe_through<I, O, X>(input: &ReadableStream<I>, stage: X, config: StreamConfig) -> SeqResult<ReadableStream<O>>
where
    I: Send + 'static,
    O: Send + 'static,
    X: Transformer<I, O> + 'static,
{
    let reader = input.get_reader()?;
    let (output, writer) = ReadableStream::new(config);
    tokio::spawn(run_stage(reader, stage, writer));
    Ok(output)
}

impl<I> ReadableStream<I>
where
    I: Send + 'static,
{
    /// [`pipe_through`] with the default output configuration
    pub fn pipe_through<O, X>(&self, stage: X) -> SeqResult<ReadableStream<O>>
    where
        O: Send + 'static,
        X: Transformer<I, O> + 'static,
    {
        pipe_through(self, stage, StreamConfig::default())
    }
}

fn downstream_reason<O>(writer: &StreamWriter<O>) -> Option<SeqError> {
    writer.cancellation().and_then(|c| c.reason)
}

async fn run_stage<I, O, X>(mut reader: StreamReader<I>, mut stage: X, writer: StreamWriter<O>)
where
    I: Send + 'static,
    O: Send + 'static,
    X: Transformer<I, O>,
{
    let mut out = Emitter { writer };
    let mut flow = match stage.start(&mut out).await {
        Ok(flow) => flow,
        Err(e) => return fail_stage(reader, out.writer, e).await,
    };

    while flow == Flow::Continue {
        let next = tokio::select! {
            next = reader.read() => next,
            cancellation = out.writer.cancelled() => {
                log::debug!("stage output cancelled, cancelling input");
                reader.cancel(cancellation.reason);
                return;
            }
        };
        let item = match next {
            Ok(Some(item)) => item,
            Ok(None) => break,
            Err(e) => {
                log::debug!("stage input errored: {}", e);
                reader.release_lock();
                out.writer.error(e).await;
                return;
            }
        };
        flow = match stage.transform(item, &mut out).await {
            Ok(flow) => flow,
            Err(e) => return fail_stage(reader, out.writer, e).await,
        };
    }

    if flow == Flow::Stop {
        reader.cancel(None);
    }
    reader.release_lock();
    match stage.flush(&mut out).await {
        Ok(()) => out.writer.close(),
        Err(e) => fail_stage_output(out.writer, e).await,
    }
}

async fn fail_stage<I, O>(mut reader: StreamReader<I>, writer: StreamWriter<O>, error: SeqError) {
    if writer.is_cancelled() {
        reader.cancel(downstream_reason(&writer));
        return;
    }
    log::debug!("stage failed: {}", error);
    reader.cancel(Some(error.clone()));
    reader.release_lock();
    writer.error(error).await;
}

async fn fail_stage_output<O>(writer: StreamWriter<O>, error: SeqError) {
    if !writer.is_cancelled() {
        writer.error(error).await;
    }
}

// ================================
// Stages
// ================================

pub struct MapStage<F> {
    f: F,
}

/// Stage applying an async, fallible `f` to every item
pub fn map<I, O, F, Fut>(f: F) -> MapStage<F>
where
    F: FnMut(I) -> Fut + Send,
    Fut: Future<Output = SeqResult<O>> + Send + 'static,
{
    MapStage { f }
}

#[async_trait]
impl<I, O, F, Fut> Transformer<I, O> for MapStage<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: FnMut(I) -> Fut + Send,
    Fut: Future<Output = SeqResult<O>> + Send + 'static,
{
    async fn transform(&mut self, item: I, out: &mut Emitter<O>) -> SeqResult<Flow> {
        let mapped = (self.f)(item);
        let value = mapped.await?;
        out.enqueue(value).await?;
        Ok(Flow::Continue)
    }
}

pub struct FilterStage<F> {
    predicate: F,
}

/// Stage forwarding the items the async `predicate` accepts
pub fn filter<I, F, Fut>(predicate: F) -> FilterStage<F>
where
    F: FnMut(&I) -> Fut + Send,
    Fut: Future<Output = SeqResult<bool>> + Send + 'static,
{
    FilterStage { predicate }
}

#[async_trait]
impl<I, F, Fut> Transformer<I, I> for FilterStage<F>
where
    I: Send + 'static,
    F: FnMut(&I) -> Fut + Send,
    Fut: Future<Output = SeqResult<bool>> + Send + 'static,
{
    async fn transform(&mut self, item: I, out: &mut Emitter<I>) -> SeqResult<Flow> {
        let verdict = (self.predicate)(&item);
        if verdict.await? {
            out.enqueue(item).await?;
        }
        Ok(Flow::Continue)
    }
}

pub struct TransformFn<F> {
    f: F,
}

/// Stage emitting zero or more outputs per item
pub fn transform<I, O, F, Fut>(f: F) -> TransformFn<F>
where
    F: FnMut(I) -> Fut + Send,
    Fut: Future<Output = SeqResult<Vec<O>>> + Send + 'static,
{
    TransformFn { f }
}

#[async_trait]
impl<I, O, F, Fut> Transformer<I, O> for TransformFn<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: FnMut(I) -> Fut + Send,
    Fut: Future<Output = SeqResult<Vec<O>>> + Send + 'static,
{
    async fn transform(&mut self, item: I, out: &mut Emitter<O>) -> SeqResult<Flow> {
        let produced = (self.f)(item);
        for value in produced.await? {
            out.enqueue(value).await?;
        }
        Ok(Flow::Continue)
    }
}

/// Stage forwarding the first `n` items, then stopping
pub struct TakeStage {
    remaining: usize,
}

pub fn take(n: usize) -> TakeStage {
    TakeStage { remaining: n }
}

#[async_trait]
impl<T: Send + 'static> Transformer<T, T> for TakeStage {
    async fn start(&mut self, _out: &mut Emitter<T>) -> SeqResult<Flow> {
        Ok(if self.remaining == 0 { Flow::Stop } else { Flow::Continue })
    }

    async fn transform(&mut self, item: T, out: &mut Emitter<T>) -> SeqResult<Flow> {
        out.enqueue(item).await?;
        self.remaining = self.remaining.saturating_sub(1);
        Ok(if self.remaining == 0 { Flow::Stop } else { Flow::Continue })
    }
}

/// Stage discarding the first `n` items
pub struct DropStage {
    remaining: usize,
}

pub fn drop(n: usize) -> DropStage {
    DropStage { remaining: n }
}

#[async_trait]
impl<T: Send + 'static> Transformer<T, T> for DropStage {
    async fn transform(&mut self, item: T, out: &mut Emitter<T>) -> SeqResult<Flow> {
        if self.remaining > 0 {
            self.remaining -= 1;
        } else {
            out.enqueue(item).await?;
        }
        Ok(Flow::Continue)
    }
}

/// Stage pairing each item with its index
pub struct EnumerateStage {
    index: usize,
}

pub fn enumerate() -> EnumerateStage {
    EnumerateStage { index: 0 }
}

#[async_trait]
impl<T: Send + 'static> Transformer<T, (usize, T)> for EnumerateStage {
    async fn transform(&mut self, item: T, out: &mut Emitter<(usize, T)>) -> SeqResult<Flow> {
        let index = self.index;
        self.index += 1;
        out.enqueue((index, item)).await?;
        Ok(Flow::Continue)
    }
}

/// Stage pairing each item with the next item of another stream
pub struct ZipWithStage<U> {
    other: Option<StreamReader<U>>,
}

/// Locks `other` until the stage ends; stops when `other` is exhausted
pub fn zip_with<U>(other: &ReadableStream<U>) -> SeqResult<ZipWithStage<U>>
where
    U: Send + 'static,
{
    Ok(ZipWithStage {
        other: Some(other.get_reader()?),
    })
}

#[async_trait]
impl<T, U> Transformer<T, (T, U)> for ZipWithStage<U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    async fn transform(&mut self, item: T, out: &mut Emitter<(T, U)>) -> SeqResult<Flow> {
        let Some(other) = self.other.as_mut() else {
            return Ok(Flow::Stop);
        };
        match other.read().await {
            Ok(Some(value)) => {
                out.enqueue((item, value)).await?;
                Ok(Flow::Continue)
            }
            Ok(None) => {
                self.other = None;
                Ok(Flow::Stop)
            }
            Err(e) => {
                self.other = None;
                Err(e)
            }
        }
    }

    async fn flush(&mut self, _out: &mut Emitter<(T, U)>) -> SeqResult<()> {
        if let Some(other) = self.other.take() {
            other.release_lock();
        }
        Ok(())
    }
}

// ================================
// Multi-stream combinators and sources
// ================================

/// Drain each stream in turn into one output
///
/// Fails with [`SeqError::Locked`] if any input is already locked. Each input
/// is locked only when it is reached and released once it drains, so inputs
/// not reached yet stay usable by the caller. If the output is cancelled only
/// the input being drained is cancelled. An input error, or an input that
/// another reader locked before it was reached, errors the output.
pub fn concat<T>(streams: Vec<ReadableStream<T>>, config: StreamConfig) -> SeqResult<ReadableStream<T>>
where
    T: Send + 'static,
{
    if streams.iter().any(ReadableStream::is_locked) {
        return Err(SeqError::Locked);
    }
    let (output, mut writer) = ReadableStream::new(config);

    tokio::spawn(async move {
        for stream in streams {
            let mut reader = match stream.get_reader() {
                Ok(reader) => reader,
                Err(e) => {
                    log::debug!("concat: input was locked before it was reached");
                    writer.error(e).await;
                    return;
                }
            };
            loop {
                let next = tokio::select! {
                    next = reader.read() => next,
                    cancellation = writer.cancelled() => {
                        log::debug!("concat: output cancelled, cancelling the input being drained");
                        reader.cancel(cancellation.reason);
                        return;
                    }
                };
                match next {
                    Ok(Some(item)) => {
                        if writer.write(item).await.is_err() {
                            reader.cancel(downstream_reason(&writer));
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        writer.error(e).await;
                        return;
                    }
                }
            }
        }
        writer.close();
    });

    Ok(output)
}

/// Pair items of two streams positionally
///
/// Each output item takes one concurrent read from each input. When either
/// input ends, both reader locks are released and the output closes. If the
/// output is cancelled both inputs are cancelled; if one input errors the
/// output errors and the other input is cancelled.
pub fn zip<A, B>(a: &ReadableStream<A>, b: &ReadableStream<B>, config: StreamConfig) -> SeqResult<ReadableStream<(A, B)>>
where
    A: Send + 'static,
    B: Send + 'static,
{
    let mut left = a.get_reader()?;
    let mut right = b.get_reader()?;
    let (output, mut writer) = ReadableStream::new(config);

    tokio::spawn(async move {
        loop {
            let pair = tokio::select! {
                pair = future::join(left.read(), right.read()) => pair,
                cancellation = writer.cancelled() => {
                    log::debug!("zip: output cancelled, cancelling both inputs");
                    left.cancel(cancellation.reason.clone());
                    right.cancel(cancellation.reason);
                    return;
                }
            };
            match pair {
                (Ok(Some(x)), Ok(Some(y))) => {
                    if writer.write((x, y)).await.is_err() {
                        let reason = downstream_reason(&writer);
                        left.cancel(reason.clone());
                        right.cancel(reason);
                        return;
                    }
                }
                (Err(e), other) => {
                    if matches!(other, Ok(Some(_))) {
                        right.cancel(Some(e.clone()));
                    }
                    writer.error(e).await;
                    return;
                }
                (other, Err(e)) => {
                    if matches!(other, Ok(Some(_))) {
                        left.cancel(Some(e.clone()));
                    }
                    writer.error(e).await;
                    return;
                }
                _ => break,
            }
        }
        log::debug!("zip: an input ended, releasing both readers");
        left.release_lock();
        right.release_lock();
        writer.close();
    });

    Ok(output)
}

/// Stream of `0, 1, 2, ...`, `n` values long (unbounded for `None`)
///
/// The producer yields to the scheduler before each value. Must be called
/// from within a tokio runtime.
pub fn iota(n: Option<u64>, config: StreamConfig) -> ReadableStream<u64> {
    let (output, writer) = ReadableStream::new(config);
    tokio::spawn(async move {
        let mut index = 0;
        while n.map_or(true, |n| index < n) {
            tokio::task::yield_now().await;
            if writer.write(index).await.is_err() {
                log::debug!("iota: cancelled after {} values", index);
                return;
            }
            index += 1;
        }
        writer.close();
    });
    output
}
