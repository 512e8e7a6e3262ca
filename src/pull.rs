//! Synchronous pull sequences
//!
//! A [`PullSeq`] hands out its next value only when asked through
//! [`PullSeq::advance`]. Combinators own the sequence they wrap and close it
//! exactly once when they stop needing it, either because the consumer closed
//! them or because they decided to stop on their own (`take`, `zip`).

use std::collections::VecDeque;

/// A synchronous pull sequence
pub trait PullSeq {
    type Item;

    /// Produce the next value, or `None` once the sequence is exhausted.
    ///
    /// Calling `advance` after `None` keeps returning `None`.
    fn advance(&mut self) -> Option<Self::Item>;

    /// Release whatever the sequence holds. Later `advance` calls return `None`.
    fn close(&mut self) {}
}

impl<S: PullSeq + ?Sized> PullSeq for Box<S> {
    type Item = S::Item;

    fn advance(&mut self) -> Option<Self::Item> {
        (**self).advance()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

impl<S: PullSeq + ?Sized> PullSeq for &mut S {
    type Item = S::Item;

    fn advance(&mut self) -> Option<Self::Item> {
        (**self).advance()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

// ================================
// Sources
// ================================

/// Pull sequence over a standard iterator
pub struct FromIter<I> {
    iter: Option<I>,
}

/// Wrap any iterable as a pull sequence; `close` drops the rest of it
pub fn from_iter<I: IntoIterator>(iter: I) -> FromIter<I::IntoIter> {
    FromIter {
        iter: Some(iter.into_iter()),
    }
}

impl<I: Iterator> PullSeq for FromIter<I> {
    type Item = I::Item;

    fn advance(&mut self) -> Option<I::Item> {
        let next = self.iter.as_mut()?.next();
        if next.is_none() {
            self.iter = None;
        }
        next
    }

    fn close(&mut self) {
        self.iter = None;
    }
}

// ================================
// Combinators
// ================================

pub struct Map<S, F> {
    source: S,
    f: F,
    done: bool,
}

impl<S, U, F> PullSeq for Map<S, F>
where
    S: PullSeq,
    F: FnMut(S::Item) -> U,
{
    type Item = U;

    fn advance(&mut self) -> Option<U> {
        if self.done {
            return None;
        }
        match self.source.advance() {
            Some(item) => Some((self.f)(item)),
            None => {
                self.done = true;
                None
            }
        }
    }

    fn close(&mut self) {
        if !std::mem::replace(&mut self.done, true) {
            self.source.close();
        }
    }
}

/// Map with a fallible function
///
/// The first `Err` is emitted as the last item; the source is closed before
/// it is handed out.
pub struct TryMap<S, F> {
    source: S,
    f: F,
    done: bool,
}

impl<S, U, E, F> PullSeq for TryMap<S, F>
where
    S: PullSeq,
    F: FnMut(S::Item) -> Result<U, E>,
{
    type Item = Result<U, E>;

    fn advance(&mut self) -> Option<Result<U, E>> {
        if self.done {
            return None;
        }
        let Some(item) = self.source.advance() else {
            self.done = true;
            return None;
        };
        let mapped = (self.f)(item);
        if mapped.is_err() {
            self.done = true;
            self.source.close();
        }
        Some(mapped)
    }

    fn close(&mut self) {
        if !std::mem::replace(&mut self.done, true) {
            self.source.close();
        }
    }
}

pub struct Filter<S, F> {
    source: S,
    predicate: F,
    done: bool,
}

impl<S, F> PullSeq for Filter<S, F>
where
    S: PullSeq,
    F: FnMut(&S::Item) -> bool,
{
    type Item = S::Item;

    fn advance(&mut self) -> Option<S::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.source.advance() {
                Some(item) if (self.predicate)(&item) => return Some(item),
                Some(_) => continue,
                None => {
                    self.done = true;
                    return None;
                }
            }
        }
    }

    fn close(&mut self) {
        if !std::mem::replace(&mut self.done, true) {
            self.source.close();
        }
    }
}

pub struct Take<S> {
    source: S,
    remaining: usize,
    done: bool,
}

impl<S: PullSeq> Take<S> {
    fn stop(&mut self) {
        self.done = true;
        self.source.close();
    }
}

impl<S: PullSeq> PullSeq for Take<S> {
    type Item = S::Item;

    fn advance(&mut self) -> Option<S::Item> {
        if self.done {
            return None;
        }
        if self.remaining == 0 {
            self.stop();
            return None;
        }
        match self.source.advance() {
            Some(item) => {
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.stop();
                }
                Some(item)
            }
            None => {
                self.stop();
                None
            }
        }
    }

    fn close(&mut self) {
        if !self.done {
            self.stop();
        }
    }
}

pub struct Drop<S> {
    source: S,
    remaining: usize,
    done: bool,
}

impl<S: PullSeq> PullSeq for Drop<S> {
    type Item = S::Item;

    fn advance(&mut self) -> Option<S::Item> {
        if self.done {
            return None;
        }
        while self.remaining > 0 {
            self.remaining -= 1;
            if self.source.advance().is_none() {
                self.done = true;
                return None;
            }
        }
        let next = self.source.advance();
        if next.is_none() {
            self.done = true;
        }
        next
    }

    fn close(&mut self) {
        if !std::mem::replace(&mut self.done, true) {
            self.source.close();
        }
    }
}

pub struct Concat<S> {
    sources: VecDeque<S>,
}

impl<S: PullSeq> PullSeq for Concat<S> {
    type Item = S::Item;

    fn advance(&mut self) -> Option<S::Item> {
        while let Some(current) = self.sources.front_mut() {
            if let Some(item) = current.advance() {
                return Some(item);
            }
            self.sources.pop_front();
        }
        None
    }

    fn close(&mut self) {
        // Only the in-flight source has been started; the rest are dropped untouched.
        if let Some(current) = self.sources.front_mut() {
            current.close();
        }
        self.sources.clear();
    }
}

pub struct Zip<A, B> {
    a: A,
    b: B,
    done: bool,
}

impl<A: PullSeq, B: PullSeq> PullSeq for Zip<A, B> {
    type Item = (A::Item, B::Item);

    fn advance(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let left = self.a.advance();
        let right = self.b.advance();
        match (left, right) {
            (Some(a), Some(b)) => return Some((a, b)),
            (None, Some(_)) => self.b.close(),
            (Some(_), None) => self.a.close(),
            (None, None) => {}
        }
        self.done = true;
        None
    }

    fn close(&mut self) {
        if !std::mem::replace(&mut self.done, true) {
            self.a.close();
            self.b.close();
        }
    }
}

pub struct Enumerate<S> {
    source: S,
    index: usize,
    done: bool,
}

impl<S: PullSeq> PullSeq for Enumerate<S> {
    type Item = (usize, S::Item);

    fn advance(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some(item) = self.source.advance() else {
            self.done = true;
            return None;
        };
        let index = self.index;
        self.index += 1;
        Some((index, item))
    }

    fn close(&mut self) {
        if !std::mem::replace(&mut self.done, true) {
            self.source.close();
        }
    }
}

pub fn map<S, U, F>(source: S, f: F) -> Map<S, F>
where
    S: PullSeq,
    F: FnMut(S::Item) -> U,
{
    Map {
        source,
        f,
        done: false,
    }
}

pub fn try_map<S, U, E, F>(source: S, f: F) -> TryMap<S, F>
where
    S: PullSeq,
    F: FnMut(S::Item) -> Result<U, E>,
{
    TryMap {
        source,
        f,
        done: false,
    }
}

pub fn filter<S, F>(source: S, predicate: F) -> Filter<S, F>
where
    S: PullSeq,
    F: FnMut(&S::Item) -> bool,
{
    Filter {
        source,
        predicate,
        done: false,
    }
}

/// Slice: take the first `n` values, closing the source right after the last one
pub fn take<S: PullSeq>(source: S, n: usize) -> Take<S> {
    Take {
        source,
        remaining: n,
        done: false,
    }
}

/// Slice: drop the first `n` values
pub fn drop<S: PullSeq>(source: S, n: usize) -> Drop<S> {
    Drop {
        source,
        remaining: n,
        done: false,
    }
}

/// Concatenate sequences in order
pub fn concat<S, I>(sources: I) -> Concat<S>
where
    S: PullSeq,
    I: IntoIterator<Item = S>,
{
    Concat {
        sources: sources.into_iter().collect(),
    }
}

/// Pair values positionally; ends with the shorter side
pub fn zip<A: PullSeq, B: PullSeq>(a: A, b: B) -> Zip<A, B> {
    Zip { a, b, done: false }
}

pub fn enumerate<S: PullSeq>(source: S) -> Enumerate<S> {
    Enumerate {
        source,
        index: 0,
        done: false,
    }
}

// ================================
// Iterator bridge
// ================================

/// `Iterator` view of a pull sequence
///
/// Dropping the iterator closes the sequence, so breaking out of a `for` loop
/// releases the chain.
pub struct SeqIter<S: PullSeq> {
    seq: S,
}

impl<S: PullSeq> Iterator for SeqIter<S> {
    type Item = S::Item;

    fn next(&mut self) -> Option<S::Item> {
        self.seq.advance()
    }
}

impl<S: PullSeq> std::ops::Drop for SeqIter<S> {
    fn drop(&mut self) {
        self.seq.close();
    }
}

// ================================
// Extension trait
// ================================

/// Combinators and terminal consumers as methods
pub trait PullSeqExt: PullSeq + Sized {
    fn map<U, F>(self, f: F) -> Map<Self, F>
    where
        F: FnMut(Self::Item) -> U,
    {
        map(self, f)
    }

    fn try_map<U, E, F>(self, f: F) -> TryMap<Self, F>
    where
        F: FnMut(Self::Item) -> Result<U, E>,
    {
        try_map(self, f)
    }

    fn filter<F>(self, predicate: F) -> Filter<Self, F>
    where
        F: FnMut(&Self::Item) -> bool,
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

    fn zip<B: PullSeq>(self, other: B) -> Zip<Self, B> {
        zip(self, other)
    }

    fn chain(self, other: Self) -> Concat<Self> {
        concat([self, other])
    }

    fn enumerate(self) -> Enumerate<Self> {
        enumerate(self)
    }

    fn into_std_iter(self) -> SeqIter<Self> {
        SeqIter { seq: self }
    }

    fn collect_vec(mut self) -> Vec<Self::Item> {
        let mut out = Vec::new();
        while let Some(item) = self.advance() {
            out.push(item);
        }
        out
    }

    fn count(mut self) -> usize {
        let mut n = 0;
        while self.advance().is_some() {
            n += 1;
        }
        n
    }

    fn fold<A, F>(mut self, init: A, mut f: F) -> A
    where
        F: FnMut(A, Self::Item) -> A,
    {
        let mut acc = init;
        while let Some(item) = self.advance() {
            acc = f(acc, item);
        }
        acc
    }
}

impl<S: PullSeq> PullSeqExt for S {}
