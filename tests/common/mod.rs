#![allow(dead_code)]

use async_trait::async_trait;
use seqflow::{AsyncPullSeq, PullSeq, SeqError, SeqResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Shared counters recording how a source was driven and terminated
#[derive(Clone, Default)]
pub struct Tally {
    advances: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    aborts: Arc<AtomicUsize>,
    abort_errors: Arc<Mutex<Vec<SeqError>>>,
}

impl Tally {
    pub fn advances(&self) -> usize {
        self.advances.load(Ordering::SeqCst)
    }

    /// `close` calls for sync sources, `finish` calls for async ones
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    /// Total termination signals of any kind
    pub fn terminations(&self) -> usize {
        self.closes() + self.aborts()
    }

    pub fn abort_errors(&self) -> Vec<SeqError> {
        self.abort_errors.lock().unwrap().clone()
    }
}

/// Sync source over a fixed list that records every call
pub struct SpySeq {
    items: std::vec::IntoIter<i64>,
    tally: Tally,
}

pub fn spy_seq(items: impl IntoIterator<Item = i64>) -> (SpySeq, Tally) {
    let tally = Tally::default();
    let seq = SpySeq {
        items: items.into_iter().collect::<Vec<_>>().into_iter(),
        tally: tally.clone(),
    };
    (seq, tally)
}

impl PullSeq for SpySeq {
    type Item = i64;

    fn advance(&mut self) -> Option<i64> {
        self.tally.advances.fetch_add(1, Ordering::SeqCst);
        self.items.next()
    }

    fn close(&mut self) {
        self.tally.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Async source over a fixed list that records every call
///
/// With `fail_at` set, the advance at that position returns an upstream error.
/// With `abort_reply` set, `abort` reports that error instead of echoing its argument.
pub struct AsyncSpy {
    items: std::vec::IntoIter<i64>,
    position: usize,
    fail_at: Option<usize>,
    abort_reply: Option<SeqError>,
    tally: Tally,
}

pub fn async_spy(items: impl IntoIterator<Item = i64>) -> (AsyncSpy, Tally) {
    let tally = Tally::default();
    let seq = AsyncSpy {
        items: items.into_iter().collect::<Vec<_>>().into_iter(),
        position: 0,
        fail_at: None,
        abort_reply: None,
        tally: tally.clone(),
    };
    (seq, tally)
}

pub fn failing_spy(items: impl IntoIterator<Item = i64>, fail_at: usize) -> (AsyncSpy, Tally) {
    let (mut seq, tally) = async_spy(items);
    seq.fail_at = Some(fail_at);
    (seq, tally)
}

/// Source whose `abort` always reports `reply`, whatever it was aborted with
pub fn noisy_abort_spy(items: impl IntoIterator<Item = i64>, reply: SeqError) -> (AsyncSpy, Tally) {
    let (mut seq, tally) = async_spy(items);
    seq.abort_reply = Some(reply);
    (seq, tally)
}

#[async_trait]
impl AsyncPullSeq for AsyncSpy {
    type Item = i64;

    async fn advance(&mut self) -> SeqResult<Option<i64>> {
        self.tally.advances.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let position = self.position;
        self.position += 1;
        if self.fail_at == Some(position) {
            return Err(SeqError::upstream(format!("failed at {}", position)));
        }
        Ok(self.items.next())
    }

    async fn finish(&mut self) {
        self.tally.closes.fetch_add(1, Ordering::SeqCst);
    }

    async fn abort(&mut self, error: SeqError) -> SeqError {
        self.tally.aborts.fetch_add(1, Ordering::SeqCst);
        self.tally.abort_errors.lock().unwrap().push(error.clone());
        self.abort_reply.clone().unwrap_or(error)
    }
}

/// Yield to the scheduler until `check` holds
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
