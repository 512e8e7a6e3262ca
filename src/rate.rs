//! Leading-edge rate limiting stages
//!
//! Both stages forward the first item of a burst immediately. They differ in
//! what re-arms the timer: `debounce` restarts it on every item, so a burst
//! only ends after `duration` of quiet; `throttle` arms it only when an item
//! is forwarded, so windows have a fixed length.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::SeqResult;
use crate::stream_ops::{Emitter, Flow, Transformer};

/// A one-shot timer owned by a single stage, kept as a deadline on the tokio clock
#[derive(Debug, Default)]
struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    /// Start (or restart) the timer
    fn arm(&mut self, duration: Duration) {
        self.deadline = if duration.is_zero() {
            None
        } else {
            Some(Instant::now() + duration)
        };
    }

    fn is_active(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() < deadline)
    }

    fn clear(&mut self) {
        self.deadline = None;
    }
}

/// Forward the first item of each burst; items until `duration` of quiet are swallowed
pub struct Debounce {
    duration: Duration,
    timer: Timer,
}

pub fn debounce(duration: Duration) -> Debounce {
    Debounce {
        duration,
        timer: Timer::default(),
    }
}

#[async_trait]
impl<T: Send + 'static> Transformer<T, T> for Debounce {
    async fn transform(&mut self, item: T, out: &mut Emitter<T>) -> SeqResult<Flow> {
        let leading = !self.timer.is_active();
        self.timer.arm(self.duration);
        if leading {
            out.enqueue(item).await?;
        } else {
            log::trace!("debounce: item swallowed, quiet period restarted");
        }
        Ok(Flow::Continue)
    }

    async fn flush(&mut self, _out: &mut Emitter<T>) -> SeqResult<()> {
        self.timer.clear();
        Ok(())
    }
}

/// Forward an item only if no window is open, then open a `duration` window
pub struct Throttle {
    duration: Duration,
    timer: Timer,
}

pub fn throttle(duration: Duration) -> Throttle {
    Throttle {
        duration,
        timer: Timer::default(),
    }
}

#[async_trait]
impl<T: Send + 'static> Transformer<T, T> for Throttle {
    async fn transform(&mut self, item: T, out: &mut Emitter<T>) -> SeqResult<Flow> {
        if self.timer.is_active() {
            log::trace!("throttle: item dropped inside window");
            return Ok(Flow::Continue);
        }
        self.timer.arm(self.duration);
        out.enqueue(item).await?;
        Ok(Flow::Continue)
    }

    async fn flush(&mut self, _out: &mut Emitter<T>) -> SeqResult<()> {
        self.timer.clear();
        Ok(())
    }
}
