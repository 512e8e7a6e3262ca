//! Integer generators
//!
//! Both generators are one-shot cursors: restarting means constructing a new
//! one.

use crate::pull::PullSeq;

/// Unbounded arithmetic progression `start, start + step, ...`
///
/// The sequence ends only if the next value would overflow `i64`.
#[derive(Debug, Clone)]
pub struct Iota {
    next: Option<i64>,
    step: i64,
}

/// `start, start + step, ...` stopping before `end`
#[derive(Debug, Clone)]
pub struct Range {
    next: Option<i64>,
    end: i64,
    step: i64,
}

/// Create an unbounded progression starting at `start`
///
/// # Examples
/// ```
/// use seqflow::numeric::iota;
/// use seqflow::pull::PullSeqExt;
///
/// let values = iota(10, -2).take(3).collect_vec();
/// assert_eq!(values, vec![10, 8, 6]);
/// ```
pub fn iota(start: i64, step: i64) -> Iota {
    Iota {
        next: Some(start),
        step,
    }
}

/// `0, 1, 2, ...`
pub fn naturals() -> Iota {
    iota(0, 1)
}

/// Create a bounded progression; `end` is exclusive
///
/// A negative `step` counts down while the value is greater than `end`.
/// A zero `step` yields nothing.
pub fn range(start: i64, end: i64, step: i64) -> Range {
    Range {
        next: Some(start),
        end,
        step,
    }
}

impl PullSeq for Iota {
    type Item = i64;

    fn advance(&mut self) -> Option<i64> {
        let value = self.next?;
        self.next = value.checked_add(self.step);
        Some(value)
    }

    fn close(&mut self) {
        self.next = None;
    }
}

impl PullSeq for Range {
    type Item = i64;

    fn advance(&mut self) -> Option<i64> {
        let value = self.next?;
        let in_bounds = match self.step {
            s if s > 0 => value < self.end,
            s if s < 0 => value > self.end,
            _ => false,
        };
        if !in_bounds {
            self.next = None;
            return None;
        }
        self.next = value.checked_add(self.step);
        Some(value)
    }

    fn close(&mut self) {
        self.next = None;
    }
}
