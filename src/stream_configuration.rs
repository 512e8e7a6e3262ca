//! Configuration types for stream construction and stream iteration

use serde::{Deserialize, Serialize};

/// Buffer configuration for a `ReadableStream`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Number of chunks the producer may queue ahead of the reader
    pub capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { capacity: 1 }
    }
}

impl StreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the buffer capacity; zero is rounded up to one
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }
}

/// Options for turning a stream into an async pull sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterateOptions {
    /// Leave the stream open when the sequence is finished or aborted early
    pub prevent_cancel: bool,
}

impl IterateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prevent_cancel(mut self, prevent_cancel: bool) -> Self {
        self.prevent_cancel = prevent_cancel;
        self
    }
}
