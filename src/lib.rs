//! Composable lazy sequences with a strict termination contract
//!
//! Three kinds of sequence share one set of combinators:
//! - [`pull::PullSeq`]: synchronous pull sequences
//! - [`async_pull::AsyncPullSeq`]: asynchronous pull sequences with
//!   `finish`/`abort` signalling
//! - [`readable_stream::ReadableStream`]: backpressured streams with an
//!   exclusive reader lock and reader-side cancellation
//!
//! [`adapter`] turns a stream into an async pull sequence, [`stream_ops`] and
//! [`rate`] provide stream stages, and [`pipe`] packages stages as reusable
//! transformations.

pub mod error;
pub mod stream_configuration;

pub mod numeric;
pub mod pull;
pub mod async_pull;

pub mod readable_stream;
pub mod adapter;
pub mod stream_ops;
pub mod rate;
pub mod pipe;

pub use adapter::{iterate_stream, StreamIter};
pub use async_pull::{AsyncPullSeq, AsyncPullSeqExt, BoxSeq};
pub use error::{SeqError, SeqResult};
pub use numeric::{iota, naturals, range};
pub use pipe::{Pipe, PipeExt};
pub use pull::{PullSeq, PullSeqExt};
pub use readable_stream::{Cancellation, ReadableStream, StreamReader, StreamWriter};
pub use stream_configuration::{IterateOptions, StreamConfig};
pub use stream_ops::{Emitter, Flow, Transformer};
