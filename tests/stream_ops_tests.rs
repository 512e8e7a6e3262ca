mod common;

use common::eventually;
use seqflow::async_pull::{AsyncPullSeq, AsyncPullSeqExt};
use seqflow::readable_stream::{Cancellation, ReadableStream};
use seqflow::stream_configuration::StreamConfig;
use seqflow::stream_ops::{self, pipe_through};
use seqflow::{SeqError, SeqResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_test::assert_err;

async fn collect<T: Send + 'static>(stream: &ReadableStream<T>) -> SeqResult<Vec<T>> {
    stream.iter()?.to_vec().await
}

/// A stream fed by a task that writes 0, 1, 2, ... until cancelled
fn counting_producer() -> (ReadableStream<i32>, tokio::task::JoinHandle<i32>) {
    let (stream, writer) = ReadableStream::new(StreamConfig::default());
    let producer = tokio::spawn(async move {
        let mut sent = 0;
        while writer.write(sent).await.is_ok() {
            sent += 1;
        }
        sent
    });
    (stream, producer)
}

#[tokio::test]
async fn test_map() {
    let input = ReadableStream::from_iter(1..=5, StreamConfig::default());
    let output = input
        .pipe_through(stream_ops::map(|x: i32| async move { Ok(x * 2) }))
        .unwrap();
    assert_eq!(collect(&output).await, Ok(vec![2, 4, 6, 8, 10]));
    assert!(!input.is_locked());
}

#[tokio::test]
async fn test_filter() {
    let input = ReadableStream::from_iter(1..=10, StreamConfig::default());
    let output = input
        .pipe_through(stream_ops::filter(|x: &i32| {
            let keep = x % 3 == 0;
            async move { Ok(keep) }
        }))
        .unwrap();
    assert_eq!(collect(&output).await, Ok(vec![3, 6, 9]));
}

#[tokio::test]
async fn test_transform_emits_many_per_item() {
    let input = ReadableStream::from_iter(vec![1, 2, 3], StreamConfig::default());
    let output = input
        .pipe_through(stream_ops::transform(|x: i32| async move { Ok(vec![x; x as usize]) }))
        .unwrap();
    assert_eq!(collect(&output).await, Ok(vec![1, 2, 2, 3, 3, 3]));
}

#[tokio::test]
async fn test_take_cancels_upstream() {
    let (input, producer) = counting_producer();
    let output = input.pipe_through(stream_ops::take(3)).unwrap();

    assert_eq!(collect(&output).await, Ok(vec![0, 1, 2]));

    let sent = producer.await.unwrap();
    assert!((3..=6).contains(&sent), "producer wrote {} values", sent);
    assert_eq!(input.cancellation(), Some(Cancellation { reason: None }));
    assert!(!input.is_locked());
}

#[tokio::test]
async fn test_take_zero_reads_nothing() {
    let input = ReadableStream::from_iter(vec![1, 2, 3], StreamConfig::default());
    let output = input.pipe_through(stream_ops::take(0)).unwrap();
    assert_eq!(collect(&output).await, Ok(vec![]));
    assert!(input.cancellation().is_some());
}

#[tokio::test]
async fn test_drop() {
    let input = ReadableStream::from_iter(1..=10, StreamConfig::default());
    let output = input.pipe_through(stream_ops::drop(3)).unwrap();
    assert_eq!(collect(&output).await, Ok(vec![4, 5, 6, 7, 8, 9, 10]));
}

#[tokio::test]
async fn test_enumerate_after_filter() {
    let input = ReadableStream::from_iter(vec!["a", "bb", "c", "dd"], StreamConfig::default());
    let long = input
        .pipe_through(stream_ops::filter(|s: &&str| {
            let keep = s.len() == 2;
            async move { Ok(keep) }
        }))
        .unwrap();
    let output = long.pipe_through(stream_ops::enumerate()).unwrap();
    assert_eq!(collect(&output).await, Ok(vec![(0, "bb"), (1, "dd")]));
}

#[tokio::test]
async fn test_stage_error_cancels_input_and_errors_output() {
    let (input, producer) = counting_producer();
    let output = input
        .pipe_through(stream_ops::map(|x: i32| async move {
            if x == 2 {
                Err(SeqError::callback("two"))
            } else {
                Ok(x)
            }
        }))
        .unwrap();

    let mut seq = output.iter().unwrap();
    assert_eq!(seq.advance().await, Ok(Some(0)));
    assert_eq!(seq.advance().await, Ok(Some(1)));
    assert_eq!(seq.advance().await, Err(SeqError::callback("two")));

    producer.await.unwrap();
    assert_eq!(
        input.cancellation(),
        Some(Cancellation {
            reason: Some(SeqError::callback("two"))
        })
    );
    // The output ended with an error, not a cancellation
    assert_eq!(output.cancellation(), None);
}

#[tokio::test]
async fn test_input_error_reaches_output() {
    let (input, writer) = ReadableStream::new(StreamConfig::new().capacity(4));
    writer.write(1).await.unwrap();
    writer.error(SeqError::upstream("lost connection")).await;

    let output = input
        .pipe_through(stream_ops::map(|x: i32| async move { Ok(x + 1) }))
        .unwrap();
    let mut seq = output.iter().unwrap();
    assert_eq!(seq.advance().await, Ok(Some(2)));
    assert_eq!(seq.advance().await, Err(SeqError::upstream("lost connection")));
    assert_eq!(input.cancellation(), None);
}

#[tokio::test]
async fn test_output_cancel_reaches_input_with_reason() {
    let (input, producer) = counting_producer();
    let output = input
        .pipe_through(stream_ops::map(|x: i32| async move { Ok(x) }))
        .unwrap();

    let mut seq = output.iter().unwrap();
    assert_eq!(seq.advance().await, Ok(Some(0)));
    seq.abort(SeqError::custom("downstream gave up")).await;

    producer.await.unwrap();
    assert_eq!(
        input.cancellation(),
        Some(Cancellation {
            reason: Some(SeqError::custom("downstream gave up"))
        })
    );
    eventually(|| !input.is_locked()).await;
}

#[tokio::test]
async fn test_backpressure_bounds_producer() {
    let (input, writer) = ReadableStream::new(StreamConfig::default());
    let sent = Arc::new(AtomicUsize::new(0));
    let counter = sent.clone();
    tokio::spawn(async move {
        for i in 0..1000 {
            if writer.write(i).await.is_err() {
                return;
            }
            counter.fetch_add(1, Ordering::SeqCst);
        }
        writer.close();
    });

    let output = input
        .pipe_through(stream_ops::map(|x: i32| async move { Ok(x) }))
        .unwrap();
    let mut seq = output.iter().unwrap();
    assert_eq!(seq.advance().await, Ok(Some(0)));

    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    // One item each in: the input buffer, the stage, the output buffer, plus the one read
    assert!(sent.load(Ordering::SeqCst) <= 5, "producer ran ahead: {}", sent.load(Ordering::SeqCst));
    seq.finish().await;
}

#[tokio::test]
async fn test_concat() {
    let streams = vec![
        ReadableStream::from_iter(1..4, StreamConfig::default()),
        ReadableStream::from_iter(4..7, StreamConfig::default()),
        ReadableStream::from_iter(7..10, StreamConfig::default()),
    ];
    let output = stream_ops::concat(streams.clone(), StreamConfig::default()).unwrap();

    assert_eq!(collect(&output).await, Ok(vec![1, 2, 3, 4, 5, 6, 7, 8, 9]));
    assert!(streams.iter().all(|s| !s.is_locked() && s.cancellation().is_none()));
}

#[tokio::test]
async fn test_concat_cancel_reaches_only_the_input_being_drained() {
    let first = ReadableStream::from_iter(1..4, StreamConfig::default());
    let second = ReadableStream::from_iter(4..7, StreamConfig::default());
    let third = ReadableStream::from_iter(7..10, StreamConfig::default());
    let output = stream_ops::concat(vec![first.clone(), second.clone(), third.clone()], StreamConfig::default()).unwrap();

    let values = output.iter().unwrap().take(4).to_vec().await;
    assert_eq!(values, Ok(vec![1, 2, 3, 4]));

    eventually(|| second.cancellation().is_some()).await;
    assert_eq!(first.cancellation(), None);
    assert_eq!(second.cancellation(), Some(Cancellation { reason: None }));
    assert!(!second.is_locked());

    // The input never reached is left for the caller
    assert_eq!(third.cancellation(), None);
    assert_eq!(collect(&third).await, Ok(vec![7, 8, 9]));
}

#[tokio::test]
async fn test_concat_errors_when_input_is_taken_before_it_is_reached() {
    let (first, writer) = ReadableStream::<i32>::new(StreamConfig::default());
    let second = ReadableStream::from_iter(vec![2], StreamConfig::default());
    let output = stream_ops::concat(vec![first, second.clone()], StreamConfig::default()).unwrap();

    let _held = second.get_reader().unwrap();
    writer.write(1).await.unwrap();
    writer.close();

    let mut reader = output.get_reader().unwrap();
    assert_eq!(reader.read().await, Ok(Some(1)));
    assert_eq!(reader.read().await, Err(SeqError::Locked));
    assert_eq!(second.cancellation(), None);
}

#[tokio::test]
async fn test_concat_rejects_locked_input() {
    let free = ReadableStream::from_iter(vec![1], StreamConfig::default());
    let busy = ReadableStream::from_iter(vec![2], StreamConfig::default());
    let _reader = busy.get_reader().unwrap();

    let result = stream_ops::concat(vec![free.clone(), busy.clone()], StreamConfig::default());
    assert_eq!(result.err(), Some(SeqError::Locked));
    assert!(!free.is_locked());
}

#[tokio::test]
async fn test_zip_releases_both_inputs() {
    let a = ReadableStream::from_iter(1..4, StreamConfig::default());
    let b = ReadableStream::from_iter(4..100, StreamConfig::default());
    let output = stream_ops::zip(&a, &b, StreamConfig::default()).unwrap();

    assert_eq!(collect(&output).await, Ok(vec![(1, 4), (2, 5), (3, 6)]));
    assert!(!a.is_locked());
    assert!(!b.is_locked());
    assert_eq!(b.cancellation(), None);
}

#[tokio::test]
async fn test_zip_output_cancel_cancels_both_inputs() {
    let a = ReadableStream::from_iter(0..100, StreamConfig::default());
    let b = ReadableStream::from_iter(0..100, StreamConfig::default());
    let output = stream_ops::zip(&a, &b, StreamConfig::default()).unwrap();

    let values = output.iter().unwrap().take(2).to_vec().await;
    assert_eq!(values, Ok(vec![(0, 0), (1, 1)]));

    eventually(|| a.cancellation().is_some() && b.cancellation().is_some()).await;
    eventually(|| !a.is_locked() && !b.is_locked()).await;
}

#[tokio::test]
async fn test_zip_error_cancels_other_side() {
    let (a, writer) = ReadableStream::new(StreamConfig::default());
    tokio::spawn(async move {
        let _ = writer.write(1).await;
        writer.error(SeqError::upstream("left failed")).await;
    });
    let b = ReadableStream::from_iter(10..100, StreamConfig::default());
    let output = stream_ops::zip(&a, &b, StreamConfig::default()).unwrap();

    let mut seq = output.iter().unwrap();
    assert_eq!(seq.advance().await, Ok(Some((1, 10))));
    assert_eq!(seq.advance().await, Err(SeqError::upstream("left failed")));
    assert_eq!(
        b.cancellation(),
        Some(Cancellation {
            reason: Some(SeqError::upstream("left failed"))
        })
    );
}

#[tokio::test]
async fn test_zip_with() {
    let letters = ReadableStream::from_iter(vec!['a', 'b', 'c', 'd'], StreamConfig::default());
    let numbers = ReadableStream::from_iter(1..=3, StreamConfig::default());
    let output = letters.pipe_through(stream_ops::zip_with(&numbers).unwrap()).unwrap();

    assert_eq!(collect(&output).await, Ok(vec![('a', 1), ('b', 2), ('c', 3)]));
    assert!(!numbers.is_locked());
    assert!(letters.cancellation().is_some());
}

#[tokio::test]
async fn test_iota() {
    let bounded = stream_ops::iota(Some(5), StreamConfig::default());
    assert_eq!(collect(&bounded).await, Ok(vec![0, 1, 2, 3, 4]));

    let unbounded = stream_ops::iota(None, StreamConfig::default());
    let first = unbounded.iter().unwrap().take(3).to_vec().await;
    assert_eq!(first, Ok(vec![0, 1, 2]));
    assert!(unbounded.cancellation().is_some());
}

#[tokio::test]
async fn test_pipe_through_with_config() {
    let input = ReadableStream::from_iter(0..10, StreamConfig::default());
    let output = pipe_through(&input, stream_ops::drop(8), StreamConfig::new().capacity(16)).unwrap();
    assert_eq!(collect(&output).await, Ok(vec![8, 9]));
}

#[tokio::test]
async fn test_pipe_through_rejects_locked_input() {
    let input = ReadableStream::from_iter(0..10, StreamConfig::default());
    let _reader = input.get_reader().unwrap();
    let err = assert_err!(input.pipe_through(stream_ops::take(1)));
    assert_eq!(err, SeqError::Locked);
}
