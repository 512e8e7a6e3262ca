//! Terminal consumers that drive an async pull sequence to completion

use std::future::Future;

use super::{forward_abort, AsyncPullSeq};
use crate::error::SeqResult;

/// Collect every value
pub async fn to_vec<S: AsyncPullSeq>(mut seq: S) -> SeqResult<Vec<S::Item>> {
    let mut out = Vec::new();
    while let Some(item) = seq.advance().await? {
        out.push(item);
    }
    Ok(out)
}

/// Count the values
pub async fn count<S: AsyncPullSeq>(mut seq: S) -> SeqResult<usize> {
    let mut n = 0;
    while seq.advance().await?.is_some() {
        n += 1;
    }
    Ok(n)
}

/// Fold the sequence with an async, fallible reducer
///
/// If the reducer fails, the sequence is aborted before the error is
/// returned, so the caller observes a released pipeline.
///
/// # Examples
/// ```
/// use seqflow::async_pull::{from_iter, reduce};
///
/// # async fn example() {
/// let sum = reduce(from_iter(vec![1, 2, 3]), |acc, x| async move { Ok(acc + x) }, 0).await;
/// assert_eq!(sum, Ok(6));
/// # }
/// ```
pub async fn reduce<S, A, F, Fut>(mut seq: S, mut f: F, init: A) -> SeqResult<A>
where
    S: AsyncPullSeq,
    F: FnMut(A, S::Item) -> Fut,
    Fut: Future<Output = SeqResult<A>>,
{
    let mut acc = init;
    while let Some(item) = seq.advance().await? {
        acc = match f(acc, item).await {
            Ok(next) => next,
            Err(e) => {
                forward_abort(&mut seq, &e).await;
                return Err(e);
            }
        };
    }
    Ok(acc)
}

/// Run an async, fallible callback on every value
pub async fn for_each<S, F, Fut>(mut seq: S, mut f: F) -> SeqResult<()>
where
    S: AsyncPullSeq,
    F: FnMut(S::Item) -> Fut,
    Fut: Future<Output = SeqResult<()>>,
{
    while let Some(item) = seq.advance().await? {
        if let Err(e) = f(item).await {
            forward_abort(&mut seq, &e).await;
            return Err(e);
        }
    }
    Ok(())
}
