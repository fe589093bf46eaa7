use crate::{IdFactory, Result, TimeSource};
use futures::future::{self, BoxFuture};
use std::sync::Arc;

/// Anything that can hand out a batch of ids.
///
/// A [`Pool`] calls `fetch` from many worker tasks at once, so
/// implementations must be shareable. A successful fetch returns exactly `n`
/// ids; a failed one returns an error and no ids. Callers retry on failure and
/// must not assume ordering or deduplication across repeated calls.
///
/// [`IdFactory`] is the local implementation. Remote peers are reached
/// through `snowstorm_http::HttpSource`.
///
/// # Example
///
/// ```
/// use futures::future::{self, BoxFuture};
/// use snowstorm::{Result, Source};
///
/// struct Counting;
///
/// impl Source for Counting {
///     fn fetch(&self, n: usize) -> BoxFuture<'_, Result<Vec<i64>>> {
///         Box::pin(future::ready(Ok((1..=n as i64).collect())))
///     }
/// }
/// ```
///
/// [`Pool`]: crate::Pool
pub trait Source: Send + Sync {
    /// Fetches the next `n` ids.
    fn fetch(&self, n: usize) -> BoxFuture<'_, Result<Vec<i64>>>;
}

impl<T> Source for IdFactory<T>
where
    T: TimeSource + Send + Sync,
{
    fn fetch(&self, n: usize) -> BoxFuture<'_, Result<Vec<i64>>> {
        Box::pin(future::ready(Ok(self.id_n(n))))
    }
}

impl<S: Source + ?Sized> Source for Arc<S> {
    fn fetch(&self, n: usize) -> BoxFuture<'_, Result<Vec<i64>>> {
        (**self).fetch(n)
    }
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn fetch(&self, n: usize) -> BoxFuture<'_, Result<Vec<i64>>> {
        (**self).fetch(n)
    }
}
