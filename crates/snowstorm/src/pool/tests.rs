use crate::{
    Backoff, Error, FactoryOptions, IdFactory, Layout, Pool, Result, Source, Topology, WallClock,
};
use core::time::Duration;
use futures::future::{self, BoxFuture};
use std::collections::HashSet;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
};
use tokio::time::timeout;

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Never fails; hands out consecutive values starting at `start`.
struct Counter {
    next: AtomicI64,
    calls: AtomicUsize,
}

impl Counter {
    fn starting_at(start: i64) -> Self {
        Self {
            next: AtomicI64::new(start),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Source for Counter {
    fn fetch(&self, n: usize) -> BoxFuture<'_, Result<Vec<i64>>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let first = self.next.fetch_add(n as i64, Ordering::Relaxed);
        Box::pin(future::ready(Ok((first..first + n as i64).collect())))
    }
}

/// Fails the first `failures` calls, then behaves like [`Counter`].
struct Flaky {
    failures: usize,
    attempts: AtomicUsize,
    inner: Counter,
}

impl Flaky {
    fn new(failures: usize) -> Self {
        Self {
            failures,
            attempts: AtomicUsize::new(0),
            inner: Counter::starting_at(1),
        }
    }
}

impl Source for Flaky {
    fn fetch(&self, n: usize) -> BoxFuture<'_, Result<Vec<i64>>> {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed);
        if attempt < self.failures {
            let err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "peer down");
            return Box::pin(future::ready(Err(Error::fetch(err))));
        }
        self.inner.fetch(n)
    }
}

/// Hangs on the first call, then behaves like [`Counter`].
struct HangsOnce {
    attempts: AtomicUsize,
    inner: Counter,
}

impl Source for HangsOnce {
    fn fetch(&self, n: usize) -> BoxFuture<'_, Result<Vec<i64>>> {
        if self.attempts.fetch_add(1, Ordering::Relaxed) == 0 {
            return Box::pin(future::pending());
        }
        self.inner.fetch(n)
    }
}

/// Always fails.
struct Down;

impl Source for Down {
    fn fetch(&self, _n: usize) -> BoxFuture<'_, Result<Vec<i64>>> {
        Box::pin(future::ready(Err(Error::fetch("unreachable peer"))))
    }
}

/// Never completes a fetch, and takes `unwind` to drop an abandoned one.
/// `exited` flips once the last abandoned fetch has been dropped.
struct SlowUnwind {
    unwind: Duration,
    exited: Arc<AtomicBool>,
}

struct UnwindGuard {
    unwind: Duration,
    exited: Arc<AtomicBool>,
}

impl Drop for UnwindGuard {
    fn drop(&mut self) {
        std::thread::sleep(self.unwind);
        self.exited.store(true, Ordering::SeqCst);
    }
}

impl Source for SlowUnwind {
    fn fetch(&self, _n: usize) -> BoxFuture<'_, Result<Vec<i64>>> {
        let guard = UnwindGuard {
            unwind: self.unwind,
            exited: Arc::clone(&self.exited),
        };
        Box::pin(async move {
            let _guard = guard;
            future::pending::<Result<Vec<i64>>>().await
        })
    }
}

fn fast_backoff() -> Backoff {
    Backoff {
        base: Duration::from_millis(5),
        jitter: Duration::from_millis(5),
    }
}

async fn drain(pool: &Pool, count: usize) -> Vec<i64> {
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        let id = timeout(JOIN_TIMEOUT, pool.next_id())
            .await
            .expect("pool stalled")
            .expect("pool closed early");
        ids.push(id);
    }
    ids
}

fn assert_unique(ids: &[i64]) {
    let seen: HashSet<_> = ids.iter().collect();
    assert_eq!(seen.len(), ids.len(), "duplicate ids");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn drains_more_than_buffer_without_deadlock() {
    let buffer = 4;
    let iterations = buffer * 10;
    let factory = IdFactory::new(FactoryOptions::default()).unwrap();
    let pool = Pool::builder()
        .buffer_size(buffer)
        .source(factory)
        .build()
        .unwrap();

    let ids = drain(&pool, iterations).await;
    assert_unique(&ids);

    timeout(JOIN_TIMEOUT, pool.close())
        .await
        .expect("close should join every worker");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn counter_source_yields_distinct_ids() {
    let pool = Pool::builder()
        .buffer_size(64)
        .workers(4)
        .batch_size(16)
        .source(Counter::starting_at(1))
        .build()
        .unwrap();

    let ids = drain(&pool, 5_000).await;
    assert_unique(&ids);
    assert!(ids.iter().all(|id| *id >= 1));
    pool.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn close_joins_workers_after_partial_consumption() {
    let pool = Pool::builder()
        .buffer_size(8)
        .workers(8)
        .source(Counter::starting_at(1))
        .build()
        .unwrap();

    drain(&pool, 3).await;
    assert!(!pool.is_closed());

    // Workers are parked on a full buffer here; close must still return
    timeout(JOIN_TIMEOUT, pool.close())
        .await
        .expect("close should join every worker");

    assert!(pool.is_closed());
    assert_eq!(pool.next_id().await, None);

    // Idempotent
    timeout(JOIN_TIMEOUT, pool.close()).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn close_interrupts_backoff() {
    let pool = Pool::builder()
        .workers(4)
        .backoff(Backoff {
            base: Duration::from_secs(60),
            jitter: Duration::ZERO,
        })
        .source(Down)
        .build()
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    timeout(JOIN_TIMEOUT, pool.close())
        .await
        .expect("sleeping workers should observe cancellation");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_close_waits_for_workers() {
    let exited = Arc::new(AtomicBool::new(false));
    let pool = Arc::new(
        Pool::builder()
            .workers(1)
            .source(SlowUnwind {
                unwind: Duration::from_millis(300),
                exited: Arc::clone(&exited),
            })
            .build()
            .unwrap(),
    );

    // Let the worker start its fetch
    tokio::time::sleep(Duration::from_millis(50)).await;

    let first = tokio::spawn({
        let pool = Arc::clone(&pool);
        async move { pool.close().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    timeout(JOIN_TIMEOUT, pool.close()).await.unwrap();
    assert!(
        exited.load(Ordering::SeqCst),
        "second close returned before the worker exited"
    );

    timeout(JOIN_TIMEOUT, first).await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_source_recovers_without_surfacing_errors() {
    let source = Arc::new(Flaky::new(5));
    let pool = Pool::builder()
        .workers(2)
        .batch_size(32)
        .backoff(fast_backoff())
        .source(Arc::clone(&source))
        .build()
        .unwrap();

    let ids = drain(&pool, 500).await;
    assert_unique(&ids);
    assert!(source.attempts.load(Ordering::Relaxed) > 5);
    pool.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn hung_fetch_is_retried_after_timeout() {
    let source = Arc::new(HangsOnce {
        attempts: AtomicUsize::new(0),
        inner: Counter::starting_at(100),
    });
    let pool = Pool::builder()
        .workers(1)
        .batch_size(8)
        .fetch_timeout(Duration::from_millis(50))
        .backoff(fast_backoff())
        .source(Arc::clone(&source))
        .build()
        .unwrap();

    let ids = drain(&pool, 8).await;
    assert_eq!(ids, (100..108).collect::<Vec<_>>());
    assert!(source.attempts.load(Ordering::Relaxed) >= 2);
    pool.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn spreads_fetches_across_sources() {
    let low = Arc::new(Counter::starting_at(1));
    let high = Arc::new(Counter::starting_at(1 << 40));
    let pool = Pool::builder()
        .buffer_size(16)
        .workers(4)
        .batch_size(8)
        .source(Arc::clone(&low))
        .source(Arc::clone(&high))
        .build()
        .unwrap();

    let ids = drain(&pool, 2_000).await;
    assert_unique(&ids);
    pool.close().await;

    assert!(low.calls() > 0);
    assert!(high.calls() > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn monotonic_single_bucket_is_strictly_increasing() {
    let factory = IdFactory::with_time(1, Layout::default(), WallClock::default());
    let pool = Pool::builder()
        .workers(1)
        .buffer_size(256)
        .monotonic()
        .source(factory)
        .build()
        .unwrap();
    assert_eq!(pool.topology(), Topology::Monotonic);

    let ids = drain(&pool, 2_000).await;
    for pair in ids.windows(2) {
        assert!(pair[0] < pair[1]);
    }
    timeout(JOIN_TIMEOUT, pool.close()).await.unwrap();
    assert_eq!(pool.next_id().await, None);
}

#[tokio::test]
async fn rejects_invalid_configuration() {
    let cases = [
        Pool::builder().buffer_size(0).source(Down).build(),
        Pool::builder().buffer_size(65_385).source(Down).build(),
        Pool::builder().workers(0).source(Down).build(),
        Pool::builder().workers(101).source(Down).build(),
        Pool::builder().build(),
    ];
    for result in cases {
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }
}

#[test]
fn build_requires_a_runtime() {
    let result = Pool::builder().source(Down).build();
    assert!(matches!(result, Err(Error::InvalidConfig { .. })));
}
