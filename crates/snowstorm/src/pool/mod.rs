//! Prefetching id pool.
//!
//! A [`Pool`] owns a fixed set of worker tasks that pull batches from one or
//! more [`Source`]s and push them, one id at a time, into bounded queues.
//! Consumers take single ids with [`Pool::next_id`]. A full queue parks the
//! workers feeding it; an empty one parks the consumer.
//!
//! Two topologies are available (see [`Topology`]):
//!
//! - **FIFO**: every worker feeds one shared queue. Cheapest, but ids from
//!   different batches interleave in arrival order.
//! - **Monotonic**: each (source, worker) pair feeds its own bucket and a
//!   single merge task forwards the smallest head, so the output never
//!   decreases.
//!
//! All tasks share one [`CancellationToken`]. [`Pool::close`] cancels it and
//! joins every task before returning.

mod config;
mod merge;
mod queue;
mod worker;

#[cfg(test)]
mod tests;

pub use config::*;

use crate::{Error, Result, Source};
use core::time::Duration;
use merge::Merge;
use queue::Bucket;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::sync::Arc;
use tokio::{
    runtime::Handle,
    sync::{Mutex, Notify, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use worker::Worker;

/// A buffered, concurrently refilled supply of ids.
///
/// # Example
///
/// ```
/// use snowstorm::{FactoryOptions, IdFactory, Pool};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> snowstorm::Result<()> {
/// let factory = Arc::new(IdFactory::new(FactoryOptions::default())?);
/// let pool = Pool::builder()
///     .buffer_size(1024)
///     .workers(2)
///     .source(factory)
///     .build()?;
///
/// let a = pool.next_id().await.unwrap();
/// let b = pool.next_id().await.unwrap();
/// assert_ne!(a, b);
///
/// pool.close().await;
/// assert_eq!(pool.next_id().await, None);
/// # Ok(())
/// # }
/// ```
pub struct Pool {
    ids: Mutex<mpsc::Receiver<i64>>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    topology: Topology,
}

impl Pool {
    pub fn builder() -> PoolBuilder {
        PoolBuilder::default()
    }

    /// Waits for the next id.
    ///
    /// Never fails while the pool is open: fetch errors are retried inside the
    /// workers and only show up as extra latency. Returns `None` once the pool
    /// has been closed.
    pub async fn next_id(&self) -> Option<i64> {
        self.ids.lock().await.recv().await
    }

    /// Cancels every task and waits for all of them to exit.
    ///
    /// Ids still buffered are discarded. Concurrent or repeated calls all wait
    /// for the same tasks; once they have been joined, `close` is a no-op.
    pub async fn close(&self) {
        self.shutdown.cancel();

        // Held across the joins so a second caller parks until they finish.
        let mut tasks = self.tasks.lock().await;
        #[cfg(feature = "tracing")]
        tracing::debug!("Joining {} pool tasks", tasks.len());

        // A handle is only popped once joined, so a caller dropped mid-close
        // leaves the rest for the next one.
        while let Some(task) = tasks.last_mut() {
            let result = task.await;
            tasks.pop();
            if let Err(_e) = result {
                #[cfg(feature = "tracing")]
                tracing::error!("Pool task {} did not exit cleanly: {_e}", tasks.len());
            }
        }
        drop(tasks);

        let mut ids = self.ids.lock().await;
        ids.close();
        while ids.try_recv().is_ok() {}

        #[cfg(feature = "tracing")]
        tracing::debug!("Pool closed");
    }

    /// Returns true once [`Pool::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub const fn topology(&self) -> Topology {
        self.topology
    }
}

impl Drop for Pool {
    /// Signals every task to stop. Without an explicit [`Pool::close`] the
    /// tasks wind down on their own, unjoined.
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Configures and spawns a [`Pool`].
#[derive(Default)]
pub struct PoolBuilder {
    config: PoolConfig,
    sources: Vec<Arc<dyn Source>>,
}

impl PoolBuilder {
    /// Replaces every setting at once.
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Number of ids buffered locally, 1 to [`MAX_BUFFER_SIZE`]. In monotonic
    /// mode every bucket gets this capacity too.
    pub fn buffer_size(mut self, n: usize) -> Self {
        self.config.buffer_size = n;
        self
    }

    /// Number of concurrent fetch loops, 1 to [`MAX_WORKERS`]. In monotonic
    /// mode this is per source.
    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n;
        self
    }

    /// Ids requested per fetch.
    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = Some(n);
        self
    }

    /// Deadline for each fetch attempt.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    /// Delay between failed fetch attempts.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.config.backoff = backoff;
        self
    }

    /// Merge buckets so that ids come out in nondecreasing order.
    pub fn monotonic(mut self) -> Self {
        self.config.topology = Topology::Monotonic;
        self
    }

    /// Seeds source selection and backoff jitter.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Adds a source to pull batches from.
    pub fn source<S>(mut self, source: S) -> Self
    where
        S: Source + 'static,
    {
        self.sources.push(Arc::new(source));
        self
    }

    /// Adds several shared sources.
    pub fn sources<I>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Source>>,
    {
        self.sources.extend(sources);
        self
    }

    /// Validates the configuration and spawns the pool's tasks on the current
    /// Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a setting is out of range, no
    /// source was given, or there is no runtime to spawn on.
    pub fn build(self) -> Result<Pool> {
        let Self { config, sources } = self;
        config.validate()?;
        if sources.is_empty() {
            return Err(Error::invalid_config("at least one source is required"));
        }
        let handle = Handle::try_current()
            .map_err(|_| Error::invalid_config("a pool must be built inside a Tokio runtime"))?;

        let shutdown = CancellationToken::new();
        let mut seeds = StdRng::seed_from_u64(config.seed.unwrap_or_else(rand::random));
        let (out, ids) = queue::channel(config.buffer_size, None);

        let spawn_worker = |id: usize,
                            sources: Vec<Arc<dyn Source>>,
                            producer: queue::Producer,
                            seed: u64| {
            let worker = Worker {
                id,
                sources,
                batch_size: config.batch_size(),
                fetch_timeout: config.fetch_timeout,
                backoff: config.backoff,
                rng: StdRng::seed_from_u64(seed),
                queue: producer,
                shutdown: shutdown.clone(),
            };
            handle.spawn(worker.run())
        };

        let mut tasks = Vec::new();
        match config.topology {
            Topology::Fifo => {
                for id in 0..config.workers {
                    tasks.push(spawn_worker(id, sources.clone(), out.clone(), seeds.random()));
                }
            }
            Topology::Monotonic => {
                let wake = Arc::new(Notify::new());
                let mut buckets = Vec::with_capacity(sources.len() * config.workers);
                for source in &sources {
                    for _ in 0..config.workers {
                        let (producer, rx) =
                            queue::channel(config.buffer_size, Some(Arc::clone(&wake)));
                        buckets.push(Bucket::new(rx));
                        tasks.push(spawn_worker(
                            tasks.len(),
                            vec![Arc::clone(source)],
                            producer,
                            seeds.random(),
                        ));
                    }
                }
                let merge = Merge::new(buckets, wake);
                tasks.push(handle.spawn(merge::merge_loop(merge, out.clone(), shutdown.clone())));
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Started {:?} pool: {} tasks over {} sources, buffer {}, batch {}",
            config.topology,
            tasks.len(),
            sources.len(),
            config.buffer_size,
            config.batch_size()
        );

        Ok(Pool {
            ids: Mutex::new(ids),
            shutdown,
            tasks: Mutex::new(tasks),
            topology: config.topology,
        })
    }
}
