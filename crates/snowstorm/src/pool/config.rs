use crate::{Error, Result};
use core::time::Duration;
use rand::Rng;

/// Largest accepted buffer capacity.
pub const MAX_BUFFER_SIZE: usize = 65_384;

/// Largest accepted number of workers (per source, in monotonic mode).
pub const MAX_WORKERS: usize = 100;

pub const DEFAULT_BUFFER_SIZE: usize = 4096;
pub const DEFAULT_WORKERS: usize = 8;

/// Ids requested per fetch in FIFO mode.
pub const DEFAULT_BATCH_SIZE: usize = 512;

/// Ids requested per fetch in monotonic mode. Smaller batches keep bucket
/// heads fresh.
pub const MONOTONIC_BATCH_SIZE: usize = 128;

/// Deadline for a single fetch attempt.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// How a [`Pool`] turns batches into a single stream of ids.
///
/// [`Pool`]: crate::Pool
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Topology {
    /// All workers feed one shared queue. Ids come out in arrival order,
    /// which interleaves batches arbitrarily.
    #[default]
    Fifo,

    /// One bucket per (source, worker) pair, merged so that the output never
    /// decreases. A lagging bucket can stall the merge.
    Monotonic,
}

/// Delay applied after a failed fetch: `base` plus a uniformly random amount
/// in `[0, jitter)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub jitter: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(250),
            jitter: Duration::from_millis(100),
        }
    }
}

impl Backoff {
    pub fn delay<R: Rng>(&self, rng: &mut R) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.base;
        }
        self.base + Duration::from_millis(rng.random_range(0..jitter_ms))
    }
}

/// Tuning knobs for a [`Pool`]. Usually filled in through [`PoolBuilder`].
///
/// [`Pool`]: crate::Pool
/// [`PoolBuilder`]: crate::PoolBuilder
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Capacity of the output queue, and of every bucket in monotonic mode.
    pub buffer_size: usize,

    /// Worker tasks in FIFO mode; workers per source in monotonic mode.
    pub workers: usize,

    /// Ids per fetch. `None` picks [`DEFAULT_BATCH_SIZE`] or
    /// [`MONOTONIC_BATCH_SIZE`] depending on the topology.
    pub batch_size: Option<usize>,

    pub fetch_timeout: Duration,
    pub backoff: Backoff,
    pub topology: Topology,

    /// Seed for source selection and backoff jitter. `None` seeds from the
    /// thread-local rng.
    pub seed: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            workers: DEFAULT_WORKERS,
            batch_size: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            backoff: Backoff::default(),
            topology: Topology::default(),
            seed: None,
        }
    }
}

impl PoolConfig {
    /// Resolved batch size for this configuration.
    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(match self.topology {
            Topology::Fifo => DEFAULT_BATCH_SIZE,
            Topology::Monotonic => MONOTONIC_BATCH_SIZE,
        })
    }

    /// Checks every bound.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first setting out of range.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_BUFFER_SIZE).contains(&self.buffer_size) {
            return Err(Error::invalid_config(format!(
                "buffer size must be between 1 and {MAX_BUFFER_SIZE}, got {}",
                self.buffer_size
            )));
        }
        if !(1..=MAX_WORKERS).contains(&self.workers) {
            return Err(Error::invalid_config(format!(
                "worker count must be between 1 and {MAX_WORKERS}, got {}",
                self.workers
            )));
        }
        if self.batch_size() == 0 {
            return Err(Error::invalid_config("batch size must be greater than 0"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(Error::invalid_config(
                "fetch timeout must be greater than 0",
            ));
        }
        Ok(())
    }
}
