use crate::{
    Error, Result, Source,
    pool::{config::Backoff, queue::Producer},
};
use core::time::Duration;
use rand::{Rng, rngs::StdRng};
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

/// A fetch loop feeding one queue.
///
/// Workers share nothing but their queue and the pool's cancellation token.
/// In FIFO mode every worker holds all sources and picks one at random per
/// attempt; in monotonic mode each worker is pinned to a single source.
pub(crate) struct Worker {
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    pub(crate) id: usize,
    pub(crate) sources: Vec<Arc<dyn Source>>,
    pub(crate) batch_size: usize,
    pub(crate) fetch_timeout: Duration,
    pub(crate) backoff: Backoff,
    pub(crate) rng: StdRng,
    pub(crate) queue: Producer,
    pub(crate) shutdown: CancellationToken,
}

impl Worker {
    /// Runs until the pool is cancelled.
    ///
    /// Fetch failures (including timeouts and short batches) are logged and
    /// retried after a jittered backoff, forever. Ids fetched but not yet
    /// pushed when cancellation arrives are dropped.
    pub(crate) async fn run(mut self) {
        #[cfg(feature = "tracing")]
        tracing::trace!("Worker {} started", self.id);

        'fetch: loop {
            let source = self.pick_source();
            let attempt = fetch_batch(source.as_ref(), self.batch_size, self.fetch_timeout);

            let fetched = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break 'fetch,
                fetched = attempt => fetched,
            };

            match fetched {
                Ok(ids) => {
                    for id in ids {
                        if !self.queue.push(id, &self.shutdown).await {
                            break 'fetch;
                        }
                    }
                }
                Err(_e) => {
                    let delay = self.backoff.delay(&mut self.rng);

                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        "Worker {} fetch failed, retrying in {delay:?}: {_e}",
                        self.id
                    );

                    tokio::select! {
                        biased;
                        () = self.shutdown.cancelled() => break 'fetch,
                        () = sleep(delay) => {}
                    }
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::trace!("Worker {} stopped", self.id);
    }

    fn pick_source(&mut self) -> Arc<dyn Source> {
        let index = match self.sources.len() {
            1 => 0,
            len => self.rng.random_range(0..len),
        };
        Arc::clone(&self.sources[index])
    }
}

/// One fetch attempt, bounded by `deadline`. A batch of the wrong size counts
/// as a failure.
pub(crate) async fn fetch_batch(
    source: &dyn Source,
    batch_size: usize,
    deadline: Duration,
) -> Result<Vec<i64>> {
    let ids = timeout(deadline, source.fetch(batch_size))
        .await
        .map_err(|_| Error::FetchTimeout(deadline))??;

    if ids.len() != batch_size {
        return Err(Error::ShortBatch {
            expected: batch_size,
            received: ids.len(),
        });
    }
    Ok(ids)
}
