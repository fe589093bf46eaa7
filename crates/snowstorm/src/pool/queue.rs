//! Bounded id queues shared by workers, the merge loop and consumers.
//!
//! A [`Producer`] is the sending half. Every push races the pool's
//! cancellation token, so a worker blocked on a full queue exits as soon as
//! the pool closes. When a wake signal is attached, each successful push
//! notifies it; [`Notify`] stores a permit when nobody is waiting, so the
//! merge loop never misses the push that ended its wait.
//!
//! A [`Bucket`] is a receiving half with a one-slot peeked head, used by the
//! monotonic merge.

use std::sync::Arc;
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;

/// Creates a bounded queue of `capacity` ids.
pub(crate) fn channel(
    capacity: usize,
    wake: Option<Arc<Notify>>,
) -> (Producer, mpsc::Receiver<i64>) {
    let (tx, rx) = mpsc::channel(capacity);
    (Producer { tx, wake }, rx)
}

#[derive(Clone)]
pub(crate) struct Producer {
    tx: mpsc::Sender<i64>,
    wake: Option<Arc<Notify>>,
}

impl Producer {
    /// Pushes one id, waiting for room.
    ///
    /// Returns `false` if the pool is shutting down or the receiving side is
    /// gone; the id is dropped in that case.
    pub(crate) async fn push(&self, id: i64, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => false,
            sent = self.tx.send(id) => {
                if sent.is_err() {
                    return false;
                }
                if let Some(wake) = &self.wake {
                    wake.notify_one();
                }
                true
            }
        }
    }
}

/// The consuming side of one (source, worker) queue.
pub(crate) struct Bucket {
    rx: mpsc::Receiver<i64>,
    head: Option<i64>,
}

impl Bucket {
    pub(crate) const fn new(rx: mpsc::Receiver<i64>) -> Self {
        Self { rx, head: None }
    }

    /// Returns the next id without consuming it, if one is buffered.
    pub(crate) fn peek(&mut self) -> Option<i64> {
        if self.head.is_none() {
            self.head = self.rx.try_recv().ok();
        }
        self.head
    }

    /// Consumes and returns the next id, if one is buffered.
    pub(crate) fn take(&mut self) -> Option<i64> {
        self.peek();
        self.head.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    #[tokio::test]
    async fn push_then_peek_then_take() {
        let shutdown = CancellationToken::new();
        let (producer, rx) = channel(32, None);
        let mut bucket = Bucket::new(rx);

        assert!(producer.push(123, &shutdown).await);
        assert_eq!(bucket.peek(), Some(123));
        assert_eq!(bucket.peek(), Some(123));
        assert_eq!(bucket.take(), Some(123));
        assert_eq!(bucket.peek(), None);
        assert_eq!(bucket.take(), None);
    }

    #[tokio::test]
    async fn push_signals_wake() {
        let shutdown = CancellationToken::new();
        let wake = Arc::new(Notify::new());
        let (producer, _rx) = channel(32, Some(Arc::clone(&wake)));

        // Pushes before anyone waits leave a single permit behind
        assert!(producer.push(1, &shutdown).await);
        assert!(producer.push(2, &shutdown).await);
        tokio::time::timeout(Duration::from_secs(1), wake.notified())
            .await
            .expect("wake permit should be stored");
    }

    #[tokio::test]
    async fn full_queue_yields_to_cancellation() {
        let shutdown = CancellationToken::new();
        let (producer, _rx) = channel(1, None);
        assert!(producer.push(1, &shutdown).await);

        let blocked = {
            let producer = producer.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { producer.push(2, &shutdown).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        shutdown.cancel();
        let pushed = tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .expect("push should observe cancellation")
            .unwrap();
        assert!(!pushed);
    }

    #[tokio::test]
    async fn push_fails_once_receiver_is_gone() {
        let shutdown = CancellationToken::new();
        let (producer, rx) = channel(4, None);
        drop(rx);
        assert!(!producer.push(1, &shutdown).await);
    }
}
