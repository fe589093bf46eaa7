//! Monotonic merge of per-(source, worker) buckets.
//!
//! Each bucket is increasing on its own but unordered relative to its
//! siblings. The merge emits the smallest buffered head across all buckets,
//! provided it is not below the last value emitted (the watermark). Buckets
//! with nothing buffered do not take part in the comparison.
//!
//! When the smallest head is below the watermark, or nothing is buffered at
//! all, the merge waits on the shared wake signal and looks again. This
//! keeps the output nondecreasing at the cost of liveness: a bucket whose
//! source is slow or dead can hold the merge back indefinitely.

use crate::pool::queue::{Bucket, Producer};
use core::cmp::Reverse;
use std::{collections::BinaryHeap, sync::Arc};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Outcome of a single merge pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Ready(i64),
    Stalled,
}

pub(crate) struct Merge {
    buckets: Vec<Bucket>,
    /// Buffered heads keyed by `(value, bucket index)`; ties go to the lower
    /// index.
    heads: BinaryHeap<Reverse<(i64, usize)>>,
    /// Buckets whose head is not in `heads` yet.
    idle: Vec<usize>,
    watermark: Option<i64>,
    wake: Arc<Notify>,
}

impl Merge {
    pub(crate) fn new(buckets: Vec<Bucket>, wake: Arc<Notify>) -> Self {
        let len = buckets.len();
        Self {
            buckets,
            heads: BinaryHeap::with_capacity(len),
            idle: (0..len).collect(),
            watermark: None,
            wake,
        }
    }

    /// Moves the head of every idle bucket that has data into the heap.
    fn refill(&mut self) {
        let Self {
            buckets,
            heads,
            idle,
            ..
        } = self;

        idle.retain(|&i| match buckets[i].peek() {
            Some(head) => {
                heads.push(Reverse((head, i)));
                false
            }
            None => true,
        });
    }

    /// Attempts to emit the next value without waiting.
    pub(crate) fn poll_next(&mut self) -> Step {
        self.refill();

        let Some(&Reverse((head, index))) = self.heads.peek() else {
            return Step::Stalled;
        };
        if self.watermark.is_some_and(|mark| head < mark) {
            #[cfg(feature = "tracing")]
            tracing::trace!(
                "Bucket {index} head {head} is below watermark {:?}, waiting",
                self.watermark
            );
            return Step::Stalled;
        }

        self.heads.pop();
        let taken = self.buckets[index].take();
        debug_assert_eq!(taken, Some(head));
        self.idle.push(index);
        self.watermark = Some(head);
        Step::Ready(head)
    }

    /// Waits for the next value. Returns `None` once `shutdown` is cancelled.
    pub(crate) async fn next(&mut self, shutdown: &CancellationToken) -> Option<i64> {
        loop {
            match self.poll_next() {
                Step::Ready(id) => return Some(id),
                Step::Stalled => {
                    tokio::select! {
                        biased;
                        () = shutdown.cancelled() => return None,
                        () = self.wake.notified() => {}
                    }
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) const fn watermark(&self) -> Option<i64> {
        self.watermark
    }
}

/// Forwards merged ids into the pool's output queue until cancelled.
pub(crate) async fn merge_loop(mut merge: Merge, out: Producer, shutdown: CancellationToken) {
    #[cfg(feature = "tracing")]
    tracing::trace!("Merge loop started over {} buckets", merge.buckets.len());

    while let Some(id) = merge.next(&shutdown).await {
        if !out.push(id, &shutdown).await {
            break;
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Merge loop stopped");
}
