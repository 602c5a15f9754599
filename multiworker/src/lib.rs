//! Fixed-pool bucket dispatch for parallel folds.
//!
//! A [`WorkerPool`] names a fixed number of OS threads. [`next`] turns a work
//! list into a [`BucketSource`] that hands out balanced buckets, and [`fold`]
//! drains the source: every worker folds its buckets over a local accumulator
//! seeded from a neutral value, and the partial accumulators are combined
//! pairwise with a caller-provided merge. There is no ordering guarantee
//! between workers; within one worker the fold is sequential.
//!
//! The source supports a per-bucket progress callback and cooperative
//! cancellation: once [`BucketSource::cancel`] is called, workers finish the
//! bucket they already hold and then stop pulling.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Largest bucket a single `next` call will hand out.
const MAX_BUCKET_SIZE: usize = 500;

/// A fixed number of worker threads. The pool itself owns no threads; they
/// are scoped to each [`fold`] call.
#[derive(Clone, Copy, Debug)]
pub struct WorkerPool {
  workers: usize,
}

impl WorkerPool {
  /// Create a pool of `workers` threads. Zero is clamped to one.
  pub fn new(workers: usize) -> WorkerPool {
    WorkerPool {
      workers: workers.max(1),
    }
  }

  pub fn workers(&self) -> usize {
    self.workers
  }
}

/// Progress observer invoked as `(total, finished)` after each completed
/// bucket.
pub type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

/// Cloneable cancellation handle shared between a caller and a bucket
/// source. Once set it never clears.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
  pub fn new() -> CancelFlag {
    CancelFlag::default()
  }

  /// Request cancellation. Workers finish the bucket they already hold.
  pub fn cancel(&self) {
    self.0.store(true, Ordering::Relaxed);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::Relaxed)
  }
}

/// Shared hand-out point for buckets of work items.
pub struct BucketSource<T> {
  queue: Mutex<VecDeque<T>>,
  bucket_size: usize,
  total: usize,
  finished: AtomicUsize,
  cancelled: CancelFlag,
  progress: Option<Box<ProgressFn>>,
}

/// Split `elements` into a bucket source sized for `pool`.
///
/// Small work lists are balanced across workers; large ones are capped at
/// 500 items per bucket so slow items cannot starve the pool.
pub fn next<T>(pool: &WorkerPool, elements: Vec<T>) -> BucketSource<T> {
  let total = elements.len();
  BucketSource {
    queue: Mutex::new(elements.into()),
    bucket_size: bucket_size(pool.workers(), total),
    total,
    finished: AtomicUsize::new(0),
    cancelled: CancelFlag::new(),
    progress: None,
  }
}

fn bucket_size(workers: usize, len: usize) -> usize {
  if len < workers * MAX_BUCKET_SIZE {
    (1 + len / workers).max(1)
  } else {
    MAX_BUCKET_SIZE
  }
}

impl<T> BucketSource<T> {
  /// Attach a progress observer fired after every completed bucket.
  pub fn with_progress(mut self, progress: Box<ProgressFn>) -> Self {
    self.progress = Some(progress);
    self
  }

  /// Observe an externally owned cancellation flag instead of the private
  /// one, so the caller can cancel a run it no longer holds the source for.
  pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
    self.cancelled = flag;
    self
  }

  /// Pull the next bucket, or `None` when the queue is drained or the source
  /// was cancelled.
  pub fn next(&self) -> Option<Vec<T>> {
    if self.is_cancelled() {
      return None;
    }
    let mut queue = self.queue.lock();
    if queue.is_empty() {
      return None;
    }
    let take = self.bucket_size.min(queue.len());
    Some(queue.drain(..take).collect())
  }

  /// Stop handing out buckets. Workers finish the bucket they hold.
  pub fn cancel(&self) {
    self.cancelled.cancel();
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancelled.is_cancelled()
  }

  /// Total number of items behind this source.
  pub fn total(&self) -> usize {
    self.total
  }

  /// Items folded so far across all workers.
  pub fn finished(&self) -> usize {
    self.finished.load(Ordering::Relaxed)
  }

  fn complete(&self, count: usize) {
    let done = self.finished.fetch_add(count, Ordering::Relaxed) + count;
    if let Some(progress) = &self.progress {
      progress(self.total, done);
    }
  }
}

/// Fold every item of `source` through `job` on `pool`'s workers.
///
/// Each worker starts from a clone of `neutral`; partial accumulators are
/// combined pairwise with `merge` in worker-completion order. A panic inside
/// `job` is resumed on the calling thread after the pool drains.
pub fn fold<T, A, J, M>(pool: &WorkerPool, source: &BucketSource<T>, neutral: A, job: J, merge: M) -> A
where
  T: Send,
  A: Clone + Send,
  J: Fn(A, T) -> A + Sync,
  M: Fn(A, A) -> A,
{
  tracing::debug!(
    target: "multiworker",
    workers = pool.workers(),
    total = source.total(),
    bucket_size = source.bucket_size,
    "starting fold"
  );
  thread::scope(|scope| {
    let job = &job;
    let handles: Vec<_> = (0..pool.workers())
      .map(|_| {
        let seed = neutral.clone();
        scope.spawn(move || worker_loop(source, seed, job))
      })
      .collect();
    let mut acc: Option<A> = None;
    for handle in handles {
      let partial = match handle.join() {
        Ok(partial) => partial,
        Err(payload) => panic::resume_unwind(payload),
      };
      acc = Some(match acc {
        Some(prev) => merge(prev, partial),
        None => partial,
      });
    }
    acc.unwrap_or_else(|| neutral.clone())
  })
}

fn worker_loop<T, A>(source: &BucketSource<T>, mut acc: A, job: &impl Fn(A, T) -> A) -> A {
  while let Some(bucket) = source.next() {
    let count = bucket.len();
    for item in bucket {
      acc = job(acc, item);
    }
    source.complete(count);
  }
  acc
}
