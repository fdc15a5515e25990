//! Division of ray casting work among threads.

use core::fmt;
use core::num::NonZeroUsize;

use crate::RenderError;

/// A fixed set of threads which ray-cast the rows of an image, created once and reused
/// for every frame.
///
/// Thread 0 is always the thread that asks for the work to be done; the pool only
/// needs to own the other `thread_count - 1`. Without the `auto-threads` feature, no
/// threads are created and the work of every thread is done in turn on the calling
/// thread.
pub struct WorkerPool {
    thread_count: NonZeroUsize,
    #[cfg(feature = "auto-threads")]
    pool: Option<rayon::ThreadPool>,
}

impl WorkerPool {
    /// Creates a pool whose work is divided `thread_count` ways.
    pub fn new(thread_count: NonZeroUsize) -> Result<Self, RenderError> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "auto-threads")] {
                let helpers = thread_count.get() - 1;
                let pool = if helpers == 0 {
                    None
                } else {
                    Some(
                        rayon::ThreadPoolBuilder::new()
                            .num_threads(helpers)
                            .thread_name(|index| format!("volcast-worker-{}", index + 1))
                            .build()
                            .map_err(|error| RenderError::ThreadPool(error.to_string()))?,
                    )
                };
                Ok(Self { thread_count, pool })
            } else {
                Ok(Self { thread_count })
            }
        }
    }

    /// Creates a pool with one thread per available hardware thread.
    pub fn with_available_parallelism() -> Result<Self, RenderError> {
        Self::new(default_thread_count())
    }

    /// Number of ways work is divided.
    pub fn thread_count(&self) -> NonZeroUsize {
        self.thread_count
    }

    /// Runs each element of `tasks` in parallel and returns when all of them have
    /// finished, with their results in task order.
    ///
    /// Task 0 is given to `first`, which runs on the calling thread and so need not be
    /// shareable between threads. Every other task is given to `others` along with its
    /// index. `tasks` should have [`thread_count()`](Self::thread_count) elements; more
    /// are permitted but will not all run at once.
    pub fn fork_join<T, R, G, F>(&self, tasks: Vec<T>, first: G, others: F) -> Vec<R>
    where
        T: Send,
        R: Send + Default,
        G: FnOnce(T) -> R,
        F: Fn(usize, T) -> R + Sync,
    {
        let mut results: Vec<R> = core::iter::repeat_with(R::default).take(tasks.len()).collect();
        let mut jobs = tasks.into_iter().zip(results.iter_mut()).enumerate();
        let head = jobs.next();

        cfg_if::cfg_if! {
            if #[cfg(feature = "auto-threads")] {
                if let Some(pool) = &self.pool {
                    let others = &others;
                    pool.in_place_scope(|scope| {
                        for (index, (task, slot)) in jobs {
                            scope.spawn(move |_| *slot = others(index, task));
                        }
                        if let Some((_, (task, slot))) = head {
                            *slot = first(task);
                        }
                    });
                    return results;
                }
            }
        }

        if let Some((_, (task, slot))) = head {
            *slot = first(task);
        }
        for (index, (task, slot)) in jobs {
            *slot = others(index, task);
        }
        results
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("thread_count", &self.thread_count)
            .field("threaded", &cfg!(feature = "auto-threads"))
            .finish_non_exhaustive()
    }
}

/// The number of hardware threads, or 1 if that cannot be determined.
pub fn default_thread_count() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

/// The rows of an image of `height` rows that are cast by thread `thread` of
/// `thread_count`: every row whose index is congruent to `thread` modulo `thread_count`.
pub fn rows_for_thread(
    thread: usize,
    thread_count: NonZeroUsize,
    height: usize,
) -> impl Iterator<Item = usize> {
    (thread..height).step_by(thread_count.get())
}

/// Splits an image buffer of rows `width` elements long into one bucket per thread,
/// following [`rows_for_thread()`]. Each row is paired with its index.
pub fn partition_rows<P>(
    buffer: &mut [P],
    width: usize,
    thread_count: NonZeroUsize,
) -> Vec<Vec<(usize, &mut [P])>> {
    let n = thread_count.get();
    let mut buckets: Vec<Vec<_>> = (0..n).map(|_| Vec::new()).collect();
    if width == 0 {
        return buckets;
    }
    for (j, row) in buffer.chunks_mut(width).enumerate() {
        buckets[j % n].push((j, row));
    }
    buckets
}
