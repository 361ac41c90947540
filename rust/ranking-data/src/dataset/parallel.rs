// rust/ranking-data/src/dataset/parallel.rs

//! Order-preserving parallel map on a private thread pool.

use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam::channel::{self, Receiver};
use rayon::ThreadPool;

use crate::error::{DataError, Result};

/// Builds the private pool parse work runs on.
///
/// # Errors
///
/// Returns a `Pipeline` error if the pool's threads cannot be started.
pub fn build_thread_pool(num_threads: usize, name: &'static str) -> Result<Arc<ThreadPool>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .thread_name(move |i| format!("{name}-{i}"))
        .build()
        .map_err(|e| DataError::pipeline("parallel_map", format!("failed to build thread pool: {e}")))?;
    Ok(Arc::new(pool))
}

/// Applies `func` to upstream items on a rayon pool, keeping up to
/// `max_in_flight` calls running while emitting results in input order.
///
/// The first error, from upstream or from `func`, is returned after every
/// item before it and ends the stream.
pub struct ParallelMap<I, T, U, F> {
    inner: I,
    func: Arc<F>,
    pool: Arc<ThreadPool>,
    in_flight: VecDeque<Receiver<Result<U>>>,
    max_in_flight: usize,
    upstream_done: bool,
    pending_error: Option<DataError>,
    failed: bool,
    _input: std::marker::PhantomData<fn(T)>,
}

impl<I, T, U, F> ParallelMap<I, T, U, F>
where
    I: Iterator<Item = Result<T>>,
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> Result<U> + Send + Sync + 'static,
{
    pub fn new(inner: I, pool: Arc<ThreadPool>, max_in_flight: usize, func: F) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            inner,
            func: Arc::new(func),
            pool,
            in_flight: VecDeque::with_capacity(max_in_flight),
            max_in_flight,
            upstream_done: false,
            pending_error: None,
            failed: false,
            _input: std::marker::PhantomData,
        }
    }

    /// Pulls from upstream until `max_in_flight` calls are running.
    fn fill(&mut self) {
        while !self.upstream_done && self.in_flight.len() < self.max_in_flight {
            match self.inner.next() {
                Some(Ok(item)) => {
                    let (sender, receiver) = channel::bounded(1);
                    let func = Arc::clone(&self.func);
                    self.pool.spawn(move || {
                        let _ = sender.send(func(item));
                    });
                    self.in_flight.push_back(receiver);
                }
                Some(Err(e)) => {
                    self.pending_error = Some(e);
                    self.upstream_done = true;
                }
                None => self.upstream_done = true,
            }
        }
    }

    fn fail(&mut self, error: DataError) -> Option<Result<U>> {
        self.failed = true;
        self.in_flight.clear();
        Some(Err(error))
    }
}

impl<I, T, U, F> Iterator for ParallelMap<I, T, U, F>
where
    I: Iterator<Item = Result<T>>,
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> Result<U> + Send + Sync + 'static,
{
    type Item = Result<U>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        self.fill();

        match self.in_flight.pop_front() {
            Some(receiver) => match receiver.recv() {
                Ok(Ok(value)) => Some(Ok(value)),
                Ok(Err(e)) => self.fail(e),
                Err(_) => self.fail(DataError::pipeline(
                    "parallel_map",
                    "worker exited without a result",
                )),
            },
            None => {
                let error = self.pending_error.take()?;
                self.fail(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn pool(n: usize) -> Arc<ThreadPool> {
        build_thread_pool(n, "test-pool").unwrap()
    }

    #[test]
    fn test_preserves_order() {
        let input = (0..200u64).map(Ok);

        let output: Vec<u64> = ParallelMap::new(input, pool(8), 8, |x: u64| {
            // Later items finish first
            thread::sleep(Duration::from_micros((200 - x) * 10));
            Ok(x * 2)
        })
        .map(|r| r.unwrap())
        .collect();

        assert_eq!(output, (0..200u64).map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_bounded_in_flight() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));
        let map = ParallelMap::new((0..64u32).map(Ok), pool(16), 3, move |x: u32| {
            let now = r.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(1));
            r.fetch_sub(1, Ordering::SeqCst);
            Ok(x)
        });

        assert_eq!(map.count(), 64);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_func_error_ends_stream() {
        let map = ParallelMap::new((0..10u32).map(Ok), pool(4), 4, |x: u32| {
            if x == 5 {
                Err(DataError::parse("bad record"))
            } else {
                Ok(x)
            }
        });

        let results: Vec<_> = map.collect();
        assert_eq!(results.len(), 6);
        assert!(results[..5].iter().all(|r| r.is_ok()));
        assert!(matches!(results[5], Err(DataError::Parse { .. })));
    }

    #[test]
    fn test_upstream_error_after_preceding_items() {
        let input = vec![Ok(1u32), Ok(2), Err(DataError::parse("upstream")), Ok(3)];
        let results: Vec<_> = ParallelMap::new(input.into_iter(), pool(2), 4, Ok).collect();

        assert_eq!(results.len(), 3);
        assert_eq!(*results[0].as_ref().unwrap(), 1);
        assert_eq!(*results[1].as_ref().unwrap(), 2);
        assert!(results[2].is_err());
    }

    #[test]
    fn test_pool_thread_names() {
        let pool = build_thread_pool(2, "criteo-parse").unwrap();
        let name = pool.install(|| thread::current().name().map(str::to_string));
        assert!(name.unwrap().starts_with("criteo-parse-"));
    }
}
