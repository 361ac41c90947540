// rust/ranking-data/src/dataset/prefetch.rs

//! Prefetching stage for hiding pipeline latency from the training loop.
//!
//! The upstream pipeline runs on a background thread that fills a bounded
//! channel, so the consumer only blocks when it outruns the producer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver};

use crate::error::{DataError, Result};

type Upstream<T> = Box<dyn Iterator<Item = Result<T>> + Send>;

/// An iterator that pulls its upstream on a background thread.
///
/// The producer stops after forwarding the first error. Dropping the
/// prefetcher stops the producer and joins it.
pub struct Prefetcher<T> {
    /// Receiver for prefetched items.
    receiver: Option<Receiver<Result<T>>>,
    /// Flag to signal the prefetch thread to stop.
    stop_flag: Arc<AtomicBool>,
    /// Handle to the prefetch thread.
    prefetch_thread: Option<JoinHandle<()>>,
    /// Upstream used directly when the buffer size is zero.
    passthrough: Option<Upstream<T>>,
    /// Set once the end or an error has been returned.
    exhausted: bool,
}

impl<T: Send + 'static> Prefetcher<T> {
    /// Starts prefetching up to `buffer_size` items from `upstream`.
    ///
    /// A `buffer_size` of zero disables the background thread and pulls
    /// `upstream` on the caller's thread.
    ///
    /// # Errors
    ///
    /// Returns a `Pipeline` error if the thread cannot be spawned.
    pub fn new<I>(upstream: I, buffer_size: usize) -> Result<Self>
    where
        I: Iterator<Item = Result<T>> + Send + 'static,
    {
        let stop_flag = Arc::new(AtomicBool::new(false));

        if buffer_size == 0 {
            return Ok(Self {
                receiver: None,
                stop_flag,
                prefetch_thread: None,
                passthrough: Some(Box::new(upstream)),
                exhausted: false,
            });
        }

        let (sender, receiver) = channel::bounded(buffer_size);
        let stop_flag_clone = Arc::clone(&stop_flag);

        let prefetch_thread = thread::Builder::new()
            .name("criteo-prefetch".to_string())
            .spawn(move || {
                for item in upstream {
                    if stop_flag_clone.load(Ordering::Relaxed) {
                        break;
                    }
                    let failed = item.is_err();
                    // Blocks while the buffer is full; fails once the
                    // consumer is gone.
                    if sender.send(item).is_err() || failed {
                        break;
                    }
                }
            })
            .map_err(|e| {
                DataError::pipeline("prefetch", format!("failed to spawn prefetch thread: {e}"))
            })?;

        Ok(Self {
            receiver: Some(receiver),
            stop_flag,
            prefetch_thread: Some(prefetch_thread),
            passthrough: None,
            exhausted: false,
        })
    }
}

impl<T> Prefetcher<T> {
    /// Stops the prefetch thread and waits for it to exit.
    fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        self.exhausted = true;

        // Unblocks a producer waiting on a full channel
        self.receiver = None;
        self.passthrough = None;

        if let Some(thread) = self.prefetch_thread.take() {
            let _ = thread.join();
        }
    }
}

impl<T> Iterator for Prefetcher<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let item = match (&mut self.passthrough, &self.receiver) {
            (Some(upstream), _) => upstream.next(),
            (None, Some(receiver)) => receiver.recv().ok(),
            (None, None) => None,
        };

        match item {
            Some(Ok(value)) => Some(Ok(value)),
            Some(Err(e)) => {
                self.exhausted = true;
                Some(Err(e))
            }
            None => {
                self.exhausted = true;
                None
            }
        }
    }
}

impl<T> Drop for Prefetcher<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
