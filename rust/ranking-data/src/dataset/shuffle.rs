// rust/ranking-data/src/dataset/shuffle.rs

use rand::rngs::StdRng;
use rand::Rng;

use crate::error::Result;

/// Fixed-size shuffle buffer over a fallible stream.
///
/// The buffer is filled from upstream, then each call hands out a uniformly
/// chosen buffered item and refills the slot. An upstream error is passed on
/// as soon as it is pulled and ends the stream; buffered items are dropped.
pub struct ShuffleBuffer<I, T> {
    inner: I,
    buffer: Vec<T>,
    capacity: usize,
    rng: StdRng,
    exhausted: bool,
    failed: bool,
}

impl<I, T> ShuffleBuffer<I, T>
where
    I: Iterator<Item = Result<T>>,
{
    pub fn new(inner: I, capacity: usize, rng: StdRng) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner,
            buffer: Vec::with_capacity(capacity),
            capacity,
            rng,
            exhausted: false,
            failed: false,
        }
    }
}

impl<I, T> Iterator for ShuffleBuffer<I, T>
where
    I: Iterator<Item = Result<T>>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        while !self.exhausted && self.buffer.len() < self.capacity {
            match self.inner.next() {
                Some(Ok(item)) => self.buffer.push(item),
                Some(Err(e)) => {
                    self.failed = true;
                    self.buffer.clear();
                    return Some(Err(e));
                }
                None => self.exhausted = true,
            }
        }

        if self.buffer.is_empty() {
            return None;
        }

        let index = self.rng.gen_range(0..self.buffer.len());
        Some(Ok(self.buffer.swap_remove(index)))
    }
}
