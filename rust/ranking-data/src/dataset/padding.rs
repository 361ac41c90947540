// rust/ranking-data/src/dataset/padding.rs

use tracing::debug;

use crate::error::Result;
use crate::features::ParsedBatch;

enum State {
    /// First pass, forwarding upstream batches into the cache.
    Reading,
    /// Upstream is exhausted; appending padding batches.
    Padding,
    /// Cycling over the cache.
    Replaying,
    /// Returned an error or had nothing to replay.
    Done,
}

/// Evaluation tail: pads the stream so every worker yields the same number
/// of batches per pass, then repeats the pass from memory.
///
/// The first pass forwards upstream batches, then appends `padding_batches`
/// copies of the first batch relabeled as padding, cutting the whole at
/// `num_batches`. Everything emitted is cached and replayed forever after.
/// If upstream plus padding is shorter than `num_batches`, each pass is just
/// that long.
pub struct PaddedRepeat<I> {
    inner: Option<I>,
    num_batches: usize,
    padding_batches: usize,
    padding: Option<ParsedBatch>,
    padding_emitted: usize,
    cache: Vec<ParsedBatch>,
    replay_position: usize,
    state: State,
}

impl<I> PaddedRepeat<I>
where
    I: Iterator<Item = Result<ParsedBatch>>,
{
    pub fn new(inner: I, num_batches: usize, padding_batches: usize) -> Self {
        Self {
            inner: Some(inner),
            num_batches,
            padding_batches,
            padding: None,
            padding_emitted: 0,
            cache: Vec::new(),
            replay_position: 0,
            state: State::Reading,
        }
    }

    fn emit(&mut self, batch: ParsedBatch) -> Option<Result<ParsedBatch>> {
        self.cache.push(batch.clone());
        if self.cache.len() >= self.num_batches {
            self.finish_pass();
        }
        Some(Ok(batch))
    }

    fn finish_pass(&mut self) {
        self.inner = None;
        self.padding = None;
        debug!(
            batches = self.cache.len(),
            padding = self.padding_emitted,
            "evaluation pass cached"
        );
        self.state = if self.cache.is_empty() {
            State::Done
        } else {
            State::Replaying
        };
    }
}

impl<I> Iterator for PaddedRepeat<I>
where
    I: Iterator<Item = Result<ParsedBatch>>,
{
    type Item = Result<ParsedBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                State::Reading => {
                    if self.cache.len() >= self.num_batches {
                        self.finish_pass();
                        continue;
                    }
                    let next = self.inner.as_mut().and_then(Iterator::next);
                    match next {
                        Some(Ok(batch)) => {
                            if self.padding.is_none() {
                                self.padding = Some(batch.to_padding());
                            }
                            return self.emit(batch);
                        }
                        Some(Err(e)) => {
                            self.inner = None;
                            self.state = State::Done;
                            return Some(Err(e));
                        }
                        None => {
                            self.inner = None;
                            self.state = State::Padding;
                        }
                    }
                }
                State::Padding => {
                    let padding = match &self.padding {
                        Some(padding) if self.padding_emitted < self.padding_batches => {
                            padding.clone()
                        }
                        _ => {
                            self.finish_pass();
                            continue;
                        }
                    };
                    self.padding_emitted += 1;
                    return self.emit(padding);
                }
                State::Replaying => {
                    let batch = self.cache[self.replay_position].clone();
                    self.replay_position = (self.replay_position + 1) % self.cache.len();
                    return Some(Ok(batch));
                }
                State::Done => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use ndarray::{Array1, Array2};
    use std::collections::BTreeMap;

    /// A one-row batch whose dense value identifies it.
    fn batch(id: usize) -> ParsedBatch {
        ParsedBatch {
            clicked: Array1::from_elem(1, (id % 2) as i64),
            dense_features: Array2::from_elem((1, 13), id as f32),
            sparse_features: BTreeMap::new(),
        }
    }

    fn ids(batches: &[ParsedBatch]) -> Vec<f32> {
        batches.iter().map(|b| b.dense_features[[0, 0]]).collect()
    }

    fn run(real: usize, num_batches: usize, padding: usize, take: usize) -> Vec<ParsedBatch> {
        PaddedRepeat::new((0..real).map(|i| Ok(batch(i))), num_batches, padding)
            .take(take)
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_pads_to_num_batches_then_repeats() {
        let out = run(3, 5, 100, 12);

        assert_eq!(out.len(), 12);
        assert_eq!(ids(&out[..5]), vec![0.0, 1.0, 2.0, 0.0, 0.0]);
        assert!(out[..3].iter().all(|b| !b.is_padding()));
        assert!(out[3..5].iter().all(ParsedBatch::is_padding));

        // Second and third passes replay the first
        assert_eq!(out[5..10], out[..5]);
        assert_eq!(out[10..12], out[..2]);
    }

    #[test]
    fn test_truncates_real_batches() {
        let out = run(10, 4, 100, 8);

        assert_eq!(ids(&out), vec![0.0, 1.0, 2.0, 3.0, 0.0, 1.0, 2.0, 3.0]);
        assert!(out.iter().all(|b| !b.is_padding()));
    }

    #[test]
    fn test_short_pass_when_padding_runs_out() {
        let out = run(2, 10, 3, 10);

        // Each pass is 2 real + 3 padding
        assert_eq!(out[5..10], out[..5]);
        assert_eq!(out.iter().filter(|b| b.is_padding()).count(), 6);
    }

    #[test]
    fn test_padding_copies_first_batch() {
        let out = run(2, 3, 100, 3);
        let padding = &out[2];

        assert!(padding.is_padding());
        assert_eq!(padding.dense_features, out[0].dense_features);
        assert_eq!(padding.clicked.to_vec(), vec![-1]);
    }

    #[test]
    fn test_empty_input() {
        let mut padded = PaddedRepeat::new(std::iter::empty(), 5, 100);
        assert!(padded.next().is_none());
        assert!(padded.next().is_none());
    }

    #[test]
    fn test_error_ends_stream() {
        let input = vec![Ok(batch(0)), Err(DataError::parse("bad")), Ok(batch(2))];
        let mut padded = PaddedRepeat::new(input.into_iter(), 5, 100);

        assert!(padded.next().unwrap().is_ok());
        assert!(padded.next().unwrap().is_err());
        assert!(padded.next().is_none());
    }
}
