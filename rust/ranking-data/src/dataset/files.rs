// rust/ranking-data/src/dataset/files.rs

use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::shuffle::ShuffleBuffer;
use crate::error::Result;

type Epoch = Box<dyn Iterator<Item = Result<PathBuf>> + Send>;

/// The sequence of files one worker reads.
///
/// Evaluation reads the shard once in order. Training passes every epoch
/// through a fresh shuffle buffer and repeats forever.
pub struct FileSource {
    files: Vec<PathBuf>,
    shuffle: Option<(usize, StdRng)>,
    repeat: bool,
    current: Epoch,
    epoch: u64,
}

impl FileSource {
    /// Yields `files` once, in order.
    pub fn single_pass(files: Vec<PathBuf>) -> Self {
        let current: Epoch = Box::new(files.clone().into_iter().map(Ok));
        Self {
            files,
            shuffle: None,
            repeat: false,
            current,
            epoch: 0,
        }
    }

    /// Yields `files` forever, reshuffled each epoch with a buffer of
    /// `buffer_size`. An empty file list yields nothing.
    pub fn shuffled_repeat(files: Vec<PathBuf>, buffer_size: usize, rng: StdRng) -> Self {
        let mut source = Self {
            files,
            shuffle: Some((buffer_size, rng)),
            repeat: true,
            current: Box::new(std::iter::empty()),
            epoch: 0,
        };
        source.current = source.start_epoch();
        source
    }

    fn start_epoch(&mut self) -> Epoch {
        let files = self.files.clone().into_iter().map(Ok);
        match &mut self.shuffle {
            Some((buffer_size, rng)) => {
                let epoch_rng = StdRng::seed_from_u64(rng.gen());
                Box::new(ShuffleBuffer::new(files, *buffer_size, epoch_rng))
            }
            None => Box::new(files),
        }
    }
}

impl Iterator for FileSource {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(path) = self.current.next() {
            return Some(path);
        }
        if !self.repeat || self.files.is_empty() {
            return None;
        }

        self.epoch += 1;
        debug!(epoch = self.epoch, files = self.files.len(), "starting file epoch");
        self.current = self.start_epoch();
        self.current.next()
    }
}
