// rust/ranking-data/src/dataset/interleave.rs

//! Parallel, deterministic record reads across files.
//!
//! Each open file gets a reader thread that decodes TFRecord frames into a
//! bounded channel. The consumer visits the open files round-robin, taking
//! one record from each in turn, so the output order depends only on the
//! file order and never on thread timing.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::debug;

use crate::error::{DataError, Result};
use crate::record::TfRecordReader;
use crate::storage::StorageBackend;

type RecordItem = Result<Vec<u8>>;

/// One open file: the receiving end of its reader thread.
struct FileSlot {
    path: PathBuf,
    receiver: Receiver<RecordItem>,
    handle: Option<JoinHandle<()>>,
}

impl FileSlot {
    /// Disconnects the reader thread and waits for it to exit.
    fn close(self) {
        let FileSlot {
            path,
            receiver,
            handle,
        } = self;
        // The reader is blocked on `send` at worst; dropping the receiver
        // makes that send fail.
        drop(receiver);
        if let Some(handle) = handle {
            if handle.join().is_err() {
                debug!(path = %path.display(), "reader thread panicked");
            }
        }
    }
}

/// Interleaves records from up to `cycle_length` files at a time, with a
/// block length of one record.
///
/// When a file runs out its slot is refilled from the next file in the
/// source. A read error is returned once and ends the stream.
pub struct InterleavedRecordReader<F> {
    storage: Arc<dyn StorageBackend>,
    files: F,
    slots: Vec<Option<FileSlot>>,
    cycle_length: usize,
    buffer_records: usize,
    position: usize,
    files_opened: usize,
    files_exhausted: bool,
    failed: bool,
}

impl<F> InterleavedRecordReader<F>
where
    F: Iterator<Item = Result<PathBuf>>,
{
    /// Creates the reader. No file is opened until the first `next`.
    ///
    /// # Arguments
    ///
    /// * `storage` - Backend the files are opened through
    /// * `files` - File sequence, possibly infinite
    /// * `cycle_length` - Number of files read concurrently
    /// * `buffer_records` - Records each reader thread may decode ahead
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        files: F,
        cycle_length: usize,
        buffer_records: usize,
    ) -> Self {
        let cycle_length = cycle_length.max(1);
        Self {
            storage,
            files,
            slots: (0..cycle_length).map(|_| None).collect(),
            cycle_length,
            buffer_records: buffer_records.max(1),
            position: 0,
            files_opened: 0,
            files_exhausted: false,
            failed: false,
        }
    }

    /// Opens the next file from the source, if any.
    fn open_next(&mut self) -> Result<Option<FileSlot>> {
        if self.files_exhausted {
            return Ok(None);
        }

        let path = match self.files.next() {
            Some(path) => path?,
            None => {
                self.files_exhausted = true;
                return Ok(None);
            }
        };

        let (sender, receiver) = channel::bounded(self.buffer_records);
        let storage = Arc::clone(&self.storage);
        let thread_path = path.clone();
        let handle = thread::Builder::new()
            .name(format!("criteo-reader-{}", self.files_opened))
            .spawn(move || read_file(storage.as_ref(), thread_path, sender))
            .map_err(|e| {
                DataError::pipeline("interleave", format!("failed to spawn reader thread: {e}"))
            })?;

        self.files_opened += 1;
        debug!(path = %path.display(), opened = self.files_opened, "opened record file");

        Ok(Some(FileSlot {
            path,
            receiver,
            handle: Some(handle),
        }))
    }

    fn fail(&mut self, error: DataError) -> Option<RecordItem> {
        self.failed = true;
        self.close_all();
        Some(Err(error))
    }
}

impl<F> InterleavedRecordReader<F> {
    fn close_all(&mut self) {
        for slot in self.slots.iter_mut().filter_map(Option::take) {
            slot.close();
        }
    }
}

impl<F> Iterator for InterleavedRecordReader<F>
where
    F: Iterator<Item = Result<PathBuf>>,
{
    type Item = RecordItem;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if self.files_exhausted && self.slots.iter().all(Option::is_none) {
                return None;
            }

            let index = self.position;
            if self.slots[index].is_none() {
                match self.open_next() {
                    Ok(Some(slot)) => self.slots[index] = Some(slot),
                    Ok(None) => {
                        self.position = (index + 1) % self.cycle_length;
                        continue;
                    }
                    Err(e) => return self.fail(e),
                }
            }

            let received = match &self.slots[index] {
                Some(slot) => slot.receiver.recv(),
                None => continue,
            };

            match received {
                Ok(Ok(record)) => {
                    self.position = (index + 1) % self.cycle_length;
                    return Some(Ok(record));
                }
                Ok(Err(e)) => return self.fail(e),
                Err(_) => {
                    // Sender dropped: the file is fully read
                    if let Some(slot) = self.slots[index].take() {
                        debug!(path = %slot.path.display(), "finished record file");
                        slot.close();
                    }
                    self.position = (index + 1) % self.cycle_length;
                }
            }
        }
    }
}

impl<F> Drop for InterleavedRecordReader<F> {
    fn drop(&mut self) {
        self.close_all();
    }
}

/// Reader thread body: decodes `path` into `sender` until the file ends,
/// a record fails or the consumer goes away.
fn read_file(storage: &dyn StorageBackend, path: PathBuf, sender: Sender<RecordItem>) {
    let reader = match storage.open_read(&path) {
        Ok(reader) => reader,
        Err(e) => {
            let _ = sender.send(Err(e));
            return;
        }
    };

    for record in TfRecordReader::new(reader, &path) {
        let failed = record.is_err();
        if sender.send(record).is_err() || failed {
            return;
        }
    }
}
