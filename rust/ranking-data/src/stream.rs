// rust/ranking-data/src/stream.rs

//! Async adapter for tokio-based training loops.

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::Result;
use crate::features::ParsedBatch;
use crate::reader::BatchIterator;

impl BatchIterator {
    /// Moves the pipeline onto tokio's blocking pool and exposes it as a
    /// stream, buffering up to `capacity` batches.
    ///
    /// The stream ends after the first error. Dropping the stream stops the
    /// pipeline once the blocking task notices the closed channel.
    ///
    /// Note: This must be called from within a tokio runtime.
    pub fn into_stream(self, capacity: usize) -> impl Stream<Item = Result<ParsedBatch>> + Send + Unpin {
        let (sender, receiver) = mpsc::channel(capacity.max(1));

        tokio::task::spawn_blocking(move || {
            for item in self {
                let failed = item.is_err();
                if sender.blocking_send(item).is_err() || failed {
                    break;
                }
            }
        });

        ReceiverStream::new(receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DataConfig, PipelineTuning, StorageConfig};
    use crate::reader::CriteoRecordReader;
    use crate::storage::LocalStorage;
    use crate::testing::{small_schema, write_shards};
    use futures::StreamExt;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn reader(temp: &TempDir, is_training: bool) -> CriteoRecordReader {
        let schema = small_schema();
        let storage = Arc::new(LocalStorage::new(&StorageConfig {
            base_path: temp.path().to_path_buf(),
            ..Default::default()
        }));
        CriteoRecordReader::new(
            storage,
            "train/*.tfrecord",
            DataConfig {
                file_pattern: String::new(),
                global_batch_size: 2,
                num_shards: 2,
                is_training,
            },
            13,
            schema.vocab_sizes,
            schema.multi_hot_sizes,
            schema.embedding_threshold,
        )
        .with_tuning(PipelineTuning {
            private_threadpool_size: 2,
            prefetch_batches: 4,
            num_dataset_samples: 12,
            seed: Some(3),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_stream_yields_batches() {
        let temp = TempDir::new().unwrap();
        write_shards(temp.path(), 2, 2, 2, &small_schema());

        let batches = reader(&temp, false).build_pipeline(None).unwrap();
        let stream = batches.into_stream(2);

        // 4 real batches padded to 6, then repeated
        let pass: Vec<ParsedBatch> = stream.take(12).map(|b| b.unwrap()).collect().await;
        assert_eq!(pass.len(), 12);
        assert_eq!(pass.iter().filter(|b| b.is_padding()).count(), 4);
        assert_eq!(pass[..6], pass[6..]);
    }

    #[tokio::test]
    async fn test_stream_ends_after_error() {
        let temp = TempDir::new().unwrap();
        write_shards(temp.path(), 1, 2, 4, &small_schema());

        // Records hold 4 examples but the pipeline expects 2
        let batches = reader(&temp, true).build_pipeline(None).unwrap();
        let items: Vec<_> = batches.into_stream(4).collect().await;

        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }
}
