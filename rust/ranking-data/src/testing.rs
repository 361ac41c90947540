// rust/ranking-data/src/testing.rs

//! Shared fixtures for pipeline tests.

use std::path::{Path, PathBuf};

use crate::config::{SchemaConfig, StorageConfig};
use crate::features::{encode_batch, FeatureSchema, SyntheticBatchGenerator};
use crate::record::TfRecordWriter;
use crate::storage::{LocalStorage, StorageBackend};

/// Small schema: width-2 rows, every odd field above the threshold.
pub(crate) fn small_schema() -> SchemaConfig {
    SchemaConfig {
        num_dense_features: 13,
        vocab_sizes: (0..26).map(|i| if i % 2 == 0 { 50 } else { 5_000 }).collect(),
        multi_hot_sizes: (0..26).map(|i| 1 + i % 3).collect(),
        embedding_threshold: 100,
    }
}

/// The tag written into the first dense column of every row of record
/// `record` in file `file`.
pub(crate) fn tag(file: usize, record: usize) -> f32 {
    (file * 1_000 + record) as f32
}

/// Writes `num_files` TFRecord files under `dir/train`, each holding
/// `records_per_file` batches of `batch_size` examples tagged with [`tag`].
pub(crate) fn write_shards(
    dir: &Path,
    num_files: usize,
    records_per_file: usize,
    batch_size: usize,
    schema: &SchemaConfig,
) -> Vec<PathBuf> {
    let storage = LocalStorage::new(&StorageConfig {
        base_path: dir.to_path_buf(),
        buffer_size: 64 * 1024,
        ..Default::default()
    });

    let mut paths = Vec::new();
    for file in 0..num_files {
        let path = PathBuf::from(format!("train/part-{file:05}.tfrecord"));
        let mut generator = SyntheticBatchGenerator::new(
            batch_size,
            schema.vocab_sizes.clone(),
            schema.multi_hot_sizes.clone(),
            schema.embedding_threshold,
            Some(file as u64),
        )
        .unwrap();

        let mut writer = TfRecordWriter::new(storage.open_write(&path).unwrap(), &path);
        for record in 0..records_per_file {
            let mut batch = generator.next_batch();
            batch.dense_features.column_mut(0).fill(tag(file, record));
            writer
                .write_record(&encode_batch(&FeatureSchema::criteo(), &batch).unwrap())
                .unwrap();
        }
        writer.into_inner().unwrap().finish().unwrap();
        paths.push(path);
    }
    paths
}
