// rust/ranking-data/src/lib.rs

//! Ranking Data - Criteo Input Pipeline
//!
//! This crate reads pre-batched Criteo click-log records from TFRecord files
//! and turns them into `ndarray` batches for a distributed training loop,
//! including sharding across workers, parallel reads, shuffling, evaluation
//! padding and prefetching.

pub mod config;
pub mod error;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::{DataConfig, PipelineConfig, PipelineTuning, SchemaConfig, NUM_DATASET_SAMPLES};
pub use error::{DataError, Result};
pub use storage::{LocalStorage, StorageBackend, StorageReader, StorageWriter};

pub mod record;
pub use record::{Example, TfRecordReader, TfRecordWriter};

pub mod features;
pub use features::{
    encode_batch, BatchParser, FeatureSchema, ParsedBatch, SparseFeature, SparseTensor,
    SyntheticBatchGenerator, PADDING_LABEL,
};

pub mod dataset;

pub mod reader;
pub use reader::{BatchIterator, CriteoRecordReader, InputContext};

mod stream;

#[cfg(test)]
mod testing;
