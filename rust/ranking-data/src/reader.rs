// rust/ranking-data/src/reader.rs

//! The Criteo record reader.
//!
//! [`CriteoRecordReader`] holds the dataset description and builds a fresh
//! pipeline for each worker:
//!
//! 1. Glob the file pattern and keep this worker's round-robin shard.
//! 2. Training only: shuffle the shard's files each epoch and repeat forever.
//! 3. Read up to `parallelism` files at once, interleaving their records.
//! 4. Parse records into batches on a private thread pool, in order.
//! 5. Shuffle parsed batches.
//! 6. Evaluation only: pad to a fixed batch count, cache and repeat.
//! 7. Prefetch on a background thread.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::config::{DataConfig, PipelineConfig, PipelineTuning};
use crate::dataset::{
    build_thread_pool, read_parallelism, shard_files, FileSource, InterleavedRecordReader,
    PaddedRepeat, ParallelMap, Prefetcher, ShuffleBuffer,
};
use crate::error::{DataError, Result};
use crate::features::{BatchParser, FeatureSchema, ParsedBatch};
use crate::storage::{LocalStorage, StorageBackend};

/// Seed offset between workers, so workers sharing a base seed shuffle
/// differently.
const WORKER_SEED_STRIDE: u64 = 1_000;

/// Where a pipeline sits in a distributed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputContext {
    /// Number of workers, each running its own pipeline.
    pub num_input_pipelines: usize,
    /// Index of this worker in `[0, num_input_pipelines)`.
    pub input_pipeline_id: usize,
    /// Number of replicas the global batch is split across.
    pub num_replicas_in_sync: usize,
}

impl InputContext {
    pub fn new(num_input_pipelines: usize, input_pipeline_id: usize, num_replicas_in_sync: usize) -> Self {
        Self {
            num_input_pipelines,
            input_pipeline_id,
            num_replicas_in_sync,
        }
    }

    /// The batch size each replica sees.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if `global_batch_size` does not split evenly.
    pub fn per_replica_batch_size(&self, global_batch_size: usize) -> Result<usize> {
        if self.num_replicas_in_sync == 0 {
            return Err(DataError::config("num_replicas_in_sync must be greater than 0"));
        }
        if global_batch_size % self.num_replicas_in_sync != 0 {
            return Err(DataError::config(format!(
                "global batch size {global_batch_size} is not divisible by {} replicas",
                self.num_replicas_in_sync
            )));
        }
        Ok(global_batch_size / self.num_replicas_in_sync)
    }
}

/// Factory for per-worker Criteo input pipelines.
///
/// Construction only records its arguments. Files are listed and opened by
/// [`CriteoRecordReader::build_pipeline`], once per call.
#[derive(Clone)]
pub struct CriteoRecordReader {
    storage: Arc<dyn StorageBackend>,
    file_pattern: String,
    data: DataConfig,
    num_dense_features: usize,
    vocab_sizes: Vec<u64>,
    multi_hot_sizes: Vec<usize>,
    embedding_threshold: u64,
    schema: FeatureSchema,
    tuning: PipelineTuning,
}

impl CriteoRecordReader {
    /// Creates a reader over the files matching `file_pattern`.
    ///
    /// # Arguments
    ///
    /// * `storage` - Backend used to list and open files
    /// * `file_pattern` - Glob pattern of the TFRecord files
    /// * `data` - Batch size, file-count hint and training/evaluation mode
    /// * `num_dense_features` - Number of dense fields
    /// * `vocab_sizes` - Vocabulary size per sparse field
    /// * `multi_hot_sizes` - Ids per example per sparse field
    /// * `embedding_threshold` - Fields with vocabularies at or below this stay dense
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        file_pattern: impl Into<String>,
        data: DataConfig,
        num_dense_features: usize,
        vocab_sizes: Vec<u64>,
        multi_hot_sizes: Vec<usize>,
        embedding_threshold: u64,
    ) -> Self {
        Self {
            storage,
            file_pattern: file_pattern.into(),
            data,
            num_dense_features,
            vocab_sizes,
            multi_hot_sizes,
            embedding_threshold,
            schema: FeatureSchema::criteo(),
            tuning: PipelineTuning::default(),
        }
    }

    /// Builds a reader on local storage from a full configuration.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the configuration does not validate.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(&config.storage));

        let reader = Self::new(
            storage,
            config.data.file_pattern.clone(),
            config.data.clone(),
            config.schema.num_dense_features,
            config.schema.vocab_sizes.clone(),
            config.schema.multi_hot_sizes.clone(),
            config.schema.embedding_threshold,
        );
        Ok(reader.with_tuning(config.pipeline.clone()))
    }

    /// Replaces the buffer sizes, thread counts and seed.
    #[must_use]
    pub fn with_tuning(mut self, tuning: PipelineTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn file_pattern(&self) -> &str {
        &self.file_pattern
    }

    pub fn is_training(&self) -> bool {
        self.data.is_training
    }

    /// Batches per evaluation pass: every worker yields this many, so the
    /// dataset is covered at the global batch size.
    pub fn num_eval_batches(&self) -> usize {
        let global = self.data.global_batch_size.max(1) as u64;
        let batches = self.tuning.num_dataset_samples.div_ceil(global);
        usize::try_from(batches).unwrap_or(usize::MAX)
    }

    /// Builds the pipeline for one worker.
    ///
    /// `None` runs a single worker with the full global batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch size does not divide across replicas,
    /// the worker id is out of range, the pattern is invalid or a pipeline
    /// thread cannot be started. Errors while reading come out of the
    /// iterator instead.
    pub fn build_pipeline(&self, ctx: Option<&InputContext>) -> Result<BatchIterator> {
        self.tuning.validate()?;

        let (worker_id, num_workers, batch_size) = match ctx {
            Some(ctx) => (
                ctx.input_pipeline_id,
                ctx.num_input_pipelines,
                ctx.per_replica_batch_size(self.data.global_batch_size)?,
            ),
            None => (0, 1, self.data.global_batch_size),
        };

        let files = self.storage.glob(&self.file_pattern)?;
        if files.is_empty() {
            warn!(pattern = %self.file_pattern, "no files match pattern");
        }
        let shard = shard_files(&files, worker_id, num_workers)?;
        let parallelism = read_parallelism(
            self.data.num_shards,
            num_workers,
            self.tuning.max_read_parallelism,
        );

        let base_seed = self.tuning.seed.unwrap_or_else(rand::random);
        let mut rng =
            StdRng::seed_from_u64(base_seed.wrapping_add(worker_id as u64 * WORKER_SEED_STRIDE));

        info!(
            worker_id,
            num_workers,
            batch_size,
            files = files.len(),
            shard_files = shard.len(),
            parallelism,
            training = self.data.is_training,
            dense_features = self.num_dense_features,
            "building criteo input pipeline"
        );

        let file_source = if self.data.is_training {
            FileSource::shuffled_repeat(shard, parallelism, StdRng::seed_from_u64(rng.gen()))
        } else {
            FileSource::single_pass(shard)
        };

        let records = InterleavedRecordReader::new(
            Arc::clone(&self.storage),
            file_source,
            parallelism,
            self.tuning.reader_buffer_records,
        );

        let parser = BatchParser::new(
            self.schema.clone(),
            batch_size,
            self.vocab_sizes.clone(),
            self.multi_hot_sizes.clone(),
            self.embedding_threshold,
        );
        let pool = build_thread_pool(self.tuning.private_threadpool_size, "criteo-parse")?;
        let parsed = ParallelMap::new(records, pool, parallelism, move |record: Vec<u8>| {
            parser.parse(&record)
        });

        let shuffled = ShuffleBuffer::new(
            parsed,
            self.tuning.shuffle_buffer_size,
            StdRng::seed_from_u64(rng.gen()),
        );

        let prefetcher = if self.data.is_training {
            Prefetcher::new(shuffled, self.tuning.prefetch_batches)?
        } else {
            let num_batches = self.num_eval_batches();
            info!(
                num_batches,
                padding_batches = self.tuning.eval_padding_batches,
                "padding evaluation pipeline"
            );
            let padded = PaddedRepeat::new(shuffled, num_batches, self.tuning.eval_padding_batches);
            Prefetcher::new(padded, self.tuning.prefetch_batches)?
        };

        Ok(BatchIterator {
            inner: prefetcher,
            batch_size,
            parallelism,
        })
    }
}

/// The batches of one worker's pipeline.
///
/// Training pipelines never end. Evaluation pipelines repeat a fixed pass.
/// Either ends early after yielding an error.
pub struct BatchIterator {
    inner: Prefetcher<ParsedBatch>,
    batch_size: usize,
    parallelism: usize,
}

impl BatchIterator {
    /// Examples per batch on this worker.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of files read at once.
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }
}

impl Iterator for BatchIterator {
    type Item = Result<ParsedBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}
