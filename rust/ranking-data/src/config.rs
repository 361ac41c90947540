// rust/ranking-data/src/config.rs

//! Configuration management for the Criteo input pipeline.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{DataError, Result};
use crate::features::schema::{NUM_DENSE_FIELDS, NUM_SPARSE_FIELDS};

/// Total number of samples in the Criteo 1TB click logs evaluation split.
///
/// Only used to size the evaluation padding tail.
pub const NUM_DATASET_SAMPLES: u64 = 89_137_319;

/// Per-field vocabulary sizes of the Criteo 1TB dataset.
pub const CRITEO_VOCAB_SIZES: [u64; NUM_SPARSE_FIELDS] = [
    40_000_000, 39_060, 17_295, 7_424, 20_265, 3, 7_122, 1_543, 63, 40_000_000, 3_067_956,
    405_282, 10, 2_209, 11_938, 155, 4, 976, 14, 40_000_000, 40_000_000, 40_000_000, 590_152,
    12_973, 108, 36,
];

/// Per-field multi-hot widths used by the DCNv2 multi-hot variant of Criteo.
pub const CRITEO_MULTI_HOT_SIZES: [usize; NUM_SPARSE_FIELDS] = [
    3, 2, 1, 2, 6, 1, 1, 1, 1, 7, 3, 8, 1, 6, 9, 5, 1, 1, 1, 12, 100, 27, 10, 3, 1, 1,
];

// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub storage: StorageConfig,
    pub data: DataConfig,
    pub schema: SchemaConfig,
    pub pipeline: PipelineTuning,
}

// Storage configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    // Base path that relative file patterns are resolved against.
    pub base_path: PathBuf,
    // Read buffer size in bytes, per open file.
    pub buffer_size: usize,
    // Whether to use memory-mapped I/O for large files.
    pub use_mmap: bool,
    // File size threshold (bytes) above which to use mmap.
    pub mmap_threshold: u64,
}

/// Dataset selection and batching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Glob pattern matching the TFRecord shards.
    pub file_pattern: String,
    /// Batch size across all replicas.
    pub global_batch_size: usize,
    /// Number of files in the dataset. Only a hint used to size read parallelism.
    pub num_shards: usize,
    /// Training pipelines shuffle and repeat; evaluation pipelines pad and cache.
    pub is_training: bool,
}

/// Shape of the sparse feature columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub num_dense_features: usize,
    pub vocab_sizes: Vec<u64>,
    pub multi_hot_sizes: Vec<usize>,
    /// Sparse fields with a vocabulary at or below this size stay dense.
    pub embedding_threshold: u64,
}

/// Buffer sizes and thread counts. None of these affect what is produced,
/// only how fast.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineTuning {
    pub max_read_parallelism: usize,
    // Records each file reader may run ahead of the interleave.
    pub reader_buffer_records: usize,
    pub shuffle_buffer_size: usize,
    pub eval_padding_batches: usize,
    pub prefetch_batches: usize,
    pub private_threadpool_size: usize,
    pub num_dataset_samples: u64,
    // Optional seed for reproducible shuffling.
    pub seed: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            buffer_size: 16 * 1024 * 1024, // 16 MB
            use_mmap: false,
            mmap_threshold: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            file_pattern: String::new(),
            global_batch_size: 1,
            num_shards: 1,
            is_training: true,
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            num_dense_features: NUM_DENSE_FIELDS,
            vocab_sizes: CRITEO_VOCAB_SIZES.to_vec(),
            multi_hot_sizes: CRITEO_MULTI_HOT_SIZES.to_vec(),
            embedding_threshold: 0,
        }
    }
}

impl Default for PipelineTuning {
    fn default() -> Self {
        Self {
            max_read_parallelism: 8,
            reader_buffer_records: 4,
            shuffle_buffer_size: 256,
            eval_padding_batches: 100,
            prefetch_batches: 2048,
            private_threadpool_size: 96,
            num_dataset_samples: NUM_DATASET_SAMPLES,
            seed: None,
        }
    }
}

impl FromStr for PipelineConfig {
    type Err = DataError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| DataError::config_with_source("failed to parse TOML config", e))
    }
}

impl PipelineConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DataError::storage_with_source(path, "failed to read config file", e)
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Environment variables are prefixed with `CRITEO_` and use underscores
    // to separate nested fields. For example:
    // - `CRITEO_DATA_FILE_PATTERN` overrides `data.file_pattern`
    // - `CRITEO_DATA_IS_TRAINING` overrides `data.is_training`
    // - `CRITEO_SCHEMA_VOCAB_SIZES` overrides `schema.vocab_sizes` (comma separated)
    // - `CRITEO_PIPELINE_SEED` overrides `pipeline.seed`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Storage overrides
        if let Ok(val) = std::env::var("CRITEO_STORAGE_BASE_PATH") {
            self.storage.base_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("CRITEO_STORAGE_BUFFER_SIZE") {
            if let Ok(v) = val.parse() {
                self.storage.buffer_size = v;
            }
        }
        if let Ok(val) = std::env::var("CRITEO_STORAGE_USE_MMAP") {
            if let Ok(v) = val.parse() {
                self.storage.use_mmap = v;
            }
        }
        if let Ok(val) = std::env::var("CRITEO_STORAGE_MMAP_THRESHOLD") {
            if let Ok(v) = val.parse() {
                self.storage.mmap_threshold = v;
            }
        }

        // Data overrides
        if let Ok(val) = std::env::var("CRITEO_DATA_FILE_PATTERN") {
            self.data.file_pattern = val;
        }
        if let Ok(val) = std::env::var("CRITEO_DATA_GLOBAL_BATCH_SIZE") {
            if let Ok(v) = val.parse() {
                self.data.global_batch_size = v;
            }
        }
        if let Ok(val) = std::env::var("CRITEO_DATA_NUM_SHARDS") {
            if let Ok(v) = val.parse() {
                self.data.num_shards = v;
            }
        }
        if let Ok(val) = std::env::var("CRITEO_DATA_IS_TRAINING") {
            if let Ok(v) = val.parse() {
                self.data.is_training = v;
            }
        }

        // Schema overrides
        if let Ok(val) = std::env::var("CRITEO_SCHEMA_VOCAB_SIZES") {
            if let Some(v) = parse_list(&val) {
                self.schema.vocab_sizes = v;
            }
        }
        if let Ok(val) = std::env::var("CRITEO_SCHEMA_MULTI_HOT_SIZES") {
            if let Some(v) = parse_list(&val) {
                self.schema.multi_hot_sizes = v;
            }
        }
        if let Ok(val) = std::env::var("CRITEO_SCHEMA_EMBEDDING_THRESHOLD") {
            if let Ok(v) = val.parse() {
                self.schema.embedding_threshold = v;
            }
        }

        // Pipeline overrides
        if let Ok(val) = std::env::var("CRITEO_PIPELINE_PREFETCH_BATCHES") {
            if let Ok(v) = val.parse() {
                self.pipeline.prefetch_batches = v;
            }
        }
        if let Ok(val) = std::env::var("CRITEO_PIPELINE_PRIVATE_THREADPOOL_SIZE") {
            if let Ok(v) = val.parse() {
                self.pipeline.private_threadpool_size = v;
            }
        }
        if let Ok(val) = std::env::var("CRITEO_PIPELINE_NUM_DATASET_SAMPLES") {
            if let Ok(v) = val.parse() {
                self.pipeline.num_dataset_samples = v;
            }
        }
        if let Ok(val) = std::env::var("CRITEO_PIPELINE_SEED") {
            if let Ok(v) = val.parse() {
                self.pipeline.seed = Some(v);
            }
        }

        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        // Storage validation
        if self.storage.buffer_size == 0 {
            return Err(DataError::config(
                "storage.buffer_size must be greater than 0",
            ));
        }

        // Data validation
        if self.data.file_pattern.is_empty() {
            return Err(DataError::config("data.file_pattern must not be empty"));
        }
        if self.data.global_batch_size == 0 {
            return Err(DataError::config(
                "data.global_batch_size must be greater than 0",
            ));
        }

        // Schema validation
        if self.schema.num_dense_features != NUM_DENSE_FIELDS {
            return Err(DataError::config(format!(
                "schema.num_dense_features must be {NUM_DENSE_FIELDS}, got {}",
                self.schema.num_dense_features
            )));
        }
        if self.schema.vocab_sizes.len() != NUM_SPARSE_FIELDS {
            return Err(DataError::config(format!(
                "schema.vocab_sizes must have {NUM_SPARSE_FIELDS} entries, got {}",
                self.schema.vocab_sizes.len()
            )));
        }
        if self.schema.multi_hot_sizes.len() != NUM_SPARSE_FIELDS {
            return Err(DataError::config(format!(
                "schema.multi_hot_sizes must have {NUM_SPARSE_FIELDS} entries, got {}",
                self.schema.multi_hot_sizes.len()
            )));
        }
        if self.schema.multi_hot_sizes.contains(&0) {
            return Err(DataError::config(
                "schema.multi_hot_sizes entries must be greater than 0",
            ));
        }

        self.pipeline.validate()
    }
}

impl PipelineTuning {
    /// Validate buffer sizes and thread counts.
    pub fn validate(&self) -> Result<()> {
        if self.max_read_parallelism == 0 {
            return Err(DataError::config(
                "pipeline.max_read_parallelism must be greater than 0",
            ));
        }
        if self.reader_buffer_records == 0 {
            return Err(DataError::config(
                "pipeline.reader_buffer_records must be greater than 0",
            ));
        }
        if self.shuffle_buffer_size == 0 {
            return Err(DataError::config(
                "pipeline.shuffle_buffer_size must be greater than 0",
            ));
        }
        if self.private_threadpool_size == 0 {
            return Err(DataError::config(
                "pipeline.private_threadpool_size must be greater than 0",
            ));
        }
        if self.num_dataset_samples == 0 {
            return Err(DataError::config(
                "pipeline.num_dataset_samples must be greater than 0",
            ));
        }
        Ok(())
    }
}

fn parse_list<T: FromStr>(val: &str) -> Option<Vec<T>> {
    val.split(',')
        .map(|item| item.trim().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.data.file_pattern = "train/*.tfrecord".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();

        assert_eq!(config.storage.base_path, PathBuf::from("."));
        assert_eq!(config.storage.buffer_size, 16 * 1024 * 1024);
        assert!(!config.storage.use_mmap);

        assert_eq!(config.data.global_batch_size, 1);
        assert_eq!(config.data.num_shards, 1);
        assert!(config.data.is_training);

        assert_eq!(config.schema.num_dense_features, 13);
        assert_eq!(config.schema.vocab_sizes.len(), 26);
        assert_eq!(config.schema.multi_hot_sizes.len(), 26);
        assert_eq!(config.schema.embedding_threshold, 0);

        assert_eq!(config.pipeline.max_read_parallelism, 8);
        assert_eq!(config.pipeline.shuffle_buffer_size, 256);
        assert_eq!(config.pipeline.eval_padding_batches, 100);
        assert_eq!(config.pipeline.prefetch_batches, 2048);
        assert_eq!(config.pipeline.private_threadpool_size, 96);
        assert_eq!(config.pipeline.num_dataset_samples, 89_137_319);
        assert!(config.pipeline.seed.is_none());
    }

    #[test]
    fn test_default_requires_file_pattern() {
        let config = PipelineConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("file_pattern"));

        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_from_str_partial() {
        let toml = r#"
            [data]
            file_pattern = "/data/criteo/eval/*"
            global_batch_size = 65536
            is_training = false
        "#;
        let config: PipelineConfig = toml.parse().unwrap();

        assert_eq!(config.data.file_pattern, "/data/criteo/eval/*");
        assert_eq!(config.data.global_batch_size, 65536);
        assert!(!config.data.is_training);
        // Other data fields should be defaults
        assert_eq!(config.data.num_shards, 1);
        // Other sections should be defaults
        assert_eq!(config.pipeline.prefetch_batches, 2048);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_full() {
        let toml = r#"
            [storage]
            base_path = "/data"
            buffer_size = 1048576
            use_mmap = true
            mmap_threshold = 2097152

            [data]
            file_pattern = "train/part-*"
            global_batch_size = 1024
            num_shards = 64
            is_training = true

            [schema]
            num_dense_features = 13
            vocab_sizes = [5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5]
            multi_hot_sizes = [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 2]
            embedding_threshold = 10

            [pipeline]
            max_read_parallelism = 4
            reader_buffer_records = 2
            shuffle_buffer_size = 16
            eval_padding_batches = 3
            prefetch_batches = 8
            private_threadpool_size = 4
            num_dataset_samples = 1000
            seed = 7
        "#;

        let config: PipelineConfig = toml.parse().unwrap();

        assert_eq!(config.storage.base_path, PathBuf::from("/data"));
        assert_eq!(config.storage.buffer_size, 1048576);
        assert!(config.storage.use_mmap);
        assert_eq!(config.storage.mmap_threshold, 2097152);

        assert_eq!(config.data.file_pattern, "train/part-*");
        assert_eq!(config.data.global_batch_size, 1024);
        assert_eq!(config.data.num_shards, 64);

        assert_eq!(config.schema.vocab_sizes, vec![5; 26]);
        assert_eq!(config.schema.multi_hot_sizes[25], 2);
        assert_eq!(config.schema.embedding_threshold, 10);

        assert_eq!(config.pipeline.max_read_parallelism, 4);
        assert_eq!(config.pipeline.reader_buffer_records, 2);
        assert_eq!(config.pipeline.shuffle_buffer_size, 16);
        assert_eq!(config.pipeline.eval_padding_batches, 3);
        assert_eq!(config.pipeline.prefetch_batches, 8);
        assert_eq!(config.pipeline.private_threadpool_size, 4);
        assert_eq!(config.pipeline.num_dataset_samples, 1000);
        assert_eq!(config.pipeline.seed, Some(7));

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let result: std::result::Result<PipelineConfig, _> = "invalid = [".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [data]
            file_pattern = "/tmp/criteo/*.tfrecord"
            "#
        )
        .unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.data.file_pattern, "/tmp/criteo/*.tfrecord");
    }

    #[test]
    fn test_from_file_not_found() {
        let result = PipelineConfig::from_file("/nonexistent/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_zero_batch_size() {
        let mut config = valid_config();
        config.data.global_batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_sparse_lengths() {
        let mut config = valid_config();
        config.schema.vocab_sizes.pop();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("vocab_sizes"));

        let mut config = valid_config();
        config.schema.multi_hot_sizes.push(1);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("multi_hot_sizes"));
    }

    #[test]
    fn test_validate_zero_multi_hot() {
        let mut config = valid_config();
        config.schema.multi_hot_sizes[3] = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_dense_count() {
        let mut config = valid_config();
        config.schema.num_dense_features = 12;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_tuning() {
        let mut config = valid_config();
        config.pipeline.private_threadpool_size = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.pipeline.shuffle_buffer_size = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.pipeline.max_read_parallelism = 0;
        assert!(config.validate().is_err());
    }

    // Helper to clear all CRITEO_ environment variables for test isolation
    fn clear_criteo_env_vars() {
        for (key, _) in std::env::vars() {
            if key.starts_with("CRITEO_") {
                std::env::remove_var(&key);
            }
        }
    }

    // Environment variable tests are combined into a single test to avoid
    // race conditions when tests run in parallel, since env vars are global state.
    #[test]
    fn test_env_overrides() {
        clear_criteo_env_vars();

        std::env::set_var("CRITEO_DATA_FILE_PATTERN", "/env/*.tfrecord");
        std::env::set_var("CRITEO_DATA_GLOBAL_BATCH_SIZE", "512");
        std::env::set_var("CRITEO_DATA_IS_TRAINING", "false");
        std::env::set_var("CRITEO_SCHEMA_EMBEDDING_THRESHOLD", "100");
        std::env::set_var("CRITEO_SCHEMA_MULTI_HOT_SIZES", "1, 2,3");
        std::env::set_var("CRITEO_PIPELINE_SEED", "12345");

        let config = PipelineConfig::default().with_env_overrides();

        assert_eq!(config.data.file_pattern, "/env/*.tfrecord");
        assert_eq!(config.data.global_batch_size, 512);
        assert!(!config.data.is_training);
        assert_eq!(config.schema.embedding_threshold, 100);
        assert_eq!(config.schema.multi_hot_sizes, vec![1, 2, 3]);
        assert_eq!(config.pipeline.seed, Some(12345));

        clear_criteo_env_vars();

        // Invalid values should be ignored (keep defaults)
        std::env::set_var("CRITEO_STORAGE_BUFFER_SIZE", "not_a_number");
        std::env::set_var("CRITEO_SCHEMA_VOCAB_SIZES", "1,two,3");

        let config = PipelineConfig::default().with_env_overrides();

        assert_eq!(config.storage.buffer_size, 16 * 1024 * 1024);
        assert_eq!(config.schema.vocab_sizes, CRITEO_VOCAB_SIZES.to_vec());

        clear_criteo_env_vars();
    }

    #[test]
    fn test_serialize_roundtrip() {
        let original = valid_config();
        let toml_str = toml::to_string(&original).unwrap();
        let parsed: PipelineConfig = toml_str.parse().unwrap();

        assert_eq!(original.data.file_pattern, parsed.data.file_pattern);
        assert_eq!(original.schema.vocab_sizes, parsed.schema.vocab_sizes);
        assert_eq!(
            original.pipeline.prefetch_batches,
            parsed.pipeline.prefetch_batches
        );
    }
}
