// rust/ranking-data/src/features/synthetic.rs

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::batch::{ParsedBatch, SparseFeature, SparseTensor};
use super::encode::encode_batch;
use super::schema::{FeatureSchema, NUM_SPARSE_FIELDS};
use crate::error::{DataError, Result};

/// Dense values are drawn from `[0, MAX_DENSE_VALUE)`, like the count
/// features of the click logs.
const MAX_DENSE_VALUE: u32 = 1_000;

/// Generates random batches that follow the Criteo schema.
///
/// Labels are 0 or 1, dense values are non-negative and sparse ids of field
/// `i` fall in `[0, vocab_sizes[i])`. The same seed yields the same batches.
pub struct SyntheticBatchGenerator {
    schema: FeatureSchema,
    batch_size: usize,
    vocab_sizes: Vec<u64>,
    multi_hot_sizes: Vec<usize>,
    embedding_threshold: u64,
    rng: StdRng,
}

impl SyntheticBatchGenerator {
    /// # Errors
    ///
    /// Returns a `Config` error unless both lists have one positive entry
    /// per sparse field.
    pub fn new(
        batch_size: usize,
        vocab_sizes: Vec<u64>,
        multi_hot_sizes: Vec<usize>,
        embedding_threshold: u64,
        seed: Option<u64>,
    ) -> Result<Self> {
        if vocab_sizes.len() != NUM_SPARSE_FIELDS || multi_hot_sizes.len() != NUM_SPARSE_FIELDS {
            return Err(DataError::config(format!(
                "expected {NUM_SPARSE_FIELDS} vocabulary and multi-hot sizes, got {} and {}",
                vocab_sizes.len(),
                multi_hot_sizes.len()
            )));
        }
        if vocab_sizes.contains(&0) || multi_hot_sizes.contains(&0) {
            return Err(DataError::config(
                "vocabulary and multi-hot sizes must be greater than 0",
            ));
        }

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            schema: FeatureSchema::criteo(),
            batch_size,
            vocab_sizes,
            multi_hot_sizes,
            embedding_threshold,
            rng,
        })
    }

    /// Draws the next batch, with sparse fields materialized the way the
    /// parser would for the configured embedding threshold.
    pub fn next_batch(&mut self) -> ParsedBatch {
        let batch_size = self.batch_size;
        let rng = &mut self.rng;

        let clicked = Array1::from_shape_fn(batch_size, |_| i64::from(rng.gen_bool(0.25)));
        let dense_features = Array2::from_shape_fn(
            (batch_size, self.schema.dense_features().len()),
            |_| rng.gen_range(0..MAX_DENSE_VALUE) as f32,
        );

        let mut sparse_features = BTreeMap::new();
        for (index, (&vocab_size, &width)) in self
            .vocab_sizes
            .iter()
            .zip(self.multi_hot_sizes.iter())
            .enumerate()
        {
            let upper = i64::try_from(vocab_size).unwrap_or(i64::MAX);
            let ids = Array2::from_shape_fn((batch_size, width), |_| rng.gen_range(0..upper));
            let feature = if vocab_size > self.embedding_threshold {
                SparseFeature::Sparse(SparseTensor::from_dense(&ids))
            } else {
                SparseFeature::Dense(ids)
            };
            sparse_features.insert(index.to_string(), feature);
        }

        ParsedBatch {
            clicked,
            dense_features,
            sparse_features,
        }
    }

    /// Draws the next batch and serializes it as a record payload.
    pub fn next_record(&mut self) -> Result<Vec<u8>> {
        let batch = self.next_batch();
        encode_batch(&self.schema, &batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CRITEO_MULTI_HOT_SIZES, CRITEO_VOCAB_SIZES};

    fn generator(seed: u64) -> SyntheticBatchGenerator {
        SyntheticBatchGenerator::new(
            16,
            CRITEO_VOCAB_SIZES.to_vec(),
            CRITEO_MULTI_HOT_SIZES.to_vec(),
            1_000,
            Some(seed),
        )
        .unwrap()
    }

    #[test]
    fn test_batch_follows_schema() {
        let batch = generator(3).next_batch();

        assert_eq!(batch.batch_size(), 16);
        assert!(batch.clicked.iter().all(|&label| label == 0 || label == 1));
        assert_eq!(batch.dense_features.shape(), &[16, 13]);
        assert!(batch.dense_features.iter().all(|&v| v >= 0.0));

        for (i, (&vocab, &width)) in CRITEO_VOCAB_SIZES
            .iter()
            .zip(CRITEO_MULTI_HOT_SIZES.iter())
            .enumerate()
        {
            let feature = batch.sparse_feature(i).unwrap();
            assert_eq!(feature.shape(), [16, width]);
            assert_eq!(feature.is_sparse(), vocab > 1_000);
            assert!(feature
                .to_dense()
                .iter()
                .all(|&id| id >= 0 && (id as u64) < vocab));
        }
    }

    #[test]
    fn test_seeded_generators_agree() {
        let mut a = generator(42);
        let mut b = generator(42);
        assert_eq!(a.next_batch(), b.next_batch());
        assert_eq!(a.next_record().unwrap(), b.next_record().unwrap());

        let mut c = generator(43);
        assert_ne!(generator(42).next_batch(), c.next_batch());
    }

    #[test]
    fn test_rejects_short_lists() {
        let result = SyntheticBatchGenerator::new(4, vec![10; 25], vec![1; 26], 0, None);
        assert!(matches!(result, Err(DataError::Config { .. })));

        let result = SyntheticBatchGenerator::new(4, vec![10; 26], vec![0; 26], 0, None);
        assert!(result.is_err());
    }
}
