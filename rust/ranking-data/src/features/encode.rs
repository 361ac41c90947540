// rust/ranking-data/src/features/encode.rs

use std::collections::BTreeMap;

use prost::Message;

use super::batch::ParsedBatch;
use super::schema::FeatureSchema;
use crate::error::{DataError, Result};
use crate::record::{Example, Feature, Features};

/// Serializes a batch into the batched `Example` layout read by
/// [`BatchParser`](super::BatchParser).
///
/// Sparse fields are written densified, one little-endian int64 row per
/// example, so the encoding does not depend on the embedding threshold.
///
/// # Errors
///
/// Returns a `Parse` error if the batch does not match the schema: wrong
/// dense column count, a missing sparse field, or ragged row counts.
pub fn encode_batch(schema: &FeatureSchema, batch: &ParsedBatch) -> Result<Vec<u8>> {
    let batch_size = batch.batch_size();
    let dense_names = schema.dense_features();
    if batch.dense_features.shape() != [batch_size, dense_names.len()] {
        return Err(DataError::parse(format!(
            "dense features have shape {:?}, expected [{batch_size}, {}]",
            batch.dense_features.shape(),
            dense_names.len()
        )));
    }

    let mut feature = BTreeMap::new();
    feature.insert(
        schema.label().to_string(),
        Feature::int64s(batch.clicked.to_vec()),
    );

    for (col, name) in dense_names.iter().enumerate() {
        let column = batch.dense_features.column(col).to_vec();
        feature.insert(name.clone(), Feature::floats(column));
    }

    for (index, name) in schema.sparse_features().iter().enumerate() {
        let values = batch
            .sparse_feature(index)
            .ok_or_else(|| DataError::parse(format!("batch has no sparse feature {index}")))?
            .to_dense();
        if values.nrows() != batch_size {
            return Err(DataError::parse(format!(
                "sparse feature {index} has {} rows, expected {batch_size}",
                values.nrows()
            )));
        }

        let rows = values
            .rows()
            .into_iter()
            .map(|row| row.iter().flat_map(|id| id.to_le_bytes()).collect::<Vec<u8>>())
            .collect();
        feature.insert(name.clone(), Feature::bytes(rows));
    }

    let example = Example {
        features: Some(Features { feature }),
    };
    Ok(example.encode_to_vec())
}
