// rust/ranking-data/src/features/parse.rs

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use prost::Message;

use super::batch::{ParsedBatch, SparseFeature, SparseTensor};
use super::schema::{FeatureSchema, FeatureSpec, FeatureType};
use crate::error::{DataError, Result};
use crate::record::{feature::Kind, Example, Feature};

const INT64_BYTES: usize = std::mem::size_of::<i64>();

/// Decodes serialized batched `Example`s into [`ParsedBatch`]es.
///
/// The parser is immutable and shared between parse workers. Every feature
/// is checked against the schema's [`FeatureSpec`] before it is read.
#[derive(Debug, Clone)]
pub struct BatchParser {
    schema: FeatureSchema,
    specs: Vec<FeatureSpec>,
    batch_size: usize,
    vocab_sizes: Vec<u64>,
    multi_hot_sizes: Vec<usize>,
    embedding_threshold: u64,
}

impl BatchParser {
    /// Creates a parser for records holding `batch_size` examples each.
    ///
    /// `vocab_sizes` and `multi_hot_sizes` are indexed by sparse field
    /// position. They are not checked here; a missing entry is reported when
    /// a record is parsed.
    pub fn new(
        schema: FeatureSchema,
        batch_size: usize,
        vocab_sizes: Vec<u64>,
        multi_hot_sizes: Vec<usize>,
        embedding_threshold: u64,
    ) -> Self {
        let specs = schema.feature_specs(batch_size);
        Self {
            schema,
            specs,
            batch_size,
            vocab_sizes,
            multi_hot_sizes,
            embedding_threshold,
        }
    }

    /// Parses one serialized record.
    ///
    /// # Errors
    ///
    /// Returns a `Parse` error if the bytes are not an `Example`, a feature
    /// is missing or has the wrong type or length, or a sparse row does not
    /// hold exactly `multi_hot_sizes[i]` little-endian int64 values.
    pub fn parse(&self, record: &[u8]) -> Result<ParsedBatch> {
        let example = Example::decode(record)
            .map_err(|e| DataError::parse_with_source("failed to decode Example", e))?;
        let features = example
            .features
            .map(|f| f.feature)
            .ok_or_else(|| DataError::parse("Example has no features"))?;

        // Specs are ordered label, dense fields, sparse fields
        let (label, columns) = self
            .specs
            .split_first()
            .ok_or_else(|| DataError::parse("schema has no label feature"))?;
        let (dense_specs, sparse_specs) = columns.split_at(self.schema.dense_features().len());

        let clicked = Array1::from(int64_feature(&features, label)?.to_vec());

        let mut dense_features = Array2::<f32>::zeros((self.batch_size, dense_specs.len()));
        for (col, spec) in dense_specs.iter().enumerate() {
            let values = float_feature(&features, spec)?;
            for (row, &value) in values.iter().enumerate() {
                dense_features[[row, col]] = value;
            }
        }

        let mut sparse_features = BTreeMap::new();
        for (index, spec) in sparse_specs.iter().enumerate() {
            let rows = bytes_feature(&features, spec)?;
            let values = self.decode_sparse(index, &spec.name, rows)?;
            sparse_features.insert(index.to_string(), values);
        }

        Ok(ParsedBatch {
            clicked,
            dense_features,
            sparse_features,
        })
    }

    fn decode_sparse(&self, index: usize, name: &str, rows: &[Vec<u8>]) -> Result<SparseFeature> {
        let width = *self.multi_hot_sizes.get(index).ok_or_else(|| {
            DataError::parse(format!("no multi-hot size configured for sparse feature {index}"))
        })?;
        let vocab_size = *self.vocab_sizes.get(index).ok_or_else(|| {
            DataError::parse(format!("no vocabulary size configured for sparse feature {index}"))
        })?;

        let row_bytes = width * INT64_BYTES;
        let mut ids = Vec::with_capacity(self.batch_size * width);
        for (row, raw) in rows.iter().enumerate() {
            if raw.len() != row_bytes {
                return Err(DataError::parse(format!(
                    "feature '{name}' row {row} has {} bytes, expected {row_bytes}",
                    raw.len()
                )));
            }
            ids.extend(raw.chunks_exact(INT64_BYTES).map(|chunk| {
                let mut buf = [0u8; INT64_BYTES];
                buf.copy_from_slice(chunk);
                i64::from_le_bytes(buf)
            }));
        }

        let dense = Array2::from_shape_vec((self.batch_size, width), ids).map_err(|e| {
            DataError::parse_with_source(format!("failed to reshape feature '{name}'"), e)
        })?;

        if vocab_size > self.embedding_threshold {
            Ok(SparseFeature::Sparse(SparseTensor::from_dense(&dense)))
        } else {
            Ok(SparseFeature::Dense(dense))
        }
    }
}

fn int64_feature<'a>(features: &'a BTreeMap<String, Feature>, spec: &FeatureSpec) -> Result<&'a [i64]> {
    match lookup(features, &spec.name)? {
        Kind::Int64List(list) => check_len(spec, &list.value),
        other => Err(wrong_kind(spec, other)),
    }
}

fn float_feature<'a>(features: &'a BTreeMap<String, Feature>, spec: &FeatureSpec) -> Result<&'a [f32]> {
    match lookup(features, &spec.name)? {
        Kind::FloatList(list) => check_len(spec, &list.value),
        other => Err(wrong_kind(spec, other)),
    }
}

fn bytes_feature<'a>(
    features: &'a BTreeMap<String, Feature>,
    spec: &FeatureSpec,
) -> Result<&'a [Vec<u8>]> {
    match lookup(features, &spec.name)? {
        Kind::BytesList(list) => check_len(spec, &list.value),
        other => Err(wrong_kind(spec, other)),
    }
}

fn check_len<'a, T>(spec: &FeatureSpec, values: &'a [T]) -> Result<&'a [T]> {
    if values.len() != spec.len {
        return Err(DataError::parse(format!(
            "feature '{}' has {} values, expected {}",
            spec.name,
            values.len(),
            spec.len
        )));
    }
    Ok(values)
}

fn lookup<'a>(features: &'a BTreeMap<String, Feature>, name: &str) -> Result<&'a Kind> {
    features
        .get(name)
        .and_then(|f| f.kind.as_ref())
        .ok_or_else(|| DataError::parse(format!("missing feature '{name}'")))
}

fn wrong_kind(spec: &FeatureSpec, found: &Kind) -> DataError {
    let found = match found {
        Kind::BytesList(_) => FeatureType::Bytes,
        Kind::FloatList(_) => FeatureType::Float32,
        Kind::Int64List(_) => FeatureType::Int64,
    };
    DataError::parse(format!(
        "feature '{}' has type {}, expected {}",
        spec.name,
        found.name(),
        spec.dtype.name()
    ))
}
