// rust/ranking-data/src/features/batch.rs

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};

/// Label value marking a batch as padding. Metrics must skip these rows.
pub const PADDING_LABEL: i64 = -1;

/// Coordinate-list encoding of an integer matrix, keeping only non-zero
/// entries in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseTensor {
    indices: Array2<i64>,
    values: Array1<i64>,
    dense_shape: [usize; 2],
}

impl SparseTensor {
    /// Encodes `dense`, dropping zero entries.
    pub fn from_dense(dense: &Array2<i64>) -> Self {
        let mut coords = Vec::new();
        let mut values = Vec::new();
        for ((row, col), &value) in dense.indexed_iter() {
            if value != 0 {
                coords.push([row as i64, col as i64]);
                values.push(value);
            }
        }

        Self {
            indices: Array2::from_shape_fn((coords.len(), 2), |(i, j)| coords[i][j]),
            values: Array1::from(values),
            dense_shape: [dense.nrows(), dense.ncols()],
        }
    }

    /// `[nnz, 2]` row/column coordinates.
    pub fn indices(&self) -> &Array2<i64> {
        &self.indices
    }

    pub fn values(&self) -> &Array1<i64> {
        &self.values
    }

    pub fn dense_shape(&self) -> [usize; 2] {
        self.dense_shape
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn to_dense(&self) -> Array2<i64> {
        let mut dense = Array2::zeros((self.dense_shape[0], self.dense_shape[1]));
        for (coord, &value) in self.indices.rows().into_iter().zip(self.values.iter()) {
            dense[[coord[0] as usize, coord[1] as usize]] = value;
        }
        dense
    }
}

/// One sparse column of a batch, `[batch, multi_hot_size]`.
#[derive(Debug, Clone, PartialEq)]
pub enum SparseFeature {
    /// Kept dense because the vocabulary is at or below the embedding threshold.
    Dense(Array2<i64>),
    Sparse(SparseTensor),
}

impl SparseFeature {
    pub fn shape(&self) -> [usize; 2] {
        match self {
            SparseFeature::Dense(values) => [values.nrows(), values.ncols()],
            SparseFeature::Sparse(tensor) => tensor.dense_shape(),
        }
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, SparseFeature::Sparse(_))
    }

    pub fn to_dense(&self) -> Array2<i64> {
        match self {
            SparseFeature::Dense(values) => values.clone(),
            SparseFeature::Sparse(tensor) => tensor.to_dense(),
        }
    }
}

/// A decoded batch.
///
/// `sparse_features` is keyed by the stringified position of the sparse
/// field (`"0"` to `"25"`).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBatch {
    pub clicked: Array1<i64>,
    /// `[batch, 13]`, columns in dense field order.
    pub dense_features: Array2<f32>,
    pub sparse_features: BTreeMap<String, SparseFeature>,
}

impl ParsedBatch {
    pub fn batch_size(&self) -> usize {
        self.clicked.len()
    }

    /// The sparse field at `index` in schema order.
    pub fn sparse_feature(&self, index: usize) -> Option<&SparseFeature> {
        self.sparse_features.get(&index.to_string())
    }

    /// Relabels every row as padding.
    pub fn mark_as_padding(&mut self) {
        self.clicked = Array1::from_elem(self.batch_size(), PADDING_LABEL);
    }

    /// A padding copy of this batch.
    pub fn to_padding(&self) -> Self {
        let mut padding = self.clone();
        padding.mark_as_padding();
        padding
    }

    /// True if the batch is non-empty and every label is [`PADDING_LABEL`].
    pub fn is_padding(&self) -> bool {
        !self.clicked.is_empty() && self.clicked.iter().all(|&label| label == PADDING_LABEL)
    }
}
