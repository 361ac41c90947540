// rust/ranking-data/src/features/schema.rs

/// Name of the click label.
pub const LABEL_FEATURE: &str = "clicked";

pub const NUM_DENSE_FIELDS: usize = 13;
pub const NUM_SPARSE_FIELDS: usize = 26;

/// Sparse fields are numbered after the dense ones in the raw Criteo columns.
const FIRST_SPARSE_POSITION: usize = NUM_DENSE_FIELDS + 1;

/// On-disk value type of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureType {
    Int64,
    Float32,
    Bytes,
}

impl FeatureType {
    pub fn name(&self) -> &'static str {
        match self {
            FeatureType::Int64 => "int64",
            FeatureType::Float32 => "float",
            FeatureType::Bytes => "bytes",
        }
    }
}

/// A fixed-length feature: exactly `len` values of `dtype`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSpec {
    pub name: String,
    pub dtype: FeatureType,
    pub len: usize,
}

/// Field names of a batched Criteo record, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    label: String,
    dense: Vec<String>,
    sparse: Vec<String>,
}

impl FeatureSchema {
    /// The fixed Criteo layout: `clicked`, `int-feature-1..=13` and
    /// `categorical-feature-14..=39`.
    pub fn criteo() -> Self {
        Self {
            label: LABEL_FEATURE.to_string(),
            dense: (1..=NUM_DENSE_FIELDS).map(dense_feature_name).collect(),
            sparse: (FIRST_SPARSE_POSITION..FIRST_SPARSE_POSITION + NUM_SPARSE_FIELDS)
                .map(sparse_feature_name)
                .collect(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn dense_features(&self) -> &[String] {
        &self.dense
    }

    pub fn sparse_features(&self) -> &[String] {
        &self.sparse
    }

    /// The per-record feature specs at the given batch size.
    pub fn feature_specs(&self, batch_size: usize) -> Vec<FeatureSpec> {
        let label = std::iter::once(FeatureSpec {
            name: self.label.clone(),
            dtype: FeatureType::Int64,
            len: batch_size,
        });
        let dense = self.dense.iter().map(|name| FeatureSpec {
            name: name.clone(),
            dtype: FeatureType::Float32,
            len: batch_size,
        });
        let sparse = self.sparse.iter().map(|name| FeatureSpec {
            name: name.clone(),
            dtype: FeatureType::Bytes,
            len: batch_size,
        });
        label.chain(dense).chain(sparse).collect()
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::criteo()
    }
}

fn dense_feature_name(position: usize) -> String {
    format!("int-feature-{position}")
}

fn sparse_feature_name(position: usize) -> String {
    format!("categorical-feature-{position}")
}
