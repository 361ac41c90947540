// rust/ranking-data/src/features/mod.rs

//! Feature schema and batch decoding.
//!
//! Every record holds one whole batch: the label, each dense field and each
//! sparse field are stored as a list with one entry per example. Parsing
//! turns that column layout into a [`ParsedBatch`] of `ndarray` tensors.

pub mod schema;

mod batch;
mod encode;
mod parse;
mod synthetic;

pub use batch::{ParsedBatch, SparseFeature, SparseTensor, PADDING_LABEL};
pub use encode::encode_batch;
pub use parse::BatchParser;
pub use schema::{FeatureSchema, FeatureSpec, FeatureType};
pub use synthetic::SyntheticBatchGenerator;
