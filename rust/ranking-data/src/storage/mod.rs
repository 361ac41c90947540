// rust/ranking-data/src/storage/mod.rs

//! Storage abstraction for the input pipeline.
//!
//! The pipeline discovers and opens record files through a
//! [`StorageBackend`], so tests can substitute an in-memory backend and
//! other filesystems can be plugged in without touching the pipeline stages.
//!
//! # Example
//!
//! ```no_run
//! use ranking_data::config::StorageConfig;
//! use ranking_data::storage::{LocalStorage, StorageBackend};
//! use std::io::Read;
//!
//! let storage = LocalStorage::new(&StorageConfig::default());
//!
//! for path in storage.glob("data/train/part-*").unwrap() {
//!     let mut reader = storage.open_read(&path).unwrap();
//!     let mut header = [0u8; 12];
//!     reader.read_exact(&mut header).unwrap();
//! }
//! ```

mod local;
mod traits;

pub use local::LocalStorage;
pub use traits::{StorageBackend, StorageReader, StorageWriter};
