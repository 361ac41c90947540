// rust/ranking-data/src/storage/traits.rs

//! Storage abstraction traits.
//!
//! This module defines the core traits for storage backends, allowing
//! different implementations to be used interchangeably.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// A handle for sequentially reading an object.
///
/// Readers are moved onto pipeline reader threads, so they must be `Send`.
pub trait StorageReader: Read + Send {}

/// A handle for writing to storage.
///
/// This trait extends `Write` with a method to finalize the write operation.
pub trait StorageWriter: Write + Send {
    /// Finishes the write operation, ensuring all data is persisted.
    ///
    /// This method must be called to complete the write. After calling
    /// `finish`, the writer should not be used again.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing or syncing fails.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// The core storage backend trait.
///
/// # Object Safety
///
/// This trait is object-safe and is shared across pipeline threads as
/// `Arc<dyn StorageBackend>`.
pub trait StorageBackend: Send + Sync {
    /// Opens an object for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist or cannot be opened.
    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>>;

    /// Opens an object for writing.
    ///
    /// If the object already exists, it will be overwritten.
    /// Parent directories will be created if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be created or opened.
    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>>;

    /// Lists the objects matching a glob pattern, in lexicographic order.
    ///
    /// Relative patterns are resolved against the backend's base path and
    /// the returned paths are relative to it as well, so they can be passed
    /// straight back to [`StorageBackend::open_read`]. Directories never match.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is malformed or listing fails.
    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>>;

    /// Creates a directory and all parent directories. An empty path names
    /// the backend's base path.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    fn create_dir_all(&self, path: &Path) -> Result<()>;
}
