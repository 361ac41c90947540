// rust/ranking-data/src/dataset/mod.rs

//! Pipeline stages.
//!
//! Each stage is a lazy iterator of `Result` items wrapping the stage before
//! it. Stages end after passing on the first error.
//!
//! ```text
//! FileSource -> InterleavedRecordReader -> ParallelMap -> ShuffleBuffer
//!            -> [PaddedRepeat] -> Prefetcher
//! ```

mod files;
mod interleave;
mod padding;
mod parallel;
mod prefetch;
mod sharding;
mod shuffle;

pub use files::FileSource;
pub use interleave::InterleavedRecordReader;
pub use padding::PaddedRepeat;
pub use parallel::{build_thread_pool, ParallelMap};
pub use prefetch::Prefetcher;
pub use sharding::{read_parallelism, shard_files};
pub use shuffle::ShuffleBuffer;
