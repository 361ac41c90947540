// rust/ranking-data/src/record/mod.rs

//! On-disk record format.
//!
//! Files are TFRecord streams: every record is framed as
//!
//! ```text
//! +----------------------+
//! | length     (u64 LE)  |
//! | length crc (u32 LE)  |  <- masked CRC32C of the 8 length bytes
//! | payload    (length)  |  <- serialized tf.train.Example
//! | payload crc (u32 LE) |  <- masked CRC32C of the payload
//! +----------------------+
//! ```

mod example;
mod tfrecord;

pub use example::{feature, BytesList, Example, Feature, Features, FloatList, Int64List};
pub use tfrecord::{masked_crc32c, TfRecordReader, TfRecordWriter};
