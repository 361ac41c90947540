// rust/ranking-data/src/dataset/sharding.rs

use std::path::PathBuf;

use crate::error::{DataError, Result};

/// Assigns files to a worker round-robin.
///
/// Worker `worker_id` gets every file whose position in `files` is congruent
/// to `worker_id` modulo `num_workers`. Across all workers the shards are
/// disjoint and cover every file exactly once.
///
/// # Arguments
///
/// * `files` - The full file list, in the order every worker agrees on
/// * `worker_id` - Index of this worker
/// * `num_workers` - Total number of workers
///
/// # Errors
///
/// Returns `InvalidWorker` if `worker_id` is not below `num_workers`.
pub fn shard_files(files: &[PathBuf], worker_id: usize, num_workers: usize) -> Result<Vec<PathBuf>> {
    if worker_id >= num_workers {
        return Err(DataError::invalid_worker(worker_id, num_workers));
    }

    Ok(files
        .iter()
        .skip(worker_id)
        .step_by(num_workers)
        .cloned()
        .collect())
}

/// Number of files a worker reads at once.
///
/// `num_shards` is the expected number of files in the whole dataset. Each
/// worker gets at least one reader and never more than `max_parallelism`.
pub fn read_parallelism(num_shards: usize, num_workers: usize, max_parallelism: usize) -> usize {
    let per_worker = num_shards / num_workers.max(1);
    per_worker.max(1).min(max_parallelism.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn files(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("part-{i:05}"))).collect()
    }

    #[test]
    fn test_round_robin_assignment() {
        let files = files(7);

        let shard = shard_files(&files, 1, 3).unwrap();
        assert_eq!(
            shard,
            vec![PathBuf::from("part-00001"), PathBuf::from("part-00004")]
        );
    }

    #[test]
    fn test_shards_partition_files() {
        let files = files(23);
        let num_workers = 4;

        let mut seen = HashSet::new();
        let mut total = 0;
        for worker in 0..num_workers {
            let shard = shard_files(&files, worker, num_workers).unwrap();
            total += shard.len();
            seen.extend(shard);
        }

        assert_eq!(total, files.len());
        assert_eq!(seen.len(), files.len());
    }

    #[test]
    fn test_more_workers_than_files() {
        let files = files(2);

        assert_eq!(shard_files(&files, 1, 5).unwrap().len(), 1);
        assert!(shard_files(&files, 4, 5).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_worker() {
        let files = files(4);

        let err = shard_files(&files, 2, 2).unwrap_err();
        assert!(matches!(
            err,
            DataError::InvalidWorker {
                worker_id: 2,
                num_workers: 2
            }
        ));
        assert!(shard_files(&files, 0, 0).is_err());
    }

    #[test]
    fn test_read_parallelism() {
        assert_eq!(read_parallelism(1024, 8, 8), 8);
        assert_eq!(read_parallelism(16, 4, 8), 4);
        assert_eq!(read_parallelism(3, 8, 8), 1);
        assert_eq!(read_parallelism(0, 1, 8), 1);
        assert_eq!(read_parallelism(100, 0, 8), 8);
    }
}
