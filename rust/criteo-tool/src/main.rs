//! Criteo TFRecord Tool
//!
//! Writes synthetic batched Criteo shards and runs the input pipeline over
//! existing ones.
//!
//! # Usage
//!
//! ```bash
//! # Write 8 shards of 32 batches of 1024 examples
//! criteo-tool generate --output-dir data/train --num-files 8 \
//!     --records-per-file 32 --batch-size 1024
//!
//! # Read 100 batches as worker 1 of 4
//! criteo-tool inspect --config pipeline.toml --worker-id 1 --num-workers 4 --batches 100
//! ```

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ranking_data::config::{CRITEO_MULTI_HOT_SIZES, CRITEO_VOCAB_SIZES};
use ranking_data::features::schema::NUM_SPARSE_FIELDS;
use ranking_data::{
    CriteoRecordReader, InputContext, LocalStorage, PipelineConfig, StorageBackend,
    SyntheticBatchGenerator, TfRecordWriter,
};

/// Criteo batched TFRecord tool
#[derive(Parser, Debug)]
#[command(name = "criteo-tool")]
#[command(about = "Generate and inspect batched Criteo TFRecord shards")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write synthetic shards
    Generate(GenerateArgs),
    /// Run the input pipeline and report what it yields
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Directory the shards are written to
    #[arg(short, long)]
    output_dir: PathBuf,

    /// Number of shard files
    #[arg(long, default_value = "4")]
    num_files: usize,

    /// Batched records per file
    #[arg(long, default_value = "16")]
    records_per_file: usize,

    /// Examples per record
    #[arg(long, default_value = "64")]
    batch_size: usize,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Use this many ids per sparse field instead of the Criteo widths
    #[arg(long)]
    multi_hot: Option<usize>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Pipeline configuration file (TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// Index of this worker
    #[arg(long, default_value = "0")]
    worker_id: usize,

    /// Total number of workers
    #[arg(long, default_value = "1")]
    num_workers: usize,

    /// Replicas the global batch is split across (defaults to the number of workers)
    #[arg(long)]
    replicas: Option<usize>,

    /// Number of batches to read
    #[arg(long, default_value = "10")]
    batches: usize,

    /// Read in evaluation mode regardless of the configuration
    #[arg(long)]
    eval: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Command::Generate(args) => generate(&args),
        Command::Inspect(args) => inspect(&args).map(|_| ()),
    }
}

/// What `inspect` read.
#[derive(Debug, Default, PartialEq, Eq)]
struct InspectSummary {
    batches: usize,
    padding: usize,
    examples: usize,
}

fn generate(args: &GenerateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let multi_hot_sizes = match args.multi_hot {
        Some(width) => vec![width; NUM_SPARSE_FIELDS],
        None => CRITEO_MULTI_HOT_SIZES.to_vec(),
    };
    let seed = args.seed.unwrap_or_else(rand::random);

    let storage = LocalStorage::new(&ranking_data::config::StorageConfig {
        base_path: args.output_dir.clone(),
        ..Default::default()
    });
    storage.create_dir_all(Path::new(""))?;

    tracing::info!("Writing {} shards to {}", args.num_files, args.output_dir.display());
    tracing::info!("  Records per file: {}", args.records_per_file);
    tracing::info!("  Batch size: {}", args.batch_size);
    tracing::info!("  Seed: {}", seed);

    let start = Instant::now();
    for file in 0..args.num_files {
        let path = PathBuf::from(format!("part-{file:05}.tfrecord"));
        let mut generator = SyntheticBatchGenerator::new(
            args.batch_size,
            CRITEO_VOCAB_SIZES.to_vec(),
            multi_hot_sizes.clone(),
            0,
            Some(seed.wrapping_add(file as u64)),
        )?;

        let mut writer = TfRecordWriter::new(storage.open_write(&path)?, &path);
        for _ in 0..args.records_per_file {
            writer.write_record(&generator.next_record()?)?;
        }
        let records = writer.records_written();
        writer.into_inner()?.finish()?;

        tracing::debug!("Wrote {} records to {}", records, path.display());
    }

    tracing::info!(
        "Wrote {} records in {:.2}s",
        args.num_files * args.records_per_file,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn inspect(args: &InspectArgs) -> Result<InspectSummary, Box<dyn std::error::Error>> {
    let mut config = PipelineConfig::from_file(&args.config)?.with_env_overrides();
    if args.eval {
        config.data.is_training = false;
    }

    let reader = CriteoRecordReader::from_config(&config)?;
    let replicas = args.replicas.unwrap_or(args.num_workers);
    let ctx = InputContext::new(args.num_workers, args.worker_id, replicas);
    let batches = reader.build_pipeline(Some(&ctx))?;

    tracing::info!("Reading {} batches from {}", args.batches, reader.file_pattern());
    tracing::info!("  Worker: {}/{}", args.worker_id, args.num_workers);
    tracing::info!("  Batch size: {}", batches.batch_size());
    tracing::info!("  Read parallelism: {}", batches.parallelism());
    if !reader.is_training() {
        tracing::info!("  Batches per evaluation pass: {}", reader.num_eval_batches());
    }

    let start = Instant::now();
    let mut summary = InspectSummary::default();
    for batch in batches.take(args.batches) {
        let batch = batch?;
        summary.batches += 1;
        summary.examples += batch.batch_size();
        if batch.is_padding() {
            summary.padding += 1;
        }

        let sparse = batch.sparse_features.values().filter(|f| f.is_sparse()).count();
        tracing::debug!(
            "Batch {}: clicked {:?}, dense {:?}, {} sparse / {} dense categorical fields",
            summary.batches,
            batch.clicked.shape(),
            batch.dense_features.shape(),
            sparse,
            batch.sparse_features.len() - sparse
        );
    }

    let elapsed = start.elapsed().as_secs_f64();
    tracing::info!(
        "Read {} batches ({} padding) in {:.2}s",
        summary.batches,
        summary.padding,
        elapsed
    );
    if elapsed > 0.0 {
        tracing::info!("  Throughput: {:.0} examples/s", summary.examples as f64 / elapsed);
    }
    Ok(summary)
}
