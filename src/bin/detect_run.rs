//! detect_run - one-shot detection pass over a video file.
//!
//! Runs the sampling pipeline to completion without the daemon: records go
//! to stdout as JSON lines, and optionally into a sqlite store.

use anyhow::Result;
use clap::Parser;

use traffic_witness::{
    pipeline::{run_from_paths, PipelineConfig},
    DetectionRecord, DetectionStore, EvictionPolicy, InMemoryDetectionStore, RecordPublisher,
    SqliteDetectionStore,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run one detection pass over a video file")]
struct Args {
    /// Video file path (or stub:// for a synthetic source).
    #[arg(long, env = "TRAFFIC_VIDEO_PATH")]
    video_path: String,

    /// Detection model path (or stub:// for the demo backend).
    #[arg(long, env = "TRAFFIC_MODEL_PATH")]
    model_path: String,

    /// Seconds between sampled frames.
    #[arg(long, env = "TRAFFIC_SAMPLE_INTERVAL_SECS", default_value_t = 2.0)]
    interval: f64,

    /// IoU threshold for vehicle association.
    #[arg(long, env = "TRAFFIC_IOU_THRESHOLD", default_value_t = 0.5)]
    iou_threshold: f32,

    /// Persist records to this sqlite database as well.
    #[arg(long, env = "TRAFFIC_DB_PATH")]
    db_path: Option<String>,

    /// Cap the tracked set at this many entries (off by default).
    #[arg(long)]
    max_tracks: Option<usize>,
}

/// Prints each record to stdout as one JSON line.
struct JsonLinePublisher;

impl RecordPublisher for JsonLinePublisher {
    fn publish(&mut self, record: &DetectionRecord) -> Result<()> {
        println!("{}", serde_json::to_string(record)?);
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let config = PipelineConfig {
        sample_interval_secs: args.interval,
        iou_threshold: args.iou_threshold,
        eviction: match args.max_tracks {
            Some(max) => EvictionPolicy::MaxTracks(max),
            None => EvictionPolicy::None,
        },
    };

    let mut store: Box<dyn DetectionStore> = match &args.db_path {
        Some(path) => Box::new(SqliteDetectionStore::open(path)?),
        None => Box::new(InMemoryDetectionStore::new()),
    };
    let mut publisher = JsonLinePublisher;

    let summary = run_from_paths(
        &args.video_path,
        &args.model_path,
        store.as_mut(),
        &mut publisher,
        &config,
    )?;

    log::info!(
        "done: {} frames sampled, {} vehicles seen, {} tracked at end",
        summary.frames_processed,
        summary.vehicles_seen,
        summary.tracked_vehicles
    );
    Ok(())
}
