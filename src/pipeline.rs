//! Frame sampling pipeline driver.
//!
//! One run drives one complete pass over a video source: sample a frame at
//! the configured cadence, detect, track, aggregate counts, persist and
//! publish a record. The run owns its tracker and source for its whole
//! lifetime; there is no internal parallelism and no cancellation. The
//! surrounding service dispatches runs onto background threads so callers
//! return immediately.

use anyhow::Result;

use crate::detect::{load_backend, DetectorBackend};
use crate::ingest::{FileConfig, FileSource, FrameSource};
use crate::record::DetectionRecord;
use crate::storage::DetectionStore;
use crate::track::{EvictionPolicy, VehicleTracker, DEFAULT_IOU_THRESHOLD};
use crate::transport::RecordPublisher;

pub const DEFAULT_SAMPLE_INTERVAL_SECS: f64 = 2.0;

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Seconds between sampled frames. Converted to a whole frame-skip count
    /// from the source frame rate.
    pub sample_interval_secs: f64,
    /// Passed through to the tracker.
    pub iou_threshold: f32,
    pub eviction: EvictionPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: DEFAULT_SAMPLE_INTERVAL_SECS,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            eviction: EvictionPolicy::None,
        }
    }
}

/// Tallies for one completed run.
#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineSummary {
    /// Frames sampled and processed (not frames decoded).
    pub frames_processed: u64,
    /// Distinct vehicles that appeared over the run, per the tracker.
    pub vehicles_seen: u64,
    /// Size of the tracked set when the source was exhausted.
    pub tracked_vehicles: usize,
}

/// Drive one complete pass over a source.
///
/// The source is advanced by the frame-skip count between samples, matching
/// a sampling cadence of `sample_interval_secs` at the source frame rate.
/// Persist and publish failures are logged and skipped; only source-open and
/// warm-up failures abort the run before it starts.
pub fn run_pipeline(
    source: &mut dyn FrameSource,
    backend: &mut dyn DetectorBackend,
    store: &mut dyn DetectionStore,
    publisher: &mut dyn RecordPublisher,
    config: &PipelineConfig,
) -> Result<PipelineSummary> {
    source.open()?;
    backend.warm_up()?;

    let frame_skip = (source.fps() * config.sample_interval_secs).max(0.0) as u64;
    log::info!(
        "pipeline: sampling every {} skipped frames ({}s at {:.2} fps), backend={}",
        frame_skip,
        config.sample_interval_secs,
        source.fps(),
        backend.name()
    );

    let mut tracker = VehicleTracker::new(config.iou_threshold, config.eviction);
    let mut summary = PipelineSummary::default();

    'run: loop {
        // Advance past the skipped frames, then take the next one as the
        // sample. An exhausted source anywhere in here ends the run normally.
        for _ in 0..frame_skip {
            if source.next_frame()?.is_none() {
                break 'run;
            }
        }
        let Some(frame) = source.next_frame()? else {
            break 'run;
        };

        let detections = match backend.detect(&frame.pixels, frame.width, frame.height) {
            Ok(detections) => detections,
            Err(err) => {
                log::warn!("inference failed, skipping frame: {}", err);
                continue;
            }
        };

        let new_vehicles = tracker.update(&detections);
        summary.frames_processed += 1;
        summary.vehicles_seen += new_vehicles.len() as u64;

        let record = DetectionRecord::from_detections(&detections);
        log::info!(
            "frame {}: {} vehicles ({} new, {} tracked) {:?}",
            summary.frames_processed,
            record.vehicles_detected,
            new_vehicles.len(),
            tracker.tracked().len(),
            record.class_counts
        );

        if let Err(err) = store.append_record(&record) {
            log::warn!("record not persisted: {}", err);
        }
        if let Err(err) = publisher.publish(&record) {
            log::warn!("record not published: {}", err);
        }
    }

    summary.tracked_vehicles = tracker.tracked().len();
    log::info!(
        "video processing completed: {} frames sampled, {} vehicles seen",
        summary.frames_processed,
        summary.vehicles_seen
    );
    Ok(summary)
}

/// Open a video source and detector backend by path and run the pipeline.
///
/// This is the entry point run dispatch uses; callers log the error when a
/// run fails to start and never propagate it to the triggering request.
pub fn run_from_paths(
    video_path: &str,
    model_path: &str,
    store: &mut dyn DetectionStore,
    publisher: &mut dyn RecordPublisher,
    config: &PipelineConfig,
) -> Result<PipelineSummary> {
    let mut source = FileSource::new(FileConfig {
        path: video_path.to_string(),
    })?;
    let mut backend = load_backend(model_path)?;
    run_pipeline(&mut source, backend.as_mut(), store, publisher, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ScriptedBackend;
    use crate::ingest::Frame;
    use crate::storage::InMemoryDetectionStore;
    use crate::transport::MemoryPublisher;

    /// Fixed-length source of flat frames with a configurable frame rate.
    struct ScriptFrames {
        remaining: u64,
        fps: f64,
    }

    impl ScriptFrames {
        fn new(frames: u64, fps: f64) -> Self {
            Self {
                remaining: frames,
                fps,
            }
        }
    }

    impl FrameSource for ScriptFrames {
        fn open(&mut self) -> Result<()> {
            Ok(())
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            Ok(Some(Frame {
                pixels: vec![0u8; 16 * 16 * 3],
                width: 16,
                height: 16,
            }))
        }

        fn fps(&self) -> f64 {
            self.fps
        }
    }

    #[test]
    fn frame_skip_matches_cadence() {
        // 30 fps, 2 second interval: 60 skipped frames per sample, so 122
        // decoded frames yield exactly 2 samples.
        let mut source = ScriptFrames::new(122, 30.0);
        let mut backend = ScriptedBackend::new(vec![]);
        let mut store = InMemoryDetectionStore::new();
        let mut publisher = MemoryPublisher::new();

        let summary = run_pipeline(
            &mut source,
            &mut backend,
            &mut store,
            &mut publisher,
            &PipelineConfig::default(),
        )
        .unwrap();

        assert_eq!(summary.frames_processed, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn zero_fps_source_samples_every_frame() {
        let mut source = ScriptFrames::new(3, 0.0);
        let mut backend = ScriptedBackend::new(vec![]);
        let mut store = InMemoryDetectionStore::new();
        let mut publisher = MemoryPublisher::new();

        let summary = run_pipeline(
            &mut source,
            &mut backend,
            &mut store,
            &mut publisher,
            &PipelineConfig::default(),
        )
        .unwrap();

        assert_eq!(summary.frames_processed, 3);
    }

    #[test]
    fn empty_source_terminates_normally() {
        let mut source = ScriptFrames::new(0, 30.0);
        let mut backend = ScriptedBackend::new(vec![]);
        let mut store = InMemoryDetectionStore::new();
        let mut publisher = MemoryPublisher::new();

        let summary = run_pipeline(
            &mut source,
            &mut backend,
            &mut store,
            &mut publisher,
            &PipelineConfig::default(),
        )
        .unwrap();

        assert_eq!(summary.frames_processed, 0);
        assert!(store.is_empty());
        assert!(publisher.records.is_empty());
    }
}
