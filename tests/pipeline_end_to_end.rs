use anyhow::Result;

use traffic_witness::{
    run_pipeline, BoundingBox, Detection, DetectionStore, Frame, FrameSource,
    InMemoryDetectionStore, MemoryPublisher, PipelineConfig, ScriptedBackend,
};

/// Fixed-length synthetic source: flat frames at a declared frame rate.
struct CannedSource {
    remaining: u64,
    fps: f64,
}

impl FrameSource for CannedSource {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(Frame {
            pixels: vec![0u8; 64 * 48 * 3],
            width: 64,
            height: 48,
        }))
    }

    fn fps(&self) -> f64 {
        self.fps
    }
}

#[test]
fn three_frame_run_counts_and_tracks_as_expected() {
    // Frame 1: one car. Frame 2: same box. Frame 3: box shifted far away.
    // Every sampled frame reports 1 vehicle, and the tracked set ends at 2:
    // the original entry plus the far one.
    let b = BoundingBox::new(10.0, 10.0, 30.0, 26.0);
    let far = BoundingBox::new(40.0, 30.0, 60.0, 46.0);
    let mut backend = ScriptedBackend::new(vec![
        vec![Detection::new(5, 0.9, b)],
        vec![Detection::new(5, 0.9, b)],
        vec![Detection::new(5, 0.9, far)],
    ]);

    // 1 fps with a 1s interval skips one frame per sample, so 6 frames yield
    // exactly 3 samples.
    let mut source = CannedSource {
        remaining: 6,
        fps: 1.0,
    };
    let mut store = InMemoryDetectionStore::new();
    let mut publisher = MemoryPublisher::new();
    let config = PipelineConfig {
        sample_interval_secs: 1.0,
        ..PipelineConfig::default()
    };

    let summary = run_pipeline(
        &mut source,
        &mut backend,
        &mut store,
        &mut publisher,
        &config,
    )
    .unwrap();

    assert_eq!(summary.frames_processed, 3);
    assert_eq!(summary.vehicles_seen, 2);
    assert_eq!(summary.tracked_vehicles, 2);

    let records = publisher.records;
    assert_eq!(records.len(), 3);
    for record in &records {
        assert_eq!(record.vehicles_detected, 1);
        assert_eq!(record.class_counts.get("car"), Some(&1));
    }

    // Persisted and published streams carry the same records.
    let stored = store.read_records(0, 100).unwrap();
    assert_eq!(stored, records);
}

#[test]
fn publish_failure_does_not_halt_the_run() {
    struct FailingPublisher;
    impl traffic_witness::RecordPublisher for FailingPublisher {
        fn publish(&mut self, _record: &traffic_witness::DetectionRecord) -> Result<()> {
            Err(anyhow::anyhow!("broker unavailable"))
        }
    }

    let b = BoundingBox::new(10.0, 10.0, 30.0, 26.0);
    let mut backend = ScriptedBackend::new(vec![
        vec![Detection::new(5, 0.9, b)],
        vec![Detection::new(4, 0.9, b)],
    ]);
    let mut source = CannedSource {
        remaining: 4,
        fps: 1.0,
    };
    let mut store = InMemoryDetectionStore::new();
    let mut publisher = FailingPublisher;
    let config = PipelineConfig {
        sample_interval_secs: 1.0,
        ..PipelineConfig::default()
    };

    let summary = run_pipeline(
        &mut source,
        &mut backend,
        &mut store,
        &mut publisher,
        &config,
    )
    .unwrap();

    // Both samples were processed and persisted despite every publish failing.
    assert_eq!(summary.frames_processed, 2);
    assert_eq!(store.read_records(0, 100).unwrap().len(), 2);
}
