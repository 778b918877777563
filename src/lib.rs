//! traffic-witness
//!
//! Vehicle detection and counting over sampled video frames.
//!
//! # Architecture
//!
//! A pipeline run pulls frames from a video source at a fixed cadence, hands
//! each sampled frame to a detector backend (black box: pixels in,
//! frame-space detections out), associates detections with previously seen
//! vehicles by greedy IoU matching, and emits one `DetectionRecord` per
//! sampled frame to the persistence and publish collaborators.
//!
//! # Module Structure
//!
//! - `geometry`, `letterbox`: box math and model-space/frame-space mapping
//! - `track`: greedy per-frame vehicle association
//! - `detect`: detector backends (stub, scripted, ONNX via tract)
//! - `ingest`: frame sources (synthetic, local files via ffmpeg)
//! - `pipeline`: the sampling driver
//! - `storage`, `transport`: record persistence and publishing
//! - `api`: HTTP control surface (`/start_detection`, `/detections`)

pub mod api;
pub mod config;
pub mod detect;
pub mod geometry;
pub mod ingest;
pub mod letterbox;
pub mod pipeline;
pub mod record;
pub mod storage;
pub mod track;
pub mod transport;

pub use config::{MqttSettings, TrafficConfig};
pub use detect::{class_name, load_backend, Detection, DetectorBackend, ScriptedBackend, StubBackend, CLASS_NAMES};
pub use geometry::{iou, BoundingBox};
pub use ingest::{FileConfig, FileSource, Frame, FrameSource};
pub use letterbox::Letterbox;
pub use pipeline::{run_from_paths, run_pipeline, PipelineConfig, PipelineSummary};
pub use record::DetectionRecord;
pub use storage::{
    DetectionStore, InMemoryDetectionStore, SharedStore, SqliteDetectionStore, StoreHandle,
};
pub use track::{EvictionPolicy, TrackedVehicle, VehicleTracker};
pub use transport::{
    MemoryPublisher, MqttPublisher, NullPublisher, PublisherHandle, RecordPublisher,
    SharedPublisher,
};
