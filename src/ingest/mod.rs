//! Frame sources.
//!
//! A source hands the pipeline decoded RGB24 frames one at a time. End of
//! stream is a normal outcome (`Ok(None)`), never an error: a run over a
//! finite video simply terminates when the source is exhausted.
//!
//! Sources:
//! - `stub://` paths: synthetic frames, for tests and demos
//! - local video files (feature: ingest-file-ffmpeg)

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;

pub use file::{FileConfig, FileSource};

/// One decoded frame of tightly packed RGB24 pixels.
pub struct Frame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// A frame source the pipeline can drain.
pub trait FrameSource {
    /// Open the source. Failure here is fatal to the run; the pipeline
    /// never starts.
    fn open(&mut self) -> anyhow::Result<()>;

    /// Decode the next frame. `Ok(None)` means the stream ended normally
    /// (including mid-stream decode failures, which end the run rather than
    /// aborting it).
    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>>;

    /// Source frame rate, used to derive the sampling frame-skip count.
    /// May be 0 when unknown; the pipeline then samples every frame.
    fn fps(&self) -> f64;
}
