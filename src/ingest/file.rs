//! Local file frame source.
//!
//! `stub://` paths select a synthetic in-memory source; anything else is a
//! local video file decoded by FFmpeg (feature: ingest-file-ffmpeg). Remote
//! URL schemes are rejected up front.

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::{Frame, FrameSource};

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path or `stub://` name.
    pub path: String,
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        if config.path.starts_with("stub://") {
            Ok(Self {
                backend: FileBackend::Synthetic(SyntheticFileSource::new(config)),
            })
        } else {
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                Ok(Self {
                    backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)?),
                })
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                Err(anyhow!(
                    "file ingestion requires the ingest-file-ffmpeg feature"
                ))
            }
        }
    }
}

impl FrameSource for FileSource {
    fn open(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.open(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.open(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    fn fps(&self) -> f64 {
        match &self.backend {
            FileBackend::Synthetic(source) => source.fps(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.fps(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and demos
// ----------------------------------------------------------------------------

const SYNTHETIC_WIDTH: u32 = 640;
const SYNTHETIC_HEIGHT: u32 = 480;
const SYNTHETIC_FPS: f64 = 30.0;
const SYNTHETIC_FRAME_LIMIT: u64 = 150;

struct SyntheticFileSource {
    config: FileConfig,
    frames_emitted: u64,
    frame_limit: u64,
}

impl SyntheticFileSource {
    fn new(config: FileConfig) -> Self {
        Self {
            config,
            frames_emitted: 0,
            frame_limit: SYNTHETIC_FRAME_LIMIT,
        }
    }

    fn open(&mut self) -> Result<()> {
        log::info!("FileSource: opened {} (synthetic)", self.config.path);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.frames_emitted >= self.frame_limit {
            return Ok(None);
        }
        self.frames_emitted += 1;

        // Flat gray frame with a per-frame tint so consecutive frames differ.
        let shade = (self.frames_emitted % 256) as u8;
        let pixels = vec![shade; (SYNTHETIC_WIDTH * SYNTHETIC_HEIGHT * 3) as usize];
        Ok(Some(Frame {
            pixels,
            width: SYNTHETIC_WIDTH,
            height: SYNTHETIC_HEIGHT,
        }))
    }

    fn fps(&self) -> f64 {
        SYNTHETIC_FPS
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}
