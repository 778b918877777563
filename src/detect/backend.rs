use anyhow::Result;

use crate::detect::result::Detection;

/// Detector backend trait.
///
/// A backend is a black box from the pipeline's point of view: RGB24 pixels
/// in, frame-space detections out. Preprocessing (letterboxing), inference,
/// confidence filtering, non-max suppression, and coordinate rescaling all
/// happen behind this boundary, so the tracking core can be exercised with
/// scripted backends independent of any inference runtime.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on one frame of tightly packed RGB24 pixels.
    ///
    /// Returned boxes are in frame coordinates, clamped to the frame bounds,
    /// in the order the model produced them. Order matters downstream: the
    /// tracker's matching is first-fit over this sequence.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, called once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
