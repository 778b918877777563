//! Letterbox geometry: mapping between frame space and model-input space.
//!
//! The preprocessing step scales a frame by a uniform gain (preserving aspect
//! ratio) and pads the short dimension to reach the model's input size.
//! Detections come back in model-input coordinates; `rescale` undoes the
//! padding and the gain and clamps the result into the original frame.

use crate::geometry::BoundingBox;

/// A letterbox transform: scale by `gain`, then pad by `pad` pixels on the
/// x and y axes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub gain: f32,
    pub pad: (f32, f32),
}

impl Letterbox {
    pub fn uniform(gain: f32, pad: (f32, f32)) -> Self {
        Self { gain, pad }
    }

    /// Build from a per-axis ratio pair. Aspect-preserving resizes report the
    /// same ratio on both axes; only the first component is used.
    pub fn from_ratio_pair(ratio: (f32, f32), pad: (f32, f32)) -> Self {
        Self {
            gain: ratio.0,
            pad,
        }
    }

    /// Compute the gain and padding that fit a `frame_width` x `frame_height`
    /// image into a `input_width` x `input_height` model input, centered.
    pub fn fit(frame_width: u32, frame_height: u32, input_width: u32, input_height: u32) -> Self {
        let gain = (input_width as f32 / frame_width as f32)
            .min(input_height as f32 / frame_height as f32);
        let pad_x = (input_width as f32 - frame_width as f32 * gain) / 2.0;
        let pad_y = (input_height as f32 - frame_height as f32 * gain) / 2.0;
        Self {
            gain,
            pad: (pad_x, pad_y),
        }
    }

    /// Forward transform: frame space to model-input space.
    pub fn apply(&self, b: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x1: b.x1 * self.gain + self.pad.0,
            y1: b.y1 * self.gain + self.pad.1,
            x2: b.x2 * self.gain + self.pad.0,
            y2: b.y2 * self.gain + self.pad.1,
        }
    }

    /// Map model-input boxes back into frame space: subtract the padding,
    /// divide out the gain, clamp into `[0, frame_width] x [0, frame_height]`.
    pub fn rescale(
        &self,
        boxes: &[BoundingBox],
        frame_width: u32,
        frame_height: u32,
    ) -> Vec<BoundingBox> {
        boxes
            .iter()
            .map(|b| {
                BoundingBox {
                    x1: (b.x1 - self.pad.0) / self.gain,
                    y1: (b.y1 - self.pad.1) / self.gain,
                    x2: (b.x2 - self.pad.0) / self.gain,
                    y2: (b.y2 - self.pad.1) / self.gain,
                }
                .clamp_to(frame_width as f32, frame_height as f32)
            })
            .collect()
    }
}
