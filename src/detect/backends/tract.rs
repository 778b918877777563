#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{Detection, CLASS_NAMES};
use crate::geometry::{iou, BoundingBox};
use crate::letterbox::Letterbox;

const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_NMS_THRESHOLD: f32 = 0.45;
const LETTERBOX_FILL: f32 = 114.0 / 255.0;

/// Tract-based ONNX backend for the vehicle detection model.
///
/// Loads a local model file, letterboxes each frame to the square model
/// input, and decodes rows of `[cx, cy, w, h, obj, class scores...]` into
/// frame-space detections with confidence filtering and per-class greedy
/// non-max suppression. No network I/O; the model file is the only disk read.
pub struct TractBackend {
    model: TypedSimplePlan<TypedModel>,
    input_size: u32,
    confidence_threshold: f32,
    nms_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_size as usize, input_size as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
        })
    }

    /// Override the default confidence and NMS thresholds.
    pub fn with_thresholds(mut self, confidence: f32, nms: f32) -> Self {
        self.confidence_threshold = confidence;
        self.nms_threshold = nms;
        self
    }

    /// Letterbox the RGB frame into the square model input.
    ///
    /// Samples nearest-neighbor through the inverse transform; pixels outside
    /// the scaled image get the conventional gray fill.
    fn build_input(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        lb: &Letterbox,
    ) -> Result<Tensor> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let size = self.input_size as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, size, size),
            |(_, channel, out_y, out_x)| {
                let src_x = (out_x as f32 - lb.pad.0) / lb.gain;
                let src_y = (out_y as f32 - lb.pad.1) / lb.gain;
                if src_x < 0.0 || src_y < 0.0 {
                    return LETTERBOX_FILL;
                }
                let (src_x, src_y) = (src_x as usize, src_y as usize);
                if src_x >= width as usize || src_y >= height as usize {
                    return LETTERBOX_FILL;
                }
                let idx = (src_y * width as usize + src_x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    /// Decode model output rows into model-space candidates.
    fn decode_output(&self, outputs: TVec<TValue>) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let rows = view
            .to_shape((view.len() / (5 + CLASS_NAMES.len()), 5 + CLASS_NAMES.len()))
            .context("model output rows have unexpected width")?;

        let mut candidates = Vec::new();
        for row in rows.outer_iter() {
            let objectness = row[4];
            if objectness < self.confidence_threshold {
                continue;
            }
            let (class_id, class_score) = row
                .iter()
                .skip(5)
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (i, &s)| {
                    if s > best.1 {
                        (i, s)
                    } else {
                        best
                    }
                });
            let confidence = objectness * class_score;
            if confidence < self.confidence_threshold {
                continue;
            }
            let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
            candidates.push(Detection::new(
                class_id,
                confidence,
                BoundingBox::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0),
            ));
        }
        Ok(candidates)
    }

    /// Per-class greedy non-max suppression, highest confidence first.
    fn suppress(&self, mut candidates: Vec<Detection>) -> Vec<Detection> {
        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut kept: Vec<Detection> = Vec::new();
        for cand in candidates {
            let duplicate = kept.iter().any(|k| {
                k.class_id == cand.class_id && iou(&k.bbox, &cand.bbox) > self.nms_threshold
            });
            if !duplicate {
                kept.push(cand);
            }
        }
        kept
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        let lb = Letterbox::fit(width, height, self.input_size, self.input_size);
        let input = self.build_input(pixels, width, height, &lb)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;

        let candidates = self.decode_output(outputs)?;
        let kept = self.suppress(candidates);

        let boxes: Vec<BoundingBox> = kept.iter().map(|d| d.bbox).collect();
        let rescaled = lb.rescale(&boxes, width, height);

        Ok(kept
            .into_iter()
            .zip(rescaled)
            .map(|(d, bbox)| Detection { bbox, ..d })
            .collect())
    }
}
