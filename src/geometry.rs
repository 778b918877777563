//! Axis-aligned bounding boxes and intersection-over-union.
//!
//! Boxes are stored as corner pairs in frame pixel coordinates. All of the
//! math here is pure; degenerate boxes (zero or negative area) never divide
//! by zero.

/// Axis-aligned bounding box, `(x1, y1)` top-left and `(x2, y2)` bottom-right.
///
/// Invariant: `x1 <= x2` and `y1 <= y2`. Construction sites (the detector
/// backends and the rescaler) are responsible for upholding it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Signed area. Not clamped; valid boxes have non-negative area.
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1) * (self.y2 - self.y1)
    }

    /// Clamp all coordinates into `[0, width] x [0, height]`.
    pub fn clamp_to(&self, width: f32, height: f32) -> Self {
        Self {
            x1: self.x1.clamp(0.0, width),
            y1: self.y1.clamp(0.0, height),
            x2: self.x2.clamp(0.0, width),
            y2: self.y2.clamp(0.0, height),
        }
    }
}

/// Intersection over union of two boxes, in `[0, 1]`.
///
/// Returns 0 when the union is empty, so zero-area boxes are safe to pass.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let inter_w = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let inter_h = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = inter_w * inter_h;
    let union = a.area() + b.area() - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
