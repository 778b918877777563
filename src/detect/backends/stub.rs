use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::geometry::BoundingBox;

/// Scripted backend: plays back a fixed per-frame sequence of detections.
///
/// Each call to `detect` consumes the next entry; once the script is
/// exhausted every frame comes back empty. Ignores pixel content entirely,
/// which makes pipeline behavior fully deterministic in tests.
pub struct ScriptedBackend {
    script: std::vec::IntoIter<Vec<Detection>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        Self {
            script: script.into_iter(),
        }
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
        Ok(self.script.next().unwrap_or_default())
    }
}

/// Stub backend for `stub://` model paths. Emits a procedural traffic scene:
/// one car drifting across the frame, with a bus entering every third call.
pub struct StubBackend {
    calls: u64,
}

// Class ids from the label table.
const CLASS_BUS: usize = 4;
const CLASS_CAR: usize = 5;

impl StubBackend {
    pub fn new() -> Self {
        Self { calls: 0 }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        let width = width as f32;
        let height = height as f32;

        // Drift the car 8px right per call; wrap when it leaves the frame.
        let x = (50.0 + self.calls as f32 * 8.0) % (width - 120.0).max(1.0);
        let y = height * 0.55;
        let mut detections = vec![Detection::new(
            CLASS_CAR,
            0.91,
            BoundingBox::new(x, y, x + 120.0, y + 80.0).clamp_to(width, height),
        )];

        if self.calls % 3 == 0 {
            detections.push(Detection::new(
                CLASS_BUS,
                0.78,
                BoundingBox::new(width * 0.1, height * 0.3, width * 0.35, height * 0.6),
            ));
        }

        self.calls += 1;
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_backend_plays_back_in_order_then_goes_quiet() {
        let b1 = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b2 = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        let mut backend = ScriptedBackend::new(vec![
            vec![Detection::new(5, 0.9, b1)],
            vec![Detection::new(4, 0.8, b2)],
        ]);

        let first = backend.detect(&[], 640, 480).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].class_id, 5);

        let second = backend.detect(&[], 640, 480).unwrap();
        assert_eq!(second[0].class_id, 4);

        assert!(backend.detect(&[], 640, 480).unwrap().is_empty());
    }

    #[test]
    fn stub_backend_always_reports_a_car_inside_the_frame() {
        let mut backend = StubBackend::new();
        for _ in 0..20 {
            let detections = backend.detect(&[], 640, 480).unwrap();
            let car = detections
                .iter()
                .find(|d| d.class_id == CLASS_CAR)
                .expect("car present in every frame");
            assert!(car.bbox.x1 >= 0.0 && car.bbox.x2 <= 640.0);
            assert!(car.bbox.y1 >= 0.0 && car.bbox.y2 <= 480.0);
        }
    }
}
