//! Frame-to-frame vehicle association.
//!
//! Not a general multi-object tracker: no Kalman filtering, no track ids, no
//! occlusion handling. Each detection is greedily matched against the
//! last-known boxes by class and IoU; anything unmatched is a new vehicle.

use crate::detect::Detection;
use crate::geometry::{iou, BoundingBox};

pub const DEFAULT_IOU_THRESHOLD: f32 = 0.5;

/// Last observed state of a vehicle presumed still in frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackedVehicle {
    pub class_id: usize,
    pub bbox: BoundingBox,
    /// Update-call index at which this vehicle was last matched.
    last_seen: u64,
}

/// When, if ever, stale entries leave the tracked set.
///
/// The historical behavior is `None`: the set grows for the lifetime of a
/// run, and stale entries can absorb detections that coincidentally overlap
/// them. Downstream consumers may depend on that, so eviction is opt-in.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum EvictionPolicy {
    #[default]
    None,
    /// Keep at most this many entries; the oldest are dropped first.
    MaxTracks(usize),
    /// Drop entries not refreshed within this many update calls.
    MaxAge { frames: u64 },
}

/// Greedy per-frame vehicle tracker. One instance per pipeline run.
pub struct VehicleTracker {
    tracked: Vec<TrackedVehicle>,
    iou_threshold: f32,
    eviction: EvictionPolicy,
    frame_index: u64,
}

impl VehicleTracker {
    pub fn new(iou_threshold: f32, eviction: EvictionPolicy) -> Self {
        Self {
            tracked: Vec::new(),
            iou_threshold,
            eviction,
            frame_index: 0,
        }
    }

    pub fn tracked(&self) -> &[TrackedVehicle] {
        &self.tracked
    }

    /// Associate one frame's detections with the tracked set and return the
    /// vehicles that appeared for the first time.
    ///
    /// Matching is single-pass and first-fit, in detector order: the first
    /// tracked entry with the same class whose IoU exceeds the threshold
    /// wins, and its box is replaced in place. A detection that matches
    /// nothing is appended immediately, so later detections in the same call
    /// can match it. That bias (under-counting "new" vehicles in crowded
    /// frames) is the intended association policy.
    ///
    /// Never fails; empty inputs degenerate to "every detection is new".
    pub fn update(&mut self, detections: &[Detection]) -> Vec<TrackedVehicle> {
        self.frame_index += 1;
        let mut new_vehicles = Vec::new();

        for det in detections {
            let slot = self.tracked.iter_mut().find(|t| {
                t.class_id == det.class_id && iou(&det.bbox, &t.bbox) > self.iou_threshold
            });
            match slot {
                Some(t) => {
                    t.bbox = det.bbox;
                    t.last_seen = self.frame_index;
                }
                None => {
                    let entry = TrackedVehicle {
                        class_id: det.class_id,
                        bbox: det.bbox,
                        last_seen: self.frame_index,
                    };
                    new_vehicles.push(entry);
                    self.tracked.push(entry);
                }
            }
        }

        // Eviction runs after matching, so enabling a policy never changes
        // the outcome of the call that triggered it.
        self.evict();
        new_vehicles
    }

    fn evict(&mut self) {
        match self.eviction {
            EvictionPolicy::None => {}
            EvictionPolicy::MaxTracks(max) => {
                let len = self.tracked.len();
                if len > max {
                    self.tracked.drain(..len - max);
                }
            }
            EvictionPolicy::MaxAge { frames } => {
                let cutoff = self.frame_index;
                self.tracked.retain(|t| cutoff - t.last_seen <= frames);
            }
        }
    }
}

impl Default for VehicleTracker {
    fn default() -> Self {
        Self::new(DEFAULT_IOU_THRESHOLD, EvictionPolicy::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;

    fn det(class_id: usize, bbox: BoundingBox) -> Detection {
        Detection::new(class_id, 0.9, bbox)
    }

    #[test]
    fn first_detection_is_new() {
        let b = BoundingBox::new(10.0, 10.0, 110.0, 90.0);
        let mut tracker = VehicleTracker::default();

        let new = tracker.update(&[det(5, b)]);

        assert_eq!(new.len(), 1);
        assert_eq!(new[0].class_id, 5);
        assert_eq!(new[0].bbox, b);
        assert_eq!(tracker.tracked().len(), 1);
        assert_eq!(tracker.tracked()[0].bbox, b);
    }

    #[test]
    fn overlapping_detection_updates_in_place() {
        let b = BoundingBox::new(10.0, 10.0, 110.0, 90.0);
        // Shifted slightly: IoU well above 0.5.
        let b_moved = BoundingBox::new(14.0, 10.0, 114.0, 90.0);
        let mut tracker = VehicleTracker::default();
        tracker.update(&[det(5, b)]);

        let new = tracker.update(&[det(5, b_moved)]);

        assert!(new.is_empty());
        assert_eq!(tracker.tracked().len(), 1);
        assert_eq!(tracker.tracked()[0].bbox, b_moved);
    }

    #[test]
    fn low_overlap_detection_becomes_a_second_entry() {
        let b = BoundingBox::new(10.0, 10.0, 110.0, 90.0);
        let far = BoundingBox::new(400.0, 300.0, 500.0, 380.0);
        let mut tracker = VehicleTracker::default();
        tracker.update(&[det(5, b)]);

        let new = tracker.update(&[det(5, far)]);

        assert_eq!(new.len(), 1);
        assert_eq!(new[0].bbox, far);
        assert_eq!(tracker.tracked().len(), 2);
        assert_eq!(tracker.tracked()[0].bbox, b);
        assert_eq!(tracker.tracked()[1].bbox, far);
    }

    #[test]
    fn class_mismatch_never_matches() {
        let b = BoundingBox::new(10.0, 10.0, 110.0, 90.0);
        let mut tracker = VehicleTracker::default();
        tracker.update(&[det(5, b)]);

        // Identical box, different class: must not match.
        let new = tracker.update(&[det(4, b)]);

        assert_eq!(new.len(), 1);
        assert_eq!(tracker.tracked().len(), 2);
    }

    #[test]
    fn later_detection_can_match_entry_appended_in_same_call() {
        // Two near-identical same-class boxes in one frame: the first becomes
        // a new track, the second matches it instead of becoming new itself.
        let b = BoundingBox::new(10.0, 10.0, 110.0, 90.0);
        let b_close = BoundingBox::new(12.0, 10.0, 112.0, 90.0);
        let mut tracker = VehicleTracker::default();

        let new = tracker.update(&[det(5, b), det(5, b_close)]);

        assert_eq!(new.len(), 1);
        assert_eq!(tracker.tracked().len(), 1);
        assert_eq!(tracker.tracked()[0].bbox, b_close);
    }

    #[test]
    fn empty_inputs_are_fine() {
        let mut tracker = VehicleTracker::default();
        assert!(tracker.update(&[]).is_empty());

        let b = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let new = tracker.update(&[det(3, b)]);
        assert_eq!(new.len(), 1);
    }

    #[test]
    fn no_eviction_grows_without_bound() {
        let mut tracker = VehicleTracker::default();
        for i in 0..50 {
            let x = i as f32 * 200.0;
            tracker.update(&[det(5, BoundingBox::new(x, 0.0, x + 100.0, 80.0))]);
        }
        assert_eq!(tracker.tracked().len(), 50);
    }

    #[test]
    fn max_tracks_drops_oldest_entries() {
        let mut tracker = VehicleTracker::new(0.5, EvictionPolicy::MaxTracks(2));
        for i in 0..4 {
            let x = i as f32 * 200.0;
            tracker.update(&[det(5, BoundingBox::new(x, 0.0, x + 100.0, 80.0))]);
        }
        assert_eq!(tracker.tracked().len(), 2);
        // Entries for x=400 and x=600 survive.
        assert_eq!(tracker.tracked()[0].bbox.x1, 400.0);
        assert_eq!(tracker.tracked()[1].bbox.x1, 600.0);
    }

    #[test]
    fn max_age_drops_stale_entries() {
        let mut tracker = VehicleTracker::new(0.5, EvictionPolicy::MaxAge { frames: 1 });
        let near = BoundingBox::new(0.0, 0.0, 100.0, 80.0);
        let far = BoundingBox::new(400.0, 300.0, 500.0, 380.0);

        tracker.update(&[det(5, near), det(5, far)]);
        assert_eq!(tracker.tracked().len(), 2);

        // Only the near vehicle shows up for two more frames; the far entry
        // ages out after missing more than one update.
        tracker.update(&[det(5, near)]);
        assert_eq!(tracker.tracked().len(), 2);
        tracker.update(&[det(5, near)]);
        assert_eq!(tracker.tracked().len(), 1);
        assert_eq!(tracker.tracked()[0].bbox, near);
    }
}
