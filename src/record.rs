//! Per-frame detection records.
//!
//! One record is produced per sampled frame and handed to the persistence
//! and publish collaborators immediately; the pipeline keeps no reference.

use std::collections::BTreeMap;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::detect::{class_name, Detection};

/// Aggregated result for one sampled frame.
///
/// `class_counts` covers every detection visible in the frame, not just the
/// newly appeared ones, and omits zero-count classes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DetectionRecord {
    /// ISO-8601 wall-clock timestamp of record construction.
    pub timestamp: String,
    pub vehicles_detected: usize,
    pub class_counts: BTreeMap<String, usize>,
}

impl DetectionRecord {
    /// Build a record from one frame's detections, stamped with the current
    /// local time.
    pub fn from_detections(detections: &[Detection]) -> Self {
        let mut class_counts: BTreeMap<String, usize> = BTreeMap::new();
        for det in detections {
            *class_counts.entry(class_name(det.class_id)).or_insert(0) += 1;
        }
        Self {
            timestamp: Local::now().to_rfc3339(),
            vehicles_detected: detections.len(),
            class_counts,
        }
    }
}
