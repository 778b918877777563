use crate::geometry::BoundingBox;

/// One detection in frame space. Produced fresh per frame by a backend;
/// immutable once created.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    /// Index into [`CLASS_NAMES`].
    pub class_id: usize,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class_id: usize, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class_id,
            confidence,
            bbox,
        }
    }
}

/// Class label table of the vehicle detection model, indexed by `class_id`.
pub const CLASS_NAMES: [&str; 21] = [
    "ambulance",
    "army vehicle",
    "auto rickshaw",
    "bicycle",
    "bus",
    "car",
    "garbagevan",
    "human hauler",
    "minibus",
    "minivan",
    "motorbike",
    "pickup",
    "policecar",
    "rickshaw",
    "scooter",
    "suv",
    "taxi",
    "three wheelers -CNG-",
    "truck",
    "van",
    "wheelbarrow",
];

/// Display key for a class id. Ids outside the table render as `class_<id>`
/// rather than failing; the label is only ever used as a map key.
pub fn class_name(class_id: usize) -> String {
    CLASS_NAMES
        .get(class_id)
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("class_{}", class_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_ids_map_to_labels() {
        assert_eq!(class_name(5), "car");
        assert_eq!(class_name(4), "bus");
        assert_eq!(class_name(18), "truck");
    }

    #[test]
    fn unknown_ids_get_a_fallback_key() {
        assert_eq!(class_name(99), "class_99");
    }
}
