use serde::{Deserialize, Serialize};

pub const FLOOR_LABEL: &str = "floor";

/// Normalized box, `(x1, y1)` top-left and `(x2, y2)` bottom-right, all in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.clamp(0.0, 1.0),
            y1: y1.clamp(0.0, 1.0),
            x2: x2.clamp(0.0, 1.0),
            y2: y2.clamp(0.0, 1.0),
        }
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedObject {
    pub label: String,
    #[serde(default)]
    pub bounding_box: BoundingBox,
}

impl DetectedObject {
    pub fn is_floor(&self) -> bool {
        self.label.trim().eq_ignore_ascii_case(FLOOR_LABEL)
    }
}

pub fn find_floor(objects: &[DetectedObject]) -> Option<&DetectedObject> {
    objects.iter().find(|object| object.is_floor())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn center_is_box_midpoint() {
        let bbox = BoundingBox::new(0.1, 0.5, 0.9, 1.0);
        let (x, y) = bbox.center();
        assert!((x - 0.5).abs() < 1e-9);
        assert!((y - 0.75).abs() < 1e-9);
    }

    #[test]
    fn new_clamps_out_of_range_coordinates() {
        let bbox = BoundingBox::new(-0.2, 0.3, 1.4, 0.9);
        assert_eq!(bbox.x1, 0.0);
        assert_eq!(bbox.x2, 1.0);
    }

    #[test]
    fn floor_lookup_ignores_case() -> anyhow::Result<()> {
        let objects: Vec<DetectedObject> = serde_json::from_value(json!([
            {"label": "rug", "boundingBox": {"x1": 0.2, "y1": 0.6, "x2": 0.4, "y2": 0.8}},
            {"label": "Floor", "boundingBox": {"x1": 0.0, "y1": 0.5, "x2": 1.0, "y2": 1.0}}
        ]))?;
        let floor = find_floor(&objects).map(|object| object.bounding_box);
        assert_eq!(floor, Some(BoundingBox::new(0.0, 0.5, 1.0, 1.0)));
        assert!(find_floor(&objects[..1]).is_none());
        Ok(())
    }
}
