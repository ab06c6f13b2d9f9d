use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Object classes the line can sort.
///
/// The set is closed: every model class id either maps to one of these
/// variants or is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    DietCoke,
    OriginalCoke,
}

impl ObjectClass {
    /// All classes, in model class id order.
    pub const ALL: [ObjectClass; 2] = [ObjectClass::DietCoke, ObjectClass::OriginalCoke];

    /// Map a model class id onto the closed class set.
    pub fn from_class_id(id: usize) -> Result<Self> {
        Self::ALL
            .get(id)
            .copied()
            .ok_or(Error::UnknownClass(id))
    }

    pub fn class_id(&self) -> usize {
        match self {
            ObjectClass::DietCoke => 0,
            ObjectClass::OriginalCoke => 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ObjectClass::DietCoke => "Diet Coke",
            ObjectClass::OriginalCoke => "Original Coke",
        }
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Axis-aligned box in frame pixel coordinates, corner form.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
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

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 || !union.is_finite() {
            return 0.0;
        }
        inter / union
    }
}

/// One classified object in one frame. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: ObjectClass,
    /// Model confidence in [0, 1]
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class: ObjectClass, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class,
            confidence,
            bbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_id_mapping_is_total() {
        for class in ObjectClass::ALL {
            assert_eq!(ObjectClass::from_class_id(class.class_id()).unwrap(), class);
        }
    }

    #[test]
    fn test_unknown_class_rejected() {
        match ObjectClass::from_class_id(2) {
            Err(Error::UnknownClass(2)) => {}
            other => panic!("Expected UnknownClass, got {:?}", other),
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(ObjectClass::DietCoke.label(), "Diet Coke");
        assert_eq!(ObjectClass::OriginalCoke.to_string(), "Original Coke");
    }

    #[test]
    fn test_bbox_iou() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 15.0, 10.0);
        let iou = a.iou(&b);
        assert!((iou - 50.0 / 150.0).abs() < 1e-6);

        let far = BoundingBox::new(100.0, 100.0, 110.0, 110.0);
        assert_eq!(a.iou(&far), 0.0);
        assert_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_degenerate_bbox() {
        let inverted = BoundingBox::new(10.0, 10.0, 0.0, 0.0);
        assert_eq!(inverted.area(), 0.0);
        assert_eq!(inverted.iou(&inverted), 0.0);
    }
}
