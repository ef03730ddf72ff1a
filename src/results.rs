// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Per-frame inference output.
//!
//! Everything here is produced fresh by one inference call and discarded after the
//! overlay for that tick has been drawn. There is no identity across frames.

use crate::task::Task;

/// Number of keypoints in one pose (COCO order).
pub const NUM_KEYPOINTS: usize = 17;

/// Axis-aligned box in source-pixel coordinates, stored as top-left corner plus size.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Box width.
    pub width: f32,
    /// Box height.
    pub height: f32,
}

impl BoundingBox {
    /// Create a box from its top-left corner and size.
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a box from corner coordinates `[x1, y1, x2, y2]`.
    ///
    /// Corners may be given in either order.
    #[must_use]
    pub fn from_xyxy(xyxy: [f32; 4]) -> Self {
        let [x1, y1, x2, y2] = xyxy;
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }

    /// Corner coordinates `[x1, y1, x2, y2]`.
    #[must_use]
    pub fn xyxy(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    /// Box area in square pixels.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// One labeled, scored box returned by a detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Class name, e.g. `"person"`.
    pub label: String,
    /// Score in `[0, 1]`.
    pub confidence: f32,
    /// Box in source-pixel coordinates.
    pub bbox: BoundingBox,
}

impl Detection {
    /// Create a new detection.
    #[must_use]
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }
}

/// One scored body landmark.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoint {
    /// X coordinate in pixels.
    pub x: f32,
    /// Y coordinate in pixels.
    pub y: f32,
    /// Score in `[0, 1]`.
    pub confidence: f32,
}

impl Keypoint {
    /// Create a new keypoint.
    #[must_use]
    pub const fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// Whether this keypoint scores strictly above `threshold`.
    #[must_use]
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.confidence > threshold
    }
}

/// Keypoints of one person, indexed positionally.
///
/// Index meaning (nose, left eye, ...) is a convention of the engine, not checked here.
/// Engines normally return [`NUM_KEYPOINTS`] entries; skeleton edges whose indices fall
/// outside a shorter list are skipped when drawing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pose {
    /// Ordered keypoints.
    pub keypoints: Vec<Keypoint>,
}

impl Pose {
    /// Create a pose from its keypoints.
    #[must_use]
    pub const fn new(keypoints: Vec<Keypoint>) -> Self {
        Self { keypoints }
    }
}

/// Output of one inference call.
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    /// Detector output.
    Detections(Vec<Detection>),
    /// Pose estimator output.
    Poses(Vec<Pose>),
}

impl Prediction {
    /// Task that produced this prediction.
    #[must_use]
    pub const fn task(&self) -> Task {
        match self {
            Self::Detections(_) => Task::Detect,
            Self::Poses(_) => Task::Pose,
        }
    }

    /// Number of entries (detections or poses).
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Detections(d) => d.len(),
            Self::Poses(p) => p.len(),
        }
    }

    /// Whether the engine returned nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_from_xyxy() {
        let b = BoundingBox::from_xyxy([10.0, 20.0, 40.0, 60.0]);
        assert_eq!(b, BoundingBox::new(10.0, 20.0, 30.0, 40.0));
        assert_eq!(b.xyxy(), [10.0, 20.0, 40.0, 60.0]);
        assert!((b.area() - 1200.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_bbox_from_swapped_corners() {
        let b = BoundingBox::from_xyxy([40.0, 60.0, 10.0, 20.0]);
        assert_eq!(b, BoundingBox::new(10.0, 20.0, 30.0, 40.0));
    }

    #[test]
    fn test_keypoint_visibility_is_strict() {
        assert!(!Keypoint::new(0.0, 0.0, 0.3).is_visible(0.3));
        assert!(Keypoint::new(0.0, 0.0, 0.31).is_visible(0.3));
    }

    #[test]
    fn test_prediction_task_and_len() {
        let p = Prediction::Detections(vec![Detection::new(
            "cat",
            0.9,
            BoundingBox::default(),
        )]);
        assert_eq!(p.task(), Task::Detect);
        assert_eq!(p.len(), 1);
        assert!(Prediction::Poses(vec![]).is_empty());
    }
}
