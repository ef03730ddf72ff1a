// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Task definitions for overlay loops.
//!
//! A loop either draws object detections (boxes and labels) or pose estimates
//! (keypoints and skeleton edges).

use std::fmt;
use std::str::FromStr;

/// Inference task driven by an overlay loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Task {
    /// Object detection - labeled, scored bounding boxes.
    #[default]
    Detect,
    /// Pose estimation - 17 scored keypoints per person.
    Pose,
}

impl Task {
    /// Returns the string representation used by the CLI and inference servers.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Detect => "detect",
            Self::Pose => "pose",
        }
    }

    /// Returns whether this task produces bounding boxes.
    #[must_use]
    pub const fn has_boxes(&self) -> bool {
        matches!(self, Self::Detect)
    }

    /// Returns whether this task produces keypoints.
    #[must_use]
    pub const fn has_keypoints(&self) -> bool {
        matches!(self, Self::Pose)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Task {
    type Err = TaskParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "detect" | "detection" => Ok(Self::Detect),
            "pose" | "keypoint" | "keypoints" => Ok(Self::Pose),
            _ => Err(TaskParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an invalid task string.
#[derive(Debug, Clone)]
pub struct TaskParseError(String);

impl fmt::Display for TaskParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task '{}', expected one of: detect, pose", self.0)
    }
}

impl std::error::Error for TaskParseError {}
