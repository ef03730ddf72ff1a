// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Inference engine capabilities.
//!
//! The overlay loop only knows two operations: [`Detector::detect`] and
//! [`PoseEstimator::estimate_poses`]. Concrete engines (an HTTP inference server, an
//! in-process model, a test double) live behind these traits.

mod http;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::frame::Frame;
use crate::results::{Detection, Pose, Prediction};
use crate::task::Task;
use crate::{error, section, success};

pub use http::HttpEngine;

/// An object detector.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Detect objects in one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails for this frame.
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>>;
}

/// A pose estimator.
#[async_trait]
pub trait PoseEstimator: Send + Sync {
    /// Estimate the poses of all people in one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails for this frame.
    async fn estimate_poses(&self, frame: &Frame) -> Result<Vec<Pose>>;
}

/// A loaded inference capability, shared by every tick of a loop.
#[derive(Clone)]
pub enum Engine {
    /// Draws boxes and labels.
    Detector(Arc<dyn Detector>),
    /// Draws keypoints and skeleton edges.
    PoseEstimator(Arc<dyn PoseEstimator>),
}

impl Engine {
    /// Wrap a detector.
    pub fn detector(detector: impl Detector + 'static) -> Self {
        Self::Detector(Arc::new(detector))
    }

    /// Wrap a pose estimator.
    pub fn pose_estimator(estimator: impl PoseEstimator + 'static) -> Self {
        Self::PoseEstimator(Arc::new(estimator))
    }

    /// Task this engine performs.
    #[must_use]
    pub const fn task(&self) -> Task {
        match self {
            Self::Detector(_) => Task::Detect,
            Self::PoseEstimator(_) => Task::Pose,
        }
    }

    /// Run inference on one frame.
    ///
    /// # Errors
    ///
    /// Propagates the engine's error for this frame.
    pub async fn infer(&self, frame: &Frame) -> Result<Prediction> {
        match self {
            Self::Detector(d) => d.detect(frame).await.map(Prediction::Detections),
            Self::PoseEstimator(p) => p.estimate_poses(frame).await.map(Prediction::Poses),
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Engine").field(&self.task()).finish()
    }
}

/// Await an engine constructor, logging instead of failing.
///
/// Returns `None` if construction fails; callers must check before starting a loop.
pub async fn load_inference_engine<F>(load: F) -> Option<Engine>
where
    F: Future<Output = Result<Engine>>,
{
    section!("Loading inference engine...");
    match load.await {
        Ok(engine) => {
            success!("Engine loaded ({})", engine.task());
            Some(engine)
        }
        Err(e) => {
            error!("Engine loading failed: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OverlayError;
    use crate::results::{BoundingBox, Keypoint};

    struct OneBox;

    #[async_trait]
    impl Detector for OneBox {
        async fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>> {
            Ok(vec![Detection::new(
                "dog",
                0.8,
                BoundingBox::new(1.0, 2.0, 3.0, 4.0),
            )])
        }
    }

    struct NoPeople;

    #[async_trait]
    impl PoseEstimator for NoPeople {
        async fn estimate_poses(&self, _frame: &Frame) -> Result<Vec<Pose>> {
            Ok(vec![Pose::new(vec![Keypoint::default(); 17])])
        }
    }

    fn frame() -> Frame {
        Frame::new(image::RgbImage::new(4, 4), 0)
    }

    #[tokio::test]
    async fn test_engine_dispatch() {
        let engine = Engine::detector(OneBox);
        assert_eq!(engine.task(), Task::Detect);
        let prediction = engine.infer(&frame()).await.unwrap();
        assert_eq!(prediction.len(), 1);

        let engine = Engine::pose_estimator(NoPeople);
        assert_eq!(engine.task(), Task::Pose);
        assert!(matches!(
            engine.infer(&frame()).await.unwrap(),
            Prediction::Poses(p) if p[0].keypoints.len() == 17
        ));
    }

    #[tokio::test]
    async fn test_load_failure_returns_none() {
        let loaded =
            load_inference_engine(async { Err(OverlayError::EngineLoadError("no model".into())) })
                .await;
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_load_success() {
        let loaded = load_inference_engine(async { Ok(Engine::detector(OneBox)) }).await;
        assert_eq!(loaded.map(|e| e.task()), Some(Task::Detect));
    }
}
