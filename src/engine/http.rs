// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Engine adapter for a remote Ultralytics inference server.
//!
//! The server answers `GET /health`, `GET /info` and `POST /predict`; frames are uploaded as
//! a JPEG in the multipart field `image`. Requests are blocking and run on tokio's
//! blocking pool so overlapping ticks do not stall the timer.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use serde::Deserialize;

use super::{Detector, Engine, PoseEstimator};
use crate::download::{agent, describe_error};
use crate::error::{OverlayError, Result};
use crate::frame::Frame;
use crate::results::{BoundingBox, Detection, Keypoint, Pose};
use crate::task::Task;
use crate::verbose;

/// Body timeout for one prediction request.
const PREDICT_TIMEOUT: u64 = 10;

/// Multipart boundary for uploads.
const BOUNDARY: &str = "ultralytics-overlay-frame";

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    task: String,
}

#[derive(Debug, Default, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    detections: Option<Vec<DetectionData>>,
    #[serde(default)]
    poses: Option<Vec<PoseData>>,
}

#[derive(Debug, Deserialize)]
struct DetectionData {
    class_name: String,
    confidence: f32,
    /// `[x1, y1, x2, y2]` in pixels.
    bbox: [f32; 4],
}

#[derive(Debug, Deserialize)]
struct PoseData {
    keypoints: Vec<KeypointData>,
}

#[derive(Debug, Deserialize)]
struct KeypointData {
    x: f32,
    y: f32,
    confidence: f32,
}

impl PredictResponse {
    fn into_detections(self) -> Result<Vec<Detection>> {
        let detections = self.detections.ok_or_else(|| {
            OverlayError::InferenceError("server returned no detections field".into())
        })?;
        Ok(detections
            .into_iter()
            .map(|d| Detection::new(d.class_name, d.confidence, BoundingBox::from_xyxy(d.bbox)))
            .collect())
    }

    fn into_poses(self) -> Result<Vec<Pose>> {
        let poses = self
            .poses
            .ok_or_else(|| OverlayError::InferenceError("server returned no poses field".into()))?;
        Ok(poses
            .into_iter()
            .map(|p| {
                Pose::new(
                    p.keypoints
                        .into_iter()
                        .map(|k| Keypoint::new(k.x, k.y, k.confidence))
                        .collect(),
                )
            })
            .collect())
    }
}

/// Client for a remote inference server.
#[derive(Clone)]
pub struct HttpEngine {
    base_url: String,
    agent: ureq::Agent,
    confidence: Option<f32>,
    max_det: Option<usize>,
    jpeg_quality: u8,
}

impl HttpEngine {
    /// Create a client for the server at `base_url` (e.g. `http://localhost:3000`).
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: agent(Some(Duration::from_secs(PREDICT_TIMEOUT))),
            confidence: None,
            max_det: None,
            jpeg_quality: 85,
        }
    }

    /// Ask the server to drop results below `threshold`.
    #[must_use]
    pub const fn with_confidence(mut self, threshold: f32) -> Self {
        self.confidence = Some(threshold);
        self
    }

    /// Ask the server for at most `max` results.
    #[must_use]
    pub const fn with_max_det(mut self, max: usize) -> Self {
        self.max_det = Some(max);
        self
    }

    /// JPEG quality (1-100) used for uploads.
    #[must_use]
    pub const fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Check that the server is healthy and serves `task`, then wrap it as an [`Engine`].
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::EngineLoadError`] if the server is unreachable, unhealthy or
    /// runs a model for a different task.
    pub async fn load(self, task: Task) -> Result<Engine> {
        let client = self.clone();
        tokio::task::spawn_blocking(move || client.check(task))
            .await
            .map_err(|e| OverlayError::EngineLoadError(format!("health check panicked: {e}")))??;

        Ok(match task {
            Task::Detect => Engine::detector(self),
            Task::Pose => Engine::pose_estimator(self),
        })
    }

    fn check(&self, task: Task) -> Result<()> {
        let health: HealthResponse = self.get_json("health")?;
        if health.status != "healthy" {
            return Err(OverlayError::EngineLoadError(format!(
                "{} reports status '{}'",
                self.base_url, health.status
            )));
        }
        verbose!("Inference server {} v{} is healthy", self.base_url, health.version);

        // Older servers have no /info; only a readable, mismatching task is fatal.
        if let Ok(info) = self.get_json::<InfoResponse>("info")
            && let Ok(served) = info.task.parse::<Task>()
            && served != task
        {
            return Err(OverlayError::EngineLoadError(format!(
                "{} serves a {served} model, expected {task}",
                self.base_url
            )));
        }
        Ok(())
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{path}", self.base_url);
        let body = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| OverlayError::EngineLoadError(describe_error(&url, &e)))?
            .into_body()
            .read_to_vec()
            .map_err(|e| OverlayError::EngineLoadError(format!("Failed to read {url}: {e}")))?;
        serde_json::from_slice(&body)
            .map_err(|e| OverlayError::EngineLoadError(format!("Unexpected answer from {url}: {e}")))
    }

    async fn predict(&self, frame: &Frame) -> Result<PredictResponse> {
        let client = self.clone();
        let frame = frame.clone();
        tokio::task::spawn_blocking(move || client.predict_blocking(&frame))
            .await
            .map_err(|e| OverlayError::InferenceError(format!("request task panicked: {e}")))?
    }

    fn predict_blocking(&self, frame: &Frame) -> Result<PredictResponse> {
        let jpeg = encode_jpeg(frame, self.jpeg_quality)?;
        let body = multipart_body(&jpeg);
        let url = format!("{}/predict", self.base_url);

        let mut request = self.agent.post(&url).header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        if let Some(conf) = self.confidence {
            request = request.query("conf", conf.to_string());
        }
        if let Some(max_det) = self.max_det {
            request = request.query("max_det", max_det.to_string());
        }

        let bytes = request
            .send(&body[..])
            .map_err(|e| OverlayError::InferenceError(describe_error(&url, &e)))?
            .into_body()
            .read_to_vec()
            .map_err(|e| OverlayError::InferenceError(format!("Failed to read {url}: {e}")))?;
        parse_predict(&bytes)
    }
}

#[async_trait]
impl Detector for HttpEngine {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>> {
        self.predict(frame).await?.into_detections()
    }
}

#[async_trait]
impl PoseEstimator for HttpEngine {
    async fn estimate_poses(&self, frame: &Frame) -> Result<Vec<Pose>> {
        self.predict(frame).await?.into_poses()
    }
}

fn parse_predict(bytes: &[u8]) -> Result<PredictResponse> {
    serde_json::from_slice(bytes)
        .map_err(|e| OverlayError::InferenceError(format!("Malformed prediction: {e}")))
}

fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(frame.image())?;
    Ok(buf.into_inner())
}

fn multipart_body(jpeg: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(jpeg.len() + 256);
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"frame.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(jpeg);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detections() {
        let json = br#"{"task":"Detect","inference_time_ms":4.2,"conf_threshold":0.25,"count":1,
            "detections":[{"class_id":0,"class_name":"person","confidence":0.91,"bbox":[10,20,110,220]}]}"#;
        let detections = parse_predict(json).unwrap().into_detections().unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "person");
        assert_eq!(detections[0].bbox, BoundingBox::new(10.0, 20.0, 100.0, 200.0));
    }

    #[test]
    fn test_parse_poses() {
        let json = br#"{"task":"Pose","count":1,"poses":[{"class_id":0,"class_name":"person",
            "confidence":0.9,"bbox":[0,0,1,1],"keypoints":[{"x":1.5,"y":2.5,"confidence":0.7}]}]}"#;
        let poses = parse_predict(json).unwrap().into_poses().unwrap();
        assert_eq!(poses[0].keypoints, vec![Keypoint::new(1.5, 2.5, 0.7)]);
    }

    #[test]
    fn test_task_mismatch_in_payload() {
        let json = br#"{"task":"Pose","count":0,"poses":[]}"#;
        assert!(parse_predict(json).unwrap().into_detections().is_err());
        assert!(parse_predict(b"not json").is_err());
    }

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_body(b"JPEG");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with(&format!("--{BOUNDARY}\r\n")));
        assert!(text.contains("name=\"image\""));
        assert!(text.contains("\r\n\r\nJPEG\r\n"));
        assert!(text.ends_with(&format!("--{BOUNDARY}--\r\n")));
    }

    #[test]
    fn test_encode_jpeg_roundtrips_size() {
        let frame = Frame::new(image::RgbImage::new(16, 8), 0);
        let jpeg = encode_jpeg(&frame, 85).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[tokio::test]
    async fn test_load_unreachable_server() {
        let err = HttpEngine::new("http://127.0.0.1:9/")
            .load(Task::Detect)
            .await
            .unwrap_err();
        assert!(matches!(err, OverlayError::EngineLoadError(_)));
    }
}
