// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Ultralytics Live Overlay Library
//!
//! Poll an object detector or pose estimator over a live visual source on a fixed timer and
//! draw each result onto a render surface: boxes with labels, or keypoints joined by a
//! skeleton.
//!
//! ## Features
//!
//! - **Fixed-period loop** - A tokio interval drives inference; slow calls overlap instead of
//!   delaying the timer
//! - **Ordered redraws** - Late completions are dropped so the overlay never goes back in time
//! - **Pluggable engines** - Anything implementing [`Detector`] or [`PoseEstimator`], with a
//!   ready-made client for an Ultralytics inference server ([`HttpEngine`])
//! - **Multiple Sources** - Images, image URLs, Motion JPEG cameras, and video files or
//!   streams with the `video` feature
//! - **Headless or windowed** - Draw into a [`RecordingCanvas`], an [`ImageCanvas`], or a
//!   live window
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use std::sync::{Arc, Mutex};
//! use ultralytics_overlay::{HttpEngine, ImageCanvas, Preset, Resolution, Source, start};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let preset = Preset::WebcamDetect;
//!     let source = Source::from("http://192.168.1.20:81/stream").open()?;
//!     let canvas = Arc::new(Mutex::new(ImageCanvas::with_default_font(Resolution::new(1, 1))));
//!     let engine = HttpEngine::new("http://localhost:3000").load(preset.task());
//!
//!     let Some(handle) = start(source, Arc::clone(&canvas), engine, preset.config()).await else {
//!         return Ok(());
//!     };
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(10)).await;
//!     handle.stop();
//!     canvas.lock().unwrap().save("overlay.png".as_ref())?;
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Boxes over an ESP32-CAM stream, twice a second at 240x240
//! ultralytics-overlay detect --source http://192.168.1.20:81/stream --preset stream-detect --show
//!
//! # Skeletons over a webcam, saving every redraw
//! ultralytics-overlay pose --source /dev/video0 --engine http://localhost:3000 --save
//! ```
//!
//! **CLI Options:**
//!
//! | Option | Description | Default |
//! |--------|-------------|---------|
//! | `--source`, `-s` | Image, image URL, MJPEG URL, video or stream | required |
//! | `--engine`, `-e` | Inference server base URL | `http://localhost:3000` |
//! | `--preset` | `stream-detect`, `webcam-detect` or `webcam-pose` | per task |
//! | `--interval` | Tick period in milliseconds | preset |
//! | `--imgsz` | Fixed canvas size, `WxH` or a single side | preset |
//! | `--conf` | Confidence threshold sent to the server | server |
//! | `--max-det` | Maximum results per frame sent to the server | server |
//! | `--jpeg-quality` | JPEG quality of uploaded frames | `85` |
//! | `--threshold` | Keypoint confidence threshold | `0.3` |
//! | `--color` | Box, label and skeleton color | preset |
//! | `--ordering` | `drop-stale` or `unordered` | `drop-stale` |
//! | `--save` | Save redraws to `runs/<task>/overlay` | `false` |
//! | `--show` | Display the overlay in a window | `false` |
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`overlay`] | The loop: [`OverlayContext`], [`LoopConfig`], [`Preset`], [`LoopHandle`] |
//! | [`engine`] | [`Detector`], [`PoseEstimator`], [`Engine`] and [`HttpEngine`] |
//! | [`source`] | Input sources ([`Source`], [`FrameSource`]) |
//! | [`canvas`] | Render surfaces ([`Canvas`], [`RecordingCanvas`]) |
//! | [`annotate`] | Drawing detections and poses ([`Annotator`]) |
//! | [`results`] | Output types ([`Detection`], [`Keypoint`], [`Pose`]) |
//! | [`error`] | Error types ([`OverlayError`], [`Result`]) |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `annotate` | Raster canvas with fonts (default) |
//! | `visualize` | Real-time window display (default) |
//! | `video` | Video file, camera and stream decoding |
//!
//! ## License
//!
//! This project is licensed under [AGPL-3.0](https://ultralytics.com/license).

// Modules
pub mod annotate;
pub mod canvas;
pub mod download;
pub mod engine;
pub mod error;
pub mod frame;
pub mod logging;
pub mod overlay;
pub mod results;
pub mod source;
pub mod task;
pub mod utils;
pub mod visualizer;

// Re-export main types for convenience
pub use annotate::{Annotator, DetectionStyle, PoseStyle};
#[cfg(feature = "annotate")]
pub use canvas::ImageCanvas;
pub use canvas::{Canvas, DrawCommand, RecordingCanvas, Stroke, TextStyle};
pub use engine::{Detector, Engine, HttpEngine, PoseEstimator, load_inference_engine};
pub use error::{OverlayError, Result};
pub use frame::{Frame, Resolution};
pub use overlay::{
    LoopConfig, LoopHandle, LoopStats, OrderingPolicy, OverlayContext, Preset, start,
};
pub use results::{BoundingBox, Detection, Keypoint, Pose, Prediction};
pub use source::{FrameSource, MjpegSource, Source, StillSource};
pub use task::Task;
pub use visualizer::{Color, SKELETON};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "ultralytics-overlay");
    }
}
