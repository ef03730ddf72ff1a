// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Visual sources for overlay loops.
//!
//! A source produces the frame the engine sees on each tick and reports its native
//! resolution once ready. Live sources decode on a background thread and publish the
//! latest frame through a [`tokio::sync::watch`] channel; a tick always sees the most
//! recent frame and never waits for a new one.

mod mjpeg;
mod still;
#[cfg(feature = "video")]
mod video;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::{OverlayError, Result};
use crate::frame::{Frame, Resolution};

pub use mjpeg::{MjpegReader, MjpegSource};
pub use still::StillSource;
#[cfg(feature = "video")]
pub use video::VideoSource;

/// A visual source the overlay loop can pull frames from.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Wait until the first frame is available and return its native resolution.
    ///
    /// Resolves immediately if the source is already complete.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails before delivering a frame.
    async fn ready(&self) -> Result<Resolution>;

    /// Latest decoded frame, or `None` before the first one arrives.
    fn current_frame(&self) -> Option<Frame>;

    /// Human-readable name for logs.
    fn describe(&self) -> String;
}

/// Represents the input sources an overlay can run on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Path to an image file.
    Image(PathBuf),
    /// HTTP/HTTPS URL to a single image file.
    ImageUrl(String),
    /// HTTP/HTTPS Motion JPEG endpoint (`multipart/x-mixed-replace`).
    Mjpeg(String),
    /// Path to a video file.
    Video(PathBuf),
    /// Streaming URL (RTSP, RTMP).
    Stream(String),
}

impl Source {
    /// Check if this source is a single still image.
    #[must_use]
    pub const fn is_image(&self) -> bool {
        matches!(self, Self::Image(_) | Self::ImageUrl(_))
    }

    /// Check if this source keeps producing frames.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Mjpeg(_) | Self::Video(_) | Self::Stream(_))
    }

    /// Check if decoding this source needs the `video` feature.
    #[must_use]
    pub const fn needs_video(&self) -> bool {
        matches!(self, Self::Video(_) | Self::Stream(_))
    }

    /// Open the source and start decoding.
    ///
    /// Live sources return immediately; use [`FrameSource::ready`] to wait for the first
    /// frame.
    ///
    /// # Errors
    ///
    /// Returns an error if a still image cannot be loaded, or if video decoding is
    /// requested without the `video` feature.
    pub fn open(&self) -> Result<Arc<dyn FrameSource>> {
        match self {
            Self::Image(path) => Ok(Arc::new(StillSource::open(path)?)),
            Self::ImageUrl(url) => Ok(Arc::new(StillSource::download(url)?)),
            Self::Mjpeg(url) => Ok(Arc::new(MjpegSource::connect(url))),
            #[cfg(feature = "video")]
            Self::Video(path) => Ok(Arc::new(VideoSource::open(path.clone(), true))),
            #[cfg(feature = "video")]
            Self::Stream(url) => Ok(Arc::new(VideoSource::open(PathBuf::from(url), false))),
            #[cfg(not(feature = "video"))]
            Self::Video(_) | Self::Stream(_) => Err(OverlayError::FeatureNotEnabled(
                "Video support requires 'video' feature".to_string(),
            )),
        }
    }

    /// Check if a URL points to an image based on extension.
    fn is_image_url(url: &str) -> bool {
        let url_lower = url.to_lowercase();
        let path_part = url_lower.split('?').next().unwrap_or(&url_lower);
        Self::has_image_extension(Path::new(path_part))
    }

    fn has_image_extension(path: &Path) -> bool {
        path.extension().is_some_and(|ext| {
            matches!(
                ext.to_string_lossy().to_lowercase().as_str(),
                "jpg" | "jpeg" | "png" | "bmp" | "webp"
            )
        })
    }
}

/// Convert from a CLI string to Source.
impl From<&str> for Source {
    fn from(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            if Self::is_image_url(s) {
                return Self::ImageUrl(s.to_string());
            }
            return Self::Mjpeg(s.to_string());
        }

        if s.starts_with("rtsp://") || s.starts_with("rtmp://") {
            return Self::Stream(s.to_string());
        }

        let path = PathBuf::from(s);
        if Self::has_image_extension(&path) {
            Self::Image(path)
        } else {
            Self::Video(path)
        }
    }
}

impl From<String> for Source {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

/// State published by a live source.
#[derive(Debug, Clone, Default)]
pub(crate) struct FeedState {
    frame: Option<Frame>,
    error: Option<String>,
}

/// Writer half of a live source: the decoding thread publishes frames here.
#[derive(Debug)]
pub(crate) struct FeedWriter {
    tx: watch::Sender<FeedState>,
    next_index: u64,
}

impl FeedWriter {
    pub(crate) fn publish(&mut self, image: image::RgbImage) {
        let frame = Frame::new(image, self.next_index);
        self.next_index += 1;
        self.tx.send_modify(|state| state.frame = Some(frame));
    }

    /// Record a terminal failure. The last good frame, if any, stays available.
    pub(crate) fn fail(&self, message: String) {
        self.tx.send_modify(|state| state.error = Some(message));
    }

    /// Whether every reader is gone, i.e. the source was dropped.
    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Reader half of a live source.
#[derive(Debug, Clone)]
pub(crate) struct Feed {
    rx: watch::Receiver<FeedState>,
}

impl Feed {
    pub(crate) fn channel() -> (FeedWriter, Self) {
        let (tx, rx) = watch::channel(FeedState::default());
        (FeedWriter { tx, next_index: 0 }, Self { rx })
    }

    pub(crate) async fn ready(&self, name: &str) -> Result<Resolution> {
        let mut rx = self.rx.clone();
        // `wait_for` checks the current value first, so a feed that already has a frame
        // resolves without waiting for another update.
        let state = rx
            .wait_for(|s| s.frame.is_some() || s.error.is_some())
            .await
            .map_err(|_| {
                OverlayError::SourceError(format!("{name} closed before the first frame"))
            })?;
        match (&state.frame, &state.error) {
            (Some(frame), _) => Ok(frame.resolution()),
            (None, Some(err)) => Err(OverlayError::SourceError(format!("{name}: {err}"))),
            (None, None) => Err(OverlayError::SourceError(format!("{name} is not ready"))),
        }
    }

    pub(crate) fn latest(&self) -> Option<Frame> {
        self.rx.borrow().frame.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_from_string() {
        assert!(matches!(Source::from("image.jpg"), Source::Image(_)));
        assert!(matches!(Source::from("video.mp4"), Source::Video(_)));
        assert!(matches!(
            Source::from("rtsp://example.com/cam"),
            Source::Stream(_)
        ));
        assert!(matches!(
            Source::from("http://192.168.1.20:81/stream"),
            Source::Mjpeg(_)
        ));
        assert!(matches!(
            Source::from("https://ultralytics.com/images/bus.jpg?x=1"),
            Source::ImageUrl(_)
        ));
    }

    #[test]
    fn test_source_checks() {
        let img = Source::Image(PathBuf::from("test.jpg"));
        assert!(img.is_image());
        assert!(!img.is_live());

        let cam = Source::Mjpeg("http://cam/stream".into());
        assert!(cam.is_live());
        assert!(!cam.needs_video());
        assert!(Source::Stream("rtsp://x".into()).needs_video());
    }

    #[tokio::test]
    async fn test_feed_ready_after_publish() {
        let (mut writer, feed) = Feed::channel();
        assert!(feed.latest().is_none());

        writer.publish(image::RgbImage::new(8, 6));
        assert_eq!(feed.ready("cam").await.unwrap(), Resolution::new(8, 6));
        assert_eq!(feed.latest().unwrap().index(), 0);

        writer.publish(image::RgbImage::new(8, 6));
        assert_eq!(feed.latest().unwrap().index(), 1);
    }

    #[tokio::test]
    async fn test_feed_failure_before_first_frame() {
        let (writer, feed) = Feed::channel();
        writer.fail("connection refused".into());
        let err = feed.ready("cam").await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_feed_writer_dropped() {
        let (writer, feed) = Feed::channel();
        drop(writer);
        assert!(feed.ready("cam").await.is_err());
    }

    #[test]
    #[cfg(not(feature = "video"))]
    fn test_video_without_feature() {
        let err = Source::from("clip.mp4").open().err().unwrap();
        assert!(matches!(err, OverlayError::FeatureNotEnabled(_)));
    }
}
