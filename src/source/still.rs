// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::Path;

use async_trait::async_trait;
use image::DynamicImage;

use super::FrameSource;
use crate::error::{OverlayError, Result};
use crate::frame::{Frame, Resolution};

/// A source that always shows the same image.
///
/// It is complete from the moment it is constructed, so [`FrameSource::ready`] never waits.
#[derive(Debug, Clone)]
pub struct StillSource {
    frame: Frame,
    name: String,
}

impl StillSource {
    /// Wrap an in-memory image.
    #[must_use]
    pub fn new(image: &DynamicImage, name: impl Into<String>) -> Self {
        Self {
            frame: Frame::from_dynamic(image, 0),
            name: name.into(),
        }
    }

    /// Load an image file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path).map_err(|e| {
            OverlayError::SourceError(format!("Failed to load {}: {e}", path.display()))
        })?;
        Ok(Self::new(&image, path.display().to_string()))
    }

    /// Download an image from a URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a decodable image.
    pub fn download(url: &str) -> Result<Self> {
        let bytes = crate::download::fetch_bytes(url)
            .map_err(|e| OverlayError::SourceError(format!("Failed to download {url}: {e}")))?;
        let image = image::load_from_memory(&bytes).map_err(|e| {
            OverlayError::SourceError(format!("Failed to decode image from {url}: {e}"))
        })?;
        Ok(Self::new(&image, url))
    }
}

#[async_trait]
impl FrameSource for StillSource {
    async fn ready(&self) -> Result<Resolution> {
        Ok(self.frame.resolution())
    }

    fn current_frame(&self) -> Option<Frame> {
        Some(self.frame.clone())
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_still_source_is_ready_immediately() {
        let source = StillSource::new(&DynamicImage::new_rgb8(64, 48), "memory");
        assert_eq!(source.ready().await.unwrap(), Resolution::new(64, 48));
        assert_eq!(source.current_frame().unwrap().index(), 0);
        assert_eq!(source.describe(), "memory");
    }

    #[test]
    fn test_missing_file() {
        let err = StillSource::open(Path::new("does/not/exist.png")).unwrap_err();
        assert!(matches!(err, OverlayError::SourceError(_)));
    }
}
