// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Frames and resolutions passed between sources, engines and canvases.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use image::{DynamicImage, RgbImage, imageops::FilterType};

/// Resolution (`width x height`) of a source, frame or canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Creates a new [`Resolution`] of `width x height`.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either side is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = String;

    /// Parses `"640x480"`, or a single number for a square size.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| format!("invalid resolution '{s}', expected WIDTHxHEIGHT"))
        };
        let res = match s.split_once(['x', 'X']) {
            Some((w, h)) => Self::new(parse(w)?, parse(h)?),
            None => {
                let side = parse(s)?;
                Self::new(side, side)
            }
        };
        if res.is_empty() {
            return Err(format!("invalid resolution '{s}', sides must be non-zero"));
        }
        Ok(res)
    }
}

/// One decoded frame from a source.
///
/// Cloning is cheap; the pixel buffer is shared.
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<RgbImage>,
    index: u64,
}

impl Frame {
    /// Wrap a decoded image as frame number `index`.
    #[must_use]
    pub fn new(image: RgbImage, index: u64) -> Self {
        Self {
            image: Arc::new(image),
            index,
        }
    }

    /// Convert any decoded image into a frame.
    #[must_use]
    pub fn from_dynamic(image: &DynamicImage, index: u64) -> Self {
        Self::new(image.to_rgb8(), index)
    }

    /// Pixels of this frame.
    #[must_use]
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Position of this frame in its source, starting at 0.
    #[must_use]
    pub const fn index(&self) -> u64 {
        self.index
    }

    /// Native size of this frame.
    #[must_use]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.image.width(), self.image.height())
    }

    /// Return this frame scaled to `target`, or itself if it already has that size.
    #[must_use]
    pub fn fit_to(&self, target: Resolution) -> Self {
        if self.resolution() == target {
            return self.clone();
        }
        let resized = image::imageops::resize(
            self.image.as_ref(),
            target.width,
            target.height,
            FilterType::Triangle,
        );
        Self::new(resized, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_parse() {
        assert_eq!("640x480".parse::<Resolution>(), Ok(Resolution::new(640, 480)));
        assert_eq!("240".parse::<Resolution>(), Ok(Resolution::new(240, 240)));
        assert!("0x480".parse::<Resolution>().is_err());
        assert!("wide".parse::<Resolution>().is_err());
        assert_eq!(Resolution::new(640, 480).to_string(), "640x480");
    }

    #[test]
    fn test_frame_fit_to() {
        let frame = Frame::new(RgbImage::new(320, 200), 3);
        let same = frame.fit_to(Resolution::new(320, 200));
        assert_eq!(same.resolution(), Resolution::new(320, 200));

        let small = frame.fit_to(Resolution::new(240, 240));
        assert_eq!(small.resolution(), Resolution::new(240, 240));
        assert_eq!(small.index(), 3);
    }
}
