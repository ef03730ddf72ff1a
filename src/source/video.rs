// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Video files and network streams decoded with `video-rs` (FFmpeg).

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;

use super::{Feed, FeedWriter, FrameSource};
use crate::error::{OverlayError, Result};
use crate::frame::{Frame, Resolution};
use crate::{verbose, warn};

/// A video file or stream decoded on a background thread.
pub struct VideoSource {
    name: String,
    feed: Feed,
}

impl VideoSource {
    /// Start decoding `location` in the background.
    ///
    /// FFmpeg resolves `rtsp://` and `rtmp://` URLs given as paths. Files are paced at
    /// their native frame rate when `pace` is set; live streams arrive at their own pace.
    #[must_use]
    pub fn open(location: PathBuf, pace: bool) -> Self {
        let name = location.display().to_string();
        let (writer, feed) = Feed::channel();
        let spawned = thread::Builder::new()
            .name("video-decoder".into())
            .spawn(move || decode(location, pace, writer));
        if let Err(e) = spawned {
            warn!("Failed to start video decoder for {name}: {e}");
        }
        Self { name, feed }
    }
}

fn decode(location: PathBuf, pace: bool, mut writer: FeedWriter) {
    let name = location.display().to_string();
    match decode_frames(location, pace, &mut writer) {
        Ok(()) => {
            verbose!("Video {name} ended");
            writer.fail("end of video".into());
        }
        Err(e) => {
            warn!("Video {name} failed: {e}");
            writer.fail(e.to_string());
        }
    }
}

fn decode_frames(location: PathBuf, pace: bool, writer: &mut FeedWriter) -> Result<()> {
    video_rs::init()
        .map_err(|e| OverlayError::SourceError(format!("Failed to initialize FFmpeg: {e}")))?;
    let mut decoder = video_rs::decode::Decoder::new(location.as_path())
        .map_err(|e| OverlayError::SourceError(format!("Failed to create decoder: {e}")))?;

    let fps = decoder.frame_rate();
    let frame_time = (pace && fps > 0.0).then(|| Duration::from_secs_f32(1.0 / fps));

    // Any decode error is treated as end of stream.
    while let Ok((_ts, frame)) = decoder.decode() {
        if writer.is_closed() {
            return Ok(());
        }
        writer.publish(video_frame_to_image(&frame)?);
        if let Some(dt) = frame_time {
            thread::sleep(dt);
        }
    }
    Ok(())
}

/// Convert a `video_rs` HWC frame to an RGB image.
fn video_frame_to_image(arr: &video_rs::Frame) -> Result<RgbImage> {
    let shape = arr.shape();
    let height = u32::try_from(shape[0])
        .map_err(|_| OverlayError::ImageError("Frame height exceeds u32::MAX".to_string()))?;
    let width = u32::try_from(shape[1])
        .map_err(|_| OverlayError::ImageError("Frame width exceeds u32::MAX".to_string()))?;

    let mut rgb_data = Vec::with_capacity(shape[0] * shape[1] * 3);
    for y in 0..shape[0] {
        for x in 0..shape[1] {
            rgb_data.push(arr[[y, x, 0]]);
            rgb_data.push(arr[[y, x, 1]]);
            rgb_data.push(arr[[y, x, 2]]);
        }
    }

    RgbImage::from_raw(width, height, rgb_data)
        .ok_or_else(|| OverlayError::ImageError("Failed to create image from video frame".into()))
}

#[async_trait]
impl FrameSource for VideoSource {
    async fn ready(&self) -> Result<Resolution> {
        self.feed.ready(&self.name).await
    }

    fn current_frame(&self) -> Option<Frame> {
        self.feed.latest()
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
