// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Window for watching an overlay canvas live.

use image::RgbImage;
use minifb::{Key, Window, WindowOptions};

use crate::error::{OverlayError, Result};

/// A simple canvas viewer using minifb.
pub struct Viewer {
    window: Window,
    pub width: usize,
    pub height: usize,
    buffer: Vec<u32>,
}

impl Viewer {
    /// Create a new viewer window.
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let mut window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| OverlayError::RenderError(format!("Failed to create window: {e}")))?;

        window.set_target_fps(60);

        Ok(Self {
            window,
            width,
            height,
            buffer: Vec::new(),
        })
    }

    /// Whether the window is still open and neither Escape nor Q is held.
    pub fn is_open(&self) -> bool {
        self.window.is_open()
            && !self.window.is_key_down(Key::Escape)
            && !self.window.is_key_down(Key::Q)
    }

    /// Show a new canvas snapshot.
    ///
    /// Returns `Ok(false)` once the user has closed the window.
    pub fn update(&mut self, image: &RgbImage) -> Result<bool> {
        if !self.is_open() {
            return Ok(false);
        }

        let (img_width, img_height) = (image.width() as usize, image.height() as usize);
        self.buffer.resize(img_width * img_height, 0);

        // minifb expects 0x00RRGGBB per pixel
        for (dst, pixel) in self.buffer.iter_mut().zip(image.pixels()) {
            let [r, g, b] = pixel.0;
            *dst = (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b);
        }

        self.width = img_width;
        self.height = img_height;

        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|e| OverlayError::RenderError(format!("Failed to update window: {e}")))?;

        Ok(true)
    }

    /// Keep the window responsive without a new image.
    pub fn pump(&mut self) -> bool {
        if !self.is_open() {
            return false;
        }
        if self.buffer.is_empty() {
            self.window.update();
        } else {
            let _ = self
                .window
                .update_with_buffer(&self.buffer, self.width, self.height);
        }
        true
    }
}
