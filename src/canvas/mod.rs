// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Render targets.
//!
//! A [`Canvas`] is the 2D surface an overlay loop clears and redraws each tick. It offers
//! the handful of primitives the annotators need: frame blit, rectangle outline, filled
//! circle, line segment and text.

#[cfg(feature = "annotate")]
mod font;
#[cfg(feature = "annotate")]
mod raster;

use crate::frame::{Frame, Resolution};
use crate::results::BoundingBox;
use crate::visualizer::Color;

#[cfg(feature = "annotate")]
pub use font::{check_font, load_font};
#[cfg(feature = "annotate")]
pub use raster::ImageCanvas;

/// Outline style for rectangles and line segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    /// Line color.
    pub color: Color,
    /// Line width in pixels.
    pub width: f32,
}

impl Stroke {
    /// Create a stroke style.
    #[must_use]
    pub const fn new(color: Color, width: f32) -> Self {
        Self { color, width }
    }
}

/// Fill style for text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    /// Text color.
    pub color: Color,
    /// Font size in pixels.
    pub size: f32,
}

impl TextStyle {
    /// Create a text style.
    #[must_use]
    pub const fn new(color: Color, size: f32) -> Self {
        Self { color, size }
    }
}

/// A 2D drawing surface.
pub trait Canvas: Send {
    /// Current pixel size.
    fn resolution(&self) -> Resolution;

    /// Change the pixel size. Clears the surface.
    fn resize(&mut self, resolution: Resolution);

    /// Erase everything drawn so far.
    fn clear(&mut self);

    /// Draw a source frame scaled to cover the whole surface.
    fn draw_frame(&mut self, frame: &Frame);

    /// Outline a rectangle.
    fn stroke_rect(&mut self, rect: BoundingBox, stroke: Stroke);

    /// Fill a circle centered on `(x, y)`.
    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Color);

    /// Draw a straight segment.
    fn line(&mut self, from: (f32, f32), to: (f32, f32), stroke: Stroke);

    /// Draw text with its left end of the baseline at `(x, y)`.
    fn text(&mut self, text: &str, x: f32, y: f32, style: TextStyle);
}

/// One primitive recorded by a [`RecordingCanvas`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// A frame blit.
    Frame {
        /// Index of the blitted frame.
        index: u64,
    },
    /// A rectangle outline.
    StrokeRect {
        /// Rectangle in canvas pixels.
        rect: BoundingBox,
        /// Outline style.
        stroke: Stroke,
    },
    /// A filled circle.
    FillCircle {
        /// Center x.
        x: f32,
        /// Center y.
        y: f32,
        /// Radius.
        radius: f32,
        /// Fill color.
        color: Color,
    },
    /// A line segment.
    Line {
        /// Start point.
        from: (f32, f32),
        /// End point.
        to: (f32, f32),
        /// Line style.
        stroke: Stroke,
    },
    /// A text run.
    Text {
        /// The string drawn.
        text: String,
        /// Baseline x.
        x: f32,
        /// Baseline y.
        y: f32,
        /// Text style.
        style: TextStyle,
    },
}

/// A canvas that records primitives instead of rasterizing them.
///
/// [`Canvas::clear`] drops the record, so [`RecordingCanvas::commands`] always describes
/// exactly what is visible. Useful for headless runs and tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingCanvas {
    resolution: Option<Resolution>,
    commands: Vec<DrawCommand>,
    clears: usize,
}

impl RecordingCanvas {
    /// Create an unsized canvas; the overlay sizes it during initialization.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Primitives visible since the last clear.
    #[must_use]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Number of clears so far, including the one implied by resizing.
    #[must_use]
    pub const fn clear_count(&self) -> usize {
        self.clears
    }

    /// Whether the canvas has been sized.
    #[must_use]
    pub const fn is_sized(&self) -> bool {
        self.resolution.is_some()
    }

    /// Text runs visible since the last clear.
    pub fn texts(&self) -> impl Iterator<Item = &str> + '_ {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

impl Canvas for RecordingCanvas {
    fn resolution(&self) -> Resolution {
        self.resolution.unwrap_or(Resolution::new(0, 0))
    }

    fn resize(&mut self, resolution: Resolution) {
        self.resolution = Some(resolution);
        self.clear();
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.clears += 1;
    }

    fn draw_frame(&mut self, frame: &Frame) {
        self.commands.push(DrawCommand::Frame {
            index: frame.index(),
        });
    }

    fn stroke_rect(&mut self, rect: BoundingBox, stroke: Stroke) {
        self.commands.push(DrawCommand::StrokeRect { rect, stroke });
    }

    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Color) {
        self.commands.push(DrawCommand::FillCircle {
            x,
            y,
            radius,
            color,
        });
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32), stroke: Stroke) {
        self.commands.push(DrawCommand::Line { from, to, stroke });
    }

    fn text(&mut self, text: &str, x: f32, y: f32, style: TextStyle) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            x,
            y,
            style,
        });
    }
}
