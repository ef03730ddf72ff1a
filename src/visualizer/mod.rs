// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Visualization tools for overlays.

/// Color definitions and palettes.
pub mod color;

/// Pose skeleton edges.
pub mod skeleton;

#[cfg(feature = "visualize")]
pub mod viewer;

pub use color::Color;
pub use skeleton::SKELETON;

#[cfg(feature = "visualize")]
pub use viewer::Viewer;
