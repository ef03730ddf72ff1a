// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the overlay library.

use std::fmt;

/// Result type alias for overlay operations.
pub type Result<T> = std::result::Result<T, OverlayError>;

/// Main error type for the overlay library.
#[derive(Debug)]
pub enum OverlayError {
    /// The visual source could not be opened or never became ready.
    SourceError(String),
    /// The inference engine could not be constructed.
    EngineLoadError(String),
    /// A single inference call failed.
    InferenceError(String),
    /// Drawing onto the render target failed.
    RenderError(String),
    /// Invalid configuration provided.
    ConfigError(String),
    /// Error decoding or encoding images.
    ImageError(String),
    /// Wrapped `std::io::Error`
    Io(std::io::Error),
    /// Feature not enabled.
    FeatureNotEnabled(String),
}

impl fmt::Display for OverlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceError(msg) => write!(f, "Source error: {msg}"),
            Self::EngineLoadError(msg) => write!(f, "Engine load error: {msg}"),
            Self::InferenceError(msg) => write!(f, "Inference error: {msg}"),
            Self::RenderError(msg) => write!(f, "Render error: {msg}"),
            Self::ConfigError(msg) => write!(f, "Config error: {msg}"),
            Self::ImageError(msg) => write!(f, "Image error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
            Self::FeatureNotEnabled(msg) => write!(f, "Feature not enabled: {msg}"),
        }
    }
}

impl std::error::Error for OverlayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OverlayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for OverlayError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OverlayError::EngineLoadError("test".to_string());
        assert_eq!(err.to_string(), "Engine load error: test");

        let err = OverlayError::InferenceError("timeout".to_string());
        assert_eq!(err.to_string(), "Inference error: timeout");
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error;

        let err = OverlayError::from(std::io::Error::other("boom"));
        assert!(err.source().is_some());
        assert!(OverlayError::SourceError("x".into()).source().is_none());
    }
}
