// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::FontArc;

use crate::download::{ASSETS_URL, download_file};
use crate::warn;

/// Check if font exists locally or download it into the Ultralytics config directory.
pub fn check_font(font: &str) -> Option<PathBuf> {
    let font_name = Path::new(font).file_name()?.to_string_lossy().to_string();
    let config_dir = dirs::config_dir()?.join("Ultralytics");
    let font_path = config_dir.join(&font_name);

    if font_path.exists() {
        return Some(font_path);
    }

    if let Err(e) = fs::create_dir_all(&config_dir) {
        warn!("Failed to create config directory: {e}");
        return None;
    }

    let url = format!("{ASSETS_URL}/{font_name}");
    match download_file(&url, &font_path) {
        Ok(()) => Some(font_path),
        Err(e) => {
            warn!("Failed to download font from {url}: {e}");
            None
        }
    }
}

/// Load a TrueType font, downloading it on first use.
///
/// Returns `None` when the font is unavailable; labels are then skipped.
pub fn load_font(font: &str) -> Option<FontArc> {
    let path = check_font(font)?;
    let data = fs::read(&path)
        .map_err(|e| warn!("Failed to read font {}: {e}", path.display()))
        .ok()?;
    FontArc::try_from_vec(data)
        .map_err(|e| warn!("Invalid font {}: {e}", path.display()))
        .ok()
}
