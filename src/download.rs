// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! HTTP helpers.
//!
//! Shared `ureq` agents for the network-facing parts of the crate: still images fetched
//! from URLs, Motion JPEG streams, the HTTP inference engine and the label font.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::error::{OverlayError, Result};

/// Assets URL for downloading fonts.
pub const ASSETS_URL: &str = "https://github.com/ultralytics/assets/releases/download/v0.0.0";

/// Connection timeout in seconds.
const CONNECT_TIMEOUT: u64 = 30;

/// Read timeout in seconds for finite bodies.
const READ_TIMEOUT: u64 = 300;

/// Build an agent with a connect timeout and an optional body timeout.
///
/// Streams that never end (Motion JPEG) must pass `None` for `recv_body`.
#[must_use]
pub fn agent(recv_body: Option<Duration>) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_connect(Some(Duration::from_secs(CONNECT_TIMEOUT)))
        .timeout_recv_body(recv_body)
        .build();
    ureq::Agent::new_with_config(config)
}

/// Describe a `ureq` failure for `url`.
pub(crate) fn describe_error(url: &str, e: &ureq::Error) -> String {
    match e {
        ureq::Error::Timeout(_) => format!("Connection timed out while requesting {url}"),
        ureq::Error::Io(io_err) => format!("Network error requesting {url}: {io_err}"),
        ureq::Error::StatusCode(code) => format!("{url} answered with HTTP {code}"),
        _ => format!("Request to {url} failed: {e}"),
    }
}

/// Fetch a complete response body into memory.
///
/// # Errors
///
/// Returns an error on connection failures, non-2xx answers or unreadable bodies.
pub fn fetch_bytes(url: &str) -> Result<Vec<u8>> {
    let response = agent(Some(Duration::from_secs(READ_TIMEOUT)))
        .get(url)
        .call()
        .map_err(|e| OverlayError::SourceError(describe_error(url, &e)))?;
    response
        .into_body()
        .read_to_vec()
        .map_err(|e| OverlayError::SourceError(format!("Failed to read response from {url}: {e}")))
}

/// Format bytes as human-readable string (e.g., "10.4MB").
fn format_bytes(bytes: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    if bytes >= MB {
        format!("{:.1}MB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.1}KB", bytes / KB)
    } else {
        format!("{bytes:.0}B")
    }
}

/// Download a file from URL to the specified path.
///
/// Streams to a temporary file next to `dest`, then renames it into place so a
/// partial download never looks like a finished one.
///
/// # Errors
///
/// Returns an error if the request, the write or the final rename fails.
pub fn download_file(url: &str, dest: &Path) -> Result<()> {
    let response = agent(Some(Duration::from_secs(READ_TIMEOUT)))
        .get(url)
        .call()
        .map_err(|e| OverlayError::Io(std::io::Error::other(describe_error(url, &e))))?;

    let temp_path = dest.with_extension("part");
    let _ = fs::remove_file(&temp_path);

    let temp_file = File::create(&temp_path)?;
    let mut writer = BufWriter::new(temp_file);
    let mut reader = response.into_body().into_reader();
    let mut buffer = [0u8; 65536];
    let mut downloaded: u64 = 0;
    let start_time = Instant::now();

    let copied: std::io::Result<()> = (|| {
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buffer[..n])?;
            downloaded += n as u64;
        }
        writer.flush()
    })();

    if let Err(e) = copied {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    #[allow(clippy::cast_precision_loss)]
    let size = format_bytes(downloaded as f64);
    eprintln!(
        "Downloaded {url} to '{}' ({size} in {:.1}s)",
        dest.display(),
        start_time.elapsed().as_secs_f64()
    );

    fs::rename(&temp_path, dest).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        OverlayError::Io(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500.0), "500B");
        assert_eq!(format_bytes(1024.0), "1.0KB");
        assert_eq!(format_bytes(1_048_576.0), "1.0MB");
    }

    #[test]
    fn test_fetch_bytes_unreachable() {
        // Port 9 (discard) on localhost is not expected to serve HTTP.
        let err = fetch_bytes("http://127.0.0.1:9/none.jpg").unwrap_err();
        assert!(matches!(err, OverlayError::SourceError(_)));
    }
}
