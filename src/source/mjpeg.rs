// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Motion JPEG over HTTP (`multipart/x-mixed-replace`), as served by IP cameras and
//! ESP32-CAM style boards.

use std::io::{BufRead, BufReader};
use std::thread;

use async_trait::async_trait;
use image::ImageFormat;

use super::{Feed, FeedWriter, FrameSource};
use crate::error::{OverlayError, Result};
use crate::frame::{Frame, Resolution};
use crate::{verbose, warn};

/// Largest part accepted from a stream, in bytes.
pub const MAX_PART_BYTES: usize = 16 * 1024 * 1024;

/// Splits a multipart byte stream into JPEG payloads.
///
/// Parts carrying a `Content-Length` header are read exactly; parts without one are
/// collected up to the next boundary line.
pub struct MjpegReader<R> {
    reader: R,
    markers: Vec<Vec<u8>>,
    at_part: bool,
    finished: bool,
}

impl<R: BufRead> MjpegReader<R> {
    /// Create a reader for parts separated by `boundary`.
    ///
    /// The boundary may be given with or without its leading `--`.
    pub fn new(reader: R, boundary: &str) -> Self {
        let bare = boundary.trim();
        let stripped = bare.trim_start_matches("--");
        let mut markers = vec![format!("--{stripped}").into_bytes()];
        if bare != stripped {
            markers.push(format!("--{bare}").into_bytes());
        }
        Self {
            reader,
            markers,
            at_part: false,
            finished: false,
        }
    }

    /// Extract the boundary from a `Content-Type` header value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not `multipart/x-mixed-replace` with a boundary.
    pub fn boundary_from_content_type(value: &str) -> Result<String> {
        let mut params = value.split(';').map(str::trim);
        let mime = params.next().unwrap_or_default();
        if !mime.eq_ignore_ascii_case("multipart/x-mixed-replace") {
            return Err(OverlayError::SourceError(format!(
                "unexpected mime type '{mime}', expected multipart/x-mixed-replace"
            )));
        }
        params
            .find_map(|p| {
                let (key, val) = p.split_once('=')?;
                key.trim()
                    .eq_ignore_ascii_case("boundary")
                    .then(|| val.trim().trim_matches('"').to_string())
            })
            .filter(|b| !b.is_empty())
            .ok_or_else(|| {
                OverlayError::SourceError("malformed Content-Type header (missing boundary)".into())
            })
    }

    /// Read the next JPEG payload, or `None` at the end of the stream.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failures, malformed part headers, or parts larger than
    /// [`MAX_PART_BYTES`].
    pub fn next_jpeg(&mut self) -> Result<Option<Vec<u8>>> {
        if self.finished {
            return Ok(None);
        }

        let mut line = Vec::new();
        if !self.at_part {
            loop {
                if !self.read_line(&mut line)? {
                    return Ok(None);
                }
                match self.classify(&line) {
                    Line::Boundary => break,
                    Line::End => return self.finish(),
                    Line::Other => {}
                }
            }
        }
        self.at_part = false;

        let mut length = None;
        loop {
            if !self.read_line(&mut line)? {
                return self.finish();
            }
            let text = String::from_utf8_lossy(line.trim_ascii());
            if text.is_empty() {
                break;
            }
            let Some((key, value)) = text.split_once(':') else {
                return Err(OverlayError::SourceError(format!(
                    "malformed multipart header: {text}"
                )));
            };
            if key.trim().eq_ignore_ascii_case("Content-Length") {
                let parsed = value.trim().parse::<usize>().map_err(|_| {
                    OverlayError::SourceError(format!("invalid Content-Length: {}", value.trim()))
                })?;
                length = Some(parsed);
            }
        }

        if let Some(length) = length {
            if length > MAX_PART_BYTES {
                return Err(too_large(length));
            }
            let mut buf = vec![0; length];
            self.reader.read_exact(&mut buf)?;
            return Ok(Some(buf));
        }

        let mut data = Vec::new();
        loop {
            if !self.read_line(&mut line)? {
                self.finished = true;
                break;
            }
            match self.classify(&line) {
                Line::Boundary => {
                    self.at_part = true;
                    break;
                }
                Line::End => {
                    self.finished = true;
                    break;
                }
                Line::Other => {
                    data.extend_from_slice(&line);
                    if data.len() > MAX_PART_BYTES {
                        return Err(too_large(data.len()));
                    }
                }
            }
        }
        if data.ends_with(b"\r\n") {
            data.truncate(data.len() - 2);
        } else if data.ends_with(b"\n") {
            data.truncate(data.len() - 1);
        }
        Ok((!data.is_empty()).then_some(data))
    }

    fn finish(&mut self) -> Result<Option<Vec<u8>>> {
        self.finished = true;
        Ok(None)
    }

    /// Read one raw line including its terminator; `false` at end of stream.
    fn read_line(&mut self, line: &mut Vec<u8>) -> Result<bool> {
        line.clear();
        Ok(self.reader.read_until(b'\n', line)? > 0)
    }

    fn classify(&self, line: &[u8]) -> Line {
        let trimmed = line.trim_ascii();
        for marker in &self.markers {
            if trimmed == marker.as_slice() {
                return Line::Boundary;
            }
            if trimmed.len() == marker.len() + 2
                && trimmed.starts_with(marker)
                && trimmed.ends_with(b"--")
            {
                return Line::End;
            }
        }
        Line::Other
    }
}

fn too_large(length: usize) -> OverlayError {
    OverlayError::SourceError(format!(
        "multipart part of {length} bytes exceeds the {MAX_PART_BYTES} byte limit"
    ))
}

enum Line {
    Boundary,
    End,
    Other,
}

/// A Motion JPEG endpoint decoded on a background thread.
///
/// The source becomes ready when the first JPEG has been decoded. If the stream ends or
/// drops, the last frame stays visible.
pub struct MjpegSource {
    url: String,
    feed: Feed,
}

impl MjpegSource {
    /// Start reading `url` in the background.
    ///
    /// Connection errors surface through [`FrameSource::ready`].
    #[must_use]
    pub fn connect(url: &str) -> Self {
        let (writer, feed) = Feed::channel();
        let thread_url = url.to_string();
        let spawned = thread::Builder::new()
            .name("mjpeg-reader".into())
            .spawn(move || stream(&thread_url, writer));
        if let Err(e) = spawned {
            // The writer moved into the failed closure is dropped, which closes the feed.
            warn!("Failed to start MJPEG reader for {url}: {e}");
        }
        Self {
            url: url.to_string(),
            feed,
        }
    }
}

fn stream(url: &str, mut writer: FeedWriter) {
    match read_stream(url, &mut writer) {
        Ok(()) => {
            verbose!("MJPEG stream {url} ended");
            writer.fail("stream ended".into());
        }
        Err(e) => {
            warn!("MJPEG stream {url} failed: {e}");
            writer.fail(e.to_string());
        }
    }
}

fn read_stream(url: &str, writer: &mut FeedWriter) -> Result<()> {
    let response = crate::download::agent(None)
        .get(url)
        .call()
        .map_err(|e| OverlayError::SourceError(crate::download::describe_error(url, &e)))?;

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let boundary = MjpegReader::<&[u8]>::boundary_from_content_type(&content_type)?;

    let body = BufReader::new(response.into_body().into_reader());
    let mut parts = MjpegReader::new(body, &boundary);
    while let Some(jpeg) = parts.next_jpeg()? {
        if writer.is_closed() {
            return Ok(());
        }
        match image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg) {
            Ok(img) => writer.publish(img.to_rgb8()),
            Err(e) => verbose!("Skipping undecodable MJPEG part ({} bytes): {e}", jpeg.len()),
        }
    }
    Ok(())
}

#[async_trait]
impl FrameSource for MjpegSource {
    async fn ready(&self) -> Result<Resolution> {
        self.feed.ready(&self.url).await
    }

    fn current_frame(&self) -> Option<Frame> {
        self.feed.latest()
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(body: &[u8], boundary: &str) -> Vec<Vec<u8>> {
        let mut reader = MjpegReader::new(body, boundary);
        let mut out = Vec::new();
        while let Some(p) = reader.next_jpeg().unwrap() {
            out.push(p);
        }
        out
    }

    #[test]
    fn test_boundary_from_content_type() {
        assert_eq!(
            MjpegReader::<&[u8]>::boundary_from_content_type(
                "multipart/x-mixed-replace; boundary=frame"
            )
            .unwrap(),
            "frame"
        );
        assert_eq!(
            MjpegReader::<&[u8]>::boundary_from_content_type(
                "multipart/x-mixed-replace;boundary=\"--myboundary\""
            )
            .unwrap(),
            "--myboundary"
        );
        assert!(MjpegReader::<&[u8]>::boundary_from_content_type("image/jpeg").is_err());
        assert!(
            MjpegReader::<&[u8]>::boundary_from_content_type("multipart/x-mixed-replace").is_err()
        );
    }

    #[test]
    fn test_parts_with_content_length() {
        let body = b"--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 4\r\n\r\nABCD\r\n\
--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 2\r\n\r\nEF\r\n";
        assert_eq!(parts(body, "frame"), vec![b"ABCD".to_vec(), b"EF".to_vec()]);
    }

    #[test]
    fn test_parts_without_content_length() {
        let body = b"--frame\r\nContent-Type: image/jpeg\r\n\r\nAB\nCD\r\n\
--frame\r\nContent-Type: image/jpeg\r\n\r\nXYZ\r\n--frame--\r\n";
        assert_eq!(parts(body, "--frame"), vec![b"AB\nCD".to_vec(), b"XYZ".to_vec()]);
    }

    #[test]
    fn test_preamble_is_skipped() {
        let body = b"garbage before\r\n--b\r\nContent-Length: 1\r\n\r\nZ\r\n";
        assert_eq!(parts(body, "b"), vec![b"Z".to_vec()]);
    }

    #[test]
    fn test_malformed_header() {
        let body = b"--b\r\nnot a header\r\n\r\nZ\r\n";
        let mut reader = MjpegReader::new(&body[..], "b");
        assert!(reader.next_jpeg().is_err());
    }

    #[test]
    fn test_oversized_part_is_rejected() {
        let body = b"--b\r\nContent-Length: 18446744073709551615\r\n\r\nZ\r\n";
        let mut reader = MjpegReader::new(&body[..], "b");
        assert!(matches!(reader.next_jpeg(), Err(OverlayError::SourceError(_))));

        let header = format!("--b\r\nContent-Length: {}\r\n\r\n", MAX_PART_BYTES + 1);
        let mut reader = MjpegReader::new(header.as_bytes(), "b");
        assert!(reader.next_jpeg().is_err());
    }

    #[test]
    fn test_unterminated_part_is_bounded() {
        let mut body = b"--b\r\n\r\n".to_vec();
        let line = [b'A'; 1023].iter().chain(b"\n").copied().collect::<Vec<u8>>();
        while body.len() <= MAX_PART_BYTES + 2048 {
            body.extend_from_slice(&line);
        }
        let mut reader = MjpegReader::new(&body[..], "b");
        assert!(reader.next_jpeg().is_err());
    }

    #[tokio::test]
    async fn test_unreachable_stream_is_not_ready() {
        let source = MjpegSource::connect("http://127.0.0.1:9/stream");
        assert!(source.ready().await.is_err());
        assert!(source.current_frame().is_none());
    }
}
