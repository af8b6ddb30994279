use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;

use crate::error::{StudioError, StudioResult};

const DEFAULT_MIME: &str = "image/png";
const LOAD_FAILED: &str = "Failed to load image for processing.";

/// Raw image bytes plus MIME type, as sent to and received from the model.
///
/// Cloning shares the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes: Arc::from(bytes),
        }
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn file_extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

/// Splits `data:<mime>;base64,<payload>` into bytes and MIME type.
///
/// A header without a MIME type falls back to `image/png`.
pub fn parse_data_url(raw: &str) -> StudioResult<ImagePayload> {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("data:") else {
        return Err(StudioError::codec("not a data URL"));
    };
    let Some((header, data)) = rest.split_once(',') else {
        return Err(StudioError::codec("data URL has no payload separator"));
    };
    let mut params = header.split(';');
    let mime_type = params
        .next()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_MIME)
        .to_string();
    if !params.any(|param| param.trim().eq_ignore_ascii_case("base64")) {
        return Err(StudioError::codec("data URL is not base64 encoded"));
    }
    let bytes = BASE64
        .decode(data.trim().as_bytes())
        .map_err(|err| StudioError::codec(format!("base64 decode failed: {err}")))?;
    if bytes.is_empty() {
        return Err(StudioError::codec("data URL carries no image bytes"));
    }
    Ok(ImagePayload::new(mime_type, bytes))
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    let lowered = mime.to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    "png"
}

pub fn read_image_file(path: &Path) -> StudioResult<ImagePayload> {
    let bytes = fs::read(path)
        .map_err(|err| StudioError::codec(format!("failed reading {}: {err}", path.display())))?;
    if bytes.is_empty() {
        return Err(StudioError::codec(format!("{} is empty", path.display())));
    }
    Ok(ImagePayload::new(
        mime_for_path(path).unwrap_or(DEFAULT_MIME),
        bytes,
    ))
}

/// Resolves material and room image references into payloads.
///
/// Accepts data URLs, `http(s)` URLs and local file paths.
#[derive(Debug, Clone)]
pub struct ImageLoader {
    http: HttpClient,
    timeout: Duration,
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageLoader {
    pub fn new() -> Self {
        Self::with_client(HttpClient::new())
    }

    pub fn with_client(http: HttpClient) -> Self {
        Self {
            http,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn load(&self, reference: &str) -> StudioResult<ImagePayload> {
        let trimmed = reference.trim();
        if trimmed.starts_with("data:") {
            return parse_data_url(trimmed);
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return self.fetch(trimmed);
        }
        read_image_file(Path::new(trimmed))
            .map_err(|err| StudioError::codec(format!("{LOAD_FAILED} ({err})")))
    }

    fn fetch(&self, url: &str) -> StudioResult<ImagePayload> {
        let load_failed = |detail: String| StudioError::codec(format!("{LOAD_FAILED} ({detail})"));
        let response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .map_err(|err| load_failed(format!("{url}: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(load_failed(format!("{url}: HTTP {}", status.as_u16())));
        }
        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(str::trim)
            .filter(|value| value.starts_with("image/"))
            .unwrap_or(DEFAULT_MIME)
            .to_string();
        let bytes = response
            .bytes()
            .map_err(|err| load_failed(format!("{url}: {err}")))?;
        if bytes.is_empty() {
            return Err(load_failed(format!("{url}: empty body")));
        }
        Ok(ImagePayload::new(mime_type, bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_decodes_mime_and_bytes() -> anyhow::Result<()> {
        let payload = parse_data_url("data:image/jpeg;base64,AQID")?;
        assert_eq!(payload.mime_type, "image/jpeg");
        assert_eq!(&payload.bytes[..], &[1, 2, 3]);
        assert_eq!(payload.to_data_url(), "data:image/jpeg;base64,AQID");
        assert_eq!(payload.file_extension(), "jpg");
        Ok(())
    }

    #[test]
    fn data_url_without_mime_defaults_to_png() -> anyhow::Result<()> {
        let payload = parse_data_url("data:;base64,AQID")?;
        assert_eq!(payload.mime_type, "image/png");
        Ok(())
    }

    #[test]
    fn malformed_data_urls_are_codec_errors() {
        for raw in [
            "https://example.com/a.png",
            "data:image/png;base64",
            "data:image/png,AQID",
            "data:image/png;base64,!!!",
            "data:image/png;base64,",
        ] {
            assert!(
                matches!(parse_data_url(raw), Err(StudioError::Codec { .. })),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn loader_reads_files_with_extension_mime() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("swatch.webp");
        std::fs::write(&path, [9u8, 8, 7])?;

        let loader = ImageLoader::new();
        let payload = loader.load(path.to_string_lossy().as_ref())?;
        assert_eq!(payload.mime_type, "image/webp");
        assert_eq!(payload.len(), 3);

        let inline = loader.load("data:image/gif;base64,AQID")?;
        assert_eq!(inline.mime_type, "image/gif");
        Ok(())
    }

    #[test]
    fn loader_reports_missing_files() {
        let err = ImageLoader::new().load("/definitely/not/here.png");
        match err {
            Err(StudioError::Codec { message }) => {
                assert!(message.starts_with(LOAD_FAILED), "{message}")
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
