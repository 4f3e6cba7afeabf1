//! Input resolution: turn a user-supplied path or URL into a [`SelectedFile`].
//!
//! The controller only accepts files whose *declared* media type is PDF, the
//! way a browser file picker reports it. For local files that declaration is
//! derived from the extension; for downloads it is the `Content-Type` header,
//! falling back to the URL's extension when the header is absent. The bytes
//! themselves are checked later by the extractor.

use crate::error::AgentError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Media type of a PDF document.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Media type reported when nothing better is known.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// A file picked by the user, fully loaded into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// Display name (file name or last URL segment).
    pub name: String,
    /// Declared media type, e.g. `application/pdf`.
    pub media_type: String,
    /// Raw file contents.
    pub bytes: Arc<[u8]>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: Arc::from(bytes),
        }
    }

    /// Whether the declared media type is PDF.
    pub fn is_pdf(&self) -> bool {
        self.media_type.eq_ignore_ascii_case(PDF_MEDIA_TYPE)
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Declared media type for a file name, from its extension.
pub fn media_type_for_name(name: &str) -> &'static str {
    let is_pdf = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        PDF_MEDIA_TYPE
    } else {
        OCTET_STREAM
    }
}

/// Strip parameters from a `Content-Type` value (`application/pdf; x=y`).
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Resolve the input string into a loaded file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<SelectedFile, AgentError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

/// Read a local file.
async fn read_local(path_str: &str) -> Result<SelectedFile, AgentError> {
    if path_str.trim().is_empty() {
        return Err(AgentError::InvalidInput {
            input: path_str.to_string(),
        });
    }
    let path = PathBuf::from(path_str);

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AgentError::FileNotFound { path: path.clone() },
        std::io::ErrorKind::PermissionDenied => AgentError::PermissionDenied { path: path.clone() },
        _ => AgentError::InvalidInput {
            input: path_str.to_string(),
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());
    let media_type = media_type_for_name(&name);
    debug!("Read local file {} ({} bytes, {})", path.display(), bytes.len(), media_type);

    Ok(SelectedFile::new(name, media_type, bytes))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<SelectedFile, AgentError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AgentError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            AgentError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            AgentError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(AgentError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = filename_from_url(url);
    let media_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(essence)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| media_type_for_name(&name).to_string());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AgentError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes ({})", bytes.len(), media_type);
    Ok(SelectedFile::new(name, media_type, bytes.to_vec()))
}

/// Last non-empty path segment of the URL, or `downloaded.pdf`.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}
