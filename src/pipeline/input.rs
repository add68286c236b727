//! Input resolution: normalise a user-supplied path or URL to a local file
//! and sniff what kind of document it is.
//!
//! URLs are downloaded into a `TempDir` that lives inside the returned
//! [`ResolvedInput`], so the file is removed when the input is dropped. The
//! format is decided from the leading bytes (`%PDF` or valid UTF-8), never
//! from the file extension.

use crate::error::PipelineError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Bytes inspected when sniffing a local file.
const SNIFF_BYTES: u64 = 8 * 1024;

/// Document formats the extractors understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Text,
}

/// A local document ready for extraction.
#[derive(Debug)]
pub struct ResolvedInput {
    path: PathBuf,
    format: DocumentFormat,
    /// Keeps a downloaded file alive until extraction is done.
    _temp_dir: Option<TempDir>,
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn is_downloaded(&self) -> bool {
        self._temp_dir.is_some()
    }

    /// File stem, used as the session name.
    pub fn title(&self) -> Option<String> {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .filter(|s| !s.is_empty() && s != "downloaded")
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local document.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, PipelineError> {
    if input.trim().is_empty() {
        return Err(PipelineError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Classify leading bytes. `None` means neither PDF nor UTF-8 text.
pub fn sniff_format(bytes: &[u8]) -> Option<DocumentFormat> {
    if bytes.starts_with(b"%PDF") {
        return Some(DocumentFormat::Pdf);
    }
    match std::str::from_utf8(bytes) {
        Ok(_) => Some(DocumentFormat::Text),
        // Sample cut through a multi-byte character.
        Err(e) if e.error_len().is_none() => Some(DocumentFormat::Text),
        Err(_) => None,
    }
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, PipelineError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(PipelineError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(PipelineError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    let head = match std::fs::File::open(&path) {
        Ok(f) => {
            let mut head = Vec::new();
            f.take(SNIFF_BYTES)
                .read_to_end(&mut head)
                .map_err(|e| PipelineError::ExtractionFailed {
                    path: path.clone(),
                    detail: e.to_string(),
                })?;
            head
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PipelineError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(PipelineError::FileNotFound { path });
        }
    };

    let format = sniff_format(&head).ok_or_else(|| PipelineError::UnsupportedFormat {
        path: path.clone(),
    })?;

    debug!("Resolved local {:?} document: {}", format, path.display());
    Ok(ResolvedInput {
        path,
        format,
        _temp_dir: None,
    })
}

/// Download a URL to a temporary directory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, PipelineError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PipelineError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PipelineError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PipelineError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(PipelineError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            PipelineError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PipelineError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    let format = sniff_format(&bytes[..bytes.len().min(SNIFF_BYTES as usize)]).ok_or_else(|| {
        PipelineError::UnsupportedFormat {
            path: PathBuf::from(url),
        }
    })?;

    let temp_dir = TempDir::new().map_err(|e| PipelineError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(filename_from_url(url, format));

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| PipelineError::Internal(format!("Failed to write temp file: {e}")))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput {
        path: file_path,
        format,
        _temp_dir: Some(temp_dir),
    })
}

/// Last path segment of the URL, or a generic name for the format.
fn filename_from_url(url: &str, format: DocumentFormat) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    match format {
        DocumentFormat::Pdf => "downloaded.pdf".to_string(),
        DocumentFormat::Text => "downloaded.txt".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn sniffing() {
        assert_eq!(sniff_format(b"%PDF-1.7\n..."), Some(DocumentFormat::Pdf));
        assert_eq!(sniff_format("Cardiac cycle\n".as_bytes()), Some(DocumentFormat::Text));
        assert_eq!(sniff_format(b""), Some(DocumentFormat::Text));
        // "é" cut in half at the end of the sample
        assert_eq!(sniff_format(&[b'a', 0xC3]), Some(DocumentFormat::Text));
        assert_eq!(sniff_format(&[0x89, b'P', b'N', b'G', 0xFF, 0x00]), None);
    }

    #[test]
    fn filename_from_url_falls_back_by_format() {
        assert_eq!(
            filename_from_url("https://example.com/a/notes.pdf?x=1", DocumentFormat::Pdf),
            "notes.pdf"
        );
        assert_eq!(
            filename_from_url("https://example.com/download", DocumentFormat::Text),
            "downloaded.txt"
        );
    }

    #[tokio::test]
    async fn resolves_local_text_file() {
        let mut f = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        writeln!(f, "The heart has four chambers.").unwrap();
        let resolved = resolve_input(f.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.format(), DocumentFormat::Text);
        assert!(!resolved.is_downloaded());
        assert!(resolved.title().is_some());
    }

    #[tokio::test]
    async fn missing_and_binary_files_are_rejected() {
        assert!(matches!(
            resolve_input("/definitely/not/here.pdf", 5).await,
            Err(PipelineError::FileNotFound { .. })
        ));
        assert!(matches!(
            resolve_input("   ", 5).await,
            Err(PipelineError::InvalidInput { .. })
        ));

        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[0x89, b'P', b'N', b'G', 0xFF, 0xFE, 0x00]).unwrap();
        assert!(matches!(
            resolve_input(f.path().to_str().unwrap(), 5).await,
            Err(PipelineError::UnsupportedFormat { .. })
        ));
    }
}
