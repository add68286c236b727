//! Text extraction: turn a resolved document into a page-ordered [`Source`].
//!
//! Two extractors ship with the crate:
//!
//! * [`PlainTextExtractor`]: UTF-8 text; form feeds (`\x0C`) separate pages.
//!   Text without form feeds is cut into pseudo-pages on paragraph
//!   boundaries so long files still batch sensibly.
//! * [`PdfTextExtractor`] (feature `pdf`): the text layer of every page via
//!   pdfium, run under `spawn_blocking` because pdfium is synchronous and
//!   CPU-bound.
//!
//! [`extract_input`] resolves a path or URL and dispatches on the sniffed
//! format.

use super::input::{resolve_input, DocumentFormat};
use crate::config::ExtractConfig;
use crate::error::PipelineError;
use crate::model::Source;
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

/// Target size of a pseudo-page for text without form feeds.
pub const PSEUDO_PAGE_CHARS: usize = 3_000;

/// Produces a page-ordered [`Source`] from a local document.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<Source, PipelineError>;
}

/// Extractor for UTF-8 text files.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path) -> Result<Source, PipelineError> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PipelineError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => PipelineError::PermissionDenied {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::InvalidData => PipelineError::UnsupportedFormat {
                path: path.to_path_buf(),
            },
            _ => PipelineError::ExtractionFailed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            },
        })?;
        let pages = split_pages(&text);
        debug!("Extracted {} text page(s) from {}", pages.len(), path.display());
        Ok(with_title(pages, path))
    }
}

/// Split text into pages on form feeds, or into pseudo-pages when there are none.
pub fn split_pages(text: &str) -> Vec<String> {
    if text.contains('\x0C') {
        return text.split('\x0C').map(str::to_string).collect();
    }
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut pages = Vec::new();
    let mut current = String::new();
    for paragraph in text.split("\n\n") {
        if !current.is_empty() && current.len() + paragraph.len() > PSEUDO_PAGE_CHARS {
            pages.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    if !current.trim().is_empty() {
        pages.push(current);
    }
    pages
}

fn with_title(pages: Vec<String>, path: &Path) -> Source {
    match path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty() && *s != "downloaded")
    {
        Some(stem) => Source::file_with_title(pages, stem),
        None => Source::file(pages),
    }
}

/// Extractor for PDF text layers.
#[cfg(feature = "pdf")]
#[derive(Debug, Default, Clone)]
pub struct PdfTextExtractor {
    password: Option<String>,
}

#[cfg(feature = "pdf")]
impl PdfTextExtractor {
    pub fn new(password: Option<String>) -> Self {
        Self { password }
    }
}

#[cfg(feature = "pdf")]
#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, path: &Path) -> Result<Source, PipelineError> {
        let owned = path.to_path_buf();
        let password = self.password.clone();
        let (pages, title) =
            tokio::task::spawn_blocking(move || pdf::extract_blocking(&owned, password.as_deref()))
                .await
                .map_err(|e| PipelineError::Internal(format!("Extraction task panicked: {e}")))??;

        info!("Extracted text from {} PDF page(s)", pages.len());
        Ok(match title {
            Some(t) => Source::file_with_title(pages, t),
            None => with_title(pages, path),
        })
    }
}

#[cfg(feature = "pdf")]
mod pdf {
    use crate::error::PipelineError;
    use pdfium_render::prelude::*;
    use std::path::{Path, PathBuf};
    use tracing::debug;

    /// `PDFIUM_LIB_PATH` (file or directory) first, then the system library.
    fn bind() -> Result<Pdfium, PipelineError> {
        let bindings = match std::env::var("PDFIUM_LIB_PATH") {
            Ok(p) if !p.is_empty() => {
                let p = PathBuf::from(p);
                let lib = if p.is_dir() {
                    Pdfium::pdfium_platform_library_name_at_path(&p)
                } else {
                    p
                };
                Pdfium::bind_to_library(&lib)
            }
            _ => Pdfium::bind_to_system_library(),
        };
        bindings
            .map(Pdfium::new)
            .map_err(|e| PipelineError::PdfiumBindingFailed(e.to_string()))
    }

    pub(super) fn extract_blocking(
        path: &Path,
        password: Option<&str>,
    ) -> Result<(Vec<String>, Option<String>), PipelineError> {
        let pdfium = bind()?;
        let document = pdfium.load_pdf_from_file(path, password).map_err(|e| {
            let err_str = format!("{e:?}");
            if err_str.to_lowercase().contains("password") {
                PipelineError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            } else {
                PipelineError::ExtractionFailed {
                    path: path.to_path_buf(),
                    detail: err_str,
                }
            }
        })?;

        let title = document
            .metadata()
            .get(PdfDocumentMetadataTagType::Title)
            .map(|t| t.value().trim().to_string())
            .filter(|t| !t.is_empty());

        let mut pages = Vec::new();
        for (idx, page) in document.pages().iter().enumerate() {
            let text = page
                .text()
                .map_err(|e| PipelineError::ExtractionFailed {
                    path: path.to_path_buf(),
                    detail: format!("page {}: {e:?}", idx + 1),
                })?
                .all();
            debug!("Page {}: {} chars", idx + 1, text.len());
            pages.push(text);
        }
        Ok((pages, title))
    }
}

/// Resolve `input` (path or HTTP(S) URL) and extract it into a [`Source`].
pub async fn extract_input(input: &str, config: &ExtractConfig) -> Result<Source, PipelineError> {
    let resolved = resolve_input(input, config.download_timeout_secs).await?;
    match resolved.format() {
        DocumentFormat::Text => PlainTextExtractor.extract(resolved.path()).await,
        #[cfg(feature = "pdf")]
        DocumentFormat::Pdf => {
            PdfTextExtractor::new(config.password.clone())
                .extract(resolved.path())
                .await
        }
        #[cfg(not(feature = "pdf"))]
        DocumentFormat::Pdf => Err(PipelineError::UnsupportedFormat {
            path: resolved.path().to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn form_feeds_split_pages() {
        let pages = split_pages("one\x0Ctwo\x0C\x0Cfour");
        assert_eq!(pages, vec!["one", "two", "", "four"]);
    }

    #[test]
    fn long_text_becomes_pseudo_pages() {
        let paragraph = "word ".repeat(200); // 1000 chars
        let text = vec![paragraph.as_str(); 7].join("\n\n");
        let pages = split_pages(&text);
        assert!(pages.len() >= 3, "{} pages", pages.len());
        assert!(pages.iter().all(|p| p.len() <= PSEUDO_PAGE_CHARS + 2));
        assert_eq!(pages.join("\n\n"), text);
    }

    #[test]
    fn blank_text_has_no_pages() {
        assert!(split_pages("  \n\n ").is_empty());
    }

    #[tokio::test]
    async fn extract_input_reads_text_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cardiology.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, "Page one\x0CPage two").unwrap();

        let source = extract_input(path.to_str().unwrap(), &ExtractConfig::default())
            .await
            .unwrap();
        assert_eq!(source.page_count(), 2);
        assert_eq!(source.display_name(), Some("cardiology"));
    }

    #[tokio::test]
    async fn empty_text_file_is_an_empty_source() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let source = PlainTextExtractor.extract(f.path()).await.unwrap();
        assert!(source.is_empty());
    }
}
