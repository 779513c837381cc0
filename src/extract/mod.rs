//! Text extraction with ordered fallback.
//!
//! An [`ExtractorChain`] holds several [`Extractor`]s for the same document
//! kind and asks each in turn. The first one that yields non-blank text wins.
//! Every failed attempt is logged and kept, so an exhausted chain can report
//! exactly what went wrong with each library.
//!
//! ```text
//! input path ─▶ validate ─▶ extractor #1 ──ok──▶ text
//!                               │ err/blank
//!                               ▼
//!                           extractor #2 ──ok──▶ text
//!                               │ err/blank
//!                               ▼
//!                      ExtractionExhausted { attempts }
//! ```
//!
//! Extraction is synchronous and CPU-bound; async callers should run
//! [`ExtractorChain::extract`] inside `spawn_blocking`.

pub mod docx;
pub mod pdf;

use crate::error::{ExtractError, TextkitError};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub use docx::{docx_chain, heading_level, DocxStyledExtractor, DocxXmlExtractor};
pub use pdf::pdf_chain;

/// Text produced by one successful extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Extracted text, as the library produced it.
    pub text: String,
    /// Number of pages, when the format has them.
    pub page_count: Option<usize>,
    /// Non-empty pages in document order. Empty when the library does not
    /// report page boundaries.
    pub pages: Vec<PageText>,
    /// Name of the extractor that produced the text.
    pub extractor: &'static str,
}

/// Text of one page, numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: usize,
    pub text: String,
}

/// One way of turning a document into text.
pub trait Extractor: Send + Sync {
    /// Short, stable name used in logs and error reports.
    fn name(&self) -> &'static str;

    /// Extract text from `path`.
    ///
    /// A blank result is not an error here; the chain decides that.
    fn extract(&self, path: &Path) -> Result<Extracted, ExtractError>;
}

/// Ordered list of extractors tried until one succeeds.
pub struct ExtractorChain {
    kind: &'static str,
    extractors: Vec<Box<dyn Extractor>>,
}

impl std::fmt::Debug for ExtractorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorChain")
            .field("kind", &self.kind)
            .field("extractors", &self.names())
            .finish()
    }
}

impl ExtractorChain {
    /// Create an empty chain for documents of `kind` ("DOCX", "PDF", ...).
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            extractors: Vec::new(),
        }
    }

    /// Append an extractor at the lowest priority.
    pub fn push(&mut self, extractor: Box<dyn Extractor>) {
        self.extractors.push(extractor);
    }

    pub fn with(mut self, extractor: impl Extractor + 'static) -> Self {
        self.push(Box::new(extractor));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Validate `path` and run the chain.
    ///
    /// Returns the first result whose trimmed text is non-empty. The text is
    /// returned untrimmed.
    pub fn extract(&self, path: &Path) -> Result<Extracted, TextkitError> {
        if self.extractors.is_empty() {
            return Err(TextkitError::NoExtractors { kind: self.kind });
        }
        let path = validate_input(path)?;

        let mut attempts = Vec::with_capacity(self.extractors.len());
        for extractor in &self.extractors {
            debug!("Trying {} extractor on {}", extractor.name(), path.display());
            match extractor.extract(&path) {
                Ok(out) if !out.text.trim().is_empty() => {
                    info!(
                        "{} extracted {} chars from {}",
                        extractor.name(),
                        out.text.len(),
                        path.display()
                    );
                    return Ok(out);
                }
                Ok(_) => {
                    warn!("{} found no text in {}", extractor.name(), path.display());
                    attempts.push(ExtractError::Empty {
                        extractor: extractor.name(),
                    });
                }
                Err(e) => {
                    warn!("{}", e);
                    attempts.push(e);
                }
            }
        }

        Err(TextkitError::ExtractionExhausted { path, attempts })
    }
}

/// Check that `path` is an existing, readable regular file.
pub fn validate_input(path: &Path) -> Result<PathBuf, TextkitError> {
    let path = path.to_path_buf();
    if !path.is_file() {
        return Err(TextkitError::FileNotFound { path });
    }
    match std::fs::File::open(&path) {
        Ok(_) => Ok(path),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(TextkitError::PermissionDenied { path })
        }
        Err(_) => Err(TextkitError::FileNotFound { path }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed {
        name: &'static str,
        result: Result<&'static str, ExtractError>,
        calls: Arc<AtomicUsize>,
    }

    impl Extractor for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        fn extract(&self, _path: &Path) -> Result<Extracted, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().map(|t| Extracted {
                text: t.to_string(),
                page_count: None,
                pages: Vec::new(),
                extractor: self.name,
            })
        }
    }

    fn fixed(
        name: &'static str,
        result: Result<&'static str, ExtractError>,
    ) -> (Fixed, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Fixed {
                name,
                result,
                calls: calls.clone(),
            },
            calls,
        )
    }

    fn some_file() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().unwrap()
    }

    #[test]
    fn first_success_wins_and_later_extractors_are_skipped() {
        let (a, a_calls) = fixed("a", Ok("from a"));
        let (b, b_calls) = fixed("b", Ok("from b"));
        let chain = ExtractorChain::new("TEST").with(a).with(b);

        let f = some_file();
        let out = chain.extract(f.path()).unwrap();
        assert_eq!(out.text, "from a");
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failures_and_blank_text_fall_through() {
        let (a, _) = fixed(
            "a",
            Err(ExtractError::ParseFailed {
                extractor: "a",
                detail: "bad".into(),
            }),
        );
        let (b, _) = fixed("b", Ok("  \n\t "));
        let (c, _) = fixed("c", Ok("third time lucky"));
        let chain = ExtractorChain::new("TEST").with(a).with(b).with(c);

        let f = some_file();
        let out = chain.extract(f.path()).unwrap();
        assert_eq!(out.text, "third time lucky");
        assert_eq!(out.extractor, "c");
    }

    #[test]
    fn exhausted_chain_reports_every_attempt() {
        let (a, _) = fixed(
            "a",
            Err(ExtractError::Unavailable {
                extractor: "a",
                reason: "missing".into(),
            }),
        );
        let (b, _) = fixed("b", Ok(""));
        let chain = ExtractorChain::new("TEST").with(a).with(b);

        let f = some_file();
        match chain.extract(f.path()).unwrap_err() {
            TextkitError::ExtractionExhausted { attempts, .. } => {
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].extractor(), "a");
                assert!(attempts[1].is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_chain_is_an_error() {
        let chain = ExtractorChain::new("PDF");
        let f = some_file();
        assert!(matches!(
            chain.extract(f.path()),
            Err(TextkitError::NoExtractors { kind: "PDF" })
        ));
    }

    #[test]
    fn missing_file_is_reported_before_any_extractor_runs() {
        let (a, calls) = fixed("a", Ok("text"));
        let chain = ExtractorChain::new("TEST").with(a);
        let err = chain
            .extract(Path::new("/definitely/not/here.docx"))
            .unwrap_err();
        assert!(matches!(err, TextkitError::FileNotFound { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn directory_is_not_a_valid_input() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            validate_input(dir.path()),
            Err(TextkitError::FileNotFound { .. })
        ));
    }
}
