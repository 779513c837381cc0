//! PDF text extractors.
//!
//! Three libraries are tried in priority order: pdfium (via `pdfium-render`),
//! `pdf-extract`, then `lopdf`. Each is compiled in only when its cargo
//! feature is enabled; a kind that was compiled out still takes part in the
//! chain but reports itself as unavailable, so the exhaustion error shows it.
//!
//! Every extractor builds its text the same way: each non-empty page's text
//! followed by a single `\n`. The pages are also kept one by one, numbered
//! from 1 with empty pages counted.

use super::{Extracted, Extractor, ExtractorChain, PageText};
use crate::config::PdfExtractorKind;
use crate::error::ExtractError;
use std::path::Path;
use tracing::debug;

/// Build the PDF chain for the given kinds, in the given order.
pub fn pdf_chain(kinds: &[PdfExtractorKind]) -> ExtractorChain {
    let mut chain = ExtractorChain::new("PDF");
    for kind in kinds {
        chain.push(extractor_for(*kind));
    }
    chain
}

fn extractor_for(kind: PdfExtractorKind) -> Box<dyn Extractor> {
    match kind {
        #[cfg(feature = "pdfium")]
        PdfExtractorKind::Pdfium => Box::new(PdfiumExtractor::from_env()),
        #[cfg(feature = "pdf-extract")]
        PdfExtractorKind::PdfExtract => Box::new(PdfExtractExtractor),
        #[cfg(feature = "lopdf")]
        PdfExtractorKind::Lopdf => Box::new(LopdfExtractor),
        #[allow(unreachable_patterns)]
        other => Box::new(NotCompiled(other)),
    }
}

/// Collects page texts the way every PDF extractor does.
#[derive(Debug, Default)]
struct PageSink {
    text: String,
    pages: Vec<PageText>,
}

impl PageSink {
    fn push(&mut self, number: usize, page_text: &str) {
        if page_text.is_empty() {
            return;
        }
        self.text.push_str(page_text);
        self.text.push('\n');
        self.pages.push(PageText {
            number,
            text: page_text.to_string(),
        });
    }

    fn finish(self, page_count: Option<usize>, extractor: &'static str) -> Extracted {
        Extracted {
            text: self.text,
            page_count,
            pages: self.pages,
            extractor,
        }
    }
}

/// Placeholder for a library whose feature is disabled.
#[derive(Debug)]
struct NotCompiled(PdfExtractorKind);

impl Extractor for NotCompiled {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn extract(&self, _path: &Path) -> Result<Extracted, ExtractError> {
        Err(ExtractError::Unavailable {
            extractor: self.name(),
            reason: format!("built without the `{}` feature", self.0.name()),
        })
    }
}

// ── pdfium ───────────────────────────────────────────────────────────────

#[cfg(feature = "pdfium")]
pub use pdfium_impl::PdfiumExtractor;

#[cfg(feature = "pdfium")]
mod pdfium_impl {
    use super::*;
    use pdfium_render::prelude::*;
    use std::path::PathBuf;

    /// Environment variable naming an explicit pdfium shared library.
    pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

    /// Text extraction through the pdfium C++ library.
    ///
    /// The shared library is bound on every call; a missing library is an
    /// `Unavailable` attempt, not a hard error.
    #[derive(Debug, Clone, Default)]
    pub struct PdfiumExtractor {
        library_path: Option<PathBuf>,
    }

    impl PdfiumExtractor {
        /// Bind to `PDFIUM_LIB_PATH` when set, else to the system library.
        pub fn from_env() -> Self {
            Self {
                library_path: std::env::var_os(PDFIUM_LIB_PATH_ENV)
                    .filter(|v| !v.is_empty())
                    .map(PathBuf::from),
            }
        }

        pub fn with_library(path: impl Into<PathBuf>) -> Self {
            Self {
                library_path: Some(path.into()),
            }
        }

        fn bind(&self) -> Result<Pdfium, ExtractError> {
            let bindings = match &self.library_path {
                Some(p) => Pdfium::bind_to_library(p),
                None => Pdfium::bind_to_system_library(),
            };
            bindings
                .map(Pdfium::new)
                .map_err(|e| ExtractError::Unavailable {
                    extractor: "pdfium",
                    reason: format!("cannot load pdfium library: {e:?}"),
                })
        }
    }

    impl Extractor for PdfiumExtractor {
        fn name(&self) -> &'static str {
            "pdfium"
        }

        fn extract(&self, path: &Path) -> Result<Extracted, ExtractError> {
            let pdfium = self.bind()?;
            let document =
                pdfium
                    .load_pdf_from_file(path, None)
                    .map_err(|e| ExtractError::ParseFailed {
                        extractor: self.name(),
                        detail: format!("{e:?}"),
                    })?;

            let pages = document.pages();
            let page_count = pages.len() as usize;
            debug!("pdfium opened {} ({} pages)", path.display(), page_count);

            let mut sink = PageSink::default();
            for (i, page) in pages.iter().enumerate() {
                let page_text = page.text().map_err(|e| ExtractError::ParseFailed {
                    extractor: self.name(),
                    detail: format!("{e:?}"),
                })?;
                sink.push(i + 1, &page_text.all());
            }

            Ok(sink.finish(Some(page_count), self.name()))
        }
    }
}

// ── pdf-extract ──────────────────────────────────────────────────────────

/// Text extraction through the pure-Rust `pdf-extract` crate.
///
/// `pdf-extract` panics on some malformed inputs; a panic is reported as a
/// parse failure so the chain can continue.
#[cfg(feature = "pdf-extract")]
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractExtractor;

#[cfg(feature = "pdf-extract")]
impl Extractor for PdfExtractExtractor {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn extract(&self, path: &Path) -> Result<Extracted, ExtractError> {
        let owned = path.to_path_buf();
        let result = std::panic::catch_unwind(move || pdf_extract::extract_text(&owned));
        let raw = match result {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                return Err(ExtractError::ParseFailed {
                    extractor: self.name(),
                    detail: e.to_string(),
                })
            }
            Err(_) => {
                return Err(ExtractError::ParseFailed {
                    extractor: self.name(),
                    detail: "parser panicked".into(),
                })
            }
        };

        // Pages come back separated by form feeds.
        let mut sink = PageSink::default();
        for (i, page) in raw.split('\u{000C}').enumerate() {
            sink.push(i + 1, page.trim_matches('\n'));
        }
        Ok(sink.finish(None, self.name()))
    }
}

// ── lopdf ────────────────────────────────────────────────────────────────

/// Text extraction through `lopdf`'s content-stream decoder.
#[cfg(feature = "lopdf")]
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

#[cfg(feature = "lopdf")]
impl Extractor for LopdfExtractor {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn extract(&self, path: &Path) -> Result<Extracted, ExtractError> {
        let document = lopdf::Document::load(path).map_err(|e| ExtractError::ParseFailed {
            extractor: self.name(),
            detail: e.to_string(),
        })?;
        if document.is_encrypted() {
            return Err(ExtractError::ParseFailed {
                extractor: self.name(),
                detail: "document is encrypted".into(),
            });
        }

        let pages = document.get_pages();
        let mut sink = PageSink::default();
        for page_number in pages.keys() {
            match document.extract_text(&[*page_number]) {
                Ok(page_text) => sink.push(*page_number as usize, &page_text),
                Err(e) => debug!("lopdf: page {} unreadable: {}", page_number, e),
            }
        }

        Ok(sink.finish(Some(pages.len()), self.name()))
    }
}
