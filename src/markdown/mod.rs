//! Markdown assembly: title header, provenance note, rule, body.
//!
//! ```text
//! # <title from file name>
//!
//! > Converted from DOCX: report_final.docx
//!
//! ---
//!
//! <cleaned body>
//! ```

pub mod cleanup;
pub mod heuristics;

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};

pub use cleanup::clean_body;
pub use heuristics::{format_page_sections, format_plain_text};

/// Kind of document a Markdown file was converted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Docx,
    Pdf,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Docx => "DOCX",
            SourceKind::Pdf => "PDF",
        })
    }
}

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Derive a document title from a file name.
///
/// The stem has `_` and `-` replaced by spaces, whitespace runs collapsed and
/// the ends trimmed: `my_report-final.docx` → `my report final`.
pub fn title_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let spaced = stem.replace(['_', '-'], " ");
    let title = RE_WHITESPACE.replace_all(&spaced, " ").trim().to_string();
    if title.is_empty() {
        "Untitled".to_string()
    } else {
        title
    }
}

/// `<stem>.md` next to the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("md")
}

/// A Markdown document ready to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownDocument {
    pub title: String,
    pub kind: SourceKind,
    /// File name of the source, shown in the provenance note.
    pub source_name: String,
    /// Page count shown under the provenance note, when known.
    pub page_count: Option<usize>,
    pub body: String,
}

impl MarkdownDocument {
    /// Build a document for `source` with title and file name derived from it.
    pub fn new(source: &Path, kind: SourceKind, body: impl Into<String>) -> Self {
        Self {
            title: title_from_path(source),
            kind,
            source_name: source
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            page_count: None,
            body: body.into(),
        }
    }

    pub fn with_page_count(mut self, pages: Option<usize>) -> Self {
        self.page_count = pages;
        self
    }

    /// Render header and cleaned body. A blank body leaves only the header.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 128);
        out.push_str(&format!("# {}\n\n", self.title));
        out.push_str(&format!("> Converted from {}: {}\n", self.kind, self.source_name));
        if let Some(pages) = self.page_count {
            out.push_str(&format!("> Pages: {pages}\n"));
        }
        out.push_str("\n---\n");

        let body = clean_body(&self.body);
        if !body.is_empty() {
            out.push('\n');
            out.push_str(&body);
        }
        out
    }
}
