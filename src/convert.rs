//! Document conversion entry points.
//!
//! Extraction is CPU-bound and synchronous, so each entry point runs the
//! extractor chain on `spawn_blocking` and returns once the output (if any)
//! is on disk.

use crate::config::PdfExtractorKind;
use crate::error::TextkitError;
use crate::extract::{docx_chain, pdf_chain, Extracted, ExtractorChain};
use crate::markdown::{
    default_output_path, format_page_sections, format_plain_text, MarkdownDocument, SourceKind,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Summary of a finished conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Extractor that produced the body; `None` when the document had no text.
    pub extractor: Option<&'static str>,
    pub page_count: Option<usize>,
    pub bytes_written: usize,
}

/// Convert a DOCX file to Markdown.
///
/// Writes to `output`, or `<stem>.md` next to the input, replacing any
/// existing file. A document that opens but contains no text still produces
/// a file with the title, provenance note and rule.
///
/// # Errors
/// - input missing or unreadable
/// - every extractor failed to parse the file
/// - the output could not be written
pub async fn convert_docx(
    input: impl AsRef<Path>,
    output: Option<&Path>,
) -> Result<ConversionReport, TextkitError> {
    let input = input.as_ref().to_path_buf();
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(&input));
    info!("Converting DOCX: {}", input.display());

    let (body, extractor) = match run_chain(docx_chain(), &input).await {
        Ok(out) => (out.text, Some(out.extractor)),
        Err(e) if e.document_was_empty() => {
            warn!("{} has no extractable text; writing header only", input.display());
            (String::new(), None)
        }
        Err(e) => return Err(e),
    };

    let markdown = MarkdownDocument::new(&input, SourceKind::Docx, body).render();
    let bytes_written = write_atomic(&output, markdown).await?;
    info!("Wrote {} ({} bytes)", output.display(), bytes_written);

    Ok(ConversionReport {
        input,
        output,
        extractor,
        page_count: None,
        bytes_written,
    })
}

/// Extract the plain text of a PDF with the given extractors, in order.
///
/// The text is returned as the winning library produced it: each non-empty
/// page followed by `\n`.
pub async fn extract_pdf_text(
    input: impl AsRef<Path>,
    extractors: &[PdfExtractorKind],
) -> Result<Extracted, TextkitError> {
    let input = input.as_ref().to_path_buf();
    info!("Extracting PDF text: {}", input.display());
    run_chain(pdf_chain(extractors), &input).await
}

/// Extract a PDF and write it as Markdown, with heading and list heuristics
/// applied to the text.
///
/// When the extractor reports page boundaries, each non-empty page becomes a
/// `## Page N` section closed by a rule.
pub async fn convert_pdf(
    input: impl AsRef<Path>,
    output: Option<&Path>,
    extractors: &[PdfExtractorKind],
) -> Result<ConversionReport, TextkitError> {
    let input = input.as_ref().to_path_buf();
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(&input));

    let extracted = extract_pdf_text(&input, extractors).await?;
    let body = if extracted.pages.is_empty() {
        format_plain_text(&extracted.text)
    } else {
        format_page_sections(
            extracted
                .pages
                .iter()
                .map(|p| (p.number, p.text.as_str())),
        )
    };
    let markdown = MarkdownDocument::new(&input, SourceKind::Pdf, body)
        .with_page_count(extracted.page_count)
        .render();
    let bytes_written = write_atomic(&output, markdown).await?;
    info!("Wrote {} ({} bytes)", output.display(), bytes_written);

    Ok(ConversionReport {
        input,
        output,
        extractor: Some(extracted.extractor),
        page_count: extracted.page_count,
        bytes_written,
    })
}

async fn run_chain(chain: ExtractorChain, input: &Path) -> Result<Extracted, TextkitError> {
    let path = input.to_path_buf();
    tokio::task::spawn_blocking(move || chain.extract(&path))
        .await
        .map_err(|e| TextkitError::Internal(format!("Extraction task panicked: {e}")))?
}

/// Write `contents` to `path` via a sibling temp file and a rename, so
/// readers never see a partial file.
async fn write_atomic(path: &Path, contents: String) -> Result<usize, TextkitError> {
    let fail = |source| TextkitError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents.as_bytes())
        .await
        .map_err(fail)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(fail(e));
    }
    Ok(contents.len())
}
