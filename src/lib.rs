//! # edgequake-textkit
//!
//! Document text extraction with library fallback, plus a small Qwen model
//! service for token counting and generation.
//!
//! ## What's inside
//!
//! ```text
//! DOCX ─┬─ docx-styled (styles, headings, emphasis)
//!       └─ docx-xml    (raw paragraph text)        ─▶ Markdown file
//!
//! PDF  ─┬─ pdfium
//!       ├─ pdf-extract
//!       └─ lopdf                                   ─▶ plain text / Markdown
//!
//! HTTP ─▶ /api/v1/token_count, /api/v1/generate
//!           ├─ LocalBackend  (candle Qwen2, lazy load)
//!           └─ RemoteBackend (OpenAI-compatible API)
//! ```
//!
//! Each extractor chain tries its libraries in a fixed order and keeps the
//! first non-blank result; see [`extract::ExtractorChain`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_textkit::{convert_docx, extract_pdf_text, PdfExtractorKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = convert_docx("minutes_2024-05.docx", None).await?;
//!     eprintln!("wrote {}", report.output.display());
//!
//!     let pdf = extract_pdf_text("paper.pdf", &PdfExtractorKind::DEFAULT_ORDER).await?;
//!     print!("{}", pdf.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature       | Default | Description |
//! |---------------|---------|-------------|
//! | `cli`         | on      | The `model-service`, `docx2md` and `pdftext` binaries |
//! | `local`       | on      | In-process Qwen2 inference (candle, tokenizers, hf-hub) |
//! | `pdfium`      | on      | pdfium extractor (needs the shared library at run time) |
//! | `pdf-extract` | on      | `pdf-extract` extractor |
//! | `lopdf`       | on      | `lopdf` extractor |
//!
//! Without `local` the model service can only run in remote mode.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod markdown;
pub mod service;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GenerationParams, PdfExtractorKind, ServiceConfig, ServiceConfigBuilder};
pub use convert::{convert_docx, convert_pdf, extract_pdf_text, ConversionReport};
pub use error::{ExtractError, ServiceError, TextkitError};
pub use extract::{Extracted, Extractor, ExtractorChain, PageText};
pub use markdown::{MarkdownDocument, SourceKind};
pub use service::{build_backend, estimate_tokens, TextBackend};
