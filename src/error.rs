//! Error types for the edgequake-textkit library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`TextkitError`]: **Fatal** for a document conversion: the input cannot
//!   be read, every extractor in the chain failed, or the output file could
//!   not be written. Returned as `Err(TextkitError)` from the `convert_*`
//!   entry points.
//!
//! * [`ExtractError`]: **Non-fatal**, a single extractor could not produce
//!   text (library missing, malformed document, blank result). The chain
//!   records it and moves on to the next candidate; the full list only
//!   surfaces inside [`TextkitError::ExtractionExhausted`].
//!
//! * [`ServiceError`]: a model-service request failed. Each variant maps to
//!   one HTTP status code (see [`ServiceError::status_code`]).

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the document conversion entry points.
#[derive(Debug, Error)]
pub enum TextkitError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// Every extractor in the chain failed or returned blank text.
    #[error("No extractor could read '{path}':\n{}", format_attempts(.attempts))]
    ExtractionExhausted {
        path: PathBuf,
        attempts: Vec<ExtractError>,
    },

    /// The chain was configured with no extractors at all.
    #[error("No extractors are enabled for {kind} documents")]
    NoExtractors { kind: &'static str },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TextkitError {
    /// `true` when at least one extractor opened the document and found it
    /// empty, as opposed to every extractor failing to parse it.
    pub fn document_was_empty(&self) -> bool {
        match self {
            TextkitError::ExtractionExhausted { attempts, .. } => {
                attempts.iter().any(ExtractError::is_empty)
            }
            _ => false,
        }
    }
}

fn format_attempts(attempts: &[ExtractError]) -> String {
    attempts
        .iter()
        .map(|a| format!("  - {a}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A non-fatal failure of one extractor.
///
/// Collected by [`crate::extract::ExtractorChain`]; the next candidate is
/// tried regardless of which variant was returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    /// The backing library is not usable here (not compiled in, shared
    /// library missing, etc.).
    #[error("{extractor}: unavailable: {reason}")]
    Unavailable {
        extractor: &'static str,
        reason: String,
    },

    /// The document could not be parsed by this extractor.
    #[error("{extractor}: parse failed: {detail}")]
    ParseFailed {
        extractor: &'static str,
        detail: String,
    },

    /// The document parsed but yielded only whitespace.
    #[error("{extractor}: no text found")]
    Empty { extractor: &'static str },
}

impl ExtractError {
    /// Name of the extractor that produced this error.
    pub fn extractor(&self) -> &'static str {
        match self {
            ExtractError::Unavailable { extractor, .. }
            | ExtractError::ParseFailed { extractor, .. }
            | ExtractError::Empty { extractor } => extractor,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ExtractError::Empty { .. })
    }
}

/// Failures of the model service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The local model or tokenizer could not be loaded.
    #[error("Local model not available: {0}")]
    ModelUnavailable(String),

    /// The local model loaded but inference failed.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// The remote API answered with a non-200 status. Status and body are
    /// passed through unchanged.
    #[error("{body}")]
    Upstream { status: u16, body: String },

    /// The remote API could not be reached or returned an unusable body.
    #[error("API call failed: {0}")]
    RemoteCallFailed(String),
}

impl ServiceError {
    /// HTTP status code this error is reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::ModelUnavailable(_) => 503,
            ServiceError::GenerationFailed(_) => 500,
            ServiceError::Upstream { status, .. } => *status,
            ServiceError::RemoteCallFailed(_) => 500,
        }
    }
}
