//! CLI binary: print the text of a PDF, or write it as Markdown.
//!
//! On success the extracted text goes to stdout unchanged. When no library
//! can read the file, stdout stays empty, the reason goes to stderr and the
//! exit status is 1.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_textkit::{convert_pdf, extract_pdf_text, PdfExtractorKind};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Plain text to stdout
  pdftext report.pdf > report.txt

  # Markdown next to the input (report.md)
  pdftext --markdown report.pdf

  # Markdown to an explicit file, trying lopdf first
  pdftext --extractors lopdf,pdfium report.pdf -o notes/report.md

ENVIRONMENT VARIABLES:
  PDFTEXT_EXTRACTORS   Comma-separated extractor order (pdfium, pdf-extract, lopdf)
  PDFIUM_LIB_PATH      Path to a pdfium shared library; default is the system library
  RUST_LOG             Log filter for diagnostics on stderr
"#;

/// Extract text from a PDF using the first library that can read it.
#[derive(Parser, Debug)]
#[command(
    name = "pdftext",
    version,
    about = "Extract text from a PDF using the first library that can read it",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to read.
    input: PathBuf,

    /// Extractor order, comma-separated.
    #[arg(
        long,
        env = "PDFTEXT_EXTRACTORS",
        default_value = "pdfium,pdf-extract,lopdf"
    )]
    extractors: String,

    /// Write Markdown instead of printing text. Implies --markdown.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write Markdown to <input stem>.md.
    #[arg(short, long)]
    markdown: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFTEXT_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "error" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let extractors =
        PdfExtractorKind::parse_list(&cli.extractors).context("Invalid --extractors")?;

    if cli.markdown || cli.output.is_some() {
        let report = convert_pdf(&cli.input, cli.output.as_deref(), &extractors)
            .await
            .context("Conversion failed")?;
        eprintln!(
            "✔ PDF converted: {} -> {}",
            cli.input.display(),
            report.output.display()
        );
        return Ok(());
    }

    let extracted = extract_pdf_text(&cli.input, &extractors)
        .await
        .context("Text extraction failed")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(extracted.text.as_bytes())
        .context("Failed to write to stdout")?;
    handle.flush().context("Failed to write to stdout")?;
    Ok(())
}
