//! CLI binary: convert one DOCX file to Markdown.
//!
//! Accepts both `--input/-i` and the single-dash `-input` form.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_textkit::convert_docx;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Convert a DOCX document to Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "docx2md",
    version,
    about = "Convert a DOCX document to Markdown",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto
)]
struct Cli {
    /// DOCX file to convert.
    #[arg(short, long)]
    input: PathBuf,

    /// Markdown file to write. Default: <input stem>.md next to the input.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCX2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCX2MD_QUIET")]
    quiet: bool,
}

/// Rewrite `-input`/`-output` (and their `=value` forms) as `--input`/`--output`.
fn normalise_long_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let Some(s) = arg.to_str() else {
                return arg;
            };
            let name = s.strip_prefix('-').filter(|rest| !rest.starts_with('-'));
            match name {
                Some(rest)
                    if rest == "input"
                        || rest == "output"
                        || rest.starts_with("input=")
                        || rest.starts_with("output=") =>
                {
                    OsString::from(format!("--{rest}"))
                }
                _ => arg,
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_from(normalise_long_flags(std::env::args_os()));

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let report = convert_docx(&cli.input, cli.output.as_deref())
        .await
        .context("Conversion failed")?;

    if !cli.quiet {
        println!(
            "✔ DOCX converted: {} -> {}",
            cli.input.display(),
            report.output.display()
        );
    }
    Ok(())
}
