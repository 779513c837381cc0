//! CLI binary: the Qwen model service.
//!
//! Reads its settings from the environment once at startup, then serves
//! `/health`, `/api/v1/token_count` and `/api/v1/generate`.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use edgequake_textkit::config::parse_local_mode;
use edgequake_textkit::service::serve;
use edgequake_textkit::{build_backend, ServiceConfig};
use std::io;
use std::net::IpAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"ENVIRONMENT VARIABLES:
  QWEN_MODEL_PATH   Local model directory or Hugging Face repo id
                    (default: Qwen/Qwen2.5-7B-Instruct)
  QWEN_API_KEY      Bearer token for the remote API
  QWEN_API_BASE     Remote API base URL
                    (default: https://dashscope.aliyuncs.com/compatible-mode/v1)
  QWEN_LOCAL_MODE   "true" (any case) runs the model in-process; anything else
                    forwards to the remote API (default: true)
  PORT              Listen port (default: 8004)
  MODEL_SERVICE_HOST
                    Address to bind (default: 0.0.0.0)
  RUST_LOG          Log filter, e.g. "info,tower_http=debug"
"#;

/// Token counting and text generation over HTTP, backed by a local Qwen
/// model or a remote OpenAI-compatible API.
#[derive(Parser, Debug)]
#[command(
    name = "model-service",
    version,
    about = "Qwen token-count and generation service",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local model directory or Hugging Face repo id.
    #[arg(long, env = "QWEN_MODEL_PATH", default_value = "")]
    model_path: String,

    /// API key for the remote API.
    #[arg(long, env = "QWEN_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// Base URL of the remote API.
    #[arg(long, env = "QWEN_API_BASE", default_value = "")]
    api_base: String,

    /// Run the model in-process ("true") or use the remote API (anything else).
    #[arg(
        long,
        env = "QWEN_LOCAL_MODE",
        default_value = "true",
        action = ArgAction::Set,
        value_parser = local_mode_value
    )]
    local_mode: bool,

    /// Address to bind.
    #[arg(long, env = "MODEL_SERVICE_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 8004)]
    port: u16,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MODEL_SERVICE_VERBOSE")]
    verbose: bool,
}

fn local_mode_value(s: &str) -> Result<bool, String> {
    Ok(parse_local_mode(s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    info!("Starting with {:?}", config);

    let backend = build_backend(&config).context("Failed to initialise backend")?;
    serve(&config, backend)
        .await
        .with_context(|| format!("Server on {} failed", config.bind_addr()))
}

/// Map CLI args to `ServiceConfig`.
fn build_config(cli: &Cli) -> Result<ServiceConfig> {
    ServiceConfig::builder()
        .model_path(&cli.model_path)
        .api_key(&cli.api_key)
        .api_base(&cli.api_base)
        .local_mode(cli.local_mode)
        .host(cli.host)
        .port(cli.port)
        .build()
        .context("Invalid configuration")
}
