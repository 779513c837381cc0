//! Qwen model service: token counting and text generation over HTTP.
//!
//! The HTTP layer ([`http`]) only talks to a [`TextBackend`]. Two backends
//! exist:
//!
//! * [`local::LocalBackend`] runs a tokenizer and model in-process, loading
//!   them lazily on first use (candle + tokenizers with the `local` feature).
//! * [`remote::RemoteBackend`] forwards to an OpenAI-compatible API.
//!
//! Token counting never fails: when the tokenizer or the remote API is not
//! usable the count falls back to [`estimate_tokens`].

pub mod http;
pub mod local;
#[cfg(feature = "local")]
pub mod qwen;
pub mod remote;
pub mod types;

use crate::config::{GenerationParams, ServiceConfig};
use crate::error::{ServiceError, TextkitError};
use async_trait::async_trait;
use std::sync::Arc;

pub use http::{router, serve, ApiJson, AppState};
pub use local::{LocalBackend, ModelRuntime, ModelSource, TokenizerHandle};
pub use remote::RemoteBackend;
pub use types::{
    ErrorBody, GenerateRequest, GenerateResponse, HealthResponse, TokenCountRequest,
    TokenCountResponse,
};

/// Rough token count used when no tokenizer is available: one token per four
/// characters, rounded down.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Something that can count tokens and generate text.
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Number of tokens in `text`. Falls back to [`estimate_tokens`] instead
    /// of failing.
    async fn count_tokens(&self, text: &str) -> usize;

    /// Generate a completion for `prompt`. The returned text never contains
    /// the prompt itself.
    async fn generate(&self, prompt: &str, params: GenerationParams)
        -> Result<String, ServiceError>;
}

/// Pick the backend the configuration asks for.
///
/// Local mode needs the `local` feature; without it startup fails rather than
/// silently proxying.
pub fn build_backend(config: &ServiceConfig) -> Result<Arc<dyn TextBackend>, TextkitError> {
    if config.local_mode {
        return local_backend(config);
    }

    let remote = RemoteBackend::new(config)
        .map_err(|e| TextkitError::InvalidConfig(format!("HTTP client: {e}")))?;
    Ok(Arc::new(remote))
}

#[cfg(feature = "local")]
fn local_backend(config: &ServiceConfig) -> Result<Arc<dyn TextBackend>, TextkitError> {
    let source = qwen::QwenSource::new(&config.model_path);
    Ok(Arc::new(LocalBackend::new(source)))
}

#[cfg(not(feature = "local"))]
fn local_backend(_config: &ServiceConfig) -> Result<Arc<dyn TextBackend>, TextkitError> {
    Err(TextkitError::InvalidConfig(
        "local mode requested but this build has no `local` feature; \
         set QWEN_LOCAL_MODE=false to use the remote API"
            .into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_counts_scalar_values() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcdefghi"), 2);
        // Four CJK characters are four scalar values, not twelve bytes.
        assert_eq!(estimate_tokens("你好世界"), 1);
    }

    #[test]
    fn remote_mode_builds_without_model() {
        let config = ServiceConfig::builder()
            .local_mode(false)
            .api_key("k")
            .build()
            .unwrap();
        assert!(build_backend(&config).is_ok());
    }
}
