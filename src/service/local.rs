//! In-process backend with a lazily loaded tokenizer and model.
//!
//! Loading is split in two so that token counting only ever pays for the
//! tokenizer. Each half sits in a [`tokio::sync::OnceCell`]: concurrent cold
//! starts wait for a single load, and a failed load is not cached, so the
//! next request tries again.
//!
//! The model itself is abstracted behind [`ModelSource`], which keeps the
//! backend testable without weights on disk.

use super::{estimate_tokens, TextBackend};
use crate::config::GenerationParams;
use crate::error::ServiceError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Error type returned by model sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A loaded tokenizer.
pub trait TokenizerHandle: Send + Sync + 'static {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<u32>, BoxError>;

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String, BoxError>;

    /// Wrap a single user message in the model's chat template, ending with
    /// the assistant generation prompt.
    fn apply_chat_template(&self, prompt: &str) -> Result<String, BoxError>;
}

/// A loaded causal language model.
pub trait ModelRuntime: Send + Sync + 'static {
    /// Generate up to `params.max_tokens` new tokens after `input_ids`.
    ///
    /// Returns the full sequence: the input ids followed by the new ones.
    fn generate(&self, input_ids: &[u32], params: GenerationParams) -> Result<Vec<u32>, BoxError>;
}

/// Where tokenizer and model come from. Loading is blocking.
pub trait ModelSource: Send + Sync + 'static {
    type Tokenizer: TokenizerHandle;
    type Model: ModelRuntime;

    /// Human-readable location for logs.
    fn describe(&self) -> String;

    fn load_tokenizer(&self) -> Result<Self::Tokenizer, BoxError>;

    fn load_model(&self) -> Result<Self::Model, BoxError>;
}

/// [`TextBackend`] running a model from `S` in this process.
pub struct LocalBackend<S: ModelSource> {
    source: Arc<S>,
    tokenizer: OnceCell<Arc<S::Tokenizer>>,
    model: OnceCell<Arc<S::Model>>,
}

impl<S: ModelSource> LocalBackend<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            tokenizer: OnceCell::new(),
            model: OnceCell::new(),
        }
    }

    async fn tokenizer(&self) -> Result<Arc<S::Tokenizer>, String> {
        self.tokenizer
            .get_or_try_init(|| async {
                let source = Arc::clone(&self.source);
                info!("Loading tokenizer from {}", source.describe());
                let tokenizer = tokio::task::spawn_blocking(move || source.load_tokenizer())
                    .await
                    .map_err(|e| format!("tokenizer load task failed: {e}"))?
                    .map(Arc::new)
                    .map_err(|e| e.to_string())?;
                Ok::<_, String>(tokenizer)
            })
            .await
            .cloned()
    }

    async fn model(&self) -> Result<Arc<S::Model>, String> {
        self.model
            .get_or_try_init(|| async {
                let source = Arc::clone(&self.source);
                info!("Loading model from {}", source.describe());
                let model = tokio::task::spawn_blocking(move || source.load_model())
                    .await
                    .map_err(|e| format!("model load task failed: {e}"))?
                    .map(Arc::new)
                    .map_err(|e| e.to_string())?;
                info!("Model loaded");
                Ok::<_, String>(model)
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl<S: ModelSource> TextBackend for LocalBackend<S> {
    async fn count_tokens(&self, text: &str) -> usize {
        let tokenizer = match self.tokenizer().await {
            Ok(t) => t,
            Err(e) => {
                warn!("Tokenizer unavailable ({e}); estimating");
                return estimate_tokens(text);
            }
        };
        let owned = text.to_string();
        let counted =
            tokio::task::spawn_blocking(move || tokenizer.encode(&owned, false).map(|ids| ids.len()))
                .await;
        match counted {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                warn!("Tokenizer failed ({e}); estimating");
                estimate_tokens(text)
            }
            Err(e) => {
                warn!("Token count task failed ({e}); estimating");
                estimate_tokens(text)
            }
        }
    }

    async fn generate(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, ServiceError> {
        let tokenizer = self.tokenizer().await.map_err(ServiceError::ModelUnavailable)?;
        let model = self.model().await.map_err(ServiceError::ModelUnavailable)?;

        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || -> Result<String, BoxError> {
            let templated = tokenizer.apply_chat_template(&prompt)?;
            let input_ids = tokenizer.encode(&templated, false)?;
            let sequence = model.generate(&input_ids, params)?;
            let new_ids = sequence.get(input_ids.len()..).unwrap_or(&[]);
            tokenizer.decode(new_ids, true)
        })
        .await
        .map_err(|e| ServiceError::GenerationFailed(e.to_string()))?
        .map_err(|e| ServiceError::GenerationFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// One id per character; the template brackets the prompt.
    struct CharTokenizer;

    impl TokenizerHandle for CharTokenizer {
        fn encode(&self, text: &str, _add_special_tokens: bool) -> Result<Vec<u32>, BoxError> {
            Ok(text.chars().map(u32::from).collect())
        }

        fn decode(&self, ids: &[u32], _skip_special_tokens: bool) -> Result<String, BoxError> {
            Ok(ids.iter().filter_map(|&i| char::from_u32(i)).collect())
        }

        fn apply_chat_template(&self, prompt: &str) -> Result<String, BoxError> {
            Ok(format!("[user]{prompt}[assistant]"))
        }
    }

    /// Echoes the input and appends "ok", capped at `max_tokens`.
    struct EchoModel;

    impl ModelRuntime for EchoModel {
        fn generate(
            &self,
            input_ids: &[u32],
            params: GenerationParams,
        ) -> Result<Vec<u32>, BoxError> {
            let mut out = input_ids.to_vec();
            out.extend("ok".chars().map(u32::from).take(params.max_tokens as usize));
            Ok(out)
        }
    }

    #[derive(Default)]
    struct FakeSource {
        tokenizer_loads: AtomicUsize,
        model_loads: AtomicUsize,
        /// Number of initial model loads that fail.
        model_failures: usize,
        tokenizer_missing: bool,
    }

    impl ModelSource for Arc<FakeSource> {
        type Tokenizer = CharTokenizer;
        type Model = EchoModel;

        fn describe(&self) -> String {
            "fake".into()
        }

        fn load_tokenizer(&self) -> Result<CharTokenizer, BoxError> {
            self.tokenizer_loads.fetch_add(1, Ordering::SeqCst);
            if self.tokenizer_missing {
                return Err("no tokenizer.json".into());
            }
            Ok(CharTokenizer)
        }

        fn load_model(&self) -> Result<EchoModel, BoxError> {
            let n = self.model_loads.fetch_add(1, Ordering::SeqCst);
            if n < self.model_failures {
                return Err("weights missing".into());
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(EchoModel)
        }
    }

    fn params() -> GenerationParams {
        GenerationParams::default()
    }

    #[tokio::test]
    async fn generated_text_excludes_prompt() {
        let backend = LocalBackend::new(Arc::new(FakeSource::default()));
        let text = backend.generate("hello", params()).await.unwrap();
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn max_tokens_is_passed_through() {
        let backend = LocalBackend::new(Arc::new(FakeSource::default()));
        let p = GenerationParams {
            max_tokens: 1,
            temperature: 0.0,
        };
        assert_eq!(backend.generate("hi", p).await.unwrap(), "o");
    }

    #[tokio::test]
    async fn token_count_uses_tokenizer_and_skips_model() {
        let source = Arc::new(FakeSource::default());
        let backend = LocalBackend::new(Arc::clone(&source));
        assert_eq!(backend.count_tokens("abc").await, 3);
        assert_eq!(source.model_loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_tokenizer_falls_back_to_estimate() {
        let source = Arc::new(FakeSource {
            tokenizer_missing: true,
            ..Default::default()
        });
        let backend = LocalBackend::new(source);
        assert_eq!(backend.count_tokens("abcdefgh").await, 2);
    }

    #[tokio::test]
    async fn unavailable_model_is_503_and_retried_later() {
        let source = Arc::new(FakeSource {
            model_failures: 1,
            ..Default::default()
        });
        let backend = LocalBackend::new(Arc::clone(&source));

        let err = backend.generate("x", params()).await.unwrap_err();
        assert_eq!(err.status_code(), 503);
        assert!(err.to_string().starts_with("Local model not available"));

        assert_eq!(backend.generate("x", params()).await.unwrap(), "ok");
        assert_eq!(source.model_loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_cold_start_loads_once() {
        let source = Arc::new(FakeSource::default());
        let backend = Arc::new(LocalBackend::new(Arc::clone(&source)));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let b = Arc::clone(&backend);
                tokio::spawn(async move { b.generate("p", params()).await })
            })
            .collect();
        for t in tasks {
            assert_eq!(t.await.unwrap().unwrap(), "ok");
        }
        assert_eq!(source.model_loads.load(Ordering::SeqCst), 1);
        assert_eq!(source.tokenizer_loads.load(Ordering::SeqCst), 1);
    }
}
