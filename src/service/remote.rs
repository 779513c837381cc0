//! Backend that forwards to an OpenAI-compatible HTTP API.

use super::{estimate_tokens, TextBackend};
use crate::config::{GenerationParams, ServiceConfig};
use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Remote API client.
///
/// Token counting calls `POST {base}/tokenizers/estimate-token-count`;
/// generation calls `POST {base}/chat/completions`. Both send the API key as
/// a bearer token.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    token_count_timeout: Duration,
    generate_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl RemoteBackend {
    pub fn new(config: &ServiceConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.remote_model.clone(),
            token_count_timeout: Duration::from_secs(config.token_count_timeout_secs),
            generate_timeout: Duration::from_secs(config.generate_timeout_secs),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    async fn try_count(&self, text: &str) -> Result<Option<usize>, String> {
        let response = self
            .client
            .post(self.url("tokenizers/estimate-token-count"))
            .bearer_auth(&self.api_key)
            .json(&json!({ "text": text }))
            .timeout(self.token_count_timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(format!("HTTP {status}"));
        }
        let body: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;
        Ok(body
            .get("token_count")
            .and_then(serde_json::Value::as_u64)
            .map(|n| n as usize))
    }
}

#[async_trait]
impl TextBackend for RemoteBackend {
    async fn count_tokens(&self, text: &str) -> usize {
        match self.try_count(text).await {
            Ok(Some(n)) => n,
            Ok(None) => {
                debug!("Token-count response has no token_count; estimating");
                estimate_tokens(text)
            }
            Err(e) => {
                warn!("Remote token count failed ({e}); estimating");
                estimate_tokens(text)
            }
        }
    }

    async fn generate(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, ServiceError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });

        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(self.generate_timeout)
            .send()
            .await
            .map_err(|e| ServiceError::RemoteCallFailed(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!("Remote generation returned {status}");
            return Err(ServiceError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| ServiceError::RemoteCallFailed(format!("invalid response: {e}")))?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| ServiceError::RemoteCallFailed("response has no choices".into()))
    }
}
