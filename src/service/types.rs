//! Request and response bodies of the model service.

use crate::config::GenerationParams;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCountRequest {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCountResponse {
    pub token_count: usize,
}

/// Body of `POST /api/v1/generate`. Missing or `null` parameters fall back
/// to the service defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    pub fn params(&self, defaults: GenerationParams) -> GenerationParams {
        GenerationParams {
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
    pub token_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub local_mode: bool,
}

/// Error body: `{"detail": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_request_defaults() {
        let req: GenerateRequest = serde_json::from_str(r#"{"prompt":"hi"}"#).unwrap();
        let p = req.params(GenerationParams::default());
        assert_eq!(p.max_tokens, 2048);
        assert!((p.temperature - 0.7).abs() < f32::EPSILON);

        let req: GenerateRequest =
            serde_json::from_str(r#"{"prompt":"hi","max_tokens":null,"temperature":0.1}"#)
                .unwrap();
        let p = req.params(GenerationParams::default());
        assert_eq!(p.max_tokens, 2048);
        assert!((p.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn generate_response_serialises_null_count() {
        let body = serde_json::to_value(GenerateResponse {
            text: "x".into(),
            token_count: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"text": "x", "token_count": null}));
    }
}
