//! Qwen2-family model source built on candle and tokenizers.
//!
//! `QWEN_MODEL_PATH` may be a local directory holding the usual Hugging Face
//! layout (`config.json`, `tokenizer.json`, `*.safetensors`) or a repo id such
//! as `Qwen/Qwen2.5-7B-Instruct`, which is fetched through the hf-hub cache.

use super::local::{BoxError, ModelRuntime, ModelSource, TokenizerHandle};
use crate::config::GenerationParams;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::qwen2::{Config, ModelForCausalLM};
use hf_hub::api::sync::{Api, ApiRepo};
use minijinja::value::{from_args, Value, ValueKind};
use minijinja::{context, Environment, Error as TemplateError, ErrorKind};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

/// `<|im_end|>` and `<|endoftext|>` in the Qwen2 vocabulary.
const DEFAULT_EOS_IDS: [u32; 2] = [151645, 151643];

/// Loads Qwen2 weights and tokenizer from a directory or the Hugging Face Hub.
#[derive(Debug, Clone)]
pub struct QwenSource {
    model_path: String,
}

impl QwenSource {
    pub fn new(model_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
        }
    }

    fn files(&self) -> Result<ModelFiles, BoxError> {
        let dir = Path::new(&self.model_path);
        if dir.is_dir() {
            return Ok(ModelFiles::Local(dir.to_path_buf()));
        }
        let api = Api::new()?;
        Ok(ModelFiles::Hub(api.model(self.model_path.clone())))
    }
}

enum ModelFiles {
    Local(PathBuf),
    Hub(ApiRepo),
}

impl ModelFiles {
    fn get(&self, name: &str) -> Result<PathBuf, BoxError> {
        match self {
            ModelFiles::Local(dir) => {
                let path = dir.join(name);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(format!("{} not found", path.display()).into())
                }
            }
            ModelFiles::Hub(repo) => Ok(repo.get(name)?),
        }
    }

    fn get_optional(&self, name: &str) -> Option<PathBuf> {
        self.get(name).ok()
    }

    /// Single-file weights, or every shard named in the safetensors index.
    fn weights(&self) -> Result<Vec<PathBuf>, BoxError> {
        if let Some(path) = self.get_optional("model.safetensors") {
            return Ok(vec![path]);
        }
        let index = std::fs::read_to_string(self.get("model.safetensors.index.json")?)?;
        let shards = shard_names(&index)?;
        debug!("Loading {} weight shards", shards.len());
        shards.iter().map(|name| self.get(name)).collect()
    }
}

fn shard_names(index_json: &str) -> Result<Vec<String>, BoxError> {
    let index: serde_json::Value = serde_json::from_str(index_json)?;
    let names: BTreeSet<String> = index
        .get("weight_map")
        .and_then(|v| v.as_object())
        .ok_or("index.json has no weight_map")?
        .values()
        .filter_map(|v| v.as_str())
        .map(str::to_owned)
        .collect();
    if names.is_empty() {
        return Err("index.json weight_map lists no shards".into());
    }
    Ok(names.into_iter().collect())
}

/// `eos_token_id` may be a number or a list of numbers.
fn eos_ids(generation_config: &serde_json::Value) -> Vec<u32> {
    match generation_config.get("eos_token_id") {
        Some(serde_json::Value::Number(n)) => n.as_u64().map(|n| vec![n as u32]).unwrap_or_default(),
        Some(serde_json::Value::Array(a)) => a
            .iter()
            .filter_map(serde_json::Value::as_u64)
            .map(|n| n as u32)
            .collect(),
        _ => Vec::new(),
    }
}

impl ModelSource for QwenSource {
    type Tokenizer = QwenTokenizer;
    type Model = QwenModel;

    fn describe(&self) -> String {
        self.model_path.clone()
    }

    fn load_tokenizer(&self) -> Result<QwenTokenizer, BoxError> {
        let files = self.files()?;
        let inner = Tokenizer::from_file(files.get("tokenizer.json")?)?;

        let mut chat_template = None;
        let mut eos_token = "<|im_end|>".to_string();
        if let Some(path) = files.get_optional("tokenizer_config.json") {
            let cfg: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            chat_template = cfg
                .get("chat_template")
                .and_then(|v| v.as_str())
                .map(str::to_owned);
            if let Some(eos) = cfg.get("eos_token").and_then(|v| v.as_str()) {
                eos_token = eos.to_string();
            }
        }
        if chat_template.is_none() {
            warn!("No chat_template in tokenizer_config.json; using plain ChatML");
        }

        Ok(QwenTokenizer {
            inner,
            chat_template,
            eos_token,
        })
    }

    fn load_model(&self) -> Result<QwenModel, BoxError> {
        let files = self.files()?;
        let config: Config = serde_json::from_str(&std::fs::read_to_string(files.get("config.json")?)?)?;

        let mut eos = files
            .get_optional("generation_config.json")
            .and_then(|p| std::fs::read_to_string(p).ok())
            .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
            .map(|v| eos_ids(&v))
            .unwrap_or_default();
        if eos.is_empty() {
            eos = DEFAULT_EOS_IDS.to_vec();
        }

        let device = Device::cuda_if_available(0)?;
        let dtype = if device.is_cpu() { DType::F32 } else { DType::BF16 };
        info!(device = ?device, dtype = ?dtype, "Loading Qwen2 weights");

        let weights = files.weights()?;
        // SAFETY: safetensors files are memory-mapped read-only and not modified while loaded.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&weights, dtype, &device)? };
        let model = ModelForCausalLM::new(&config, vb)?;

        Ok(QwenModel {
            model: Mutex::new(model),
            device,
            eos_ids: eos,
        })
    }
}

// ── Tokenizer ────────────────────────────────────────────────────────────

pub struct QwenTokenizer {
    inner: Tokenizer,
    chat_template: Option<String>,
    eos_token: String,
}

impl QwenTokenizer {
    fn render_template(&self, template: &str, prompt: &str) -> Result<String, TemplateError> {
        let mut env = Environment::new();
        env.set_lstrip_blocks(true);
        env.set_trim_blocks(true);
        env.add_function("raise_exception", |msg: String| -> Result<String, TemplateError> {
            Err(TemplateError::new(ErrorKind::InvalidOperation, msg))
        });
        env.set_unknown_method_callback(|_state, value, method, args| {
            match (value.kind(), method) {
                (ValueKind::String, "strip") => {
                    let _: () = from_args(args)?;
                    Ok(Value::from(value.as_str().unwrap_or("").trim()))
                }
                _ => Err(TemplateError::new(
                    ErrorKind::UnknownMethod,
                    format!("object has no method named {method}"),
                )),
            }
        });
        env.add_template("chat", template)?;
        env.get_template("chat")?.render(context! {
            messages => vec![context! { role => "user", content => prompt }],
            add_generation_prompt => true,
            bos_token => "",
            eos_token => self.eos_token.as_str(),
        })
    }
}

fn chatml(prompt: &str) -> String {
    format!("<|im_start|>user\n{prompt}<|im_end|>\n<|im_start|>assistant\n")
}

impl TokenizerHandle for QwenTokenizer {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<u32>, BoxError> {
        Ok(self.inner.encode(text, add_special_tokens)?.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String, BoxError> {
        Ok(self.inner.decode(ids, skip_special_tokens)?)
    }

    fn apply_chat_template(&self, prompt: &str) -> Result<String, BoxError> {
        let Some(template) = self.chat_template.as_deref() else {
            return Ok(chatml(prompt));
        };
        match self.render_template(template, prompt) {
            Ok(s) => Ok(s),
            Err(e) => {
                warn!("chat_template failed to render ({e}); using plain ChatML");
                Ok(chatml(prompt))
            }
        }
    }
}

// ── Model ────────────────────────────────────────────────────────────────

pub struct QwenModel {
    model: Mutex<ModelForCausalLM>,
    device: Device,
    eos_ids: Vec<u32>,
}

impl ModelRuntime for QwenModel {
    fn generate(&self, input_ids: &[u32], params: GenerationParams) -> Result<Vec<u32>, BoxError> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| "model lock poisoned by an earlier panic")?;
        model.clear_kv_cache();

        let sampling = if params.temperature <= 0.0 {
            Sampling::ArgMax
        } else {
            Sampling::All {
                temperature: f64::from(params.temperature),
            }
        };
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(299_792_458);
        let mut logits_processor = LogitsProcessor::from_sampling(seed, sampling);

        let mut tokens = input_ids.to_vec();
        let mut start_pos = 0;
        for index in 0..params.max_tokens {
            let context_size = if index > 0 { 1 } else { tokens.len() };
            let context = &tokens[tokens.len().saturating_sub(context_size)..];
            let input = Tensor::new(context, &self.device)?.unsqueeze(0)?;
            let logits = model.forward(&input, start_pos)?;
            let logits = logits.squeeze(0)?.squeeze(0)?.to_dtype(DType::F32)?;
            start_pos += context.len();

            let next = logits_processor.sample(&logits)?;
            tokens.push(next);
            if self.eos_ids.contains(&next) {
                break;
            }
        }
        debug!(
            "Generated {} tokens",
            tokens.len().saturating_sub(input_ids.len())
        );
        Ok(tokens)
    }
}
