//! Configuration types for the model service and the extraction chains.
//!
//! The service is controlled through [`ServiceConfig`], built via its
//! [`ServiceConfigBuilder`]. The binaries read the environment once at
//! startup (through clap's `env` support) and feed the values into the
//! builder; library users can build the same struct by hand.

use crate::error::TextkitError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

/// Model used when `QWEN_MODEL_PATH` is empty.
pub const DEFAULT_MODEL_PATH: &str = "Qwen/Qwen2.5-7B-Instruct";

/// OpenAI-compatible endpoint used when `QWEN_API_BASE` is empty.
pub const DEFAULT_API_BASE: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

/// Model name sent in remote chat-completion requests.
pub const DEFAULT_REMOTE_MODEL: &str = "qwen-long";

/// Configuration for the model service.
///
/// # Example
/// ```rust
/// use edgequake_textkit::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .local_mode(false)
///     .api_key("sk-test")
///     .port(9000)
///     .build()
///     .unwrap();
/// assert_eq!(config.bind_addr().port(), 9000);
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Local directory or Hugging Face repo id of the model. Default: Qwen2.5-7B-Instruct.
    pub model_path: String,

    /// Bearer token for the remote API.
    pub api_key: String,

    /// Base URL of the remote OpenAI-compatible API, without trailing slash.
    pub api_base: String,

    /// Run inference in-process (`true`) or forward to the remote API. Default: true.
    pub local_mode: bool,

    /// Address to listen on. Default: 0.0.0.0.
    pub host: IpAddr,

    /// Port to listen on. Default: 8004.
    pub port: u16,

    /// Model name used in remote chat-completion requests. Default: "qwen-long".
    pub remote_model: String,

    /// Timeout for the remote token-count call in seconds. Default: 10.
    pub token_count_timeout_secs: u64,

    /// Timeout for the remote generation call in seconds. Default: 300.
    pub generate_timeout_secs: u64,

    /// Parameters applied when a request omits them.
    pub generation: GenerationParams,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_MODEL_PATH.to_string(),
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            local_mode: true,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8004,
            remote_model: DEFAULT_REMOTE_MODEL.to_string(),
            token_count_timeout_secs: 10,
            generate_timeout_secs: 300,
            generation: GenerationParams::default(),
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("model_path", &self.model_path)
            .field(
                "api_key",
                &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" },
            )
            .field("api_base", &self.api_base)
            .field("local_mode", &self.local_mode)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("remote_model", &self.remote_model)
            .field("token_count_timeout_secs", &self.token_count_timeout_secs)
            .field("generate_timeout_secs", &self.generate_timeout_secs)
            .field("generation", &self.generation)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// An empty value keeps the default model.
    pub fn model_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        if !path.trim().is_empty() {
            self.config.model_path = path;
        }
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    /// An empty value keeps the default endpoint.
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        let base = base.trim().trim_end_matches('/');
        if !base.is_empty() {
            self.config.api_base = base.to_string();
        }
        self
    }

    pub fn local_mode(mut self, v: bool) -> Self {
        self.config.local_mode = v;
        self
    }

    pub fn host(mut self, host: IpAddr) -> Self {
        self.config.host = host;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn remote_model(mut self, model: impl Into<String>) -> Self {
        self.config.remote_model = model.into();
        self
    }

    pub fn token_count_timeout_secs(mut self, secs: u64) -> Self {
        self.config.token_count_timeout_secs = secs.max(1);
        self
    }

    pub fn generate_timeout_secs(mut self, secs: u64) -> Self {
        self.config.generate_timeout_secs = secs.max(1);
        self
    }

    pub fn default_max_tokens(mut self, n: u32) -> Self {
        self.config.generation.max_tokens = n.max(1);
        self
    }

    pub fn default_temperature(mut self, t: f32) -> Self {
        self.config.generation.temperature = t.clamp(0.0, 2.0);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, TextkitError> {
        let c = &self.config;
        if !c.api_base.starts_with("http://") && !c.api_base.starts_with("https://") {
            return Err(TextkitError::InvalidConfig(format!(
                "API base must be an http(s) URL, got '{}'",
                c.api_base
            )));
        }
        if c.remote_model.trim().is_empty() {
            return Err(TextkitError::InvalidConfig(
                "Remote model name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Interpret a `QWEN_LOCAL_MODE` value: only "true" (any case) selects local mode.
pub fn parse_local_mode(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

// ── Generation parameters ────────────────────────────────────────────────

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Maximum number of new tokens. Default: 2048.
    pub max_tokens: u32,
    /// Sampling temperature; 0 means greedy decoding. Default: 0.7.
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.7,
        }
    }
}

// ── PDF extractor selection ──────────────────────────────────────────────

/// One of the PDF text libraries the chain can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PdfExtractorKind {
    /// pdfium via `pdfium-render`.
    Pdfium,
    /// The `pdf-extract` crate.
    PdfExtract,
    /// The `lopdf` crate.
    Lopdf,
}

impl PdfExtractorKind {
    /// Priority order used when nothing else is configured.
    pub const DEFAULT_ORDER: [PdfExtractorKind; 3] = [
        PdfExtractorKind::Pdfium,
        PdfExtractorKind::PdfExtract,
        PdfExtractorKind::Lopdf,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PdfExtractorKind::Pdfium => "pdfium",
            PdfExtractorKind::PdfExtract => "pdf-extract",
            PdfExtractorKind::Lopdf => "lopdf",
        }
    }

    /// Whether support for this library was compiled in.
    pub fn is_compiled(self) -> bool {
        match self {
            PdfExtractorKind::Pdfium => cfg!(feature = "pdfium"),
            PdfExtractorKind::PdfExtract => cfg!(feature = "pdf-extract"),
            PdfExtractorKind::Lopdf => cfg!(feature = "lopdf"),
        }
    }

    /// Parse a comma-separated list such as `"lopdf,pdf-extract"`.
    ///
    /// Order is preserved and duplicates are dropped.
    pub fn parse_list(s: &str) -> Result<Vec<PdfExtractorKind>, TextkitError> {
        let mut kinds = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let kind = part.parse::<PdfExtractorKind>()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        if kinds.is_empty() {
            return Err(TextkitError::InvalidConfig(
                "Extractor list must name at least one extractor".into(),
            ));
        }
        Ok(kinds)
    }
}

impl FromStr for PdfExtractorKind {
    type Err = TextkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdfium" => Ok(PdfExtractorKind::Pdfium),
            "pdf-extract" | "pdf_extract" => Ok(PdfExtractorKind::PdfExtract),
            "lopdf" => Ok(PdfExtractorKind::Lopdf),
            other => Err(TextkitError::InvalidConfig(format!(
                "Unknown PDF extractor '{other}' (expected pdfium, pdf-extract or lopdf)"
            ))),
        }
    }
}

impl fmt::Display for PdfExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
