//! TOML configuration.
//!
//! Every section is optional and falls back to the defaults below, so an
//! empty file (or [`Config::minimal`]) is a working setup: JSON document
//! store under `./data`, PDFs from `./documents`, lexical index, language
//! model disabled.
//!
//! ```toml
//! [store]
//! backend = "json"            # json | sqlite
//! path = "./data/documents.json"
//!
//! [documents]
//! root = "./documents"
//! include_globs = ["**/*.pdf"]
//!
//! [chunking]
//! window_words = 100
//! overlap_words = 0
//!
//! [index]
//! strategy = "lexical"        # lexical | vector
//! snapshot_dir = "./data/index"
//!
//! [embedding]
//! provider = "hashing"        # hashing | openai | ollama | local
//!
//! [retrieval]
//! top_k = 3
//! max_total_chars = 2000
//! relevance_floor = 0.0
//!
//! [answer]
//! language = "es"             # es | en
//!
//! [llm]
//! provider = "openai"         # disabled | openai
//! model = "gpt-3.5-turbo"
//!
//! [server]
//! bind = "127.0.0.1:7340"
//! ```

use anyhow::{bail, Context, Result};
use pv_harness_core::compose::Language;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Fully defaulted configuration, used when no file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Store file; defaults depend on the backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
        }
    }
}

impl StoreConfig {
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(p) => p.clone(),
            None if self.backend == "sqlite" => PathBuf::from("./data/pvh.sqlite"),
            None => PathBuf::from("./data/documents.json"),
        }
    }
}

fn default_backend() -> String {
    "json".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_documents_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            root: default_documents_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_documents_root() -> PathBuf {
    PathBuf::from("./documents")
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.pdf".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_window_words")]
    pub window_words: usize,
    #[serde(default)]
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_words: default_window_words(),
            overlap_words: 0,
        }
    }
}

fn default_window_words() -> usize {
    pv_harness_core::chunk::DEFAULT_WINDOW_WORDS
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Directory holding vector snapshots (`vectors.bin`, `vectors.ids.json`).
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

fn default_strategy() -> String {
    "lexical".to_string()
}
fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("./data/index")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "hashing".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_total_chars")]
    pub max_total_chars: usize,
    #[serde(default)]
    pub relevance_floor: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_total_chars: default_max_total_chars(),
            relevance_floor: 0.0,
        }
    }
}

fn default_top_k() -> usize {
    pv_harness_core::retrieve::DEFAULT_TOP_K
}
fn default_max_total_chars() -> usize {
    pv_harness_core::retrieve::DEFAULT_MAX_TOTAL_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    #[serde(default)]
    pub language: Language,
    /// Overrides the localized "I don't know" phrase.
    #[serde(default)]
    pub unknown_sentinel: Option<String>,
    #[serde(default = "default_min_answer_chars")]
    pub min_answer_chars: usize,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            unknown_sentinel: None,
            min_answer_chars: default_min_answer_chars(),
        }
    }
}

fn default_min_answer_chars() -> usize {
    pv_harness_core::compose::DEFAULT_MIN_ANSWER_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            base_url: default_llm_base_url(),
        }
    }
}

fn default_llm_provider() -> String {
    "disabled".to_string()
}
fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_max_tokens() -> u32 {
    200
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `"warn"` or `"pv_harness=debug"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Read, parse, and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.window_words == 0 {
        bail!("chunking.window_words must be > 0");
    }
    if config.chunking.overlap_words >= config.chunking.window_words {
        bail!("chunking.overlap_words must be < chunking.window_words");
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.max_total_chars < 1 {
        bail!("retrieval.max_total_chars must be >= 1");
    }
    let floor = config.retrieval.relevance_floor;
    if floor.is_nan() || floor < 0.0 {
        bail!("retrieval.relevance_floor must be >= 0");
    }

    match config.store.backend.as_str() {
        "json" | "sqlite" => {}
        other => bail!(
            "Unknown store backend: '{}'. Must be json or sqlite.",
            other
        ),
    }

    match config.index.strategy.as_str() {
        "lexical" | "vector" => {}
        other => bail!(
            "Unknown index strategy: '{}'. Must be lexical or vector.",
            other
        ),
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "hashing" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() {
                bail!(
                    "embedding.dims must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be hashing, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(())
}
