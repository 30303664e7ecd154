//! Configuration parsing and validation.
//!
//! QA Harness is configured via a TOML file (default: `config/qa.toml`).
//! Every section is optional; a missing file at the default path means
//! built-in defaults, while a file named explicitly must exist.
//!
//! # Example Configuration
//!
//! ```toml
//! [db]
//! path = "./data/qa.sqlite"
//!
//! [chunking]
//! chunk_size = 1000
//! overlap = 200
//!
//! [retrieval]
//! top_k = 8
//! script_context_k = 3
//!
//! [embedding]
//! provider = "openai"          # "disabled" | "openai" | "ollama" | "local"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [generator]
//! provider = "gemini"          # "disabled" | "gemini" | "openai" | "ollama"
//!
//! [documents]
//! include_globs = ["**/*.md", "**/*.txt"]
//! ```
//!
//! # Validation
//!
//! [`load_config`] rejects:
//! - `chunking.chunk_size == 0` or `chunking.overlap >= chunking.chunk_size`
//! - `retrieval.top_k < 1` or `retrieval.script_context_k < 1`
//! - unknown embedding or generator providers
//! - `openai`/`ollama` embeddings without `model` and `dims`

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use qa_harness_core::chunk::ChunkOptions;
use qa_harness_core::context::ContextBuilder;

/// Config path used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./config/qa.toml";

/// Top-level configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/qa.sqlite")
}

/// Character-window chunking parameters.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn options(&self) -> ChunkOptions {
        ChunkOptions {
            chunk_size: self.chunk_size,
            overlap: self.overlap,
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Passages retrieved per test-case request.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Passages retrieved as script context.
    #[serde(default = "default_script_context_k")]
    pub script_context_k: usize,
    /// Optional cap on the context handed to the generator, in characters.
    #[serde(default)]
    pub max_context_chars: Option<usize>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            script_context_k: default_script_context_k(),
            max_context_chars: None,
        }
    }
}

impl RetrievalConfig {
    pub fn context_builder(&self) -> ContextBuilder {
        ContextBuilder::new(self.max_context_chars)
    }
}

fn default_top_k() -> usize {
    8
}
fn default_script_context_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider (default: `http://localhost:11434`).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_timeout() -> u64 {
    30
}

/// Language-model backend used for test-case generation.
#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL override (OpenAI-compatible servers, Ollama).
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key. Defaults per provider.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Gemini models tried in order when the primary model is not found.
    /// Unset means the built-in list; `[]` disables the fallback.
    #[serde(default)]
    pub fallback_models: Option<Vec<String>>,
    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            url: None,
            api_key_env: None,
            fallback_models: None,
            timeout_secs: default_generator_timeout(),
        }
    }
}

impl GeneratorConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_generator_timeout() -> u64 {
    60
}

/// Which files a directory walk picks up.
#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    ["md", "txt", "json", "html", "htm", "pdf"]
        .iter()
        .map(|ext| format!("**/*.{}", ext))
        .collect()
}

/// Load and validate the config at `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Resolve the CLI `--config` flag.
///
/// An explicit path must exist. Without one, `config/qa.toml` is used when
/// present and built-in defaults otherwise.
pub fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => load_config(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                load_config(default)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        bail!(
            "chunking.overlap ({}) must be < chunking.chunk_size ({})",
            config.chunking.overlap,
            config.chunking.chunk_size
        );
    }

    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.script_context_k < 1 {
        bail!("retrieval.script_context_k must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    match config.generator.provider.as_str() {
        "disabled" | "gemini" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown generator provider: '{}'. Must be disabled, gemini, openai, or ollama.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(toml_text: &str) -> Result<Config> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml_text.as_bytes()).unwrap();
        load_config(file.path())
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.db.path, PathBuf::from("./data/qa.sqlite"));
        assert_eq!(cfg.chunking.chunk_size, 1000);
        assert_eq!(cfg.chunking.overlap, 200);
        assert_eq!(cfg.retrieval.top_k, 8);
        assert_eq!(cfg.retrieval.script_context_k, 3);
        assert!(!cfg.embedding.is_enabled());
        assert!(!cfg.generator.is_enabled());
        assert!(cfg.documents.include_globs.contains(&"**/*.pdf".to_string()));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let err = parse("[chunking]\nchunk_size = 100\noverlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("chunking.overlap"));
    }

    #[test]
    fn test_unknown_providers_rejected() {
        let err = parse("[embedding]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
        let err = parse("[generator]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown generator provider"));
    }

    #[test]
    fn test_remote_embeddings_need_model_and_dims() {
        let err = parse("[embedding]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
        let err =
            parse("[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\n").unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
        assert!(parse("[embedding]\nprovider = \"local\"\n").is_ok());
    }

    #[test]
    fn test_generator_fallback_models() {
        let cfg = parse("[generator]\nprovider = \"gemini\"\n").unwrap();
        assert!(cfg.generator.fallback_models.is_none());
        let cfg = parse(
            "[generator]\nprovider = \"gemini\"\nfallback_models = [\"gemini-2.5-pro\"]\n",
        )
        .unwrap();
        assert_eq!(
            cfg.generator.fallback_models,
            Some(vec!["gemini-2.5-pro".to_string()])
        );
    }

    #[test]
    fn test_malformed_file_is_error() {
        assert!(parse("[chunking\n").is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = resolve_config(Some(Path::new("/nonexistent/qa.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
