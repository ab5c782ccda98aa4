//! # veclite-embed
//!
//! A `fastembed`-backed implementation of `veclite`'s `Embedder`
//! capability: local, Rust-native text embeddings, no network calls
//! once the model is cached.
//!
//! ## Models
//!
//! - `all-MiniLM-L6-v2` (default, ~80MB, 384 dimensions)
//! - `bge-small-en-v1.5` (higher quality, ~130MB, 384 dimensions)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use veclite_embed::Embedder;
//!
//! let embedder = Embedder::new()?;
//! let embeddings = embedder.embed(&["Hello world", "Search query"])?;
//! ```

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use thiserror::Error;
use veclite::error::Error as VecliteError;

/// Embedding error types, wrapping into `veclite::Error::EmbedderError`
/// at the trait boundary.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("model error: {0}")]
    ModelError(String),

    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EmbedError>;

impl From<EmbedError> for VecliteError {
    fn from(err: EmbedError) -> Self {
        VecliteError::EmbedderError(err.to_string())
    }
}

/// Supported embedding models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Model {
    #[default]
    AllMiniLmL6V2,
    BgeSmallEnV1_5,
}

impl Model {
    fn to_fastembed(self) -> EmbeddingModel {
        match self {
            Model::AllMiniLmL6V2 => EmbeddingModel::AllMiniLML6V2,
            Model::BgeSmallEnV1_5 => EmbeddingModel::BGESmallENV15,
        }
    }

    pub fn dimensions(&self) -> usize {
        match self {
            Model::AllMiniLmL6V2 => 384,
            Model::BgeSmallEnV1_5 => 384,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Model::AllMiniLmL6V2 => "all-MiniLM-L6-v2",
            Model::BgeSmallEnV1_5 => "bge-small-en-v1.5",
        }
    }
}

impl std::str::FromStr for Model {
    type Err = EmbedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "all-minilm-l6-v2" | "minilm" | "default" => Ok(Model::AllMiniLmL6V2),
            "bge-small-en-v1.5" | "bge-small" | "bge" => Ok(Model::BgeSmallEnV1_5),
            _ => Err(EmbedError::ModelError(format!("unknown model: {}", s))),
        }
    }
}

/// Embedding model configuration.
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    pub model: Model,
    pub cache_dir: Option<std::path::PathBuf>,
    pub show_download_progress: bool,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            model: Model::default(),
            cache_dir: None,
            show_download_progress: true,
        }
    }
}

/// `fastembed`-backed embedder. Implements `veclite::embedder::Embedder`
/// so it can be registered directly on a `Client`.
pub struct Embedder {
    model: Arc<TextEmbedding>,
    config: EmbedConfig,
}

impl Embedder {
    pub fn new() -> Result<Self> {
        Self::with_config(EmbedConfig::default())
    }

    pub fn with_config(config: EmbedConfig) -> Result<Self> {
        tracing::info!("initializing embedder with model: {}", config.model.name());

        let mut init_options =
            InitOptions::new(config.model.to_fastembed()).with_show_download_progress(config.show_download_progress);

        if let Some(ref cache_dir) = config.cache_dir {
            init_options = init_options.with_cache_dir(cache_dir.clone());
        }

        let model = TextEmbedding::try_new(init_options).map_err(|e| EmbedError::ModelError(e.to_string()))?;

        tracing::info!("embedder initialized");
        Ok(Self { model: Arc::new(model), config })
    }

    pub fn dimensions(&self) -> usize {
        self.config.model.dimensions()
    }

    pub fn model_name(&self) -> &'static str {
        self.config.model.name()
    }

    pub fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let texts_owned: Vec<String> = texts.iter().map(|s| s.to_string()).collect();
        self.model
            .embed(texts_owned, None)
            .map_err(|e| EmbedError::EmbeddingFailed(e.to_string()))
    }

    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_texts(&[text])?;
        Ok(results.into_iter().next().unwrap_or_default())
    }
}

impl veclite::embedder::Embedder for Embedder {
    fn dimension(&self) -> usize {
        self.dimensions()
    }

    fn embed(&self, texts: &[&str]) -> veclite::error::Result<Vec<Vec<f32>>> {
        self.embed_texts(texts).map_err(VecliteError::from)
    }
}

/// A chunk of text with position information, for embedding long
/// documents in overlapping windows.
#[derive(Debug, Clone)]
pub struct TextChunk {
    pub text: String,
    pub char_offset: usize,
    pub index: usize,
}

/// Chunk text into overlapping segments via simple word-based
/// windowing: `chunk_size` words per chunk, `overlap` words shared
/// between consecutive chunks.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<TextChunk> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let words: Vec<(usize, &str)> = text
        .split_whitespace()
        .scan(0usize, |pos, word| {
            let start = text[*pos..].find(word).map(|i| *pos + i).unwrap_or(*pos);
            *pos = start + word.len();
            Some((start, word))
        })
        .collect();

    if words.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunk_index = 0;

    let mut i = 0;
    while i < words.len() {
        let end = (i + chunk_size).min(words.len());
        let chunk_words: Vec<&str> = words[i..end].iter().map(|(_, w)| *w).collect();
        let char_offset = words[i].0;

        chunks.push(TextChunk {
            text: chunk_words.join(" "),
            char_offset,
            index: chunk_index,
        });

        chunk_index += 1;
        if end >= words.len() {
            break;
        }
        i += step;
    }

    chunks
}
