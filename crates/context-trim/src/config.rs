//! Trimmer configuration.
//!
//! Loaded from a TOML file; every field has a default so a missing file or a
//! partial file both work.
//!
//! ```toml
//! tokenizer = "bpe"
//! model = "gpt-4o"
//! max_tokens = 8000
//!
//! [notes]
//! phases = ["triage", "fix"]
//! variables = ["ticket"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::notes::NoteAllowList;
use crate::tokenizer::{build_tokenizer, SharedTokenizer, TokenizerError, TokenizerKind};

/// Default trim size, in tokens.
pub const DEFAULT_MAX_TOKENS: usize = 100_000;

/// Default model used to pick a BPE encoding.
pub const DEFAULT_MODEL: &str = "gpt-4";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    /// Tokenizer used for counting and trimming
    pub tokenizer: TokenizerKind,
    /// Model name, used to resolve the BPE encoding
    pub model: String,
    /// Budget applied when none is given explicitly
    pub max_tokens: usize,
    /// Allowed task-note phases and placeholders
    pub notes: NoteAllowList,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            tokenizer: TokenizerKind::default(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            notes: NoteAllowList::default(),
        }
    }
}

impl TrimConfig {
    /// Read and parse a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Loaded trim config from {:?}", path);
        Ok(config)
    }

    /// Load `path` if given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Construct the configured tokenizer.
    pub fn build_tokenizer(&self) -> Result<SharedTokenizer, TokenizerError> {
        build_tokenizer(self.tokenizer, &self.model)
    }
}
