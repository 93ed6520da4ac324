//! Tokenizer capability used by the trimmer.
//!
//! The trimmer only needs two operations: `encode` text into an ordered
//! sequence of token ids and `decode` a sequence of ids back into text.
//! Implementations must be deterministic for a given input within one run.
//!
//! # Implementations
//!
//! - [`CharTokenizer`]: one token per Unicode scalar value (default)
//! - [`ByteTokenizer`]: one token per UTF-8 byte
//! - [`BpeTokenizer`]: tiktoken BPE encodings, behind the `tiktoken` feature

mod bytes;
mod chars;
#[cfg(feature = "tiktoken")]
mod bpe;

pub use self::bytes::ByteTokenizer;
pub use self::chars::CharTokenizer;
#[cfg(feature = "tiktoken")]
pub use self::bpe::BpeTokenizer;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// A single token id.
pub type TokenId = u32;

/// Errors raised by a tokenizer. The trimmer propagates these unmodified.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenizerError {
    #[error("No tokenizer encoding available for model '{0}'")]
    UnsupportedModel(String),

    #[error("Failed to encode text: {0}")]
    Encode(String),

    #[error("Failed to decode tokens: {0}")]
    Decode(String),
}

/// Trait for tokenizer implementations.
pub trait Tokenizer: Send + Sync {
    /// Encode text into an ordered sequence of token ids.
    fn encode(&self, text: &str) -> Result<Vec<TokenId>, TokenizerError>;

    /// Decode an ordered sequence of token ids into text.
    fn decode(&self, tokens: &[TokenId]) -> Result<String, TokenizerError>;

    /// Count tokens in a plain text string.
    fn count(&self, text: &str) -> Result<usize, TokenizerError> {
        self.encode(text).map(|tokens| tokens.len())
    }
}

impl<T: Tokenizer + ?Sized> Tokenizer for Arc<T> {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>, TokenizerError> {
        (**self).encode(text)
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String, TokenizerError> {
        (**self).decode(tokens)
    }

    fn count(&self, text: &str) -> Result<usize, TokenizerError> {
        (**self).count(text)
    }
}

/// Arc-wrapped tokenizer for easy sharing.
pub type SharedTokenizer = Arc<dyn Tokenizer>;

/// Which built-in tokenizer to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerKind {
    #[default]
    Char,
    Byte,
    Bpe,
}

impl fmt::Display for TokenizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenizerKind::Char => "char",
            TokenizerKind::Byte => "byte",
            TokenizerKind::Bpe => "bpe",
        };
        f.write_str(name)
    }
}

impl FromStr for TokenizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "char" => Ok(TokenizerKind::Char),
            "byte" => Ok(TokenizerKind::Byte),
            "bpe" | "tiktoken" => Ok(TokenizerKind::Bpe),
            other => Err(format!(
                "unknown tokenizer '{other}', expected one of: char, byte, bpe"
            )),
        }
    }
}

/// Build a shared tokenizer of the given kind.
///
/// `model` selects the BPE encoding and is ignored by the other kinds.
/// Without the `tiktoken` feature, asking for `Bpe` reports the model as
/// unsupported.
pub fn build_tokenizer(kind: TokenizerKind, model: &str) -> Result<SharedTokenizer, TokenizerError> {
    match kind {
        TokenizerKind::Char => Ok(Arc::new(CharTokenizer)),
        TokenizerKind::Byte => Ok(Arc::new(ByteTokenizer)),
        #[cfg(feature = "tiktoken")]
        TokenizerKind::Bpe => Ok(Arc::new(BpeTokenizer::for_model(model)?)),
        #[cfg(not(feature = "tiktoken"))]
        TokenizerKind::Bpe => {
            tracing::warn!("BPE tokenizer requested but the `tiktoken` feature is disabled");
            Err(TokenizerError::UnsupportedModel(model.to_string()))
        }
    }
}
