//! Flat token storage for a tokenized conversation.
//!
//! Every message is encoded independently and its ids are appended to one
//! shared buffer. A parallel table records which `[start, end)` slice of the
//! buffer belongs to which message, so a cut at any flat offset can be mapped
//! back onto message boundaries without nested bookkeeping.

use std::ops::Range;

use crate::message::Message;
use crate::tokenizer::{TokenId, Tokenizer, TokenizerError};

/// The token range of one message inside a [`TokenArena`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpan {
    /// Index of the originating message
    pub index: usize,
    /// Role of the originating message
    pub role: String,
    /// Slice of the arena holding this message's tokens
    pub range: Range<usize>,
}

impl TokenSpan {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Where a span falls relative to a cut at a flat token offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanPosition {
    /// Entirely inside the dropped prefix
    Dropped,
    /// Crosses the cut; only `kept` survives
    Straddling { kept: Range<usize> },
    /// At or after the cut
    Kept,
}

/// One flat buffer of token ids plus per-message offsets.
#[derive(Debug, Default)]
pub struct TokenArena {
    tokens: Vec<TokenId>,
    spans: Vec<TokenSpan>,
}

impl TokenArena {
    /// Tokenize every message in order.
    ///
    /// Fails on the first tokenizer error.
    pub fn build(messages: &[Message], tokenizer: &dyn Tokenizer) -> Result<Self, TokenizerError> {
        let mut arena = Self::default();
        for (index, message) in messages.iter().enumerate() {
            let ids = tokenizer.encode(&message.content)?;
            let start = arena.tokens.len();
            arena.tokens.extend(ids);
            arena.spans.push(TokenSpan {
                index,
                role: message.role.clone(),
                range: start..arena.tokens.len(),
            });
        }
        Ok(arena)
    }

    /// Total number of tokens across all messages.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn spans(&self) -> &[TokenSpan] {
        &self.spans
    }

    pub fn tokens(&self, range: Range<usize>) -> &[TokenId] {
        &self.tokens[range]
    }

    /// Classify a span against a cut that drops the first `cut` tokens.
    ///
    /// Zero-length spans never straddle: they are kept when they sit at or
    /// after the cut and dropped otherwise.
    pub fn position(span: &TokenSpan, cut: usize) -> SpanPosition {
        if span.range.start >= cut {
            SpanPosition::Kept
        } else if span.range.end <= cut {
            SpanPosition::Dropped
        } else {
            SpanPosition::Straddling {
                kept: cut..span.range.end,
            }
        }
    }
}
