//! Core types for token budget trimming.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use thiserror::Error;

use crate::message::Message;
use crate::tokenizer::TokenizerError;

/// Maximum total content tokens allowed in a trimmed conversation.
///
/// Always positive; role names and message framing are not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "usize")]
pub struct TokenBudget(NonZeroUsize);

impl TokenBudget {
    /// Validate a caller-supplied budget.
    pub fn new(budget: i64) -> Result<Self, TrimError> {
        usize::try_from(budget)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(Self)
            .ok_or(TrimError::InvalidBudget { budget })
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl TryFrom<usize> for TokenBudget {
    type Error = TrimError;

    fn try_from(budget: usize) -> Result<Self, Self::Error> {
        NonZeroUsize::new(budget)
            .map(Self)
            .ok_or(TrimError::InvalidBudget { budget: 0 })
    }
}

impl TryFrom<i64> for TokenBudget {
    type Error = TrimError;

    fn try_from(budget: i64) -> Result<Self, Self::Error> {
        Self::new(budget)
    }
}

impl From<TokenBudget> for usize {
    fn from(budget: TokenBudget) -> Self {
        budget.get()
    }
}

impl std::fmt::Display for TokenBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of trimming a conversation to a budget.
#[derive(Debug, Clone)]
pub struct TrimmedContext {
    /// Messages that fit the budget, in their original order
    pub messages: Vec<Message>,
    /// What the trim did
    pub report: TrimReport,
}

/// Summary of a single trim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimReport {
    /// Content tokens in the input conversation
    pub input_tokens: usize,
    /// Content tokens kept in the output
    pub output_tokens: usize,
    /// Budget the trim was asked to meet
    pub budget: usize,
    /// Number of leading messages omitted entirely
    pub messages_dropped: usize,
    /// Whether the oldest surviving message lost a prefix of its content
    pub truncated: bool,
}

impl TrimReport {
    /// Report for a conversation that already fit.
    pub fn unchanged(tokens: usize, budget: usize) -> Self {
        Self {
            input_tokens: tokens,
            output_tokens: tokens,
            budget,
            messages_dropped: 0,
            truncated: false,
        }
    }

    pub fn tokens_removed(&self) -> usize {
        self.input_tokens.saturating_sub(self.output_tokens)
    }

    pub fn trim_occurred(&self) -> bool {
        self.messages_dropped > 0 || self.truncated
    }

    /// Percentage of the budget used by the output.
    pub fn usage_percentage(&self) -> f64 {
        if self.budget == 0 {
            return 0.0;
        }
        (self.output_tokens as f64 / self.budget as f64) * 100.0
    }
}

/// Errors that can occur while trimming.
#[derive(Debug, Error)]
pub enum TrimError {
    /// Budget is not a positive integer
    #[error("Token budget must be a positive integer, got {budget}")]
    InvalidBudget { budget: i64 },

    /// Tokenizer failure, passed through unchanged
    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
}
