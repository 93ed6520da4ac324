//! Token budget trimming for LLM conversations.
//!
//! Given an ordered conversation and a maximum token count, produce the most
//! recent suffix of the conversation that fits, cutting mid-message when the
//! boundary falls inside one.
//!
//! # Key Components
//!
//! - [`types`]: `TokenBudget`, `TrimmedContext`, `TrimReport`, `TrimError`
//! - [`arena`]: flat token buffer with per-message spans
//! - [`trimmer`]: the trim itself plus the reusable `ContextTrimmer`

pub mod arena;
pub mod trimmer;
pub mod types;

pub use arena::{SpanPosition, TokenArena, TokenSpan};
pub use trimmer::{count_tokens, trim_messages, trim_to_budget, ContextTrimmer};
pub use types::{TokenBudget, TrimError, TrimReport, TrimmedContext};
