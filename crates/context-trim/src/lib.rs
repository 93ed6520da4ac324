//! Token-budget trimming for ordered chat histories.
//!
//! [`trim_messages`] drops content from the oldest end of a conversation
//! until it fits a token budget, truncating the one message that straddles
//! the cut. The surrounding modules cover tokenization, task-note
//! validation, and small prompt-text helpers.

pub mod budget;
pub mod config;
pub mod message;
pub mod notes;
pub mod text;
pub mod tokenizer;

pub use budget::{
    count_tokens, trim_messages, trim_to_budget, ContextTrimmer, TokenBudget, TrimError,
    TrimReport, TrimmedContext,
};
pub use config::{ConfigError, TrimConfig};
pub use message::Message;
pub use notes::{
    check_task_notes, notes_for_phase, render_task_notes, validate_task_notes, NoteAllowList,
    NoteError, TaskNote,
};
pub use text::{extract_fenced, strip_reasoning};
pub use tokenizer::{
    build_tokenizer, ByteTokenizer, CharTokenizer, SharedTokenizer, TokenId, Tokenizer,
    TokenizerError, TokenizerKind,
};
#[cfg(feature = "tiktoken")]
pub use tokenizer::BpeTokenizer;
