//! Trimming a conversation to a token budget.
//!
//! Tokens are removed from the oldest end first. Whole messages inside the
//! dropped prefix disappear, the message that straddles the cut keeps only its
//! trailing tokens, and everything after the cut is returned untouched.

use std::ops::Range;

use tracing::debug;

use crate::budget::arena::{SpanPosition, TokenArena};
use crate::budget::types::{TokenBudget, TrimError, TrimReport, TrimmedContext};
use crate::message::Message;
use crate::tokenizer::{SharedTokenizer, Tokenizer};

/// Trim `messages` so their content fits in `budget` tokens.
///
/// Returns the input unchanged when it already fits. Otherwise the first
/// `total - budget` tokens of the conversation are dropped and the result
/// holds at most `budget` tokens. It holds exactly `budget` when the
/// tokenizer re-encodes a decoded suffix to the same length.
///
/// # Errors
///
/// * [`TrimError::InvalidBudget`] if `budget` is zero
/// * [`TrimError::Tokenizer`] if encoding or decoding fails
///
/// # Example
///
/// ```
/// use context_trim::{trim_messages, CharTokenizer, Message};
///
/// # fn main() -> Result<(), context_trim::TrimError> {
/// let messages = vec![Message::system("You are terse."), Message::user("Hello")];
/// let trimmed = trim_messages(messages, 8, &CharTokenizer)?;
///
/// assert_eq!(trimmed, vec![Message::system("se."), Message::user("Hello")]);
/// # Ok(())
/// # }
/// ```
pub fn trim_messages(
    messages: Vec<Message>,
    budget: usize,
    tokenizer: &dyn Tokenizer,
) -> Result<Vec<Message>, TrimError> {
    let budget = TokenBudget::try_from(budget)?;
    trim_to_budget(messages, budget, tokenizer).map(|trimmed| trimmed.messages)
}

/// Sum of content tokens across `messages`.
pub fn count_tokens(messages: &[Message], tokenizer: &dyn Tokenizer) -> Result<usize, TrimError> {
    messages.iter().try_fold(0usize, |total, message| {
        Ok(total + tokenizer.count(&message.content)?)
    })
}

/// Trim with a validated budget and report what happened.
pub fn trim_to_budget(
    messages: Vec<Message>,
    budget: TokenBudget,
    tokenizer: &dyn Tokenizer,
) -> Result<TrimmedContext, TrimError> {
    let budget = budget.get();

    // 1. Tokenize every message into one flat arena
    let arena = TokenArena::build(&messages, tokenizer)?;
    let total = arena.len();

    // 2. Identity case
    if total <= budget {
        debug!(total, budget, "Conversation fits within budget");
        return Ok(TrimmedContext {
            messages,
            report: TrimReport::unchanged(total, budget),
        });
    }

    // 3. Drop the oldest `excess` tokens
    let cut = total - budget;
    debug!(total, budget, cut, "Trimming conversation prefix");

    // 4. Regroup surviving tokens by original message boundaries
    let mut kept = Vec::with_capacity(messages.len());
    let mut messages_dropped = 0;
    let mut output_tokens = 0;
    let mut truncated = false;

    for (span, message) in arena.spans().iter().zip(messages) {
        match TokenArena::position(span, cut) {
            SpanPosition::Dropped => messages_dropped += 1,
            SpanPosition::Straddling { kept: range } => {
                debug!(
                    index = span.index,
                    role = %span.role,
                    kept = range.len(),
                    of = span.len(),
                    "Truncating straddling message"
                );
                let (content, used) = decode_within(&arena, range, tokenizer)?;
                kept.push(Message::new(message.role, content));
                output_tokens += used;
                truncated = true;
            }
            SpanPosition::Kept => {
                output_tokens += span.len();
                kept.push(message);
            }
        }
    }

    Ok(TrimmedContext {
        messages: kept,
        report: TrimReport {
            input_tokens: total,
            output_tokens,
            budget,
            messages_dropped,
            truncated,
        },
    })
}

/// Decode `range`, shedding leading tokens until the text re-encodes to no
/// more tokens than were kept.
///
/// A cut inside a multi-byte character decodes to a replacement character
/// that can cost more tokens than the fragment it replaced.
fn decode_within(
    arena: &TokenArena,
    range: Range<usize>,
    tokenizer: &dyn Tokenizer,
) -> Result<(String, usize), TrimError> {
    let Range { mut start, end } = range;
    loop {
        let content = tokenizer.decode(arena.tokens(start..end))?;
        let used = tokenizer.count(&content)?;
        if used <= end - start || start == end {
            return Ok((content, used));
        }
        start += 1;
    }
}

/// Reusable trimmer bound to one tokenizer.
///
/// Cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct ContextTrimmer {
    tokenizer: SharedTokenizer,
}

impl ContextTrimmer {
    pub fn new(tokenizer: SharedTokenizer) -> Self {
        Self { tokenizer }
    }

    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    /// Trim `messages` to `budget` tokens.
    pub fn trim(&self, messages: Vec<Message>, budget: usize) -> Result<TrimmedContext, TrimError> {
        let budget = TokenBudget::try_from(budget)?;
        trim_to_budget(messages, budget, self.tokenizer.as_ref())
    }

    pub fn count(&self, messages: &[Message]) -> Result<usize, TrimError> {
        count_tokens(messages, self.tokenizer.as_ref())
    }

    /// Check whether `messages` exceed `budget` tokens.
    pub fn needs_trim(&self, messages: &[Message], budget: usize) -> Result<bool, TrimError> {
        Ok(self.count(messages)? > budget)
    }
}

impl std::fmt::Debug for ContextTrimmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextTrimmer").finish_non_exhaustive()
    }
}
